#![warn(missing_docs)]
//! cellbench IPC Protocol
//!
//! Batch data model and the framed protocol spoken between the supervisor and
//! its worker processes. Row and metric batches are column-oriented and
//! serialized with rkyv; every message is one length-prefixed frame.

mod batch;
mod framing;
mod messages;

pub use batch::{METRIC_COLUMNS, Measurements, MetricBatch, RowBatch};
pub use framing::{FrameError, FrameReader, FrameWriter, MAX_FRAME_SIZE, read_frame, write_frame};
pub use messages::{FailureKind, SupervisorCommand, WorkerCapabilities, WorkerMessage};

/// Protocol version for compatibility checking
pub const PROTOCOL_VERSION: u32 = 2;

/// Environment variable carrying the worker's `<read_fd>,<write_fd>` pair
pub const IPC_FD_ENV: &str = "CELLBENCH_IPC_FD";

/// Hidden command-line flag that starts a binary in worker mode
pub const WORKER_FLAG: &str = "--cell-worker";
