#![warn(missing_docs)]
//! cellbench Core - Pipeline Stages
//!
//! The stages every execution strategy is built from:
//! - [`CsvSource`] / [`ChunkLoader`] read the measurement file in fixed-size chunks
//! - [`compute_row_metrics`] maps one chunk to its derived metric columns
//! - [`aggregate_metrics`] reduces all metric rows to a mean/std [`Summary`]
//! - [`checksum_rows`] digests metric rows for cross-strategy comparison
//! - [`WorkerMain`] runs the compute stage inside a worker process

mod aggregate;
mod checksum;
mod compute;
mod loader;
mod worker;

pub use aggregate::{Summary, aggregate_metrics};
pub use checksum::checksum_rows;
pub use compute::{Column, compute_row_metrics};
pub use loader::{
    CELL_ID_COLUMN, CELLULAR_SURFACE_AREA_COLUMN, CELLULAR_VOLUME_COLUMN, ChunkLoader, CsvSource,
    LoadError, NUCLEAR_SURFACE_AREA_COLUMN, NUCLEAR_VOLUME_COLUMN, REQUIRED_COLUMNS,
};
pub use worker::{WorkerMain, shutdown_requested};

pub use cellbench_ipc::{METRIC_COLUMNS, Measurements, MetricBatch, RowBatch};
pub use cellbench_stats::ColumnSummary;
