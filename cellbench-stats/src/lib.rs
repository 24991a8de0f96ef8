#![warn(missing_docs)]
//! cellbench Statistical Engine
//!
//! Column reductions used by the aggregator and the checksum:
//! - Mean and sample standard deviation with missing values skipped
//! - Order-independent accumulation, so parallel strategies that reassemble
//!   rows differently still agree bit for bit

mod summary;

pub use summary::{ColumnSummary, compute_summary, sum_skipna};
