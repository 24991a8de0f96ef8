//! Pipeline Executor
//!
//! Runs the cell-metrics pipeline under one of three strategies and turns
//! the outcome into reports.
//!
//! ## Pipeline Overview
//!
//! ```text
//! CsvSource (chunked reader)
//!       │
//!       ▼
//! ┌─────────────┐
//! │  execution  │  single / thread / process: compute every chunk
//! └──────┬──────┘
//!        │
//!        ▼
//! ┌─────────────┐
//! │  benchmark  │  Wall-clock time + CPU utilization of one run
//! └──────┬──────┘
//!        │
//!        ▼
//! ┌─────────────┐
//! │   report    │  JSON documents, checksums, consistency
//! └──────┬──────┘
//!        │
//!        ▼
//! ┌─────────────┐
//! │ formatting  │  Human-readable output
//! └─────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`execution`] - The three execution strategies
//! - [`benchmark`] - Timing and CPU measurement around one execution
//! - [`cpu`] - System-wide CPU utilization sampling
//! - [`report`] - Report documents
//! - [`formatting`] - Human-readable output formatting
//! - [`metadata`] - System metadata collection

mod benchmark;
mod cpu;
mod execution;
mod formatting;
mod metadata;
mod report;

// Re-export public API
pub use benchmark::{BenchmarkResult, benchmark_execution};
pub use cpu::{CpuSession, CpuTimes, utilization};
pub use execution::{
    ExecutionConfig, ExecutionError, ExecutionMode, ExecutionOutput, Executor, ProcessExecutor,
    SingleExecutor, ThreadedExecutor,
};
pub use formatting::{format_compare_output, format_human_output, format_rows};
pub use metadata::{RunMeta, build_run_meta};
pub use report::{
    BenchmarkReport, CHECKSUM_TOLERANCE, CompareReport, RowRecord, results_consistent, row_records,
};
