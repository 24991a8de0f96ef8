#![warn(missing_docs)]
//! # cellbench
//!
//! Derives per-cell morphology metrics from a microscopy measurement CSV and
//! aggregates them, with three interchangeable execution strategies whose
//! timings and CPU load can be compared.
//!
//! - **Chunked loading**: the CSV is read in fixed-size row chunks
//! - **Row metrics**: nuclear/cytoplasmic ratio, sphericity, volume/surface
//!   ratio, eccentricity, cell density and shape factor per cell
//! - **Aggregation**: per-metric mean and sample standard deviation
//! - **Strategies**: single-threaded, thread pool, or worker processes
//!   talking rkyv frames over pipes
//! - **Benchmarking**: wall-clock time, system CPU utilization and an output
//!   checksum per run
//!
//! ## Quick Start
//!
//! ```no_run
//! use cellbench::prelude::*;
//!
//! # fn main() -> anyhow::Result<()> {
//! let source = CsvSource::new("data/cells.csv", 5000)?;
//! let result = benchmark_execution(|| ThreadedExecutor::new(4).execute(&source))?;
//! println!(
//!     "{} rows in {}s, checksum {}",
//!     result.rows.len(),
//!     result.time_seconds,
//!     checksum_rows(&result.rows)
//! );
//! # Ok(())
//! # }
//! ```
//!
//! ## Command line
//!
//! The `cellbench` binary wraps the same pipeline:
//!
//! ```text
//! cellbench benchmark --mode process --format json
//! cellbench rows --limit 20
//! cellbench compare
//! ```

// Re-export pipeline stages
pub use cellbench_core::{
    CELL_ID_COLUMN, CELLULAR_SURFACE_AREA_COLUMN, CELLULAR_VOLUME_COLUMN, ChunkLoader,
    ColumnSummary, CsvSource, LoadError, METRIC_COLUMNS, Measurements, MetricBatch,
    NUCLEAR_SURFACE_AREA_COLUMN, NUCLEAR_VOLUME_COLUMN, REQUIRED_COLUMNS, RowBatch, Summary,
    aggregate_metrics, checksum_rows, compute_row_metrics,
};

// Re-export execution and reporting
pub use cellbench_cli::{
    BenchmarkReport, BenchmarkResult, CellConfig, CompareReport, CpuSession, ExecutionConfig,
    ExecutionError, ExecutionMode, ExecutionOutput, Executor, ProcessExecutor, RowRecord,
    SingleExecutor, Supervisor, SupervisorError, ThreadedExecutor, benchmark_execution,
    results_consistent, row_records,
};

// Re-export stats
pub use cellbench_stats::{compute_summary, sum_skipna};

/// Run the cellbench command line; see [`cellbench_cli::run`]
pub fn run() -> anyhow::Result<()> {
    cellbench_cli::run()
}

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{
        CsvSource, ExecutionMode, Executor, MetricBatch, ProcessExecutor, SingleExecutor, Summary,
        ThreadedExecutor, benchmark_execution, checksum_rows,
    };
}
