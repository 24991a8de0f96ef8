//! Execution Strategies
//!
//! Three interchangeable ways to run load → compute → aggregate over one
//! CSV source. All of them produce the same metric rows in file order and
//! the same summary; only the scheduling of the compute stage differs.

use crate::supervisor::{Supervisor, SupervisorError};
use cellbench_core::{
    CsvSource, LoadError, MetricBatch, RowBatch, Summary, aggregate_metrics, compute_row_metrics,
};
use rayon::ThreadPoolBuilder;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Supervisor(#[from] SupervisorError),

    #[error("Failed to build thread pool: {0}")]
    ThreadPool(String),

    #[error("Worker binary unavailable: {0}")]
    WorkerBinary(std::io::Error),

    #[error("Expected {expected} metric rows, got {got}")]
    RowCountMismatch { expected: usize, got: usize },
}

/// Strategy selector
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    /// Sequential, in the calling thread
    Single,
    /// Thread pool inside this process
    Thread,
    /// Pool of worker processes
    Process,
}

impl ExecutionMode {
    /// Every mode, in comparison order
    pub const ALL: [ExecutionMode; 3] = [Self::Single, Self::Thread, Self::Process];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Single => "single",
            Self::Thread => "thread",
            Self::Process => "process",
        }
    }

    /// Build the executor for this mode
    pub fn executor(&self, config: &ExecutionConfig) -> Box<dyn Executor> {
        match self {
            Self::Single => Box::new(SingleExecutor),
            Self::Thread => Box::new(ThreadedExecutor::new(config.threads)),
            Self::Process => Box::new(ProcessExecutor::new(
                config.processes,
                config.worker_binary.clone(),
            )),
        }
    }
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Settings shared by the executors
#[derive(Debug, Clone)]
pub struct ExecutionConfig {
    /// Thread pool size of the thread strategy
    pub threads: usize,
    /// Worker processes of the process strategy (None: available CPUs)
    pub processes: Option<usize>,
    /// Worker executable (None: the running executable)
    pub worker_binary: Option<PathBuf>,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            threads: ThreadedExecutor::DEFAULT_THREADS,
            processes: None,
            worker_binary: None,
        }
    }
}

/// Result of one full pipeline run
#[derive(Debug, Clone)]
pub struct ExecutionOutput {
    /// Metric rows of every chunk, concatenated in file order
    pub rows: MetricBatch,
    /// Mean and std of every metric column
    pub summary: Summary,
}

/// A pipeline execution strategy
pub trait Executor: Send + Sync {
    fn mode(&self) -> ExecutionMode;

    /// Run load → compute → aggregate over `source`
    fn execute(&self, source: &CsvSource) -> Result<ExecutionOutput, ExecutionError>;
}

/// Concatenate per-chunk results and aggregate them.
fn assemble(batches: Vec<MetricBatch>, expected: usize) -> Result<ExecutionOutput, ExecutionError> {
    let rows = MetricBatch::concat(batches);
    if rows.len() != expected {
        return Err(ExecutionError::RowCountMismatch {
            expected,
            got: rows.len(),
        });
    }
    let summary = aggregate_metrics(&rows);
    Ok(ExecutionOutput { rows, summary })
}

fn total_rows(chunks: &[RowBatch]) -> usize {
    chunks.iter().map(RowBatch::len).sum()
}

/// Computes each chunk in the calling thread as it is read
#[derive(Debug, Clone, Copy, Default)]
pub struct SingleExecutor;

impl Executor for SingleExecutor {
    fn mode(&self) -> ExecutionMode {
        ExecutionMode::Single
    }

    fn execute(&self, source: &CsvSource) -> Result<ExecutionOutput, ExecutionError> {
        let mut batches = Vec::new();
        let mut expected = 0;
        for chunk in source.chunks()? {
            let chunk = chunk?;
            expected += chunk.len();
            batches.push(compute_row_metrics(&chunk));
        }
        tracing::debug!(chunks = batches.len(), rows = expected, "single: computed");
        assemble(batches, expected)
    }
}

/// Computes all chunks on a dedicated rayon pool
#[derive(Debug, Clone, Copy)]
pub struct ThreadedExecutor {
    threads: usize,
}

impl ThreadedExecutor {
    pub const DEFAULT_THREADS: usize = 4;

    pub fn new(threads: usize) -> Self {
        Self {
            threads: threads.max(1),
        }
    }

    pub fn threads(&self) -> usize {
        self.threads
    }
}

impl Default for ThreadedExecutor {
    fn default() -> Self {
        Self::new(Self::DEFAULT_THREADS)
    }
}

impl Executor for ThreadedExecutor {
    fn mode(&self) -> ExecutionMode {
        ExecutionMode::Thread
    }

    fn execute(&self, source: &CsvSource) -> Result<ExecutionOutput, ExecutionError> {
        let chunks = source.load_all()?;
        let expected = total_rows(&chunks);

        let pool = ThreadPoolBuilder::new()
            .num_threads(self.threads)
            .build()
            .map_err(|e| ExecutionError::ThreadPool(e.to_string()))?;

        // par_iter + collect keeps chunk order
        let batches: Vec<MetricBatch> =
            pool.install(|| chunks.par_iter().map(compute_row_metrics).collect());

        tracing::debug!(
            threads = self.threads,
            chunks = batches.len(),
            rows = expected,
            "thread: computed"
        );
        assemble(batches, expected)
    }
}

/// Computes chunks in separate worker processes
#[derive(Debug, Clone, Default)]
pub struct ProcessExecutor {
    workers: Option<usize>,
    worker_binary: Option<PathBuf>,
}

impl ProcessExecutor {
    pub fn new(workers: Option<usize>, worker_binary: Option<PathBuf>) -> Self {
        Self {
            workers,
            worker_binary,
        }
    }

    /// Worker count for `chunk_count` chunks: configured or available CPUs,
    /// never more than there are chunks.
    pub fn worker_count(&self, chunk_count: usize) -> usize {
        let configured = self.workers.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        });
        configured.max(1).min(chunk_count.max(1))
    }

    fn resolve_binary(&self) -> Result<PathBuf, ExecutionError> {
        match &self.worker_binary {
            Some(path) => Ok(path.clone()),
            None => std::env::current_exe().map_err(ExecutionError::WorkerBinary),
        }
    }
}

impl Executor for ProcessExecutor {
    fn mode(&self) -> ExecutionMode {
        ExecutionMode::Process
    }

    fn execute(&self, source: &CsvSource) -> Result<ExecutionOutput, ExecutionError> {
        let chunks = source.load_all()?;
        let expected = total_rows(&chunks);
        let workers = self.worker_count(chunks.len());
        let supervisor = Supervisor::new(self.resolve_binary()?, workers);

        tracing::debug!(
            workers,
            chunks = chunks.len(),
            rows = expected,
            "process: dispatching"
        );
        let batches = supervisor.map_chunks(chunks)?;
        assemble(batches, expected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const HEADER: &str = "CellId,Nuclear Volume [fL],Cellular Volume [fL],Nuclear Surface Area [um^2],Cellular Surface Area [um^2]";

    fn write_csv(rows: usize) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "{}", HEADER).unwrap();
        for i in 0..rows {
            let n = 100.0 + i as f64;
            writeln!(file, "cell-{},{},{},{},{}", i, n, n * 2.5, n * 0.8, n * 1.6).unwrap();
        }
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_mode_names_match_cli_values() {
        use clap::ValueEnum;
        for mode in ExecutionMode::ALL {
            let value = mode.to_possible_value().unwrap();
            assert_eq!(value.get_name(), mode.as_str());
            assert_eq!(mode.to_string(), mode.as_str());
        }
        assert_eq!(format!("{:<8}|", ExecutionMode::Thread), "thread  |");
        assert_eq!(
            serde_json::to_string(&ExecutionMode::Process).unwrap(),
            "\"process\""
        );
    }

    #[test]
    fn test_single_and_thread_agree() {
        let file = write_csv(103);
        let source = CsvSource::new(file.path(), 10).unwrap();

        let single = SingleExecutor.execute(&source).unwrap();
        let threaded = ThreadedExecutor::new(3).execute(&source).unwrap();

        assert_eq!(single.rows.len(), 103);
        assert_eq!(single.rows, threaded.rows);
        assert_eq!(single.summary, threaded.summary);
        assert_eq!(single.rows.cell_ids[0], "cell-0");
        assert_eq!(single.rows.cell_ids[102], "cell-102");
    }

    #[test]
    fn test_header_only_file() {
        let file = write_csv(0);
        let source = CsvSource::new(file.path(), 10).unwrap();
        let output = ThreadedExecutor::default().execute(&source).unwrap();
        assert!(output.rows.is_empty());
        assert!(output.summary.get("ncr").unwrap().mean.is_nan());
    }

    #[test]
    fn test_load_errors_propagate() {
        let source = CsvSource::new("/nonexistent/cells.csv", 10).unwrap();
        assert!(matches!(
            SingleExecutor.execute(&source),
            Err(ExecutionError::Load(_))
        ));
        assert!(matches!(
            ProcessExecutor::default().execute(&source),
            Err(ExecutionError::Load(_))
        ));
    }

    #[test]
    fn test_process_worker_count() {
        let executor = ProcessExecutor::new(Some(8), None);
        assert_eq!(executor.worker_count(3), 3);
        assert_eq!(executor.worker_count(20), 8);
        assert_eq!(executor.worker_count(0), 1);
        assert!(ProcessExecutor::default().worker_count(1000) >= 1);
    }

    #[test]
    fn test_row_count_mismatch_detected() {
        let err = assemble(vec![MetricBatch::default()], 5).unwrap_err();
        assert!(matches!(
            err,
            ExecutionError::RowCountMismatch {
                expected: 5,
                got: 0
            }
        ));
    }

    #[test]
    fn test_executor_factory() {
        let config = ExecutionConfig::default();
        for mode in ExecutionMode::ALL {
            assert_eq!(mode.executor(&config).mode(), mode);
        }
    }
}
