//! Timing and CPU measurement around one execution.

use super::cpu::CpuSession;
use super::execution::ExecutionOutput;
use cellbench_core::{MetricBatch, Summary};
use std::time::Instant;

/// Execution output plus its wall-clock time and CPU utilization
#[derive(Debug, Clone)]
pub struct BenchmarkResult {
    pub rows: MetricBatch,
    pub summary: Summary,
    /// Elapsed seconds, rounded to milliseconds
    pub time_seconds: f64,
    /// System-wide busy percentage over the run, one decimal
    pub cpu_percent: f64,
}

/// Run `execute` once, timing it and sampling CPU utilization.
///
/// The CPU window opens before the clock starts and closes after it stops,
/// so the reading covers only this run. Errors are returned unchanged.
pub fn benchmark_execution<F, E>(execute: F) -> Result<BenchmarkResult, E>
where
    F: FnOnce() -> Result<ExecutionOutput, E>,
{
    let cpu = CpuSession::start();
    let start = Instant::now();
    let output = execute()?;
    let elapsed = start.elapsed();
    let cpu_percent = cpu.finish();

    Ok(BenchmarkResult {
        rows: output.rows,
        summary: output.summary,
        time_seconds: round_millis(elapsed.as_secs_f64()),
        cpu_percent,
    })
}

fn round_millis(seconds: f64) -> f64 {
    (seconds * 1000.0).round() / 1000.0
}
