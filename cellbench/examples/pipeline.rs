//! Library-level walk through the pipeline
//!
//! Writes a synthetic measurement file, runs it through the in-process
//! strategies and prints their timings and checksums.
//!
//! Run with:
//!   cargo run --example pipeline              # 50 000 synthetic cells
//!   cargo run --example pipeline -- 200000    # custom row count

use cellbench::prelude::*;
use cellbench::{BenchmarkReport, REQUIRED_COLUMNS, results_consistent};
use std::io::{BufWriter, Write};

fn write_synthetic_csv(path: &std::path::Path, rows: usize) -> std::io::Result<()> {
    let mut out = BufWriter::new(std::fs::File::create(path)?);
    writeln!(out, "{}", REQUIRED_COLUMNS.join(","))?;
    for i in 0..rows {
        // Deterministic spread of sizes, nucleus always smaller than the cell
        let t = (i % 997) as f64 / 997.0;
        let nuclear_volume = 150.0 + 250.0 * t;
        let cellular_volume = nuclear_volume * (2.0 + t);
        let nuclear_area = 4.836 * nuclear_volume.powf(2.0 / 3.0) * (1.0 + 0.2 * t);
        let cellular_area = 4.836 * cellular_volume.powf(2.0 / 3.0) * (1.0 + 0.1 * t);
        writeln!(
            out,
            "cell-{i},{nuclear_volume:.3},{cellular_volume:.3},{nuclear_area:.3},{cellular_area:.3}"
        )?;
    }
    out.flush()
}

fn main() -> anyhow::Result<()> {
    let rows: usize = std::env::args()
        .nth(1)
        .map(|s| s.parse())
        .transpose()?
        .unwrap_or(50_000);

    let dir = std::env::temp_dir().join("cellbench-example");
    std::fs::create_dir_all(&dir)?;
    let path = dir.join("cells.csv");
    write_synthetic_csv(&path, rows)?;

    let source = CsvSource::new(&path, 5000)?;
    let executors: [(ExecutionMode, Box<dyn Executor>); 2] = [
        (ExecutionMode::Single, Box::new(SingleExecutor)),
        (ExecutionMode::Thread, Box::new(ThreadedExecutor::new(4))),
    ];

    let mut reports = Vec::new();
    for (mode, executor) in executors {
        let result = benchmark_execution(|| executor.execute(&source))?;
        let report = BenchmarkReport::new(mode, &result);
        println!(
            "{:<8} {:>8} rows  {:>7.3}s  {:>5.1}% cpu  checksum {:.6}",
            mode, report.rows_processed, report.time_seconds, report.cpu_percent, report.checksum
        );
        reports.push(report);
    }

    println!("consistent: {}", results_consistent(&reports));
    Ok(())
}
