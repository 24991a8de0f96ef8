//! Integration tests for cellbench
//!
//! End-to-end runs over real CSV files, including the process strategy with
//! this package's binary as the worker executable.

use cellbench::{
    BenchmarkReport, CsvSource, ExecutionConfig, ExecutionError, ExecutionMode, Executor,
    MetricBatch, ProcessExecutor, SingleExecutor, Supervisor, SupervisorError, ThreadedExecutor,
    benchmark_execution, checksum_rows, compute_row_metrics, results_consistent, row_records,
};
use std::io::Write;
use std::path::PathBuf;
use std::process::Command;

const HEADER: &str = "CellId,Nuclear Volume [fL],Cellular Volume [fL],Nuclear Surface Area [um^2],Cellular Surface Area [um^2]";

fn worker_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_cellbench"))
}

fn execution_config(processes: usize) -> ExecutionConfig {
    ExecutionConfig {
        threads: 4,
        processes: Some(processes),
        worker_binary: Some(worker_binary()),
    }
}

/// Measurement file with `rows` plausible cells; every 17th row misses its nuclear area
fn write_cells(rows: usize) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "{}", HEADER).unwrap();
    for i in 0..rows {
        let t = (i % 101) as f64 / 101.0;
        let nv = 120.0 + 300.0 * t;
        let cv = nv * (1.8 + t);
        let na = if i % 17 == 0 {
            String::new()
        } else {
            format!("{:.4}", 4.836 * nv.powf(2.0 / 3.0) * (1.05 + 0.3 * t))
        };
        let ca = 4.836 * cv.powf(2.0 / 3.0) * (1.02 + 0.2 * t);
        writeln!(file, "id-{i},{nv:.4},{cv:.4},{na},{ca:.4}").unwrap();
    }
    file.flush().unwrap();
    file
}

#[test]
fn test_all_strategies_agree() {
    let file = write_cells(2_345);
    let source = CsvSource::new(file.path(), 100).unwrap();
    let config = execution_config(3);

    let outputs: Vec<_> = ExecutionMode::ALL
        .iter()
        .map(|mode| mode.executor(&config).execute(&source).unwrap())
        .collect();

    let reference = &outputs[0];
    assert_eq!(reference.rows.len(), 2_345);
    for output in &outputs[1..] {
        assert_eq!(output.rows.cell_ids, reference.rows.cell_ids);
        assert_eq!(checksum_rows(&output.rows), checksum_rows(&reference.rows));
        // bit-for-bit: same per-row arithmetic, same canonical aggregation
        assert_eq!(
            format!("{:?}", output.summary),
            format!("{:?}", reference.summary)
        );
    }
}

#[test]
fn test_process_strategy_preserves_file_order() {
    let file = write_cells(1_000);
    let source = CsvSource::new(file.path(), 7).unwrap();
    let output = ProcessExecutor::new(Some(4), Some(worker_binary()))
        .execute(&source)
        .unwrap();

    assert_eq!(output.rows.len(), 1_000);
    for (i, id) in output.rows.cell_ids.iter().enumerate() {
        assert_eq!(id, &format!("id-{i}"));
    }
}

#[test]
fn test_chunksize_larger_than_file() {
    let file = write_cells(42);
    let source = CsvSource::new(file.path(), 5_000).unwrap();
    assert_eq!(source.load_all().unwrap().len(), 1);

    let single = SingleExecutor.execute(&source).unwrap();
    let process = ProcessExecutor::new(None, Some(worker_binary()))
        .execute(&source)
        .unwrap();
    assert_eq!(single.rows.len(), 42);
    assert_eq!(checksum_rows(&single.rows), checksum_rows(&process.rows));
}

#[test]
fn test_header_only_file_under_every_strategy() {
    let file = write_cells(0);
    let source = CsvSource::new(file.path(), 10).unwrap();
    let config = execution_config(2);
    for mode in ExecutionMode::ALL {
        let output = mode.executor(&config).execute(&source).unwrap();
        assert!(output.rows.is_empty(), "{mode}");
        assert_eq!(checksum_rows(&output.rows), 0.0);
    }
}

#[test]
fn test_missing_values_are_skipped() {
    let file = write_cells(34);
    let source = CsvSource::new(file.path(), 10).unwrap();
    let output = SingleExecutor.execute(&source).unwrap();

    // rows 0 and 17 lack a nuclear surface area
    assert!(output.rows.sphericity[0].is_nan());
    assert!(output.rows.sphericity[17].is_nan());
    let sphericity = output.summary.get("sphericity").unwrap();
    assert_eq!(sphericity.count, 32);
    assert_eq!(sphericity.missing, 2);
    assert!(sphericity.mean.is_finite());
    assert!(checksum_rows(&output.rows).is_finite());
}

#[test]
fn test_benchmark_report_per_strategy() {
    let file = write_cells(500);
    let source = CsvSource::new(file.path(), 64).unwrap();
    let config = execution_config(2);

    let reports: Vec<BenchmarkReport> = ExecutionMode::ALL
        .iter()
        .map(|&mode| {
            let executor = mode.executor(&config);
            let result = benchmark_execution(|| executor.execute(&source)).unwrap();
            BenchmarkReport::new(mode, &result)
        })
        .collect();

    for report in &reports {
        assert_eq!(report.rows_processed, 500);
        assert!(report.time_seconds >= 0.0);
        assert!((0.0..=100.0).contains(&report.cpu_percent));
    }
    assert!(results_consistent(&reports));
}

#[test]
fn test_row_records_limit() {
    let file = write_cells(30);
    let source = CsvSource::new(file.path(), 8).unwrap();
    let output = ProcessExecutor::new(Some(2), Some(worker_binary()))
        .execute(&source)
        .unwrap();

    let records = row_records(&output.rows, 20);
    assert_eq!(records.len(), 20);
    assert_eq!(records[0].cell_id, "id-0");
    assert_eq!(records[19].cell_id, "id-19");
    assert_eq!(row_records(&output.rows, 100).len(), 30);
}

#[test]
fn test_worker_spawn_failure_surfaces() {
    let file = write_cells(20);
    let source = CsvSource::new(file.path(), 5).unwrap();
    let err = ProcessExecutor::new(Some(2), Some(PathBuf::from("/nonexistent/cellbench")))
        .execute(&source)
        .unwrap_err();
    assert!(matches!(
        err,
        ExecutionError::Supervisor(SupervisorError::SpawnFailed(_))
    ));
}

#[test]
fn test_malformed_row_fails_every_strategy() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "{}", HEADER).unwrap();
    writeln!(file, "a,100,200,50,80").unwrap();
    writeln!(file, "b,100,not-a-number,50,80").unwrap();
    file.flush().unwrap();

    let source = CsvSource::new(file.path(), 1).unwrap();
    assert!(matches!(
        SingleExecutor.execute(&source),
        Err(ExecutionError::Load(_))
    ));
    assert!(matches!(
        ThreadedExecutor::default().execute(&source),
        Err(ExecutionError::Load(_))
    ));
    assert!(matches!(
        ProcessExecutor::new(Some(2), Some(worker_binary())).execute(&source),
        Err(ExecutionError::Load(_))
    ));
}

#[test]
fn test_oversized_chunks_travel_in_pieces() {
    let file = write_cells(600);
    // one chunk per 250 rows, frames budgeted for about 10 rows each
    let chunks = CsvSource::new(file.path(), 250).unwrap().load_all().unwrap();
    assert_eq!(chunks.len(), 3);
    let expected = MetricBatch::concat(chunks.iter().map(compute_row_metrics));

    let batches = Supervisor::new(worker_binary(), 2)
        .with_frame_budget(800)
        .map_chunks(chunks)
        .unwrap();

    assert_eq!(batches.len(), 3);
    assert_eq!(batches[0].len(), 250);
    assert_eq!(batches[2].len(), 100);
    let rows = MetricBatch::concat(batches);
    assert_eq!(rows.cell_ids, expected.cell_ids);
    assert_eq!(checksum_rows(&rows), checksum_rows(&expected));
}

#[test]
fn test_cli_benchmark_json() {
    let file = write_cells(120);
    let output = Command::new(worker_binary())
        .args(["benchmark", "--mode", "process", "--format", "json"])
        .arg("--csv")
        .arg(file.path())
        .args(["--chunksize", "25", "--processes", "2"])
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["mode"], "process");
    assert_eq!(json["rows_processed"], 120);
    assert!(json["time_seconds"].is_number());
    assert!(json["cpu_percent"].is_number());
    assert!(json["checksum"].is_number());
    assert!(json["summary"]["shape_factor"]["mean"].is_number());
}

#[test]
fn test_cli_rows_json() {
    let file = write_cells(50);
    let output = Command::new(worker_binary())
        .args(["rows", "--limit", "5", "--format", "json"])
        .arg("--csv")
        .arg(file.path())
        .output()
        .unwrap();
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let rows = json.as_array().unwrap();
    assert_eq!(rows.len(), 5);
    assert_eq!(rows[0]["CellId"], "id-0");
    // missing nuclear area propagates as null
    assert!(rows[0]["ncr"].is_number());
    assert!(rows[0]["sphericity"].is_null());
}

#[test]
fn test_cli_missing_file_fails() {
    let output = Command::new(worker_binary())
        .args(["benchmark", "--mode", "single", "--csv", "/nonexistent/cells.csv"])
        .output()
        .unwrap();
    assert!(!output.status.success());
}
