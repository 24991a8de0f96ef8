//! Report Building
//!
//! Machine-readable documents produced by the CLI:
//!
//! - [`BenchmarkReport`]: one timed run of one strategy
//! - [`RowRecord`]: one metric row, keyed like the input file
//! - [`CompareReport`]: every strategy over the same input, plus a
//!   consistency verdict
//!
//! All three serialize with serde; non-finite floats become `null` in JSON.

use super::benchmark::BenchmarkResult;
use super::execution::ExecutionMode;
use super::metadata::{RunMeta, build_run_meta};
use cellbench_core::{CELL_ID_COLUMN, MetricBatch, Summary, checksum_rows};
use serde::{Serialize, Serializer};
use std::path::Path;

/// Relative tolerance when comparing checksums across strategies
pub const CHECKSUM_TOLERANCE: f64 = 1e-9;

/// Outcome of one benchmarked run
#[derive(Debug, Clone, Serialize)]
pub struct BenchmarkReport {
    pub mode: ExecutionMode,
    pub rows_processed: usize,
    pub time_seconds: f64,
    pub cpu_percent: f64,
    pub checksum: f64,
    pub summary: Summary,
}

impl BenchmarkReport {
    pub fn new(mode: ExecutionMode, result: &BenchmarkResult) -> Self {
        Self {
            mode,
            rows_processed: result.rows.len(),
            time_seconds: result.time_seconds,
            cpu_percent: result.cpu_percent,
            checksum: checksum_rows(&result.rows),
            summary: result.summary.clone(),
        }
    }
}

/// One metric row
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowRecord {
    /// Written as a JSON number when the id is an integer, as a string otherwise
    #[serde(rename = "CellId", serialize_with = "serialize_cell_id")]
    pub cell_id: String,
    pub ncr: f64,
    pub sphericity: f64,
    pub vol_surface_ratio: f64,
    pub eccentricity: f64,
    pub cell_density: f64,
    pub shape_factor: f64,
}

fn serialize_cell_id<S: Serializer>(cell_id: &str, serializer: S) -> Result<S::Ok, S::Error> {
    match cell_id.trim().parse::<i64>() {
        Ok(n) => serializer.serialize_i64(n),
        Err(_) => serializer.serialize_str(cell_id),
    }
}

/// The first `limit` rows of `rows` as records
pub fn row_records(rows: &MetricBatch, limit: usize) -> Vec<RowRecord> {
    rows.cell_ids
        .iter()
        .take(limit)
        .enumerate()
        .filter_map(|(i, cell_id)| {
            let [ncr, sphericity, vol_surface_ratio, eccentricity, cell_density, shape_factor] =
                rows.row(i)?;
            Some(RowRecord {
                cell_id: cell_id.clone(),
                ncr,
                sphericity,
                vol_surface_ratio,
                eccentricity,
                cell_density,
                shape_factor,
            })
        })
        .collect()
}

/// All strategies run over the same input
#[derive(Debug, Clone, Serialize)]
pub struct CompareReport {
    pub meta: RunMeta,
    pub csv_path: String,
    pub chunksize: usize,
    pub results: Vec<BenchmarkReport>,
    /// Row counts equal and checksums within [`CHECKSUM_TOLERANCE`]
    pub consistent: bool,
}

impl CompareReport {
    pub fn new(csv_path: &Path, chunksize: usize, results: Vec<BenchmarkReport>) -> Self {
        let consistent = results_consistent(&results);
        Self {
            meta: build_run_meta(),
            csv_path: csv_path.display().to_string(),
            chunksize,
            results,
            consistent,
        }
    }
}

fn checksums_match(a: f64, b: f64) -> bool {
    if a == b || (a.is_nan() && b.is_nan()) {
        return true;
    }
    (a - b).abs() <= CHECKSUM_TOLERANCE * a.abs().max(b.abs())
}

/// Whether every report processed the same rows with matching checksums
pub fn results_consistent(reports: &[BenchmarkReport]) -> bool {
    let Some(first) = reports.first() else {
        return true;
    };
    reports.iter().all(|r| {
        r.rows_processed == first.rows_processed && checksums_match(r.checksum, first.checksum)
    })
}

/// Column order of [`RowRecord`] as printed in tables
pub fn row_columns() -> [&'static str; 7] {
    [
        CELL_ID_COLUMN,
        "ncr",
        "sphericity",
        "vol_surface_ratio",
        "eccentricity",
        "cell_density",
        "shape_factor",
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use cellbench_core::aggregate_metrics;

    fn rows() -> MetricBatch {
        MetricBatch {
            cell_ids: vec!["a".into(), "b".into(), "c".into()],
            ncr: vec![1.0, 2.0, 3.0],
            sphericity: vec![0.5, 0.6, f64::NAN],
            vol_surface_ratio: vec![1.0, 1.0, 1.0],
            eccentricity: vec![0.0, 0.5, 0.6],
            cell_density: vec![0.1, 0.2, 0.3],
            shape_factor: vec![2.0, 2.0, 2.0],
        }
    }

    fn report(mode: ExecutionMode, rows: MetricBatch) -> BenchmarkReport {
        let summary = aggregate_metrics(&rows);
        BenchmarkReport::new(
            mode,
            &BenchmarkResult {
                rows,
                summary,
                time_seconds: 0.012,
                cpu_percent: 37.5,
            },
        )
    }

    #[test]
    fn test_benchmark_report_json() {
        let json = serde_json::to_value(report(ExecutionMode::Thread, rows())).unwrap();
        assert_eq!(json["mode"], "thread");
        assert_eq!(json["rows_processed"], 3);
        assert_eq!(json["time_seconds"], 0.012);
        assert_eq!(json["cpu_percent"], 37.5);
        assert!(json["checksum"].as_f64().unwrap() > 0.0);
        assert_eq!(json["summary"]["ncr"]["mean"], 2.0);
    }

    #[test]
    fn test_row_records() {
        let records = row_records(&rows(), 2);
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].cell_id, "b");
        assert_eq!(records[1].eccentricity, 0.5);

        let json = serde_json::to_value(row_records(&rows(), 20)).unwrap();
        assert_eq!(json.as_array().unwrap().len(), 3);
        assert_eq!(json[2]["CellId"], "c");
        assert!(json[2]["sphericity"].is_null());
    }

    #[test]
    fn test_integer_cell_ids_serialize_as_numbers() {
        let mut numeric = rows();
        numeric.cell_ids = vec!["17".into(), "-3".into(), "4.5".into()];
        let json = serde_json::to_value(row_records(&numeric, 3)).unwrap();
        assert_eq!(json[0]["CellId"], 17);
        assert_eq!(json[1]["CellId"], -3);
        assert_eq!(json[2]["CellId"], "4.5");
    }

    #[test]
    fn test_consistency() {
        let a = report(ExecutionMode::Single, rows());
        let b = report(ExecutionMode::Process, rows());
        assert!(results_consistent(&[a.clone(), b]));

        let mut shifted = rows();
        shifted.ncr[0] += 1.0;
        let c = report(ExecutionMode::Thread, shifted);
        assert!(!results_consistent(&[a.clone(), c]));

        let fewer = rows().head(2);
        assert!(!results_consistent(&[a, report(ExecutionMode::Thread, fewer)]));
        assert!(results_consistent(&[]));
    }

    #[test]
    fn test_checksum_tolerance() {
        assert!(checksums_match(1e12, 1e12 + 1.0));
        assert!(!checksums_match(1.0, 1.001));
        assert!(checksums_match(f64::INFINITY, f64::INFINITY));
    }
}
