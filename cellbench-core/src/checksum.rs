//! Output checksum used to compare strategies.

use cellbench_ipc::MetricBatch;
use cellbench_stats::sum_skipna;

/// Sum of every numeric cell, identifier column excluded.
///
/// Missing (NaN) cells are skipped; each column is summed in canonical order,
/// so row order does not affect the result.
pub fn checksum_rows(rows: &MetricBatch) -> f64 {
    rows.columns()
        .into_iter()
        .map(|(_, values)| sum_skipna(values))
        .sum()
}
