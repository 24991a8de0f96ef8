//! Row Metric Computer
//!
//! Derives six shape metrics from the four physical measurements of each row.
//! Every formula is elementwise over whole columns. Division by zero and
//! negative-domain roots produce inf/NaN cells rather than errors.

use cellbench_ipc::{MetricBatch, RowBatch};
use std::f64::consts::PI;

/// A borrowed numeric column with elementwise operators
#[derive(Debug, Clone, Copy)]
pub struct Column<'a>(&'a [f64]);

impl<'a> Column<'a> {
    /// Borrow a column
    pub fn new(values: &'a [f64]) -> Self {
        Self(values)
    }

    /// Apply `f` to every cell
    pub fn map(self, f: impl Fn(f64) -> f64) -> Vec<f64> {
        self.0.iter().map(|&x| f(x)).collect()
    }

    /// Apply `f` pairwise with another column of the same length
    pub fn zip_map(self, other: Column<'_>, f: impl Fn(f64, f64) -> f64) -> Vec<f64> {
        debug_assert_eq!(self.0.len(), other.0.len());
        self.0
            .iter()
            .zip(other.0)
            .map(|(&a, &b)| f(a, b))
            .collect()
    }
}

/// Compute the metric columns of one batch.
///
/// The output has exactly one row per input row, in input order, keyed by the
/// same identifiers.
pub fn compute_row_metrics(batch: &RowBatch) -> MetricBatch {
    let nuclear_volume = Column::new(&batch.nuclear_volume);
    let cellular_volume = Column::new(&batch.cellular_volume);
    let nuclear_area = Column::new(&batch.nuclear_surface_area);
    let cellular_area = Column::new(&batch.cellular_surface_area);

    let pi_cbrt = PI.cbrt();

    MetricBatch {
        cell_ids: batch.cell_ids.clone(),
        ncr: nuclear_volume.zip_map(cellular_volume, |nv, cv| nv / cv),
        sphericity: nuclear_volume.zip_map(nuclear_area, |nv, na| {
            pi_cbrt * (6.0 * nv).powf(2.0 / 3.0) / na
        }),
        vol_surface_ratio: cellular_volume.zip_map(cellular_area, |cv, ca| cv / ca),
        eccentricity: nuclear_volume.zip_map(nuclear_area, |nv, na| 1.0 - nv.sqrt() / na.sqrt()),
        cell_density: cellular_volume.map(|cv| 1.0 / cv),
        shape_factor: nuclear_area.zip_map(cellular_area, |na, ca| 4.0 * PI * na / (ca * ca)),
    }
}
