//! Column-Oriented Batches
//!
//! A [`RowBatch`] is one chunk of input rows as read from the measurement
//! file; a [`MetricBatch`] holds the derived metric columns for the same rows.
//! Both travel unchanged between supervisor and worker processes, so they
//! derive the rkyv traits alongside the usual std ones.

use rkyv::{Archive, Deserialize as RkyvDeserialize, Serialize as RkyvSerialize};
use std::ops::Range;

/// Names of the derived metric columns, in output order.
pub const METRIC_COLUMNS: [&str; 6] = [
    "ncr",
    "sphericity",
    "vol_surface_ratio",
    "eccentricity",
    "cell_density",
    "shape_factor",
];

/// Physical measurements of a single cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Measurements {
    /// Nuclear volume in femtolitres
    pub nuclear_volume: f64,
    /// Cellular volume in femtolitres
    pub cellular_volume: f64,
    /// Nuclear surface area in square micrometres
    pub nuclear_surface_area: f64,
    /// Cellular surface area in square micrometres
    pub cellular_surface_area: f64,
}

/// A chunk of input rows, one vector per column.
///
/// All vectors always have the same length.
#[derive(Debug, Clone, Default, PartialEq, Archive, RkyvSerialize, RkyvDeserialize)]
#[archive(check_bytes)]
pub struct RowBatch {
    /// Identifier column
    pub cell_ids: Vec<String>,
    /// Nuclear volume column
    pub nuclear_volume: Vec<f64>,
    /// Cellular volume column
    pub cellular_volume: Vec<f64>,
    /// Nuclear surface area column
    pub nuclear_surface_area: Vec<f64>,
    /// Cellular surface area column
    pub cellular_surface_area: Vec<f64>,
}

impl RowBatch {
    /// Create an empty batch with room for `rows` rows
    pub fn with_capacity(rows: usize) -> Self {
        Self {
            cell_ids: Vec::with_capacity(rows),
            nuclear_volume: Vec::with_capacity(rows),
            cellular_volume: Vec::with_capacity(rows),
            nuclear_surface_area: Vec::with_capacity(rows),
            cellular_surface_area: Vec::with_capacity(rows),
        }
    }

    /// Append one row
    pub fn push(&mut self, cell_id: impl Into<String>, m: Measurements) {
        self.cell_ids.push(cell_id.into());
        self.nuclear_volume.push(m.nuclear_volume);
        self.cellular_volume.push(m.cellular_volume);
        self.nuclear_surface_area.push(m.nuclear_surface_area);
        self.cellular_surface_area.push(m.cellular_surface_area);
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.cell_ids.len()
    }

    /// Whether the batch holds no rows
    pub fn is_empty(&self) -> bool {
        self.cell_ids.is_empty()
    }

    /// Copy of the rows in `range`
    ///
    /// # Panics
    ///
    /// Panics if `range` is out of bounds.
    pub fn slice(&self, range: Range<usize>) -> RowBatch {
        RowBatch {
            cell_ids: self.cell_ids[range.clone()].to_vec(),
            nuclear_volume: self.nuclear_volume[range.clone()].to_vec(),
            cellular_volume: self.cellular_volume[range.clone()].to_vec(),
            nuclear_surface_area: self.nuclear_surface_area[range.clone()].to_vec(),
            cellular_surface_area: self.cellular_surface_area[range].to_vec(),
        }
    }
}

/// Derived metrics for a chunk, keyed by the input identifiers.
#[derive(Debug, Clone, Default, PartialEq, Archive, RkyvSerialize, RkyvDeserialize)]
#[archive(check_bytes)]
pub struct MetricBatch {
    /// Identifier column, copied from the input batch
    pub cell_ids: Vec<String>,
    /// Nuclear-to-cellular volume ratio
    pub ncr: Vec<f64>,
    /// Nuclear sphericity
    pub sphericity: Vec<f64>,
    /// Cellular volume over cellular surface area
    pub vol_surface_ratio: Vec<f64>,
    /// One minus the ratio of root nuclear volume to root nuclear surface area
    pub eccentricity: Vec<f64>,
    /// Inverse cellular volume
    pub cell_density: Vec<f64>,
    /// Surface-area shape factor
    pub shape_factor: Vec<f64>,
}

impl MetricBatch {
    /// Number of rows
    pub fn len(&self) -> usize {
        self.cell_ids.len()
    }

    /// Whether the batch holds no rows
    pub fn is_empty(&self) -> bool {
        self.cell_ids.is_empty()
    }

    /// Numeric columns paired with their names, in [`METRIC_COLUMNS`] order
    pub fn columns(&self) -> [(&'static str, &[f64]); 6] {
        [
            (METRIC_COLUMNS[0], self.ncr.as_slice()),
            (METRIC_COLUMNS[1], self.sphericity.as_slice()),
            (METRIC_COLUMNS[2], self.vol_surface_ratio.as_slice()),
            (METRIC_COLUMNS[3], self.eccentricity.as_slice()),
            (METRIC_COLUMNS[4], self.cell_density.as_slice()),
            (METRIC_COLUMNS[5], self.shape_factor.as_slice()),
        ]
    }

    /// Metric values of row `index`, in [`METRIC_COLUMNS`] order
    pub fn row(&self, index: usize) -> Option<[f64; 6]> {
        if index >= self.len() {
            return None;
        }
        Some([
            self.ncr[index],
            self.sphericity[index],
            self.vol_surface_ratio[index],
            self.eccentricity[index],
            self.cell_density[index],
            self.shape_factor[index],
        ])
    }

    /// Move all rows of `other` to the end of `self`
    pub fn append(&mut self, other: &mut MetricBatch) {
        self.cell_ids.append(&mut other.cell_ids);
        self.ncr.append(&mut other.ncr);
        self.sphericity.append(&mut other.sphericity);
        self.vol_surface_ratio.append(&mut other.vol_surface_ratio);
        self.eccentricity.append(&mut other.eccentricity);
        self.cell_density.append(&mut other.cell_density);
        self.shape_factor.append(&mut other.shape_factor);
    }

    /// Concatenate batches in iteration order
    pub fn concat(batches: impl IntoIterator<Item = MetricBatch>) -> MetricBatch {
        let mut out = MetricBatch::default();
        for mut batch in batches {
            out.append(&mut batch);
        }
        out
    }

    /// The first `limit` rows
    pub fn head(&self, limit: usize) -> MetricBatch {
        let n = limit.min(self.len());
        MetricBatch {
            cell_ids: self.cell_ids[..n].to_vec(),
            ncr: self.ncr[..n].to_vec(),
            sphericity: self.sphericity[..n].to_vec(),
            vol_surface_ratio: self.vol_surface_ratio[..n].to_vec(),
            eccentricity: self.eccentricity[..n].to_vec(),
            cell_density: self.cell_density[..n].to_vec(),
            shape_factor: self.shape_factor[..n].to_vec(),
        }
    }
}
