//! Aggregation of metric rows into a two-row summary (mean, std).

use cellbench_ipc::MetricBatch;
use cellbench_stats::{ColumnSummary, compute_summary};
use serde::ser::{Serialize, SerializeMap, Serializer};

/// Mean and standard deviation of every metric column.
///
/// Serializes column-major as `{"ncr": {"mean": .., "std": ..}, ...}` with
/// columns in metric order. Non-finite statistics serialize as `null`.
#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    columns: Vec<(&'static str, ColumnSummary)>,
}

impl Summary {
    /// Statistics of the named column
    pub fn get(&self, column: &str) -> Option<&ColumnSummary> {
        self.columns
            .iter()
            .find(|(name, _)| *name == column)
            .map(|(_, s)| s)
    }

    /// Columns in metric order
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &ColumnSummary)> {
        self.columns.iter().map(|(name, s)| (*name, s))
    }
}

#[derive(serde::Serialize)]
struct MeanStd {
    mean: f64,
    std: f64,
}

impl Serialize for Summary {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.columns.len()))?;
        for (name, s) in &self.columns {
            map.serialize_entry(
                name,
                &MeanStd {
                    mean: s.mean,
                    std: s.std_dev,
                },
            )?;
        }
        map.end()
    }
}

/// Reduce the concatenated metric rows to per-column mean and std.
///
/// The result does not depend on row order.
pub fn aggregate_metrics(rows: &MetricBatch) -> Summary {
    Summary {
        columns: rows
            .columns()
            .into_iter()
            .map(|(name, values)| (name, compute_summary(values)))
            .collect(),
    }
}
