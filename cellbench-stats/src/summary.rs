//! Summary Statistics
//!
//! Mean and sample standard deviation of one numeric column.
//! - NaN cells are missing values and are skipped
//! - Infinite values are kept and propagate
//! - Values are accumulated in ascending order, so any permutation of the
//!   same column yields bit-identical results

/// Summary statistics of a single column
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColumnSummary {
    /// Arithmetic mean of the non-missing values (NaN if there are none)
    pub mean: f64,
    /// Sample standard deviation, n-1 denominator (NaN below two values)
    pub std_dev: f64,
    /// Number of non-missing values
    pub count: usize,
    /// Number of missing (NaN) values skipped
    pub missing: usize,
}

/// Non-missing values of `values` in ascending order
fn canonical(values: &[f64]) -> Vec<f64> {
    let mut kept: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
    kept.sort_by(f64::total_cmp);
    kept
}

/// Sum of the non-missing values, accumulated in canonical order.
///
/// An all-missing or empty column sums to 0.0.
pub fn sum_skipna(values: &[f64]) -> f64 {
    canonical(values).iter().sum()
}

/// Compute mean and standard deviation of a column
pub fn compute_summary(values: &[f64]) -> ColumnSummary {
    let kept = canonical(values);
    let count = kept.len();
    let missing = values.len() - count;

    if count == 0 {
        return ColumnSummary {
            mean: f64::NAN,
            std_dev: f64::NAN,
            count,
            missing,
        };
    }

    let mean = kept.iter().sum::<f64>() / count as f64;

    let std_dev = if count < 2 {
        f64::NAN
    } else {
        let variance = kept.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (count - 1) as f64;
        variance.sqrt()
    };

    ColumnSummary {
        mean,
        std_dev,
        count,
        missing,
    }
}
