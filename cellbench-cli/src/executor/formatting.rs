//! Output Formatting
//!
//! Human-readable terminal output for benchmark runs, metric rows and
//! strategy comparisons.

use super::execution::ExecutionMode;
use super::report::{BenchmarkReport, CompareReport, RowRecord, row_columns};
use cellbench_core::Summary;

fn format_value(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else {
        format!("{:.6}", value)
    }
}

fn push_summary(output: &mut String, summary: &Summary) {
    output.push_str(&format!(
        "  {:<20} {:>16} {:>16}\n",
        "metric", "mean", "std"
    ));
    output.push_str(&format!("  {}\n", "-".repeat(54)));
    for (name, stats) in summary.iter() {
        output.push_str(&format!(
            "  {:<20} {:>16} {:>16}\n",
            name,
            format_value(stats.mean),
            format_value(stats.std_dev)
        ));
    }
}

/// Format one benchmark run for terminal display
pub fn format_human_output(report: &BenchmarkReport) -> String {
    let mut output = String::new();

    output.push('\n');
    output.push_str(&format!("cellbench: {} execution\n", report.mode));
    output.push_str(&"=".repeat(60));
    output.push_str("\n\n");

    output.push_str(&format!("  rows processed: {}\n", report.rows_processed));
    output.push_str(&format!("  time:           {:.3} s\n", report.time_seconds));
    output.push_str(&format!("  cpu:            {:.1} %\n", report.cpu_percent));
    output.push_str(&format!("  checksum:       {}\n\n", report.checksum));

    push_summary(&mut output, &report.summary);
    output
}

/// Format metric rows as an aligned table
pub fn format_rows(records: &[RowRecord]) -> String {
    let columns = row_columns();
    let id_width = records
        .iter()
        .map(|r| r.cell_id.len())
        .max()
        .unwrap_or(0)
        .max(columns[0].len());

    let mut output = String::new();
    output.push_str(&format!("{:<width$}", columns[0], width = id_width));
    for name in &columns[1..] {
        output.push_str(&format!("  {:>17}", name));
    }
    output.push('\n');

    for r in records {
        output.push_str(&format!("{:<width$}", r.cell_id, width = id_width));
        for value in [
            r.ncr,
            r.sphericity,
            r.vol_surface_ratio,
            r.eccentricity,
            r.cell_density,
            r.shape_factor,
        ] {
            output.push_str(&format!("  {:>17}", format_value(value)));
        }
        output.push('\n');
    }
    output
}

/// Format a strategy comparison, fastest first relative to `single`
pub fn format_compare_output(report: &CompareReport) -> String {
    let mut output = String::new();

    output.push('\n');
    output.push_str("cellbench: strategy comparison\n");
    output.push_str(&"=".repeat(60));
    output.push('\n');
    output.push_str(&format!(
        "  input: {} (chunksize {})\n",
        report.csv_path, report.chunksize
    ));
    output.push_str(&format!(
        "  host:  {} ({} cores), {}\n\n",
        report.meta.cpu, report.meta.cpu_cores, report.meta.timestamp
    ));

    let baseline = report
        .results
        .iter()
        .find(|r| r.mode == ExecutionMode::Single)
        .map(|r| r.time_seconds);

    output.push_str(&format!(
        "  {:<10} {:>10} {:>10} {:>8} {:>10}\n",
        "mode", "rows", "time (s)", "cpu %", "speedup"
    ));
    output.push_str(&format!("  {}\n", "-".repeat(52)));

    let mut sorted: Vec<_> = report.results.iter().collect();
    sorted.sort_by(|a, b| a.time_seconds.total_cmp(&b.time_seconds));
    for r in sorted {
        let speedup = match baseline {
            Some(base) if r.time_seconds > 0.0 => format!("{:.2}x", base / r.time_seconds),
            _ => "-".to_string(),
        };
        output.push_str(&format!(
            "  {:<10} {:>10} {:>10.3} {:>8.1} {:>10}\n",
            r.mode.as_str(),
            r.rows_processed,
            r.time_seconds,
            r.cpu_percent,
            speedup
        ));
    }

    output.push('\n');
    if report.consistent {
        output.push_str("  ✓ all strategies produced identical rows and checksums\n");
    } else {
        output.push_str("  ✗ strategies disagree:\n");
        for r in &report.results {
            output.push_str(&format!(
                "      {:<10} rows {}  checksum {}\n",
                r.mode.as_str(),
                r.rows_processed,
                r.checksum
            ));
        }
    }

    if let Some(first) = report.results.first() {
        output.push('\n');
        push_summary(&mut output, &first.summary);
    }
    output
}
