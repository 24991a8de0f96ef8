//! Host metadata attached to comparison reports.
//!
//! Timings are only comparable on the same machine, so every
//! [`CompareReport`](super::CompareReport) records where it ran. CPU model
//! and memory come from `/proc` on Linux and read as unknown elsewhere.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Host and build information for one report
#[derive(Debug, Clone, Serialize)]
pub struct RunMeta {
    pub version: String,
    pub timestamp: DateTime<Utc>,
    pub os: String,
    pub arch: String,
    pub cpu: String,
    pub cpu_cores: usize,
    /// Total RAM; 0 when unknown
    pub memory_gb: f64,
}

/// Collect metadata for a report generated now
pub fn build_run_meta() -> RunMeta {
    let memory_kb = proc_field("/proc/meminfo", "MemTotal")
        .and_then(|v| v.split_whitespace().next()?.parse::<u64>().ok());

    RunMeta {
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now(),
        os: std::env::consts::OS.to_string(),
        arch: std::env::consts::ARCH.to_string(),
        cpu: proc_field("/proc/cpuinfo", "model name").unwrap_or_else(|| "Unknown".to_string()),
        cpu_cores: std::thread::available_parallelism().map_or(1, |n| n.get()),
        memory_gb: memory_kb.map_or(0.0, |kb| kb as f64 / (1024.0 * 1024.0)),
    }
}

/// Value of the first `key: value` line in a `/proc` text file
fn proc_field(path: &str, key: &str) -> Option<String> {
    if !cfg!(target_os = "linux") {
        return None;
    }
    let content = std::fs::read_to_string(path).ok()?;
    parse_field(&content, key)
}

fn parse_field(content: &str, key: &str) -> Option<String> {
    content.lines().find_map(|line| {
        let (name, value) = line.split_once(':')?;
        (name.trim() == key).then(|| value.trim().to_string())
    })
}
