//! System-wide CPU utilization sampling
//!
//! A [`CpuSession`] snapshots the aggregate CPU counters when it starts and
//! reports the busy share of all CPU time elapsed until it finishes. On
//! Linux the counters come from `/proc/stat`; elsewhere the reading is 0.0.

/// Aggregate CPU counters in clock ticks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CpuTimes {
    /// Ticks not spent idle or waiting on I/O
    pub busy: u64,
    /// All ticks
    pub total: u64,
}

impl CpuTimes {
    /// Read the current counters, if the platform exposes them
    pub fn read() -> Option<Self> {
        #[cfg(target_os = "linux")]
        {
            std::fs::read_to_string("/proc/stat")
                .ok()
                .and_then(|content| Self::parse(&content))
        }
        #[cfg(not(target_os = "linux"))]
        {
            None
        }
    }

    /// Parse the aggregate `cpu` line of `/proc/stat`
    pub fn parse(stat: &str) -> Option<Self> {
        let line = stat.lines().find(|l| l.starts_with("cpu "))?;
        let fields: Vec<u64> = line
            .split_whitespace()
            .skip(1)
            .map(|v| v.parse().ok())
            .collect::<Option<_>>()?;
        if fields.len() < 4 {
            return None;
        }

        // user nice system idle iowait irq softirq steal; guest time is already in user
        let counted = &fields[..fields.len().min(8)];
        let total: u64 = counted.iter().sum();
        let idle = fields[3] + fields.get(4).copied().unwrap_or(0);
        Some(Self {
            busy: total.saturating_sub(idle),
            total,
        })
    }
}

/// Busy percentage between two snapshots, rounded to one decimal.
///
/// 0.0 when no time elapsed or the counters went backwards.
pub fn utilization(start: CpuTimes, end: CpuTimes) -> f64 {
    let total = end.total.saturating_sub(start.total);
    if total == 0 {
        return 0.0;
    }
    let busy = end.busy.saturating_sub(start.busy).min(total);
    let percent = busy as f64 / total as f64 * 100.0;
    (percent * 10.0).round() / 10.0
}

/// One CPU measurement window
#[derive(Debug, Clone, Copy)]
pub struct CpuSession {
    start: Option<CpuTimes>,
}

impl CpuSession {
    pub fn start() -> Self {
        Self {
            start: CpuTimes::read(),
        }
    }

    /// Close the window and return the busy percentage since [`start`](Self::start)
    pub fn finish(self) -> f64 {
        match (self.start, CpuTimes::read()) {
            (Some(start), Some(end)) => utilization(start, end),
            _ => 0.0,
        }
    }
}
