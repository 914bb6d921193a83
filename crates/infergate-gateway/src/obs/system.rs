//! Host resource sampling (CPU and memory utilisation).
//!
//! On Linux both values come from `/proc`. CPU utilisation needs two
//! `/proc/stat` snapshots; the gap between them is awaited with
//! `tokio::time::sleep`, so only the caller is held for the window.
//! Anywhere `/proc` is missing the sampler returns `None` and the exporter
//! keeps the previous gauge value.

use std::time::Duration;

use async_trait::async_trait;

/// Source of host utilisation samples, in percent (0.0 to 100.0).
#[async_trait]
pub trait HostSampler: Send + Sync {
    /// CPU utilisation measured across `window`.
    async fn cpu_percent(&self, window: Duration) -> Option<f64>;
    /// Memory in use right now.
    async fn memory_percent(&self) -> Option<f64>;
}

/// Aggregate CPU jiffies from the first line of `/proc/stat`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CpuTimes {
    pub idle: u64,
    pub total: u64,
}

impl CpuTimes {
    /// Parse the aggregate `cpu ` line. `guest` columns are already folded
    /// into `user`/`nice`, so only the first eight fields are summed.
    pub fn parse(stat: &str) -> Option<Self> {
        let line = stat.lines().find(|l| l.starts_with("cpu "))?;
        let fields: Vec<u64> = line
            .split_whitespace()
            .skip(1)
            .take(8)
            .map(|f| f.parse().ok())
            .collect::<Option<Vec<u64>>>()?;
        if fields.len() < 4 {
            return None;
        }
        // idle + iowait
        let idle = fields[3] + fields.get(4).copied().unwrap_or(0);
        Some(Self {
            idle,
            total: fields.iter().sum(),
        })
    }

    /// Busy share between two snapshots, in percent.
    pub fn busy_percent_since(&self, earlier: &CpuTimes) -> Option<f64> {
        let total = self.total.checked_sub(earlier.total)?;
        let idle = self.idle.checked_sub(earlier.idle)?;
        if total == 0 {
            return Some(0.0);
        }
        let busy = total.saturating_sub(idle) as f64;
        Some((busy / total as f64 * 100.0).clamp(0.0, 100.0))
    }
}

/// Used memory in percent from `/proc/meminfo` (`MemTotal - MemAvailable`).
pub fn parse_meminfo_percent(meminfo: &str) -> Option<f64> {
    let mut total = None;
    let mut available = None;
    for line in meminfo.lines() {
        if line.starts_with("MemTotal:") {
            total = extract_kb_value(line);
        } else if line.starts_with("MemAvailable:") {
            available = extract_kb_value(line);
        }
    }
    let total = total?;
    let available = available?;
    if total == 0 {
        return None;
    }
    let used = total.saturating_sub(available) as f64;
    Some((used / total as f64 * 100.0).clamp(0.0, 100.0))
}

fn extract_kb_value(line: &str) -> Option<u64> {
    line.split_whitespace().nth(1)?.parse().ok()
}

/// `/proc`-backed sampler.
#[derive(Debug, Clone, Default)]
pub struct ProcSampler;

impl ProcSampler {
    pub fn new() -> Self {
        Self
    }

    async fn read_cpu_times() -> Option<CpuTimes> {
        let stat = tokio::fs::read_to_string("/proc/stat").await.ok()?;
        CpuTimes::parse(&stat)
    }
}

#[async_trait]
impl HostSampler for ProcSampler {
    async fn cpu_percent(&self, window: Duration) -> Option<f64> {
        let before = Self::read_cpu_times().await?;
        tokio::time::sleep(window).await;
        let after = Self::read_cpu_times().await?;
        after.busy_percent_since(&before)
    }

    async fn memory_percent(&self) -> Option<f64> {
        let meminfo = tokio::fs::read_to_string("/proc/meminfo").await.ok()?;
        parse_meminfo_percent(&meminfo)
    }
}
