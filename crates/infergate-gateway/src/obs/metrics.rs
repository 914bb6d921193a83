//! In-process metrics registry for the gateway.
//!
//! Counter/gauge/histogram families with dynamic labels backed by `DashMap`,
//! so unrelated label sets live in different shards and never contend on one
//! global lock. Labels are flattened into sorted key vectors, and rendering
//! sorts label sets, so the exposition output is deterministic.
//!
//! Label sets are created on first use and never pruned. Every label the
//! gateway writes comes from the HTTP method, the matched route template or
//! a status code, which keeps cardinality bounded.

use dashmap::DashMap;
use std::fmt::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

pub const LABEL_METHOD: &str = "method";
pub const LABEL_ENDPOINT: &str = "endpoint";
pub const LABEL_STATUS: &str = "http_status";

/// Latency buckets in seconds (the Prometheus client defaults).
pub const LATENCY_BUCKETS_SECONDS: [f64; 14] = [
    0.005, 0.01, 0.025, 0.05, 0.075, 0.1, 0.25, 0.5, 0.75, 1.0, 2.5, 5.0, 7.5, 10.0,
];

/// Payload size buckets in bytes: 64 B to 4 MiB in x4 steps.
pub const SIZE_BUCKETS_BYTES: [f64; 9] = [
    64.0, 256.0, 1024.0, 4096.0, 16384.0, 65536.0, 262144.0, 1048576.0, 4194304.0,
];

type LabelKey = Vec<(String, String)>;

fn label_key(labels: &[(&str, &str)]) -> LabelKey {
    let mut key: LabelKey = labels
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    key.sort();
    key
}

/// Helper to escape label values.
fn escape_label(v: &str) -> String {
    v.replace('\\', "\\\\").replace('"', "\\\"").replace('\n', "\\n")
}

/// `{k="v",...}` or the empty string when there are no labels.
fn fmt_labels(key: &[(String, String)], le: Option<&str>) -> String {
    let mut parts: Vec<String> = key
        .iter()
        .map(|(k, v)| format!("{}=\"{}\"", k, escape_label(v)))
        .collect();
    if let Some(le) = le {
        parts.push(format!("le=\"{}\"", le));
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!("{{{}}}", parts.join(","))
    }
}

fn write_header(out: &mut String, name: &str, help: &str, kind: &str) {
    let _ = writeln!(out, "# HELP {} {}", name, help);
    let _ = writeln!(out, "# TYPE {} {}", name, kind);
}

/// Clamp observations into the non-negative domain (NaN becomes 0).
fn sanitize(value: f64) -> f64 {
    if value.is_nan() || value < 0.0 {
        0.0
    } else {
        value
    }
}

pub struct CounterVec {
    name: &'static str,
    help: &'static str,
    map: DashMap<LabelKey, AtomicU64>,
}

impl CounterVec {
    pub fn new(name: &'static str, help: &'static str) -> Self {
        Self {
            name,
            help,
            map: DashMap::new(),
        }
    }

    /// Increment by 1.
    pub fn inc(&self, labels: &[(&str, &str)]) {
        self.add(labels, 1);
    }

    fn add(&self, labels: &[(&str, &str)], v: u64) {
        let key = label_key(labels);
        // Existing series only need the shard read lock.
        if let Some(c) = self.map.get(&key) {
            c.fetch_add(v, Ordering::Relaxed);
            return;
        }
        self.map
            .entry(key)
            .or_insert_with(|| AtomicU64::new(0))
            .fetch_add(v, Ordering::Relaxed);
    }

    /// Current value for one label set (0 if never incremented).
    pub fn get(&self, labels: &[(&str, &str)]) -> u64 {
        self.map
            .get(&label_key(labels))
            .map(|c| c.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    /// Sum over every label set.
    pub fn total(&self) -> u64 {
        self.map.iter().map(|r| r.value().load(Ordering::Relaxed)).sum()
    }

    /// Render in Prometheus text exposition format.
    fn render(&self, out: &mut String) {
        write_header(out, self.name, self.help, "counter");
        let mut rows: Vec<(LabelKey, u64)> = self
            .map
            .iter()
            .map(|r| (r.key().clone(), r.value().load(Ordering::Relaxed)))
            .collect();
        rows.sort_by(|a, b| a.0.cmp(&b.0));
        for (key, val) in rows {
            let _ = writeln!(out, "{}{} {}", self.name, fmt_labels(&key, None), val);
        }
    }
}

pub struct GaugeVec {
    name: &'static str,
    help: &'static str,
    // f64 bit pattern
    map: DashMap<LabelKey, AtomicU64>,
}

impl GaugeVec {
    pub fn new(name: &'static str, help: &'static str) -> Self {
        Self {
            name,
            help,
            map: DashMap::new(),
        }
    }

    /// Overwrite the current value (last write wins).
    pub fn set(&self, labels: &[(&str, &str)], v: f64) {
        let key = label_key(labels);
        if let Some(g) = self.map.get(&key) {
            g.store(v.to_bits(), Ordering::Relaxed);
            return;
        }
        self.map
            .entry(key)
            .or_insert_with(|| AtomicU64::new(0f64.to_bits()))
            .store(v.to_bits(), Ordering::Relaxed);
    }

    pub fn get(&self, labels: &[(&str, &str)]) -> Option<f64> {
        self.map
            .get(&label_key(labels))
            .map(|g| f64::from_bits(g.load(Ordering::Relaxed)))
    }

    /// Render in Prometheus text exposition format.
    fn render(&self, out: &mut String) {
        write_header(out, self.name, self.help, "gauge");
        let mut rows: Vec<(LabelKey, f64)> = self
            .map
            .iter()
            .map(|r| (r.key().clone(), f64::from_bits(r.value().load(Ordering::Relaxed))))
            .collect();
        rows.sort_by(|a, b| a.0.cmp(&b.0));
        for (key, val) in rows {
            let _ = writeln!(out, "{}{} {}", self.name, fmt_labels(&key, None), val);
        }
    }
}

/// One histogram instance. Buckets are stored cumulatively.
#[derive(Debug, Clone)]
struct HistogramState {
    buckets: Vec<u64>,
    sum: f64,
    count: u64,
}

/// Point-in-time copy of one histogram instance.
#[derive(Debug, Clone, PartialEq)]
pub struct HistogramSnapshot {
    /// `(upper bound, cumulative count)` for every finite bucket.
    pub buckets: Vec<(f64, u64)>,
    pub sum: f64,
    pub count: u64,
}

pub struct HistogramVec {
    name: &'static str,
    help: &'static str,
    bounds: &'static [f64],
    // Per-instance mutex: bucket/sum/count always move together.
    map: DashMap<LabelKey, Mutex<HistogramState>>,
}

impl HistogramVec {
    pub fn new(name: &'static str, help: &'static str, bounds: &'static [f64]) -> Self {
        Self {
            name,
            help,
            bounds,
            map: DashMap::new(),
        }
    }

    fn empty_state(&self) -> Mutex<HistogramState> {
        Mutex::new(HistogramState {
            buckets: vec![0; self.bounds.len()],
            sum: 0.0,
            count: 0,
        })
    }

    /// Create the instance for `labels` with zero observations.
    pub fn ensure(&self, labels: &[(&str, &str)]) {
        self.map
            .entry(label_key(labels))
            .or_insert_with(|| self.empty_state());
    }

    /// Record one observation. Negative and NaN values are clamped to 0.
    pub fn observe(&self, labels: &[(&str, &str)], value: f64) {
        let value = sanitize(value);
        let key = label_key(labels);
        if let Some(entry) = self.map.get(&key) {
            self.record(&entry, value);
            return;
        }
        let entry = self.map.entry(key).or_insert_with(|| self.empty_state());
        self.record(&entry, value);
    }

    fn record(&self, slot: &Mutex<HistogramState>, value: f64) {
        let mut state = slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        state.count += 1;
        state.sum += value;
        for (i, &b) in self.bounds.iter().enumerate() {
            if value <= b {
                state.buckets[i] += 1;
            }
        }
    }

    /// Record a duration in seconds.
    pub fn observe_duration(&self, labels: &[(&str, &str)], d: Duration) {
        self.observe(labels, d.as_secs_f64());
    }

    pub fn snapshot(&self, labels: &[(&str, &str)]) -> Option<HistogramSnapshot> {
        let entry = self.map.get(&label_key(labels))?;
        let state = entry
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();
        Some(self.to_snapshot(state))
    }

    fn to_snapshot(&self, state: HistogramState) -> HistogramSnapshot {
        HistogramSnapshot {
            buckets: self.bounds.iter().copied().zip(state.buckets).collect(),
            sum: state.sum,
            count: state.count,
        }
    }

    /// Render in Prometheus text exposition format.
    fn render(&self, out: &mut String) {
        write_header(out, self.name, self.help, "histogram");
        let mut rows: Vec<(LabelKey, HistogramSnapshot)> = self
            .map
            .iter()
            .map(|r| {
                let state = r
                    .value()
                    .lock()
                    .unwrap_or_else(|poisoned| poisoned.into_inner())
                    .clone();
                (r.key().clone(), self.to_snapshot(state))
            })
            .collect();
        rows.sort_by(|a, b| a.0.cmp(&b.0));

        for (key, snap) in rows {
            for (le, count) in &snap.buckets {
                let le = le.to_string();
                let _ = writeln!(out, "{}_bucket{} {}", self.name, fmt_labels(&key, Some(le.as_str())), count);
            }
            let _ = writeln!(out, "{}_bucket{} {}", self.name, fmt_labels(&key, Some("+Inf")), snap.count);
            let _ = writeln!(out, "{}_sum{} {}", self.name, fmt_labels(&key, None), snap.sum);
            let _ = writeln!(out, "{}_count{} {}", self.name, fmt_labels(&key, None), snap.count);
        }
    }
}

/// Every metric family the gateway exports.
///
/// Built once at startup and shared through `AppState`; there is no global
/// registry.
pub struct GatewayMetrics {
    pub requests_total: CounterVec,
    pub request_duration: HistogramVec, // seconds
    pub request_size: HistogramVec,     // bytes
    pub response_size: HistogramVec,    // bytes
    pub cpu_usage: GaugeVec,
    pub ram_usage: GaugeVec,
}

impl Default for GatewayMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl GatewayMetrics {
    pub fn new() -> Self {
        let m = Self {
            requests_total: CounterVec::new(
                "inference_requests_total",
                "Total number of inference requests",
            ),
            request_duration: HistogramVec::new(
                "inference_request_duration_seconds",
                "Time spent processing inference request",
                &LATENCY_BUCKETS_SECONDS,
            ),
            request_size: HistogramVec::new(
                "inference_request_size_bytes",
                "Size of inference request payload in bytes",
                &SIZE_BUCKETS_BYTES,
            ),
            response_size: HistogramVec::new(
                "inference_response_size_bytes",
                "Size of inference response payload in bytes",
                &SIZE_BUCKETS_BYTES,
            ),
            cpu_usage: GaugeVec::new("system_cpu_usage_percent", "Current CPU usage percentage"),
            ram_usage: GaugeVec::new("system_ram_usage_percent", "Current RAM usage percentage"),
        };

        // Unlabeled series are visible (at zero) from the first scrape.
        m.request_duration.ensure(&[]);
        m.request_size.ensure(&[]);
        m.response_size.ensure(&[]);
        m.cpu_usage.set(&[], 0.0);
        m.ram_usage.set(&[], 0.0);
        m
    }

    /// Count one finished request under `(method, endpoint, status)`.
    pub fn record_outcome(&self, method: &str, endpoint: &str, status: u16) {
        let status = status.to_string();
        self.requests_total.inc(&[
            (LABEL_METHOD, method),
            (LABEL_ENDPOINT, endpoint),
            (LABEL_STATUS, &status),
        ]);
    }

    /// Outcome count for one label combination.
    pub fn outcome_count(&self, method: &str, endpoint: &str, status: u16) -> u64 {
        let status = status.to_string();
        self.requests_total.get(&[
            (LABEL_METHOD, method),
            (LABEL_ENDPOINT, endpoint),
            (LABEL_STATUS, &status),
        ])
    }

    /// Render all registered families in a fixed order.
    pub fn render(&self) -> String {
        let mut out = String::new();
        self.requests_total.render(&mut out);
        self.request_duration.render(&mut out);
        self.request_size.render(&mut out);
        self.response_size.render(&mut out);
        self.cpu_usage.render(&mut out);
        self.ram_usage.render(&mut out);
        out
    }
}
