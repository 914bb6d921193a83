//! Observability: metrics registry, host sampling, and the scrape exporter.
//!
//! Metrics are stored as atomics or short-held per-series locks and rendered
//! by the `/metrics` handler in Prometheus text format.

pub mod exporter;
pub mod metrics;
pub mod system;

pub use exporter::MetricsExporter;
pub use metrics::GatewayMetrics;
pub use system::{HostSampler, ProcSampler};
