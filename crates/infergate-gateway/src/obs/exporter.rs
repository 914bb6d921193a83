//! Scrape-time exporter: refresh host gauges, then render the registry.

use std::sync::Arc;
use std::time::Duration;

use super::metrics::GatewayMetrics;
use super::system::HostSampler;

/// Content type of the Prometheus text exposition format.
pub const CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

pub struct MetricsExporter {
    sampler: Arc<dyn HostSampler>,
    cpu_window: Duration,
}

impl MetricsExporter {
    pub fn new(sampler: Arc<dyn HostSampler>, cpu_window: Duration) -> Self {
        Self {
            sampler,
            cpu_window,
        }
    }

    /// Sample CPU/RAM into their gauges and render every family.
    ///
    /// Takes roughly `cpu_window`. A failed sample leaves the gauge at its
    /// previous value; the scrape itself never fails.
    pub async fn scrape(&self, metrics: &GatewayMetrics) -> String {
        match self.sampler.cpu_percent(self.cpu_window).await {
            Some(v) => metrics.cpu_usage.set(&[], v),
            None => tracing::debug!("cpu sample unavailable; keeping last value"),
        }
        match self.sampler.memory_percent().await {
            Some(v) => metrics.ram_usage.set(&[], v),
            None => tracing::debug!("memory sample unavailable; keeping last value"),
        }
        metrics.render()
    }
}
