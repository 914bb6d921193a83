//! Shared application state for the infergate gateway.
//!
//! Built once at startup. The metrics registry, backend client and exporter
//! are constructed here and handed to handlers through axum `State`; nothing
//! lives in a global.

use std::sync::Arc;

use infergate_core::error::Result;

use crate::config::GatewayConfig;
use crate::obs::{GatewayMetrics, HostSampler, MetricsExporter, ProcSampler};
use crate::transport::BackendClient;

#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
    metrics: Arc<GatewayMetrics>,
}

struct AppStateInner {
    cfg: GatewayConfig,
    backend: BackendClient,
    exporter: MetricsExporter,
}

impl AppState {
    /// Build application state with the `/proc` host sampler.
    /// Returns Result so main can handle errors gracefully (no panic).
    pub fn new(cfg: GatewayConfig) -> Result<Self> {
        Self::with_sampler(cfg, Arc::new(ProcSampler::new()))
    }

    pub fn with_sampler(cfg: GatewayConfig, sampler: Arc<dyn HostSampler>) -> Result<Self> {
        cfg.validate()?;

        let backend = BackendClient::new(&cfg.backend)?;
        let exporter = MetricsExporter::new(sampler, cfg.metrics.cpu_sample_window());

        tracing::info!(
            backend = %backend.url(),
            timeout_ms = cfg.backend.timeout_ms,
            "backend client ready"
        );

        Ok(Self {
            inner: Arc::new(AppStateInner {
                cfg,
                backend,
                exporter,
            }),
            metrics: Arc::new(GatewayMetrics::new()),
        })
    }

    pub fn cfg(&self) -> &GatewayConfig {
        &self.inner.cfg
    }

    pub fn metrics(&self) -> Arc<GatewayMetrics> {
        Arc::clone(&self.metrics)
    }

    pub fn backend(&self) -> &BackendClient {
        &self.inner.backend
    }

    pub fn exporter(&self) -> &MetricsExporter {
        &self.inner.exporter
    }
}
