use std::net::SocketAddr;
use std::time::Duration;

use serde::Deserialize;
use infergate_core::error::{GatewayError, Result};

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    pub version: u32,

    #[serde(default)]
    pub gateway: GatewaySection,

    #[serde(default)]
    pub backend: BackendSection,

    #[serde(default)]
    pub metrics: MetricsSection,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            version: 1,
            gateway: GatewaySection::default(),
            backend: BackendSection::default(),
            metrics: MetricsSection::default(),
        }
    }
}

impl GatewayConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(GatewayError::UnsupportedVersion);
        }

        self.gateway.validate()?;
        self.backend.validate()?;
        self.metrics.validate()?;

        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GatewaySection {
    #[serde(default = "default_listen")]
    pub listen: String,

    /// Largest `/predict` body buffered for forwarding.
    #[serde(default = "default_body_limit_bytes")]
    pub body_limit_bytes: usize,
}

impl Default for GatewaySection {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            body_limit_bytes: default_body_limit_bytes(),
        }
    }
}

impl GatewaySection {
    pub fn validate(&self) -> Result<()> {
        if !(1024..=1024 * 1024 * 1024).contains(&self.body_limit_bytes) {
            return Err(GatewayError::BadRequest(
                "gateway.body_limit_bytes must be between 1024 and 1073741824".into(),
            ));
        }
        self.listen_addr().map(|_| ())
    }

    pub fn listen_addr(&self) -> Result<SocketAddr> {
        self.listen.parse().map_err(|e| {
            GatewayError::BadRequest(format!("gateway.listen must be a valid SocketAddr: {e}"))
        })
    }
}

/// Inference backend the gateway forwards to.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BackendSection {
    #[serde(default = "default_backend_url")]
    pub url: String,

    #[serde(default = "default_backend_route")]
    pub route: String,

    /// Upper bound for one whole forwarding attempt.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

impl Default for BackendSection {
    fn default() -> Self {
        Self {
            url: default_backend_url(),
            route: default_backend_route(),
            timeout_ms: default_timeout_ms(),
            connect_timeout_ms: default_connect_timeout_ms(),
        }
    }
}

impl BackendSection {
    pub fn validate(&self) -> Result<()> {
        if !(self.url.starts_with("http://") || self.url.starts_with("https://")) {
            return Err(GatewayError::BadRequest(
                "backend.url must start with http:// or https://".into(),
            ));
        }
        if !self.route.starts_with('/') {
            return Err(GatewayError::BadRequest(
                "backend.route must start with '/'".into(),
            ));
        }
        if !(100..=300_000).contains(&self.timeout_ms) {
            return Err(GatewayError::BadRequest(
                "backend.timeout_ms must be between 100 and 300000".into(),
            ));
        }
        if !(50..=60_000).contains(&self.connect_timeout_ms) {
            return Err(GatewayError::BadRequest(
                "backend.connect_timeout_ms must be between 50 and 60000".into(),
            ));
        }
        if self.connect_timeout_ms > self.timeout_ms {
            return Err(GatewayError::BadRequest(
                "backend.connect_timeout_ms must not exceed timeout_ms".into(),
            ));
        }
        Ok(())
    }

    /// Full scoring URL (`url` + `route`), tolerating a trailing slash on `url`.
    pub fn scoring_url(&self) -> String {
        format!("{}{}", self.url.trim_end_matches('/'), self.route)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MetricsSection {
    /// Window between the two `/proc/stat` reads on each scrape.
    #[serde(default = "default_cpu_sample_window_ms")]
    pub cpu_sample_window_ms: u64,
}

impl Default for MetricsSection {
    fn default() -> Self {
        Self {
            cpu_sample_window_ms: default_cpu_sample_window_ms(),
        }
    }
}

impl MetricsSection {
    pub fn validate(&self) -> Result<()> {
        if !(100..=5_000).contains(&self.cpu_sample_window_ms) {
            return Err(GatewayError::BadRequest(
                "metrics.cpu_sample_window_ms must be between 100 and 5000".into(),
            ));
        }
        Ok(())
    }

    pub fn cpu_sample_window(&self) -> Duration {
        Duration::from_millis(self.cpu_sample_window_ms)
    }
}

fn default_listen() -> String {
    "0.0.0.0:8000".into()
}
fn default_body_limit_bytes() -> usize {
    64 * 1024 * 1024
}
fn default_backend_url() -> String {
    "http://127.0.0.1:5000".into()
}
fn default_backend_route() -> String {
    "/invocations".into()
}
fn default_timeout_ms() -> u64 {
    30_000
}
fn default_connect_timeout_ms() -> u64 {
    5_000
}
fn default_cpu_sample_window_ms() -> u64 {
    1_000
}
