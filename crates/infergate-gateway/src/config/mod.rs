//! Gateway config loader (strict parsing).

pub mod schema;

use std::fs;

use infergate_core::error::{GatewayError, Result};

pub use schema::{BackendSection, GatewayConfig, GatewaySection, MetricsSection};

/// Environment variable naming the YAML config file.
pub const CONFIG_ENV: &str = "INFERGATE_CONFIG";

pub fn load_from_file(path: &str) -> Result<GatewayConfig> {
    let s = fs::read_to_string(path)
        .map_err(|e| GatewayError::Internal(format!("read config failed ({path}): {e}")))?;
    load_from_str(&s)
}

pub fn load_from_str(s: &str) -> Result<GatewayConfig> {
    let cfg: GatewayConfig = serde_yaml::from_str(s)
        .map_err(|e| GatewayError::BadRequest(format!("invalid yaml: {e}")))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Load from `$INFERGATE_CONFIG` when set, otherwise use validated defaults.
pub fn load_from_env() -> Result<GatewayConfig> {
    match std::env::var(CONFIG_ENV) {
        Ok(path) if !path.trim().is_empty() => load_from_file(path.trim()),
        _ => {
            let cfg = GatewayConfig::default();
            cfg.validate()?;
            Ok(cfg)
        }
    }
}
