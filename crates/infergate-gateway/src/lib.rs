//! infergate gateway library entry.
//!
//! This crate wires config, the metrics registry, the backend client and the
//! HTTP handlers into one router. It is consumed by the binary (`main.rs`)
//! and by integration tests.

pub mod app_state;
pub mod config;
pub mod obs;
pub mod ops;
pub mod router;
pub mod transport;
