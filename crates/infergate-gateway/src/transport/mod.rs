//! Transport layer (HTTP).
//!
//! Exposes the `/predict` handler and the outbound backend client it
//! forwards through.

pub mod backend;
pub mod predict;

pub use backend::BackendClient;
