//! Axum router wiring.
//!
//! Business traffic (`/predict`) and observability traffic (`/metrics`,
//! `/healthz`) share one listener but no handler state beyond the registry.

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::{app_state::AppState, ops, transport};

pub fn build_router(state: AppState) -> Router {
    Router::new()
        // The handler enforces `gateway.body_limit_bytes` itself so oversized
        // bodies are still measured and counted.
        .route(
            "/predict",
            post(transport::predict::predict).layer(DefaultBodyLimit::disable()),
        )
        .route("/metrics", get(ops::metrics))
        .route("/healthz", get(ops::healthz))
        .with_state(state)
}
