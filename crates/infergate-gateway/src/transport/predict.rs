//! `/predict` handler: instrumented passthrough to the inference backend.
//!
//! Per-request order is fixed:
//! - request size observed first, unconditionally (also for bodies over
//!   `gateway.body_limit_bytes` and for bodies that fail mid-read)
//! - timer started, body forwarded verbatim (one attempt, bounded by
//!   `backend.timeout_ms`)
//! - latency always observed once the attempt ends
//! - response size observed only when the backend produced a JSON body
//! - exactly one outcome counter increment labeled (method, endpoint, status)

use axum::{
    body::{Body, Bytes},
    extract::{MatchedPath, State},
    http::{header, Method, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use bytes::BytesMut;
use futures_util::StreamExt;
use serde_json::json;
use tokio::time::Instant;

use infergate_core::error::GatewayError;
use infergate_core::outcome::check_json;

use crate::app_state::AppState;

// --------------------
// Response builders
// --------------------
fn error_json(status: StatusCode, msg: &str) -> Response {
    (status, Json(json!({ "error": msg }))).into_response()
}

fn passthrough(status: u16, body: Bytes) -> Response {
    let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, [(header::CONTENT_TYPE, "application/json")], body).into_response()
}

// --------------------
// Inbound body
// --------------------
enum Inbound {
    Complete(Bytes),
    TooLarge { len: usize },
    Broken { len: usize, error: String },
}

impl Inbound {
    /// Bytes received from the client, whatever the outcome.
    fn len(&self) -> usize {
        match self {
            Inbound::Complete(b) => b.len(),
            Inbound::TooLarge { len } | Inbound::Broken { len, .. } => *len,
        }
    }
}

/// Read the whole body. Past `limit` the rest is only counted, not kept.
async fn collect_body(body: Body, limit: usize) -> Inbound {
    let mut stream = body.into_data_stream();
    let mut buf = BytesMut::new();
    let mut len = 0usize;

    while let Some(chunk) = stream.next().await {
        match chunk {
            Ok(chunk) => {
                len = len.saturating_add(chunk.len());
                if len <= limit {
                    buf.extend_from_slice(&chunk);
                } else if !buf.is_empty() {
                    buf = BytesMut::new();
                }
            }
            Err(e) => {
                return Inbound::Broken {
                    len,
                    error: e.to_string(),
                }
            }
        }
    }

    if len > limit {
        Inbound::TooLarge { len }
    } else {
        Inbound::Complete(buf.freeze())
    }
}

// --------------------
// Entry
// --------------------
#[tracing::instrument(name = "predict", skip_all, fields(method = %method, endpoint = %matched.as_str()))]
pub async fn predict(
    State(app): State<AppState>,
    method: Method,
    matched: MatchedPath,
    body: Body,
) -> Response {
    let metrics = app.metrics();
    let method = method.as_str();
    let endpoint = matched.as_str();
    let limit = app.cfg().gateway.body_limit_bytes;

    let inbound = collect_body(body, limit).await;
    metrics.request_size.observe(&[], inbound.len() as f64);

    // Rejected requests are not forwarded, so they get no latency sample.
    let body = match inbound {
        Inbound::Complete(body) => body,
        Inbound::TooLarge { len } => {
            let err = GatewayError::PayloadTooLarge { len, limit };
            metrics.record_outcome(method, endpoint, StatusCode::PAYLOAD_TOO_LARGE.as_u16());
            tracing::debug!(code = err.client_code().as_str(), error = %err, "rejected inbound body");
            return error_json(StatusCode::PAYLOAD_TOO_LARGE, &err.to_string());
        }
        Inbound::Broken { error, .. } => {
            let err = GatewayError::BadRequest(format!("failed to read request body: {error}"));
            metrics.record_outcome(method, endpoint, StatusCode::BAD_REQUEST.as_u16());
            tracing::debug!(code = err.client_code().as_str(), error = %err, "rejected inbound body");
            return error_json(StatusCode::BAD_REQUEST, &err.to_string());
        }
    };

    if let Err(e) = check_json(&body) {
        let err = GatewayError::BadRequest(format!("request body is not valid JSON: {e}"));
        metrics.record_outcome(method, endpoint, StatusCode::BAD_REQUEST.as_u16());
        tracing::debug!(code = err.client_code().as_str(), error = %err, "rejected inbound body");
        return error_json(StatusCode::BAD_REQUEST, &err.to_string());
    }

    let started = Instant::now();
    let result = app.backend().forward(body).await;
    let elapsed = started.elapsed();
    metrics.request_duration.observe_duration(&[], elapsed);

    match result {
        Ok(out) => {
            metrics.response_size.observe(&[], out.body_len() as f64);
            metrics.record_outcome(method, endpoint, out.status);
            tracing::debug!(status = out.status, elapsed_ms = elapsed.as_millis() as u64, "forwarded");
            passthrough(out.status, out.body)
        }
        Err(failure) => {
            metrics.record_outcome(method, endpoint, failure.status());
            let message = failure.to_string();
            let kind = failure.kind();
            let err = GatewayError::from(failure);
            tracing::warn!(
                code = err.client_code().as_str(),
                kind,
                elapsed_ms = elapsed.as_millis() as u64,
                error = %err,
                "backend forward failed"
            );
            error_json(StatusCode::INTERNAL_SERVER_ERROR, &message)
        }
    }
}
