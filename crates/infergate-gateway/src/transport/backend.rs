//! Outbound client for the inference backend.
//!
//! One `reqwest::Client` is built at startup and shared, so connections are
//! pooled. Each call is a single attempt: the backend's scoring route is not
//! guaranteed idempotent, so nothing is retried here.

use bytes::Bytes;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;

use infergate_core::error::{GatewayError, Result};
use infergate_core::outcome::{ensure_json, ForwardOutcome, ForwardResult, TransportFailure};

use crate::config::BackendSection;

pub struct BackendClient {
    client: Client,
    url: String,
    timeout_ms: u64,
}

impl BackendClient {
    pub fn new(cfg: &BackendSection) -> Result<Self> {
        let client = Client::builder()
            .timeout(cfg.timeout())
            .connect_timeout(cfg.connect_timeout())
            .build()
            .map_err(|e| GatewayError::Internal(format!("backend client build failed: {e}")))?;

        Ok(Self {
            client,
            url: cfg.scoring_url(),
            timeout_ms: cfg.timeout_ms,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// POST `body` verbatim as `application/json` and classify the result.
    ///
    /// Any status with a JSON body is an outcome; everything else is a
    /// transport failure.
    pub async fn forward(&self, body: Bytes) -> ForwardResult {
        let resp = self
            .client
            .post(&self.url)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = resp.status().as_u16();
        let payload = resp.bytes().await.map_err(|e| {
            if e.is_timeout() {
                self.classify(e)
            } else {
                TransportFailure::Malformed(e.to_string())
            }
        })?;

        ensure_json(&payload)?;
        Ok(ForwardOutcome::new(status, payload))
    }

    fn classify(&self, e: reqwest::Error) -> TransportFailure {
        if e.is_timeout() {
            TransportFailure::Timeout {
                timeout_ms: self.timeout_ms,
            }
        } else if e.is_connect() {
            TransportFailure::Connect(e.to_string())
        } else if e.is_builder() {
            TransportFailure::Request(e.to_string())
        } else {
            // Connection dropped mid-exchange, bad framing, unreadable body.
            TransportFailure::Malformed(e.to_string())
        }
    }
}
