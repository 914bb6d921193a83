//! Result of a single forwarding attempt to the inference backend.
//!
//! The gateway never lets a backend error escape as a fault. Every attempt
//! ends in either a [`ForwardOutcome`] (the backend answered with a JSON
//! body, whatever its status) or a [`TransportFailure`] (nothing usable came
//! back). The handler branches on this value to decide which metrics to
//! record and what to send to the client.

use bytes::Bytes;
use thiserror::Error;

use crate::error::ClientCode;

/// Status used for every transport-level failure.
pub const TRANSPORT_FAILURE_STATUS: u16 = 500;

/// The backend answered and its body decoded as JSON.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForwardOutcome {
    /// Backend status code, passed through to the caller unchanged.
    pub status: u16,
    /// Backend body, byte-for-byte.
    pub body: Bytes,
}

impl ForwardOutcome {
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Response payload length, as recorded in the response-size histogram.
    pub fn body_len(&self) -> usize {
        self.body.len()
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Why a forwarding attempt produced no usable response.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportFailure {
    /// Connection refused, DNS failure, reset before any response.
    #[error("backend connection failed: {0}")]
    Connect(String),
    /// The configured backend timeout elapsed.
    #[error("backend timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
    /// Response arrived but its body could not be read.
    #[error("malformed backend response: {0}")]
    Malformed(String),
    /// Response body was not valid JSON.
    #[error("backend response is not valid JSON: {0}")]
    Decode(String),
    /// Any other client-side request error.
    #[error("backend request failed: {0}")]
    Request(String),
}

impl TransportFailure {
    /// Short label for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            TransportFailure::Connect(_) => "connect",
            TransportFailure::Timeout { .. } => "timeout",
            TransportFailure::Malformed(_) => "malformed",
            TransportFailure::Decode(_) => "decode",
            TransportFailure::Request(_) => "request",
        }
    }

    pub fn client_code(&self) -> ClientCode {
        match self {
            TransportFailure::Connect(_) => ClientCode::BackendUnavailable,
            TransportFailure::Timeout { .. } => ClientCode::BackendTimeout,
            TransportFailure::Malformed(_) | TransportFailure::Decode(_) => ClientCode::BadGateway,
            TransportFailure::Request(_) => ClientCode::Internal,
        }
    }

    /// Status reported to the caller and used as the outcome label.
    pub fn status(&self) -> u16 {
        TRANSPORT_FAILURE_STATUS
    }
}

/// Outcome of one forwarding attempt.
pub type ForwardResult = std::result::Result<ForwardOutcome, TransportFailure>;

/// Check that `body` is one complete JSON document without building a value.
pub fn check_json(body: &[u8]) -> std::result::Result<(), serde_json::Error> {
    serde_json::from_slice::<serde::de::IgnoredAny>(body).map(|_| ())
}

/// Same check for a backend body, as a forwarding failure.
pub fn ensure_json(body: &[u8]) -> std::result::Result<(), TransportFailure> {
    check_json(body).map_err(|e| TransportFailure::Decode(e.to_string()))
}
