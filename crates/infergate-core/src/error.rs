//! Shared error type across infergate crates.

use thiserror::Error;

use crate::outcome::TransportFailure;

/// Client-facing error codes (stable API).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientCode {
    /// Invalid input / malformed request body.
    BadRequest,
    /// Request body over the configured limit.
    PayloadTooLarge,
    /// Unsupported config version.
    UnsupportedVersion,
    /// Backend could not be reached.
    BackendUnavailable,
    /// Backend did not answer within the configured timeout.
    BackendTimeout,
    /// Backend answered with something that is not a usable response.
    BadGateway,
    /// Internal server error.
    Internal,
}

impl ClientCode {
    /// String representation used in logs and tests.
    pub fn as_str(self) -> &'static str {
        match self {
            ClientCode::BadRequest => "BAD_REQUEST",
            ClientCode::PayloadTooLarge => "PAYLOAD_TOO_LARGE",
            ClientCode::UnsupportedVersion => "UNSUPPORTED_VERSION",
            ClientCode::BackendUnavailable => "BACKEND_UNAVAILABLE",
            ClientCode::BackendTimeout => "BACKEND_TIMEOUT",
            ClientCode::BadGateway => "BAD_GATEWAY",
            ClientCode::Internal => "INTERNAL",
        }
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, GatewayError>;

/// Unified error type used by core and gateway.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("payload too large: {len} bytes exceeds limit of {limit} bytes")]
    PayloadTooLarge { len: usize, limit: usize },
    #[error("unsupported config version")]
    UnsupportedVersion,
    #[error("backend transport failure: {0}")]
    Transport(#[from] TransportFailure),
    #[error("internal: {0}")]
    Internal(String),
}

impl GatewayError {
    /// Map internal error to a stable client-facing code.
    pub fn client_code(&self) -> ClientCode {
        match self {
            GatewayError::BadRequest(_) => ClientCode::BadRequest,
            GatewayError::PayloadTooLarge { .. } => ClientCode::PayloadTooLarge,
            GatewayError::UnsupportedVersion => ClientCode::UnsupportedVersion,
            GatewayError::Transport(f) => f.client_code(),
            GatewayError::Internal(_) => ClientCode::Internal,
        }
    }
}
