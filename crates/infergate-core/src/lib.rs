//! infergate core: error taxonomy and forwarding outcome types.
//!
//! This crate defines the error surface and the explicit result of a
//! backend forwarding attempt shared by the gateway and its tests. It
//! intentionally carries no transport or runtime dependencies.
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here
//! (`#![deny(clippy::panic, clippy::unwrap_used, clippy::expect_used)]`).
//! All fallible paths must surface as `GatewayError`/`Result`.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod error;
pub mod outcome;

/// Shared result type.
pub use error::{ClientCode, GatewayError, Result};
pub use outcome::{ForwardOutcome, ForwardResult, TransportFailure};
