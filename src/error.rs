//! # Error Types
//!
//! Error handling for the Votifier server.
//!
//! Every failure a single connection can hit (greeting, timeout, framing, parsing,
//! challenge, token resolution, signature) is a variant of [`VotifierError`].
//! Those are connection-scoped: they are reported to the host and the offending
//! connection is closed, while the listener keeps accepting.
//!
//! ## Error Categories
//! - **Connection Errors**: greeting write failures, timeouts, socket errors
//! - **Frame Errors**: short frames, unknown protocol magic
//! - **Message Errors**: envelope and payload parsing, missing fields
//! - **Authentication Errors**: challenge mismatch, unknown platform, bad signature
//! - **Startup Errors**: token store and configuration failures
//!
//! ## Example Usage
//! ```rust
//! use votifier_protocol::error::{Result, VotifierError};
//! use tracing::{error, info};
//!
//! fn check_length(frame: &[u8]) -> Result<()> {
//!     if frame.len() < 10 {
//!         return Err(VotifierError::FrameTooShort(frame.len()));
//!     }
//!     Ok(())
//! }
//!
//! match check_length(b"short") {
//!     Ok(()) => info!("frame accepted"),
//!     Err(e) => error!(error = %e, "frame rejected"),
//! }
//! ```

use std::io;
use thiserror::Error;

/// Error message constants to reduce allocations in error paths.
pub mod constants {
    /// Frame errors
    pub const ERR_UNSUPPORTED_VERSION: &str = "Unsupported protocol version";
    pub const ERR_NO_ENVELOPE: &str = "No JSON envelope found in frame";

    /// Authentication errors
    pub const ERR_SIGNATURE_ENCODING: &str = "Signature is not valid base64";
}

// VotifierError is the primary error type for all server operations
#[derive(Error, Debug)]
pub enum VotifierError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Error sending greetings: {0}")]
    GreetingSendFailure(String),

    #[error("Socket timeout")]
    SocketTimeout,

    #[error("Socket error: {0}")]
    SocketError(String),

    #[error("Connection closed before a frame was received")]
    ConnectionClosed,

    #[error("Frame too short: {0} bytes")]
    FrameTooShort(usize),

    #[error("Unsupported protocol version (magic 0x{0:04X})")]
    UnsupportedProtocolVersion(u16),

    #[error("Envelope parse failure: {0}")]
    EnvelopeParseFailure(String),

    #[error("Invalid payload received: signature and payload are required")]
    InvalidPayloadFields,

    #[error("Payload parse failure: {0}")]
    PayloadParseFailure(String),

    #[error("Invalid challenge token")]
    ChallengeMismatch,

    #[error("Platform {0} not found in tokens")]
    PlatformNotFound(String),

    #[error("Signature verification failed for {0}")]
    SignatureVerificationFailure(String),

    #[error("No tokens found in the token file")]
    NoTokens,

    #[error("Token store error: {0}")]
    TokenStore(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Custom error: {0}")]
    Custom(String),
}

impl VotifierError {
    /// Whether this error belongs to a single connection rather than to the server.
    ///
    /// Connection-scoped errors are reported through the event sink and never stop
    /// the listener. Everything else is a startup or configuration failure.
    pub fn is_connection_scoped(&self) -> bool {
        !matches!(
            self,
            VotifierError::NoTokens
                | VotifierError::TokenStore(_)
                | VotifierError::ConfigError(_)
        )
    }

    /// Whether the client's request was refused, as opposed to the connection failing.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            VotifierError::FrameTooShort(_)
                | VotifierError::UnsupportedProtocolVersion(_)
                | VotifierError::EnvelopeParseFailure(_)
                | VotifierError::InvalidPayloadFields
                | VotifierError::PayloadParseFailure(_)
                | VotifierError::ChallengeMismatch
                | VotifierError::PlatformNotFound(_)
                | VotifierError::SignatureVerificationFailure(_)
        )
    }
}

/// Type alias for Results using VotifierError
pub type Result<T> = std::result::Result<T, VotifierError>;
