//! Error types for protocol operations.

use thiserror::Error;

/// Result type alias for protocol operations.
pub type Result<T> = core::result::Result<T, Error>;

/// Protocol operation errors.
#[derive(Debug, Error)]
pub enum Error {
    /// Frame header did not start with the e-Link magic.
    #[error("Invalid frame magic: expected {expected:02X?}, got {actual:02X?}")]
    Framing {
        /// Magic the decoder expected.
        expected: [u8; 4],
        /// Bytes actually found at the header position.
        actual: [u8; 4],
    },

    /// Message was not a well-formed envelope.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Key exchange parameters were rejected.
    #[error("Handshake error: {0}")]
    Handshake(String),

    /// Cryptographic error.
    #[error("Crypto error: {0}")]
    Crypto(#[from] elink_crypto::Error),

    /// JSON error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
