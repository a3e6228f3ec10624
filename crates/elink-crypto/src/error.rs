//! Error types for cryptographic operations.

use thiserror::Error;

/// Result type alias for cryptographic operations.
pub type Result<T> = core::result::Result<T, Error>;

/// Cryptographic operation errors.
#[derive(Debug, Error)]
pub enum Error {
    /// Peer public value is outside the open interval `(2, modulus)`.
    #[error("Invalid DH key range")]
    InvalidKeyRange,

    /// Group parameters cannot produce a usable key.
    #[error("Invalid DH parameters: {0}")]
    InvalidParameters(String),

    /// Random source failed or returned too little data.
    #[error("Random source provided insufficient data: {0}")]
    InsufficientRandomness(String),

    /// AES key is not 16, 24 or 32 bytes long.
    #[error("Invalid AES key length: {0} bytes")]
    InvalidKeyLength(usize),

    /// Ciphertext could not be decrypted.
    #[error("Decryption failed: {0}")]
    Decryption(String),

    /// Plaintext could not be encrypted.
    #[error("Encryption failed: {0}")]
    Encryption(String),

    /// Wire encoding was malformed.
    #[error("Invalid encoding: {0}")]
    Encoding(String),
}
