//! Transport layer errors.

use thiserror::Error;

/// Result type alias.
pub type Result<T> = core::result::Result<T, Error>;

/// Transport errors.
#[derive(Debug, Error)]
pub enum Error {
    /// Socket read or write failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A send was attempted while no device connection is installed.
    #[error("No device connected")]
    NotConnected,

    /// Listener could not bind its address.
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        /// Requested address.
        addr: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Engine queues have shut down.
    #[error("Engine closed")]
    Closed,

    /// Protocol error from core.
    #[error("Protocol error: {0}")]
    Protocol(#[from] elink_core::Error),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Protocol(elink_core::Error::Json(err))
    }
}
