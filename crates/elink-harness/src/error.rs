//! Harness errors.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias.
pub type Result<T> = core::result::Result<T, Error>;

/// Harness errors.
#[derive(Debug, Error)]
pub enum Error {
    /// Test terminal MAC is not 12 characters after normalization.
    #[error("Invalid test terminal MAC: {0:?}")]
    InvalidMac(String),

    /// Queue file does not exist.
    #[error("Test queue file {} does not exist", .0.display())]
    QueueNotFound(PathBuf),

    /// Queue file is not valid CSV.
    #[error("Test queue error: {0}")]
    Csv(#[from] csv::Error),

    /// Logging could not be set up.
    #[error("Logging error: {0}")]
    Logging(String),

    /// Engine error.
    #[error("Transport error: {0}")]
    Transport(#[from] elink_transport::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
