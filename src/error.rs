//! Error types and handling.

use thiserror::Error;

use crate::config::ConfigError;
use crate::scancard::ScancardError;

/// Application-wide error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Host context is missing a field the client needs
    #[error("E1: Initialisation failed: {0}")]
    Initialization(String),

    /// A scancard transaction failed
    #[error(transparent)]
    Scancard(#[from] ScancardError),

    /// Job file lacks the job-file marker
    #[error("E204: Invalid file format: {0}")]
    FileFormat(String),

    /// Working status never reported ready
    #[error("Layer {layer} did not finish marking after {attempts} status polls")]
    PollTimeout { layer: u32, attempts: u32 },

    /// Operation aborted through the cancellation token
    #[error("Operation cancelled")]
    Cancelled,

    /// Configuration error
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// File I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for AppError
pub type Result<T> = std::result::Result<T, AppError>;

impl AppError {
    /// Create an initialisation error with message
    pub fn initialization(msg: impl Into<String>) -> Self {
        Self::Initialization(msg.into())
    }

    /// Create a file format error with message
    pub fn file_format(msg: impl Into<String>) -> Self {
        Self::FileFormat(msg.into())
    }

    /// Whether the error came from the socket or the response decoder.
    pub fn is_transaction_failure(&self) -> bool {
        matches!(self, Self::Scancard(_))
    }
}
