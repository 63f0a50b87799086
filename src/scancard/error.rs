//! Scancard transaction error types.

use std::time::Duration;

use thiserror::Error;

/// Ways a single request/response exchange can fail.
#[derive(Error, Debug)]
pub enum ScancardError {
    /// Socket could not be opened.
    #[error("Connection failed: {0}")]
    Connect(String),

    /// Request could not be written or the read failed for a reason other than timeout.
    #[error("Transfer failed: {0}")]
    Transfer(String),

    /// Response bytes could not be parsed as a JSON object.
    #[error("Invalid response: {0}")]
    Decode(String),

    /// No response within the read timeout.
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),
}

impl ScancardError {
    /// Operator-facing error code, as printed in the scancard log.
    pub fn code(&self) -> &'static str {
        match self {
            ScancardError::Connect(_) => "E200",
            ScancardError::Transfer(_) => "E201",
            ScancardError::Decode(_) => "E202",
            ScancardError::Timeout(_) => "E203",
        }
    }

    /// Whether the failure happened on the socket rather than in the payload.
    pub fn is_transport(&self) -> bool {
        matches!(self, ScancardError::Connect(_) | ScancardError::Transfer(_))
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, ScancardError::Timeout(_))
    }
}

/// Result type for scancard transactions.
pub type Result<T> = std::result::Result<T, ScancardError>;
