//! Error types for container fetching

use thiserror::Error;

/// Result type for fetch operations
pub type Result<T> = std::result::Result<T, NetworkError>;

/// Errors that can occur while fetching a weight container
#[derive(Error, Debug)]
pub enum NetworkError {
    /// Server answered with a non-success status
    #[error("HTTP error: {status} - {message}")]
    Http {
        status: u16,
        message: String,
    },

    /// Network connection failed
    #[error("Connection failed: {0}")]
    Connection(String),

    /// Request timeout
    #[error("Request timeout after {0}ms")]
    Timeout(u64),

    /// Source identifier could not be parsed
    #[error("Invalid model source: {0}")]
    InvalidSource(String),

    /// Container not found at the source
    #[error("Model not found: {0}")]
    NotFound(String),

    /// Client configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl NetworkError {
    /// Whether retrying the whole load could succeed
    pub fn is_transient(&self) -> bool {
        match self {
            NetworkError::Connection(_) => true,
            NetworkError::Timeout(_) => true,
            NetworkError::Http { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }

    /// HTTP status, if the server answered
    pub fn status(&self) -> Option<u16> {
        match self {
            NetworkError::Http { status, .. } => Some(*status),
            NetworkError::NotFound(_) => Some(404),
            _ => None,
        }
    }
}

impl NetworkError {
    /// Classify a reqwest failure; `timeout` is the limit that was configured
    pub fn from_reqwest(e: reqwest::Error, timeout: std::time::Duration) -> Self {
        if e.is_timeout() {
            NetworkError::Timeout(timeout.as_millis() as u64)
        } else if e.is_connect() {
            NetworkError::Connection(e.to_string())
        } else if let Some(status) = e.status() {
            NetworkError::Http {
                status: status.as_u16(),
                message: e.to_string(),
            }
        } else if e.is_builder() {
            NetworkError::Configuration(e.to_string())
        } else {
            NetworkError::Connection(e.to_string())
        }
    }
}

impl From<url::ParseError> for NetworkError {
    fn from(e: url::ParseError) -> Self {
        NetworkError::InvalidSource(e.to_string())
    }
}
