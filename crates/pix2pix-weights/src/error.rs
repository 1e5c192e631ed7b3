//! Error types for weight container decoding

use thiserror::Error;

/// Errors that can occur while reading or writing weight containers
#[derive(Debug, Error)]
pub enum WeightError {
    /// Container framing, metadata or payload is inconsistent
    #[error("Malformed weight container: {0}")]
    MalformedContainer(String),

    /// Codebook has the wrong size or implausible values
    #[error("Invalid codebook: {0}")]
    InvalidCodebook(String),

    /// Encoding a container failed
    #[error("Encoding failed: {0}")]
    EncodingError(String),

    /// Tensor construction failed
    #[error("Tensor error: {0}")]
    Tensor(#[from] pix2pix_core::Error),
}

impl WeightError {
    /// Create a malformed container error
    pub fn malformed(message: impl Into<String>) -> Self {
        WeightError::MalformedContainer(message.into())
    }

    /// Create a malformed container error with byte offset context
    pub fn malformed_at(message: impl Into<String>, offset: usize) -> Self {
        WeightError::MalformedContainer(format!("{} at offset {}", message.into(), offset))
    }

    /// Whether the container bytes themselves are at fault.
    ///
    /// Codebook failures count as malformed input: the codebook is part of
    /// the container.
    pub fn is_malformed(&self) -> bool {
        matches!(
            self,
            WeightError::MalformedContainer(_) | WeightError::InvalidCodebook(_)
        )
    }
}

/// Result type for weight container operations
pub type Result<T> = std::result::Result<T, WeightError>;
