//! Error types for model loading and inference.

use pix2pix_network::NetworkError;
use pix2pix_weights::WeightError;
use thiserror::Error;

/// Result type alias for pix2pix operations.
pub type Result<T> = core::result::Result<T, Error>;

/// Errors surfaced by [`crate::Pix2Pix`] and [`crate::ModelHandle`].
#[derive(Debug, Error)]
pub enum Error {
    /// The container could not be fetched from its source.
    #[error("failed to fetch weight container: {0}")]
    ContainerFetch(#[from] NetworkError),

    /// The container bytes could not be decoded.
    #[error(transparent)]
    MalformedContainer(#[from] WeightError),

    /// The architecture references a tensor the weights do not contain.
    #[error("missing weight: {0}")]
    MissingWeight(String),

    /// The input image violates a precondition.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A tensor operation failed, usually a weight/activation shape mismatch.
    #[error("tensor error: {0}")]
    Tensor(#[from] pix2pix_core::Error),

    /// A background task panicked or was cancelled.
    #[error("background task failed: {0}")]
    Task(String),

    /// Configuration could not be loaded.
    #[error("configuration error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a missing weight error.
    pub fn missing_weight(name: impl Into<String>) -> Self {
        Error::MissingWeight(name.into())
    }

    /// Create an invalid input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Error::InvalidInput(message.into())
    }

    /// Get error category for logging.
    pub fn category(&self) -> &'static str {
        match self {
            Error::ContainerFetch(_) => "container_fetch",
            Error::MalformedContainer(_) => "malformed_container",
            Error::MissingWeight(_) => "missing_weight",
            Error::InvalidInput(_) => "invalid_input",
            Error::Tensor(_) => "tensor",
            Error::Task(_) => "task",
            Error::Config(_) => "config",
            Error::Io(_) => "io",
        }
    }
}

impl From<tokio::task::JoinError> for Error {
    fn from(e: tokio::task::JoinError) -> Self {
        Error::Task(e.to_string())
    }
}
