//! Error types for tensor operations.

use thiserror::Error;

/// Result type alias for tensor operations.
pub type Result<T> = core::result::Result<T, Error>;

/// Tensor error types.
#[derive(Debug, Error)]
pub enum Error {
    /// Buffer length does not match the element count of the shape.
    #[error("shape {shape:?} needs {expected} elements, got {actual}")]
    ElementCount {
        shape: Vec<usize>,
        expected: usize,
        actual: usize,
    },

    /// Operation expected a tensor of a different rank.
    #[error("{op}: expected rank {expected}, got shape {shape:?}")]
    Rank {
        op: &'static str,
        expected: usize,
        shape: Vec<usize>,
    },

    /// Two operands have incompatible shapes.
    #[error("{op}: incompatible shapes {lhs:?} and {rhs:?}")]
    ShapeMismatch {
        op: &'static str,
        lhs: Vec<usize>,
        rhs: Vec<usize>,
    },

    /// Invalid argument such as a zero stride or a zero dimension.
    #[error("{op}: {message}")]
    InvalidArgument { op: &'static str, message: String },
}

impl Error {
    /// Create a shape mismatch error.
    pub fn shape_mismatch(op: &'static str, lhs: &[usize], rhs: &[usize]) -> Self {
        Error::ShapeMismatch {
            op,
            lhs: lhs.to_vec(),
            rhs: rhs.to_vec(),
        }
    }

    /// Create a rank error.
    pub fn rank(op: &'static str, expected: usize, shape: &[usize]) -> Self {
        Error::Rank {
            op,
            expected,
            shape: shape.to_vec(),
        }
    }

    /// Create an invalid argument error.
    pub fn invalid(op: &'static str, message: impl Into<String>) -> Self {
        Error::InvalidArgument {
            op,
            message: message.into(),
        }
    }

    /// Get error category for logging.
    pub fn category(&self) -> &'static str {
        match self {
            Error::ElementCount { .. } => "element_count",
            Error::Rank { .. } => "rank",
            Error::ShapeMismatch { .. } => "shape_mismatch",
            Error::InvalidArgument { .. } => "invalid_argument",
        }
    }
}
