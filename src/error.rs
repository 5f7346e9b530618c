//! Error types for the decision-boundary engine

use thiserror::Error;

/// Result type alias for boundary operations
pub type Result<T> = std::result::Result<T, BoundaryError>;

/// Main error type for the decision-boundary engine
#[derive(Error, Debug)]
pub enum BoundaryError {
    #[error("Unknown reduction method: {0} (expected one of pca, tsne, umap, mds)")]
    InvalidMethod(String),

    #[error("Invalid parameter: {name} = {value}, {reason}")]
    InvalidParameter {
        name: String,
        value: String,
        reason: String,
    },

    #[error("Mesh of {cells} cells exceeds the configured ceiling of {limit}")]
    ResourceExceeded { cells: u64, limit: u64 },

    #[error("Data error: {0}")]
    DataError(String),

    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },

    #[error("Projection is not invertible: {0}")]
    NotInvertible(String),

    #[error("Prediction error: {0}")]
    Prediction(String),

    #[error("Computation error: {0}")]
    Computation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl BoundaryError {
    /// Shorthand for an `InvalidParameter` error.
    pub fn invalid_parameter(
        name: impl Into<String>,
        value: impl ToString,
        reason: impl Into<String>,
    ) -> Self {
        BoundaryError::InvalidParameter {
            name: name.into(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }

    /// Shorthand for a `ShapeError`.
    pub fn shape(expected: impl ToString, actual: impl ToString) -> Self {
        BoundaryError::ShapeError {
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }
}

impl From<serde_json::Error> for BoundaryError {
    fn from(err: serde_json::Error) -> Self {
        BoundaryError::Serialization(err.to_string())
    }
}

impl From<ndarray::ShapeError> for BoundaryError {
    fn from(err: ndarray::ShapeError) -> Self {
        BoundaryError::ShapeError {
            expected: "valid shape".to_string(),
            actual: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = BoundaryError::DataError("test error".to_string());
        assert_eq!(err.to_string(), "Data error: test error");
    }

    #[test]
    fn test_invalid_parameter_display() {
        let err = BoundaryError::invalid_parameter("step", -0.5, "must be positive");
        assert_eq!(err.to_string(), "Invalid parameter: step = -0.5, must be positive");
    }

    #[test]
    fn test_resource_exceeded_display() {
        let err = BoundaryError::ResourceExceeded { cells: 1_000_001, limit: 1_000_000 };
        assert!(err.to_string().contains("1000001"));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: BoundaryError = io_err.into();
        assert!(matches!(err, BoundaryError::Io(_)));
    }
}
