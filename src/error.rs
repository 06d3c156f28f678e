//! Error types for the stacking ensemble crate

use thiserror::Error;

/// Result type alias for ensemble operations
pub type Result<T> = std::result::Result<T, EnsembleError>;

/// Main error type
#[derive(Error, Debug)]
pub enum EnsembleError {
    #[error(
        "This {estimator} instance is not fitted yet. Call 'fit' with appropriate arguments before using this method."
    )]
    NotFitted { estimator: String },

    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Invalid parameter: {name} = {value}, {reason}")]
    InvalidParameter {
        name: String,
        value: String,
        reason: String,
    },

    #[error("Invalid parameter {name} for estimator {estimator}")]
    UnknownParameter { estimator: String, name: String },

    #[error("Training error: {0}")]
    TrainingError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl EnsembleError {
    /// Not-fitted error for the named estimator type
    pub fn not_fitted(estimator: &str) -> Self {
        EnsembleError::NotFitted {
            estimator: estimator.to_string(),
        }
    }
}

impl From<serde_json::Error> for EnsembleError {
    fn from(err: serde_json::Error) -> Self {
        EnsembleError::SerializationError(err.to_string())
    }
}

impl From<ndarray::ShapeError> for EnsembleError {
    fn from(err: ndarray::ShapeError) -> Self {
        EnsembleError::ShapeError {
            expected: "valid shape".to_string(),
            actual: err.to_string(),
        }
    }
}
