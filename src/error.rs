//! Error types for the featsel crate

use thiserror::Error;

/// Result type alias for featsel operations
pub type Result<T> = std::result::Result<T, FeatselError>;

/// Main error type for the crate
#[derive(Error, Debug)]
pub enum FeatselError {
    #[error("Shape or type error: {0}")]
    ShapeOrTypeError(String),

    #[error("Degenerate variance: actual values are constant, r-squared is undefined")]
    DegenerateVarianceError,

    #[error("Empty feature set: at least one input column must be selected")]
    EmptyFeatureSetError,

    #[error("Concurrency binding error: {0}")]
    ConcurrencyBindingError(String),

    #[error("Data error: {0}")]
    DataError(String),

    #[error("Training error: {0}")]
    TrainingError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid parameter: {name} = {value}, {reason}")]
    InvalidParameter {
        name: String,
        value: String,
        reason: String,
    },

    #[error("Model not fitted")]
    ModelNotFitted,

    #[error("Evaluation cancelled")]
    Cancelled,
}

impl From<ndarray::ShapeError> for FeatselError {
    fn from(err: ndarray::ShapeError) -> Self {
        FeatselError::ShapeOrTypeError(err.to_string())
    }
}
