//! Error types for the churn pipeline

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Main error type for the pipeline
#[derive(Error, Debug)]
pub enum PipelineError {
    /// The data source could not be opened or parsed
    #[error("Data access error: {0}")]
    DataAccessError(String),

    /// Required columns are absent from the data source
    #[error("Schema error: missing required column(s): {}", .0.join(", "))]
    SchemaError(Vec<String>),

    /// Malformed or out-of-range value, or a missing target column
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// A model variant failed to fit
    #[error("Training error ({model}): {reason}")]
    TrainingError { model: String, reason: String },

    /// Evaluation could not be computed
    #[error("Metric error: {0}")]
    MetricError(String),

    #[error("Tracking error: {0}")]
    TrackingError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },

    #[error("Model not fitted")]
    ModelNotFitted,
}

/// Stable, machine-readable error category.
///
/// A serving layer maps each kind to its own failure response instead of a
/// generic error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    DataAccess,
    Schema,
    Validation,
    Training,
    Metric,
    Tracking,
    Config,
    Io,
    Serialization,
    Shape,
    NotFitted,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::DataAccess => "data_access",
            ErrorKind::Schema => "schema",
            ErrorKind::Validation => "validation",
            ErrorKind::Training => "training",
            ErrorKind::Metric => "metric",
            ErrorKind::Tracking => "tracking",
            ErrorKind::Config => "config",
            ErrorKind::Io => "io",
            ErrorKind::Serialization => "serialization",
            ErrorKind::Shape => "shape",
            ErrorKind::NotFitted => "not_fitted",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl PipelineError {
    /// Category of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::DataAccessError(_) => ErrorKind::DataAccess,
            PipelineError::SchemaError(_) => ErrorKind::Schema,
            PipelineError::ValidationError(_) => ErrorKind::Validation,
            PipelineError::TrainingError { .. } => ErrorKind::Training,
            PipelineError::MetricError(_) => ErrorKind::Metric,
            PipelineError::TrackingError(_) => ErrorKind::Tracking,
            PipelineError::ConfigError(_) => ErrorKind::Config,
            PipelineError::IoError(_) => ErrorKind::Io,
            PipelineError::SerializationError(_) => ErrorKind::Serialization,
            PipelineError::ShapeError { .. } => ErrorKind::Shape,
            PipelineError::ModelNotFitted => ErrorKind::NotFitted,
        }
    }

    pub(crate) fn training(model: impl Into<String>, reason: impl Into<String>) -> Self {
        PipelineError::TrainingError {
            model: model.into(),
            reason: reason.into(),
        }
    }
}

impl From<polars::error::PolarsError> for PipelineError {
    fn from(err: polars::error::PolarsError) -> Self {
        PipelineError::DataAccessError(err.to_string())
    }
}

impl From<serde_json::Error> for PipelineError {
    fn from(err: serde_json::Error) -> Self {
        PipelineError::SerializationError(err.to_string())
    }
}

impl From<ndarray::ShapeError> for PipelineError {
    fn from(err: ndarray::ShapeError) -> Self {
        PipelineError::ShapeError {
            expected: "valid shape".to_string(),
            actual: err.to_string(),
        }
    }
}
