//! Error types for the math-score pipeline

use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, MathScoreError>;

/// Main error type for training, persistence and inference
#[derive(Error, Debug)]
pub enum MathScoreError {
    /// A required request field is missing or not coercible to its type
    #[error("Invalid input for field '{field}': {reason}")]
    InvalidInput { field: String, reason: String },

    /// A categorical value that was never seen while fitting the encoder
    #[error("Cannot encode value '{value}' for column '{column}': category not seen during training")]
    FeatureEncodingError { column: String, value: String },

    /// Every candidate scored below the acceptance threshold
    #[error("No acceptable model: best candidate '{best_candidate}' scored R² = {best_score:.4}, below threshold {threshold}")]
    NoAcceptableModel {
        best_candidate: String,
        best_score: f64,
        threshold: f64,
    },

    /// Inference attempted before any successful training run
    #[error("Model artifact not found at {0}")]
    ArtifactNotFound(String),

    /// Building, fitting or scoring one candidate failed; the whole pass aborts
    #[error("Candidate '{candidate}' failed: {source}")]
    CandidateFitFailure {
        candidate: String,
        #[source]
        source: Box<MathScoreError>,
    },

    #[error("Data error: {0}")]
    DataError(String),

    #[error("Preprocessing error: {0}")]
    PreprocessingError(String),

    #[error("Training error: {0}")]
    TrainingError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },

    #[error("Feature not found: {0}")]
    FeatureNotFound(String),

    #[error("Model not fitted")]
    ModelNotFitted,

    #[error("Invalid parameter: {name} = {value}, {reason}")]
    InvalidParameter {
        name: String,
        value: String,
        reason: String,
    },

    #[error("Computation error: {0}")]
    ComputationError(String),
}

impl MathScoreError {
    /// Wrap an error raised while handling a specific candidate
    pub fn candidate(name: impl Into<String>, source: MathScoreError) -> Self {
        MathScoreError::CandidateFitFailure {
            candidate: name.into(),
            source: Box::new(source),
        }
    }

    /// Short, user-facing description of the failure, without internals
    pub fn user_message(&self) -> String {
        match self {
            MathScoreError::InvalidInput { field, reason } => {
                format!("Please check the '{}' field: {}", field, reason)
            }
            MathScoreError::FeatureEncodingError { column, value } => {
                format!("'{}' is not a recognised value for {}", value, column)
            }
            MathScoreError::NoAcceptableModel { best_score, threshold, .. } => format!(
                "No model was accurate enough to keep (best R² {:.3}, need at least {})",
                best_score, threshold
            ),
            MathScoreError::ArtifactNotFound(_) => {
                "No trained model is available yet; run training first".to_string()
            }
            MathScoreError::CandidateFitFailure { candidate, .. } => {
                format!("Training stopped: model '{}' could not be trained", candidate)
            }
            other => other.to_string(),
        }
    }
}

impl From<polars::error::PolarsError> for MathScoreError {
    fn from(err: polars::error::PolarsError) -> Self {
        MathScoreError::DataError(err.to_string())
    }
}

impl From<serde_json::Error> for MathScoreError {
    fn from(err: serde_json::Error) -> Self {
        MathScoreError::SerializationError(err.to_string())
    }
}

impl From<bincode::Error> for MathScoreError {
    fn from(err: bincode::Error) -> Self {
        MathScoreError::SerializationError(err.to_string())
    }
}

impl From<ndarray::ShapeError> for MathScoreError {
    fn from(err: ndarray::ShapeError) -> Self {
        MathScoreError::ShapeError {
            expected: "valid shape".to_string(),
            actual: err.to_string(),
        }
    }
}
