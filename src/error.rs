//! Error types for the takeover pipeline

use thiserror::Error;

/// Errors that abort processing.
///
/// Only identifier, schema, and configuration violations surface here.
/// Per-obstacle data gaps (missing triggers, short windows) are skips,
/// counted in the run summary and never propagated as errors.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Malformed subject identifier: {0:?}")]
    MalformedSubjectId(String),

    #[error("Unknown obstacle code: {0:?}")]
    UnknownObstacle(String),

    #[error("Unrecognized event column: {0:?}")]
    UnknownEventColumn(String),

    #[error("Marker table must contain exactly {expected} offsets, found {found}")]
    MarkerCount { expected: usize, found: usize },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Feature extraction failed: {0}")]
    FeatureExtraction(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),
}
