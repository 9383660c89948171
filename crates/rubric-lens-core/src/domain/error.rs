//! Domain-level error taxonomy for Rubric Lens.
//!
//! Each pipeline stage owns its own error enum (encoder, engine, validator,
//! aggregator). [`AttemptError`] is the umbrella an evaluation attempt fails
//! with; all of its variants abort the attempt atomically.

use super::rubric::CriterionId;
use crate::aggregate::AggregateError;
use crate::encoder::EncodeError;
use crate::engine::EngineError;
use crate::validator::ValidationError;

/// Message shown to the end user for any fatal attempt failure.
pub const GENERIC_FAILURE_MESSAGE: &str = "Failed to evaluate submission. Please try again.";

/// Errors produced by rubric edits and rubric loading.
#[derive(Debug, thiserror::Error)]
pub enum RubricError {
    #[error("unknown criterion: {0}")]
    UnknownCriterion(CriterionId),

    #[error("duplicate criterion id: {0}")]
    DuplicateId(CriterionId),

    #[error("max score must be an integer between 1 and 100, got {0}")]
    InvalidMaxScore(i64),

    #[error("invalid rubric file: {0}")]
    InvalidFile(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Conditions checked before an attempt starts. Reported as warnings.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PreconditionError {
    #[error("Please select a file to evaluate")]
    NoArtifact,

    #[error("Please add at least one rubric criteria")]
    EmptyRubric,
}

/// Why an evaluation attempt did not settle.
#[derive(Debug, thiserror::Error)]
pub enum AttemptError {
    #[error("precondition failed: {0}")]
    Precondition(#[from] PreconditionError),

    #[error("encoding failed: {0}")]
    Encode(#[from] EncodeError),

    #[error("engine invocation failed: {0}")]
    Engine(#[from] EngineError),

    #[error("response validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("aggregation failed: {0}")]
    Aggregate(#[from] AggregateError),
}

impl AttemptError {
    /// Text for the notification surface.
    ///
    /// Precondition violations are shown verbatim; every fatal failure maps
    /// to the same generic message regardless of root cause.
    pub fn user_message(&self) -> String {
        match self {
            AttemptError::Precondition(p) => p.to_string(),
            _ => GENERIC_FAILURE_MESSAGE.to_string(),
        }
    }

    /// `true` for failures that happened after the pipeline started.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, AttemptError::Precondition(_))
    }
}

/// Result type for Rubric Lens domain operations.
pub type Result<T> = std::result::Result<T, AttemptError>;
