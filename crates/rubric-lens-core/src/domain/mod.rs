//! Domain models for Rubric Lens.
//!
//! Canonical definitions for the core entities:
//! - `Rubric` / `RubricCriterion`: what a submission is graded against
//! - `Submission` / `ArtifactSource`: the artifact being graded
//! - `EvaluationResult` / `EvaluationOutcome`: what an attempt produces

pub mod error;
pub mod result;
pub mod rubric;
pub mod submission;

// Re-export main types and errors
pub use error::{AttemptError, PreconditionError, Result, RubricError, GENERIC_FAILURE_MESSAGE};
pub use result::{EvaluationOutcome, EvaluationResult};
pub use rubric::{
    CriterionField, CriterionId, MaxScore, Rubric, RubricCriterion, DEFAULT_MAX_SCORE,
    MAX_SCORE_CEILING,
};
pub use submission::{
    guess_media_type, ArtifactSource, FileArtifact, MediaKind, Submission, ACCEPTED_MEDIA_TYPES,
};
