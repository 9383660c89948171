//! Evaluation results and the settled outcome of an attempt.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::rubric::{CriterionId, Rubric};
use crate::aggregate::ScoreSummary;

/// The engine's judgment for one criterion, after validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationResult {
    pub criteria_id: CriterionId,
    /// In `[0, max_score]` of the referenced criterion.
    pub score: f64,
    pub feedback: String,
}

impl EvaluationResult {
    pub fn new(criteria_id: impl Into<CriterionId>, score: f64, feedback: impl Into<String>) -> Self {
        Self {
            criteria_id: criteria_id.into(),
            score,
            feedback: feedback.into(),
        }
    }

    /// Zero-score stand-in for a criterion the engine skipped.
    pub fn placeholder(criteria_id: CriterionId) -> Self {
        Self {
            criteria_id,
            score: 0.0,
            feedback: String::new(),
        }
    }
}

/// Everything a settled attempt produced. Replaced as a whole, never patched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationOutcome {
    pub attempt_id: Uuid,
    /// The rubric as it was when the request was dispatched.
    pub rubric: Rubric,
    /// One entry per rubric criterion, in rubric order.
    pub results: Vec<EvaluationResult>,
    pub summary: ScoreSummary,
    /// Criteria filled in with a placeholder instead of an engine judgment.
    pub placeholders: Vec<CriterionId>,
}

impl EvaluationOutcome {
    /// Pair each result with its criterion, in rubric order.
    pub fn rows(&self) -> impl Iterator<Item = (&super::rubric::RubricCriterion, &EvaluationResult)> {
        self.results
            .iter()
            .filter_map(|r| self.rubric.get(&r.criteria_id).map(|c| (c, r)))
    }
}
