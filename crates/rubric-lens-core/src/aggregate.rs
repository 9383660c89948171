//! Score aggregation.

use serde::{Deserialize, Serialize};

use crate::domain::{EvaluationResult, Rubric};

/// Errors produced by [`aggregate`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AggregateError {
    #[error("cannot aggregate against an empty rubric")]
    EmptyRubric,
}

/// Final grade of one attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreSummary {
    pub total_score: f64,
    pub max_possible_score: u32,
    /// Whole percent in `[0, 100]`, rounded half up.
    pub percentage: u8,
}

impl ScoreSummary {
    /// `"18/20"`.
    pub fn fraction(&self) -> String {
        format!("{}/{}", format_score(self.total_score), self.max_possible_score)
    }
}

/// Sum validated results against the rubric they were validated with.
pub fn aggregate(results: &[EvaluationResult], rubric: &Rubric) -> Result<ScoreSummary, AggregateError> {
    let max_possible_score = rubric.max_possible_score();
    if rubric.is_empty() || max_possible_score == 0 {
        return Err(AggregateError::EmptyRubric);
    }

    let total_score: f64 = results.iter().map(|r| r.score).sum();
    let ratio = 100.0 * total_score / f64::from(max_possible_score);
    let percentage = (ratio + 0.5).floor().clamp(0.0, 100.0) as u8;

    Ok(ScoreSummary {
        total_score,
        max_possible_score,
        percentage,
    })
}

/// Render a score without a trailing `.0` for whole numbers.
pub fn format_score(score: f64) -> String {
    if score.fract() == 0.0 {
        format!("{}", score as i64)
    } else {
        let s = format!("{:.2}", score);
        s.trim_end_matches('0').trim_end_matches('.').to_string()
    }
}
