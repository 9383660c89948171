//! Response validation.
//!
//! Reconciles the engine's raw reply against the rubric snapshot used for the
//! request. Nothing the engine says is trusted until it has passed here:
//!
//! 1. the reply must contain a JSON array of entries, either bare, wrapped in
//!    prose or Markdown fences, or under a `"results"` key;
//! 2. every entry must be exactly `{criteriaId, score, feedback}`;
//! 3. unknown criterion ids and repeated entries are dropped;
//! 4. scores are clamped into `[0, max_score]`;
//! 5. criteria without an entry follow the [`MissingCriterionPolicy`].
//!
//! The output is in rubric order and covers every criterion exactly once.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::domain::{CriterionId, EvaluationResult, Rubric};
use crate::engine::RawReply;
use crate::metrics::METRICS;
use crate::obs;

// ---------------------------------------------------------------------------
// Policy & errors
// ---------------------------------------------------------------------------

/// What to do with rubric criteria the engine did not score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingCriterionPolicy {
    /// Fail the attempt.
    #[default]
    Reject,
    /// Fill in `score = 0` with empty feedback.
    ZeroPlaceholder,
}

impl fmt::Display for MissingCriterionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MissingCriterionPolicy::Reject => write!(f, "reject"),
            MissingCriterionPolicy::ZeroPlaceholder => write!(f, "placeholder"),
        }
    }
}

impl FromStr for MissingCriterionPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "reject" => Ok(MissingCriterionPolicy::Reject),
            "placeholder" | "zero_placeholder" | "zero" => Ok(MissingCriterionPolicy::ZeroPlaceholder),
            other => Err(format!(
                "unknown missing-criterion policy '{}' (expected 'reject' or 'placeholder')",
                other
            )),
        }
    }
}

/// Reasons a reply is refused.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("reply is not a JSON result array: {0}")]
    MalformedReply(String),

    #[error("reply entry {index} is invalid: {reason}")]
    InvalidEntry { index: usize, reason: String },

    #[error("reply has no result for criteria: {}", join_ids(.0))]
    MissingCriteria(Vec<CriterionId>),
}

fn join_ids(ids: &[CriterionId]) -> String {
    ids.iter().map(CriterionId::as_str).collect::<Vec<_>>().join(", ")
}

// ---------------------------------------------------------------------------
// Wire entry
// ---------------------------------------------------------------------------

/// `criteriaId` as the engine may send it.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WireCriterionId {
    Text(String),
    Number(i64),
}

impl From<WireCriterionId> for CriterionId {
    fn from(id: WireCriterionId) -> Self {
        match id {
            WireCriterionId::Text(s) => CriterionId::from(s.trim().to_string()),
            WireCriterionId::Number(n) => CriterionId::from(n.to_string()),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct WireEntry {
    criteria_id: WireCriterionId,
    score: f64,
    feedback: String,
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Results that passed validation, plus what was repaired on the way.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedResults {
    /// Exactly one per rubric criterion, in rubric order.
    pub results: Vec<EvaluationResult>,
    /// Criteria filled with a placeholder.
    pub placeholders: Vec<CriterionId>,
    /// Entries discarded (unknown id or repeated criterion).
    pub dropped: usize,
    /// Scores moved into `[0, max_score]`.
    pub clamped: usize,
}

/// Locate the first JSON value in free-form reply text.
fn extract_json(text: &str) -> Result<Value, ValidationError> {
    let start = text
        .find(|c: char| c == '[' || c == '{')
        .ok_or_else(|| ValidationError::MalformedReply("no JSON array found".to_string()))?;

    serde_json::Deserializer::from_str(&text[start..])
        .into_iter::<Value>()
        .next()
        .ok_or_else(|| ValidationError::MalformedReply("no JSON value found".to_string()))?
        .map_err(|e| ValidationError::MalformedReply(format!("invalid JSON: {}", e)))
}

fn entries(value: Value) -> Result<Vec<Value>, ValidationError> {
    match value {
        Value::Array(items) => Ok(items),
        Value::Object(mut map) => match map.remove("results") {
            Some(Value::Array(items)) => Ok(items),
            _ => Err(ValidationError::MalformedReply(
                "expected an array of results".to_string(),
            )),
        },
        other => Err(ValidationError::MalformedReply(format!(
            "expected an array of results, got {}",
            json_kind(&other)
        ))),
    }
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Validate `reply` against `rubric`.
pub fn validate_reply(
    reply: &RawReply,
    rubric: &Rubric,
    policy: MissingCriterionPolicy,
) -> Result<ValidatedResults, ValidationError> {
    let items = entries(extract_json(&reply.text)?)?;

    let mut accepted: HashMap<CriterionId, EvaluationResult> = HashMap::new();
    let mut dropped = 0;
    let mut clamped = 0;

    for (index, item) in items.into_iter().enumerate() {
        let entry: WireEntry = serde_json::from_value(item).map_err(|e| {
            ValidationError::InvalidEntry {
                index,
                reason: e.to_string(),
            }
        })?;
        let id = CriterionId::from(entry.criteria_id);

        let Some(criterion) = rubric.get(&id) else {
            obs::emit_entry_dropped(id.as_str(), "unknown criterion");
            dropped += 1;
            continue;
        };
        if accepted.contains_key(&id) {
            obs::emit_entry_dropped(id.as_str(), "duplicate entry");
            dropped += 1;
            continue;
        }

        let max = f64::from(criterion.max_score.get());
        let score = entry.score.clamp(0.0, max);
        if score != entry.score {
            obs::emit_score_clamped(id.as_str(), entry.score, score);
            clamped += 1;
        }

        accepted.insert(id.clone(), EvaluationResult::new(id, score, entry.feedback));
    }

    let missing: Vec<CriterionId> = rubric
        .criteria()
        .iter()
        .filter(|c| !accepted.contains_key(&c.id))
        .map(|c| c.id.clone())
        .collect();

    if !missing.is_empty() && policy == MissingCriterionPolicy::Reject {
        return Err(ValidationError::MissingCriteria(missing));
    }

    let results = rubric
        .criteria()
        .iter()
        .map(|c| {
            accepted
                .remove(&c.id)
                .unwrap_or_else(|| EvaluationResult::placeholder(c.id.clone()))
        })
        .collect();

    METRICS.add_entries_dropped(dropped as u64);
    METRICS.add_scores_clamped(clamped as u64);
    debug!(
        criteria = rubric.len(),
        dropped = dropped,
        clamped = clamped,
        placeholders = missing.len(),
        "reply validated"
    );

    Ok(ValidatedResults {
        results,
        placeholders: missing,
        dropped,
        clamped,
    })
}
