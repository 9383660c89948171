//! Rubric model: the ordered set of scoring criteria and its edit operations.
//!
//! A [`Rubric`] is plain data. Every mutation goes through a method on it so
//! the two invariants hold at all times:
//! - criterion ids are unique within the rubric;
//! - every `max_score` is a positive integer (enforced by [`MaxScore`]).
//!
//! # Text form is one-directional
//!
//! [`Rubric::replace_from_text_lossy`] rebuilds the whole rubric from
//! free text, one criterion per non-blank line. Ids and custom max scores are
//! not representable in the text form and are reset, so converting a rubric
//! to text ([`Rubric::to_text`]) and back is *not* an identity.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::RubricError;

/// Max score given to criteria created by [`Rubric::add`] or the text form.
pub const DEFAULT_MAX_SCORE: u32 = 10;

/// Upper bound applied by [`MaxScore::clamped`] and [`MaxScore::parse_lossy`].
pub const MAX_SCORE_CEILING: u32 = 100;

/// Opaque unique identifier of a criterion.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CriterionId(String);

impl CriterionId {
    /// Wrap an existing identifier.
    pub fn new(id: impl Into<String>) -> Self {
        CriterionId(id.into())
    }

    /// Generate a fresh random identifier.
    pub fn generate() -> Self {
        CriterionId(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CriterionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for CriterionId {
    fn from(s: &str) -> Self {
        CriterionId(s.to_string())
    }
}

/// Per-criterion score cap. Always `>= 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u32")]
pub struct MaxScore(u32);

impl MaxScore {
    /// Returns `None` outside `[1, MAX_SCORE_CEILING]`.
    pub fn new(value: u32) -> Option<Self> {
        (1..=MAX_SCORE_CEILING).contains(&value).then_some(MaxScore(value))
    }

    /// Coerce any integer into `[1, MAX_SCORE_CEILING]`.
    pub fn clamped(value: i64) -> Self {
        MaxScore(value.clamp(1, MAX_SCORE_CEILING as i64) as u32)
    }

    /// Coerce raw editor input.
    ///
    /// Leading/trailing whitespace is ignored, a fractional part is truncated
    /// and anything unparsable becomes `1`.
    pub fn parse_lossy(raw: &str) -> Self {
        let trimmed = raw.trim();
        let integral = trimmed.split('.').next().unwrap_or_default();
        match integral.parse::<i64>() {
            Ok(v) => Self::clamped(v),
            Err(_) => MaxScore(1),
        }
    }

    pub fn get(self) -> u32 {
        self.0
    }
}

impl Default for MaxScore {
    fn default() -> Self {
        MaxScore(DEFAULT_MAX_SCORE)
    }
}

impl TryFrom<i64> for MaxScore {
    type Error = RubricError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        u32::try_from(value)
            .ok()
            .and_then(MaxScore::new)
            .ok_or(RubricError::InvalidMaxScore(value))
    }
}

impl From<MaxScore> for u32 {
    fn from(score: MaxScore) -> Self {
        score.0
    }
}

impl fmt::Display for MaxScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One scoring dimension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RubricCriterion {
    pub id: CriterionId,
    /// Free-text description shown to the engine.
    pub criteria: String,
    pub max_score: MaxScore,
}

impl RubricCriterion {
    pub fn new(id: impl Into<CriterionId>, criteria: impl Into<String>, max_score: MaxScore) -> Self {
        Self {
            id: id.into(),
            criteria: criteria.into(),
            max_score,
        }
    }

    /// A criterion with a fresh id and the default max score.
    pub fn fresh(criteria: impl Into<String>) -> Self {
        Self::new(CriterionId::generate(), criteria, MaxScore::default())
    }
}

impl From<String> for CriterionId {
    fn from(s: String) -> Self {
        CriterionId(s)
    }
}

/// A single-field edit applied by [`Rubric::update`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CriterionField {
    Criteria(String),
    /// Callers coerce raw input first, see [`MaxScore::parse_lossy`].
    MaxScore(MaxScore),
}

/// Ordered set of scoring criteria.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<RubricCriterion>", into = "Vec<RubricCriterion>")]
pub struct Rubric {
    criteria: Vec<RubricCriterion>,
}

impl Rubric {
    /// An empty rubric. Evaluation refuses to start on it.
    pub fn empty() -> Self {
        Self {
            criteria: Vec::new(),
        }
    }

    /// Build a rubric from existing criteria, rejecting duplicate ids.
    pub fn from_criteria(criteria: Vec<RubricCriterion>) -> Result<Self, RubricError> {
        let mut seen = HashSet::new();
        for c in &criteria {
            if !seen.insert(c.id.clone()) {
                return Err(RubricError::DuplicateId(c.id.clone()));
            }
        }
        Ok(Self { criteria })
    }

    /// Parse free text into a brand new rubric (see [`Rubric::replace_from_text_lossy`]).
    pub fn from_text_lossy(text: &str) -> Self {
        let mut rubric = Self::empty();
        rubric.replace_from_text_lossy(text);
        rubric
    }

    pub fn criteria(&self) -> &[RubricCriterion] {
        &self.criteria
    }

    pub fn len(&self) -> usize {
        self.criteria.len()
    }

    pub fn is_empty(&self) -> bool {
        self.criteria.is_empty()
    }

    pub fn get(&self, id: &CriterionId) -> Option<&RubricCriterion> {
        self.criteria.iter().find(|c| &c.id == id)
    }

    pub fn contains(&self, id: &CriterionId) -> bool {
        self.get(id).is_some()
    }

    /// Append a blank criterion with a fresh id and the default max score.
    pub fn add(&mut self) -> &RubricCriterion {
        self.criteria.push(RubricCriterion::fresh(""));
        &self.criteria[self.criteria.len() - 1]
    }

    /// Drop the criterion with `id`. Returns `false` when nothing matched.
    pub fn remove(&mut self, id: &CriterionId) -> bool {
        let before = self.criteria.len();
        self.criteria.retain(|c| &c.id != id);
        self.criteria.len() != before
    }

    /// Change one field of one criterion.
    pub fn update(&mut self, id: &CriterionId, field: CriterionField) -> Result<(), RubricError> {
        let criterion = self
            .criteria
            .iter_mut()
            .find(|c| &c.id == id)
            .ok_or_else(|| RubricError::UnknownCriterion(id.clone()))?;

        match field {
            CriterionField::Criteria(text) => criterion.criteria = text,
            CriterionField::MaxScore(max) => criterion.max_score = max,
        }
        Ok(())
    }

    /// Replace the **entire** rubric with one fresh criterion per non-blank line.
    ///
    /// Lossy and one-directional: every new criterion gets a new id and
    /// [`DEFAULT_MAX_SCORE`]. Nothing of the previous rubric survives except
    /// what is spelled out in `text`.
    pub fn replace_from_text_lossy(&mut self, text: &str) {
        self.criteria = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(RubricCriterion::fresh)
            .collect();
    }

    /// Criterion descriptions joined by newlines, the editable text form.
    pub fn to_text(&self) -> String {
        self.criteria
            .iter()
            .map(|c| c.criteria.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Sum of all max scores.
    pub fn max_possible_score(&self) -> u32 {
        self.criteria
            .iter()
            .fold(0u32, |acc, c| acc.saturating_add(c.max_score.get()))
    }
}

impl Default for Rubric {
    /// Starter rubric offered on a fresh session.
    fn default() -> Self {
        Self {
            criteria: vec![
                RubricCriterion::new("1", "Visual clarity and organization", MaxScore::default()),
                RubricCriterion::new("2", "Technical accuracy", MaxScore::default()),
                RubricCriterion::new("3", "Completeness", MaxScore::default()),
            ],
        }
    }
}

impl TryFrom<Vec<RubricCriterion>> for Rubric {
    type Error = RubricError;

    fn try_from(criteria: Vec<RubricCriterion>) -> Result<Self, Self::Error> {
        Self::from_criteria(criteria)
    }
}

impl From<Rubric> for Vec<RubricCriterion> {
    fn from(rubric: Rubric) -> Self {
        rubric.criteria
    }
}
