//! Evaluation request construction.
//!
//! A request carries the full encoded artifact and the complete ordered
//! rubric snapshot, so the engine can produce one judgment per criterion.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::domain::{MediaKind, Rubric};
use crate::encoder::EncodedArtifact;

/// One evaluation request, built once per attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationRequest {
    pub attempt_id: Uuid,
    pub artifact: EncodedArtifact,
    pub media_kind: MediaKind,
    /// Snapshot taken at dispatch time; later edits do not reach the engine.
    pub rubric: Rubric,
}

impl EvaluationRequest {
    pub fn new(attempt_id: Uuid, artifact: EncodedArtifact, rubric: Rubric) -> Self {
        Self {
            attempt_id,
            media_kind: artifact.media_kind(),
            artifact,
            rubric,
        }
    }

    /// Instruction text sent alongside the artifact.
    pub fn prompt(&self) -> String {
        let criteria_text = self
            .rubric
            .criteria()
            .iter()
            .enumerate()
            .map(|(i, c)| {
                format!(
                    "{}. criteriaId \"{}\": {} (max score: {})",
                    i + 1,
                    c.id,
                    c.criteria.replace(['\r', '\n'], " "),
                    c.max_score
                )
            })
            .collect::<Vec<_>>()
            .join("\n");

        let artifact_note = match self.media_kind {
            MediaKind::RasterImage => "The submission is the attached image.",
            MediaKind::VectorOrText => {
                "The submission is the document text that follows these instructions."
            }
        };

        format!(
            r#"You are an expert evaluator grading a submission against a rubric.
{}

# Rubric
{}

# Required Response Format
Return a JSON array with exactly one object per rubric criterion, in rubric order:
[{{"criteriaId": "<criteriaId from the rubric>", "score": <number from 0 to that criterion's max score>, "feedback": "<one or two sentences justifying the score>"}}]

Use only the criteriaId values listed above. Provide JSON only, no additional text."#,
            artifact_note, criteria_text
        )
    }

    /// JSON schema the reply must follow, in the engine's schema dialect.
    pub fn response_schema() -> Value {
        json!({
            "type": "ARRAY",
            "items": {
                "type": "OBJECT",
                "properties": {
                    "criteriaId": { "type": "STRING" },
                    "score": { "type": "NUMBER" },
                    "feedback": { "type": "STRING" }
                },
                "required": ["criteriaId", "score", "feedback"],
                "propertyOrdering": ["criteriaId", "score", "feedback"]
            }
        })
    }
}
