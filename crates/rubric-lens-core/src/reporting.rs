use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::Path;
use uuid::Uuid;

use crate::aggregate::{format_score, ScoreSummary};
use crate::domain::{
    ArtifactSource, EvaluationOutcome, EvaluationResult, MediaKind, Rubric, Submission,
};

/// Current report schema version.
pub const REPORT_SCHEMA_VERSION: &str = "1.0";

/// Identity of the graded artifact.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ArtifactInfo {
    pub name: String,
    pub media_type: String,
    pub media_kind: MediaKind,
    pub size_bytes: u64,
    /// Hex SHA-256 of the raw bytes.
    pub sha256: String,
}

impl ArtifactInfo {
    pub fn from_bytes(name: &str, media_type: &str, bytes: &[u8]) -> Self {
        Self {
            name: name.to_string(),
            media_type: media_type.to_string(),
            media_kind: MediaKind::from_media_type(media_type),
            size_bytes: bytes.len() as u64,
            sha256: hex::encode(Sha256::digest(bytes)),
        }
    }

    /// Describe the in-memory snapshot that was graded.
    pub fn from_submission(submission: &Submission) -> Self {
        Self::from_bytes(submission.name(), submission.media_type(), submission.content())
    }
}

/// Persisted record of one settled evaluation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EvaluationReport {
    pub schema_version: String,
    pub generated_at: DateTime<Utc>,
    pub attempt_id: Uuid,
    pub artifact: ArtifactInfo,
    pub engine: String,
    pub rubric: Rubric,
    pub results: Vec<EvaluationResult>,
    pub summary: ScoreSummary,
    pub placeholders: Vec<String>,
}

impl EvaluationReport {
    pub fn new(outcome: &EvaluationOutcome, artifact: ArtifactInfo, engine: &str) -> Self {
        Self {
            schema_version: REPORT_SCHEMA_VERSION.to_string(),
            generated_at: Utc::now(),
            attempt_id: outcome.attempt_id,
            artifact,
            engine: engine.to_string(),
            rubric: outcome.rubric.clone(),
            results: outcome.results.clone(),
            summary: outcome.summary.clone(),
            placeholders: outcome
                .placeholders
                .iter()
                .map(|id| id.as_str().to_string())
                .collect(),
        }
    }
}

/// Write the report in pretty JSON format.
pub fn write_report_json(path: &Path, report: &EvaluationReport) -> Result<()> {
    let content = serde_json::to_string_pretty(report).context("serialize evaluation report")?;
    std::fs::write(path, content).with_context(|| format!("write {:?}", path))?;
    Ok(())
}

/// Load a report written by [`write_report_json`].
pub fn read_report_json(path: &Path) -> Result<EvaluationReport> {
    let content = std::fs::read_to_string(path).with_context(|| format!("read {:?}", path))?;
    serde_json::from_str(&content).with_context(|| format!("parse report {:?}", path))
}

/// Render the result card as Markdown.
pub fn render_report_md(report: &EvaluationReport) -> String {
    let mut out = String::new();
    out.push_str("# Evaluation Results\n\n");
    out.push_str(&format!(
        "- artifact: `{}` ({})\n- engine: {}\n\n",
        report.artifact.name, report.artifact.media_type, report.engine
    ));
    out.push_str(&format!("**Total Score: {}**\n\n", report.summary.fraction()));
    out.push_str(&format!("**Percentage: {}%**\n\n", report.summary.percentage));

    for result in &report.results {
        let Some(criterion) = report.rubric.get(&result.criteria_id) else {
            continue;
        };
        let title = if criterion.criteria.trim().is_empty() {
            "(untitled criterion)"
        } else {
            criterion.criteria.as_str()
        };
        out.push_str(&format!("## {}\n", title));
        out.push_str(&format!(
            "Score: {} / {}\n\n",
            format_score(result.score),
            criterion.max_score
        ));
        if report.placeholders.iter().any(|p| p == result.criteria_id.as_str()) {
            out.push_str("_No judgment returned for this criterion; scored as 0._\n\n");
        } else if !result.feedback.trim().is_empty() {
            out.push_str(&format!("{}\n\n", result.feedback.trim()));
        }
    }
    out
}

/// Write the Markdown result card.
pub fn write_report_md(path: &Path, report: &EvaluationReport) -> Result<()> {
    let md = render_report_md(report);
    std::fs::write(path, md).with_context(|| format!("write {:?}", path))?;
    Ok(())
}
