//! Loading and saving rubrics on disk.
//!
//! `.txt` files hold the lossy text form (one criterion per line); anything
//! else is the JSON array form that keeps ids and max scores.

use std::path::Path;

use tracing::warn;

use crate::domain::{Rubric, RubricError};

/// On-disk rubric format, chosen by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RubricFormat {
    Json,
    Text,
}

impl RubricFormat {
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("txt") => RubricFormat::Text,
            _ => RubricFormat::Json,
        }
    }
}

/// Parse rubric JSON (an array of `{id, criteria, maxScore}`).
pub fn parse_rubric_json(content: &str) -> Result<Rubric, RubricError> {
    let rubric: Rubric = serde_json::from_str(content)?;
    Ok(rubric)
}

/// Load a rubric. Text files get fresh ids and default max scores.
pub fn load_rubric(path: &Path) -> Result<Rubric, RubricError> {
    let content = std::fs::read_to_string(path)?;
    let rubric = match RubricFormat::from_path(path) {
        RubricFormat::Text => Rubric::from_text_lossy(&content),
        RubricFormat::Json => parse_rubric_json(&content)
            .map_err(|e| RubricError::InvalidFile(format!("{}: {}", path.display(), e)))?,
    };
    if rubric.is_empty() {
        warn!(path = %path.display(), "loaded rubric has no criteria");
    }
    Ok(rubric)
}

/// Save a rubric. Saving as `.txt` drops ids and max scores.
pub fn save_rubric(path: &Path, rubric: &Rubric) -> Result<(), RubricError> {
    let content = match RubricFormat::from_path(path) {
        RubricFormat::Text => {
            let mut text = rubric.to_text();
            text.push('\n');
            text
        }
        RubricFormat::Json => serde_json::to_string_pretty(rubric)?,
    };
    std::fs::write(path, content)?;
    Ok(())
}
