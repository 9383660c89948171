//! Evaluation engine seam.
//!
//! The engine is an opaque remote capability: it receives one
//! [`EvaluationRequest`] and answers with a [`RawReply`] or an
//! [`EngineError`]. Nothing it returns is trusted before the validator has
//! seen it.
//!
//! # Modules
//!
//! - [`request`]: `EvaluationRequest` construction and prompt rendering
//! - [`gemini`]: HTTP engine speaking the `generateContent` API
//! - [`fake`]: `ScriptedEngine`, an in-memory engine for tests

pub mod fake;
pub mod gemini;
pub mod request;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use fake::ScriptedEngine;
pub use gemini::GeminiEngine;
pub use request::EvaluationRequest;

/// Unvalidated reply text from the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawReply {
    pub text: String,
    /// Model that produced the reply, when the engine reports it.
    pub model: Option<String>,
}

impl RawReply {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            model: None,
        }
    }
}

/// Errors produced while invoking the engine.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("engine call timed out after {limit_ms}ms")]
    Timeout { limit_ms: u64 },

    #[error("authentication rejected: {0}")]
    Auth(String),

    #[error("quota or rate limit exceeded: {0}")]
    Quota(String),

    #[error("request rejected as malformed: {0}")]
    MalformedRequest(String),

    #[error("engine server error (HTTP {status}): {body}")]
    Server { status: u16, body: String },

    #[error("unexpected engine response (HTTP {status}): {body}")]
    Http { status: u16, body: String },

    #[error("malformed engine reply: {0}")]
    MalformedReply(String),

    #[error("engine not configured: {0}")]
    NotConfigured(String),

    #[error("engine failed after {attempts} attempt(s): {last}")]
    Exhausted { attempts: u32, last: Box<EngineError> },
}

impl EngineError {
    /// Transient failures worth another attempt.
    ///
    /// Auth failures, malformed requests and malformed replies are never
    /// retried.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            EngineError::Transport(_)
                | EngineError::Timeout { .. }
                | EngineError::Quota(_)
                | EngineError::Server { .. }
        )
    }

    /// Map a non-success HTTP status to an error.
    pub fn from_status(status: u16, body: impl Into<String>) -> Self {
        let body = body.into();
        match status {
            400 | 404 | 413 | 422 => EngineError::MalformedRequest(format!("HTTP {}: {}", status, body)),
            401 | 403 => EngineError::Auth(format!("HTTP {}", status)),
            429 => EngineError::Quota(body),
            500..=599 => EngineError::Server { status, body },
            _ => EngineError::Http { status, body },
        }
    }
}

impl From<reqwest::Error> for EngineError {
    fn from(err: reqwest::Error) -> Self {
        EngineError::Transport(err.to_string())
    }
}

/// A remote capability that scores an artifact against a rubric.
#[async_trait]
pub trait EvaluationEngine: Send + Sync {
    /// Submit one request. Implementations must not retry internally.
    async fn submit(&self, request: &EvaluationRequest) -> Result<RawReply, EngineError>;

    /// Short name for logs and reports.
    fn name(&self) -> &str;
}
