//! Structured observability hooks for the evaluation attempt lifecycle.
//!
//! This module provides:
//! - Attempt-scoped tracing spans via the `AttemptSpan` RAII guard
//! - Emission functions for lifecycle events: started, phase change, retry,
//!   dropped entries, clamped scores, settled and failed
//!
//! Events are emitted at `info!` level (filterable via `RUST_LOG`).
//! For JSON output, set `RUBRIC_LENS_LOG_FORMAT=json`.

use tracing::{info, warn};
use uuid::Uuid;

/// RAII guard that enters an attempt-scoped span for the duration of one attempt.
///
/// # Example
///
/// ```ignore
/// let _span = AttemptSpan::enter(attempt_id);
/// // every tracing call below carries attempt_id
/// ```
pub struct AttemptSpan {
    _span: tracing::span::EnteredSpan,
}

impl AttemptSpan {
    /// Create and enter a span tagged with the attempt id.
    pub fn enter(attempt_id: Uuid) -> Self {
        Self {
            _span: Self::span(attempt_id).entered(),
        }
    }

    /// The bare span, for instrumenting futures across `.await` points.
    pub fn span(attempt_id: Uuid) -> tracing::Span {
        tracing::info_span!("rubric_lens.attempt", attempt_id = %attempt_id)
    }
}

/// Emit event: attempt started.
pub fn emit_attempt_started(attempt_id: Uuid, artifact: &str, criteria: usize) {
    info!(
        event = "attempt.started",
        attempt_id = %attempt_id,
        artifact = %artifact,
        criteria = criteria,
    );
}

/// Emit event: attempt moved to a new phase.
pub fn emit_phase_changed(attempt_id: Uuid, phase: &str) {
    info!(event = "attempt.phase", attempt_id = %attempt_id, phase = %phase);
}

/// Emit event: engine call failed transiently and will be retried.
pub fn emit_engine_retry(attempt_id: Uuid, attempt: u32, delay_ms: u64, error: &dyn std::fmt::Display) {
    warn!(
        event = "engine.retry",
        attempt_id = %attempt_id,
        attempt = attempt,
        delay_ms = delay_ms,
        error = %error,
    );
}

/// Emit event: a reply entry was discarded.
pub fn emit_entry_dropped(criteria_id: &str, reason: &str) {
    warn!(event = "reply.entry_dropped", criteria_id = %criteria_id, reason = %reason);
}

/// Emit event: a reply score fell outside `[0, max_score]`.
pub fn emit_score_clamped(criteria_id: &str, raw: f64, clamped: f64) {
    warn!(
        event = "reply.score_clamped",
        criteria_id = %criteria_id,
        raw = raw,
        clamped = clamped,
    );
}

/// Emit event: attempt settled with a summary.
pub fn emit_attempt_settled(attempt_id: Uuid, total_score: f64, max_possible: u32, percentage: u8, duration_ms: u64) {
    info!(
        event = "attempt.settled",
        attempt_id = %attempt_id,
        total_score = total_score,
        max_possible = max_possible,
        percentage = percentage,
        duration_ms = duration_ms,
    );
}

/// Emit event: attempt failed (warning level). Carries the root cause.
pub fn emit_attempt_failed(attempt_id: Uuid, phase: &str, error: &dyn std::fmt::Display) {
    warn!(
        event = "attempt.failed",
        attempt_id = %attempt_id,
        phase = %phase,
        error = %error,
    );
}
