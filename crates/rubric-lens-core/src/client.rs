//! Evaluation client: one logical engine request per attempt, with
//! per-call timeout and bounded exponential-backoff retry.
//!
//! Only transient failures (see [`EngineError::is_retryable`]) are retried.
//! A timeout is an engine failure like any other.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::engine::{EngineError, EvaluationEngine, EvaluationRequest, RawReply};
use crate::metrics::METRICS;
use crate::obs;

/// Timeout and retry settings for engine calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum wall-clock time for a single engine call (milliseconds).
    pub timeout_ms: u64,
    /// Maximum number of retries (0 = no retries, call once).
    pub max_retries: u32,
    /// Base delay for exponential backoff between retries (milliseconds).
    pub backoff_base_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            timeout_ms: 60_000,
            max_retries: 2,
            backoff_base_ms: 500,
        }
    }
}

impl RetryPolicy {
    /// Single call, default timeout.
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Delay before retry number `attempt` (1-based attempt that just failed).
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let factor = 2u64.saturating_pow(attempt.saturating_sub(1));
        Duration::from_millis(self.backoff_base_ms.saturating_mul(factor))
    }
}

/// Issues evaluation requests against an [`EvaluationEngine`].
pub struct EvaluationClient<E> {
    engine: E,
    policy: RetryPolicy,
}

impl<E: EvaluationEngine> EvaluationClient<E> {
    pub fn new(engine: E, policy: RetryPolicy) -> Self {
        Self { engine, policy }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Send `request`, retrying transient failures.
    ///
    /// When every attempt failed transiently the error is
    /// [`EngineError::Exhausted`] wrapping the last failure. Non-retryable
    /// errors are returned as they are.
    pub async fn evaluate(&self, request: &EvaluationRequest) -> Result<RawReply, EngineError> {
        let max_attempts = self.policy.max_retries.saturating_add(1);
        let limit = Duration::from_millis(self.policy.timeout_ms);
        let mut attempt = 1;

        loop {
            let outcome = match tokio::time::timeout(limit, self.engine.submit(request)).await {
                Ok(result) => result,
                Err(_elapsed) => Err(EngineError::Timeout {
                    limit_ms: self.policy.timeout_ms,
                }),
            };

            let err = match outcome {
                Ok(reply) => {
                    debug!(
                        attempt_id = %request.attempt_id,
                        engine = %self.engine.name(),
                        attempts = attempt,
                        reply_bytes = reply.text.len(),
                        "engine replied"
                    );
                    return Ok(reply);
                }
                Err(err) => err,
            };

            if !err.is_retryable() {
                return Err(err);
            }
            if attempt >= max_attempts {
                return Err(if attempt > 1 {
                    EngineError::Exhausted {
                        attempts: attempt,
                        last: Box::new(err),
                    }
                } else {
                    err
                });
            }

            let delay = self.policy.backoff_delay(attempt);
            obs::emit_engine_retry(request.attempt_id, attempt, delay.as_millis() as u64, &err);
            METRICS.inc_engine_retries();
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}
