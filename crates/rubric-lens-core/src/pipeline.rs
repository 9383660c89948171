//! The evaluation pipeline: encode → request → validate → aggregate.
//!
//! One call to [`EvaluationPipeline::run`] is one attempt. Progress is
//! published as an [`AttemptPhase`] on a `watch` channel:
//!
//! ```text
//! Idle → Encoding → Requesting → Validating → Aggregating → Settled
//!           │           │            │             │
//!           └───────────┴────────────┴─────────────┴──→ Failed
//! ```
//!
//! `Settled` and `Failed` are terminal. The next attempt starts again at
//! `Idle`. A failed attempt yields no results at all. Attempts on one
//! pipeline run one after another, so the phase channel always describes a
//! single attempt.

use std::time::Instant;

use serde::{Deserialize, Serialize};
use tokio::sync::{watch, Mutex};
use tracing::{warn, Instrument};
use uuid::Uuid;

use crate::aggregate::aggregate;
use crate::client::EvaluationClient;
use crate::domain::{ArtifactSource, AttemptError, EvaluationOutcome, PreconditionError, Rubric};
use crate::encoder::encode_artifact;
use crate::engine::{EvaluationEngine, EvaluationRequest};
use crate::metrics::METRICS;
use crate::obs::{self, AttemptSpan};
use crate::validator::{validate_reply, MissingCriterionPolicy};

/// Where an attempt currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptPhase {
    Idle,
    Encoding,
    Requesting,
    Validating,
    Aggregating,
    Settled,
    Failed,
}

impl AttemptPhase {
    /// Whether `self → next` is a legal transition within one attempt.
    pub fn can_advance_to(self, next: AttemptPhase) -> bool {
        use AttemptPhase::*;
        matches!(
            (self, next),
            (Idle, Encoding)
                | (Encoding, Requesting)
                | (Requesting, Validating)
                | (Validating, Aggregating)
                | (Aggregating, Settled)
                | (Encoding | Requesting | Validating | Aggregating, Failed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, AttemptPhase::Settled | AttemptPhase::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AttemptPhase::Idle => "idle",
            AttemptPhase::Encoding => "encoding",
            AttemptPhase::Requesting => "requesting",
            AttemptPhase::Validating => "validating",
            AttemptPhase::Aggregating => "aggregating",
            AttemptPhase::Settled => "settled",
            AttemptPhase::Failed => "failed",
        }
    }
}

impl std::fmt::Display for AttemptPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Runs attempts against one engine.
pub struct EvaluationPipeline<E> {
    client: EvaluationClient<E>,
    policy: MissingCriterionPolicy,
    phase_tx: watch::Sender<AttemptPhase>,
    /// Held for the whole of one attempt.
    run_lock: Mutex<()>,
}

impl<E: EvaluationEngine> EvaluationPipeline<E> {
    pub fn new(client: EvaluationClient<E>, policy: MissingCriterionPolicy) -> Self {
        let (phase_tx, _) = watch::channel(AttemptPhase::Idle);
        Self {
            client,
            policy,
            phase_tx,
            run_lock: Mutex::new(()),
        }
    }

    pub fn client(&self) -> &EvaluationClient<E> {
        &self.client
    }

    pub fn engine_name(&self) -> &str {
        self.client.engine().name()
    }

    pub fn policy(&self) -> MissingCriterionPolicy {
        self.policy
    }

    /// Observe phase changes.
    pub fn subscribe(&self) -> watch::Receiver<AttemptPhase> {
        self.phase_tx.subscribe()
    }

    pub fn phase(&self) -> AttemptPhase {
        *self.phase_tx.borrow()
    }

    fn advance(&self, attempt_id: Uuid, next: AttemptPhase) {
        let moved = self.phase_tx.send_if_modified(|phase| {
            if phase.can_advance_to(next) {
                *phase = next;
                true
            } else {
                false
            }
        });
        if moved {
            obs::emit_phase_changed(attempt_id, next.as_str());
        } else {
            warn!(attempt_id = %attempt_id, from = %self.phase(), to = %next, "illegal phase transition ignored");
        }
    }

    /// Evaluate `source` against `rubric`.
    ///
    /// The rubric is snapshotted before anything else happens. An empty
    /// rubric is refused with [`PreconditionError::EmptyRubric`] and the
    /// phase stays untouched.
    ///
    /// Concurrent callers are serialized: a second call waits until the
    /// attempt in flight has settled or failed. Callers that want a busy
    /// no-op instead go through [`EvaluationController`](crate::session::EvaluationController).
    pub async fn run(
        &self,
        source: &dyn ArtifactSource,
        rubric: &Rubric,
    ) -> Result<EvaluationOutcome, AttemptError> {
        if rubric.is_empty() {
            return Err(PreconditionError::EmptyRubric.into());
        }
        let snapshot = rubric.clone();
        let _serial = self.run_lock.lock().await;
        let attempt_id = Uuid::new_v4();

        self.phase_tx.send_replace(AttemptPhase::Idle);
        METRICS.inc_attempts_started();
        let started = Instant::now();

        let span = AttemptSpan::span(attempt_id);
        let result = self
            .execute(attempt_id, source, snapshot)
            .instrument(span.clone())
            .await;

        let _entered = span.enter();
        match &result {
            Ok(outcome) => {
                self.advance(attempt_id, AttemptPhase::Settled);
                METRICS.inc_attempts_settled();
                obs::emit_attempt_settled(
                    attempt_id,
                    outcome.summary.total_score,
                    outcome.summary.max_possible_score,
                    outcome.summary.percentage,
                    started.elapsed().as_millis() as u64,
                );
            }
            Err(err) => {
                let failed_in = self.phase();
                self.advance(attempt_id, AttemptPhase::Failed);
                METRICS.inc_attempts_failed();
                obs::emit_attempt_failed(attempt_id, failed_in.as_str(), err);
            }
        }
        result
    }

    async fn execute(
        &self,
        attempt_id: Uuid,
        source: &dyn ArtifactSource,
        rubric: Rubric,
    ) -> Result<EvaluationOutcome, AttemptError> {
        obs::emit_attempt_started(attempt_id, source.name(), rubric.len());

        self.advance(attempt_id, AttemptPhase::Encoding);
        let artifact = encode_artifact(source).await?;

        self.advance(attempt_id, AttemptPhase::Requesting);
        let request = EvaluationRequest::new(attempt_id, artifact, rubric);
        let reply = self.client.evaluate(&request).await?;

        self.advance(attempt_id, AttemptPhase::Validating);
        let validated = validate_reply(&reply, &request.rubric, self.policy)?;

        self.advance(attempt_id, AttemptPhase::Aggregating);
        let summary = aggregate(&validated.results, &request.rubric)?;

        Ok(EvaluationOutcome {
            attempt_id,
            rubric: request.rubric,
            results: validated.results,
            summary,
            placeholders: validated.placeholders,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::RetryPolicy;
    use crate::domain::Submission;
    use crate::engine::{EngineError, ScriptedEngine};

    fn pipeline(engine: ScriptedEngine) -> EvaluationPipeline<ScriptedEngine> {
        EvaluationPipeline::new(
            EvaluationClient::new(engine, RetryPolicy::no_retry()),
            MissingCriterionPolicy::Reject,
        )
    }

    #[test]
    fn test_transition_table() {
        use AttemptPhase::*;
        assert!(Idle.can_advance_to(Encoding));
        assert!(Encoding.can_advance_to(Failed));
        assert!(Aggregating.can_advance_to(Settled));
        assert!(!Idle.can_advance_to(Settled));
        assert!(!Settled.can_advance_to(Failed));
        assert!(!Failed.can_advance_to(Encoding));
        assert!(!Requesting.can_advance_to(Encoding));
        assert!(Settled.is_terminal() && Failed.is_terminal());
    }

    #[tokio::test]
    async fn test_run_settles() {
        let engine = ScriptedEngine::replying(
            r#"[{"criteriaId":"1","score":8,"feedback":"a"},{"criteriaId":"2","score":9,"feedback":"b"},{"criteriaId":"3","score":10,"feedback":"c"}]"#,
        );
        let p = pipeline(engine);
        let sub = Submission::new("notes.txt", "text/plain", b"hello".to_vec());

        let outcome = p.run(&sub, &Rubric::default()).await.unwrap();
        assert_eq!(outcome.summary.total_score, 27.0);
        assert_eq!(outcome.summary.percentage, 90);
        assert_eq!(p.phase(), AttemptPhase::Settled);
    }

    #[tokio::test]
    async fn test_engine_failure_marks_failed() {
        let p = pipeline(ScriptedEngine::failing(EngineError::Auth("HTTP 401".into())));
        let sub = Submission::new("notes.txt", "text/plain", b"hello".to_vec());

        let err = p.run(&sub, &Rubric::default()).await.unwrap_err();
        assert!(matches!(err, AttemptError::Engine(EngineError::Auth(_))));
        assert_eq!(p.phase(), AttemptPhase::Failed);
    }

    #[tokio::test]
    async fn test_empty_rubric_never_starts() {
        let engine = ScriptedEngine::replying("[]");
        let p = pipeline(engine);
        let sub = Submission::new("notes.txt", "text/plain", b"hello".to_vec());

        let err = p.run(&sub, &Rubric::empty()).await.unwrap_err();
        assert!(matches!(err, AttemptError::Precondition(PreconditionError::EmptyRubric)));
        assert_eq!(p.phase(), AttemptPhase::Idle);
        assert_eq!(p.client().engine().calls(), 0);
    }

    #[tokio::test]
    async fn test_encode_failure_skips_engine() {
        let p = pipeline(ScriptedEngine::replying("[]"));
        let empty = Submission::new("blank.png", "image/png", Vec::new());

        let err = p.run(&empty, &Rubric::default()).await.unwrap_err();
        assert!(matches!(err, AttemptError::Encode(_)));
        assert_eq!(p.client().engine().calls(), 0);
        assert_eq!(p.phase(), AttemptPhase::Failed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_runs_do_not_interleave() {
        let reply = r#"[{"criteriaId":"1","score":8,"feedback":""},{"criteriaId":"2","score":9,"feedback":""},{"criteriaId":"3","score":10,"feedback":""}]"#;
        let engine = ScriptedEngine::replying(reply)
            .then_reply(reply)
            .with_delay(std::time::Duration::from_millis(100));
        let p = pipeline(engine);
        let a = Submission::new("a.txt", "text/plain", b"first".to_vec());
        let b = Submission::new("b.txt", "text/plain", b"second".to_vec());
        let rubric = Rubric::default();

        let midway = async {
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            (p.client().engine().calls(), p.phase())
        };
        let (first, second, (calls, phase)) = tokio::join!(p.run(&a, &rubric), p.run(&b, &rubric), midway);

        // The second attempt had not started while the first was requesting.
        assert_eq!(calls, 1);
        assert_eq!(phase, AttemptPhase::Requesting);
        assert!(first.is_ok() && second.is_ok());
        assert_eq!(p.client().engine().calls(), 2);
        assert_eq!(p.phase(), AttemptPhase::Settled);
    }
}
