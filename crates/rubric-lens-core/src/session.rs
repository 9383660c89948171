//! Session state and the evaluation controller.
//!
//! [`SessionState`] holds everything the user has set up (rubric, selected
//! artifact) plus what the last attempt produced. It only changes through
//! the pure transitions below. [`EvaluationController`] owns one state and
//! drives attempts through an [`EvaluationPipeline`].
//!
//! Rules:
//! - at most one attempt is in flight; a trigger while busy is ignored
//! - selecting a new artifact clears the previous results
//! - a failed attempt clears the previous results too

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::watch;
use tracing::debug;

use crate::domain::{ArtifactSource, AttemptError, EvaluationOutcome, PreconditionError, Rubric};
use crate::engine::EvaluationEngine;
use crate::pipeline::{AttemptPhase, EvaluationPipeline};

/// Success toast text.
pub const SUCCESS_MESSAGE: &str = "Evaluation completed successfully";

// ---------------------------------------------------------------------------
// Notification surface
// ---------------------------------------------------------------------------

/// One user-facing signal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Success(String),
    Failure(String),
    Warning(String),
}

impl Notice {
    pub fn message(&self) -> &str {
        match self {
            Notice::Success(m) | Notice::Failure(m) | Notice::Warning(m) => m,
        }
    }
}

/// Where notices go.
pub trait Notifier: Send + Sync {
    fn notify(&self, notice: Notice);
}

/// Writes notices to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notice: Notice) {
        match notice {
            Notice::Success(m) => tracing::info!(notice = "success", "{}", m),
            Notice::Failure(m) => tracing::error!(notice = "failure", "{}", m),
            Notice::Warning(m) => tracing::warn!(notice = "warning", "{}", m),
        }
    }
}

/// Keeps every notice in memory.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    notices: Mutex<Vec<Notice>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notices(&self) -> Vec<Notice> {
        lock(&self.notices).clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notice: Notice) {
        lock(&self.notices).push(notice);
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ---------------------------------------------------------------------------
// SessionState
// ---------------------------------------------------------------------------

/// Explicit session state.
#[derive(Clone, Default)]
pub struct SessionState {
    pub rubric: Rubric,
    pub artifact: Option<Arc<dyn ArtifactSource>>,
    /// Results of the last settled attempt, if still current.
    pub outcome: Option<EvaluationOutcome>,
    pub busy: bool,
}

impl fmt::Debug for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionState")
            .field("rubric", &self.rubric)
            .field("artifact", &self.artifact.as_ref().map(|a| a.name().to_string()))
            .field("outcome", &self.outcome)
            .field("busy", &self.busy)
            .finish()
    }
}

impl SessionState {
    pub fn new(rubric: Rubric) -> Self {
        Self {
            rubric,
            ..Self::default()
        }
    }

    /// New artifact selected. Previous results no longer apply.
    pub fn select_artifact(self, artifact: Arc<dyn ArtifactSource>) -> Self {
        Self {
            artifact: Some(artifact),
            outcome: None,
            ..self
        }
    }

    pub fn with_rubric(self, rubric: Rubric) -> Self {
        Self { rubric, ..self }
    }

    /// Inputs for a new attempt, or the first unmet precondition.
    pub fn ready(&self) -> Result<(Arc<dyn ArtifactSource>, Rubric), PreconditionError> {
        let artifact = self.artifact.clone().ok_or(PreconditionError::NoArtifact)?;
        if self.rubric.is_empty() {
            return Err(PreconditionError::EmptyRubric);
        }
        Ok((artifact, self.rubric.clone()))
    }

    pub fn begin(self) -> Self {
        Self { busy: true, ..self }
    }

    /// Replace the results wholesale.
    pub fn settle(self, outcome: EvaluationOutcome) -> Self {
        Self {
            outcome: Some(outcome),
            ..self
        }
    }

    /// Failed attempt: no stale results stay on screen.
    pub fn fail(self) -> Self {
        Self {
            outcome: None,
            ..self
        }
    }

    pub fn release(self) -> Self {
        Self { busy: false, ..self }
    }
}

// ---------------------------------------------------------------------------
// Controller
// ---------------------------------------------------------------------------

/// Result of [`EvaluationController::trigger_evaluate`].
#[derive(Debug)]
pub enum TriggerOutcome {
    /// Another attempt was in flight; nothing happened.
    Ignored,
    /// A precondition failed; the pipeline never started.
    Rejected(PreconditionError),
    Settled(EvaluationOutcome),
    Failed(AttemptError),
}

/// Clears the busy flag however the attempt ends.
struct BusyGuard<'a> {
    state: &'a Mutex<SessionState>,
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        let mut state = lock(self.state);
        *state = std::mem::take(&mut *state).release();
    }
}

/// Drives evaluation attempts for one session.
pub struct EvaluationController<E> {
    pipeline: EvaluationPipeline<E>,
    state: Mutex<SessionState>,
    notifier: Arc<dyn Notifier>,
}

impl<E: EvaluationEngine> EvaluationController<E> {
    pub fn new(pipeline: EvaluationPipeline<E>, rubric: Rubric, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            pipeline,
            state: Mutex::new(SessionState::new(rubric)),
            notifier,
        }
    }

    pub fn pipeline(&self) -> &EvaluationPipeline<E> {
        &self.pipeline
    }

    fn transition(&self, f: impl FnOnce(SessionState) -> SessionState) {
        let mut state = lock(&self.state);
        *state = f(std::mem::take(&mut *state));
    }

    /// Copy of the current state.
    pub fn state(&self) -> SessionState {
        lock(&self.state).clone()
    }

    pub fn outcome(&self) -> Option<EvaluationOutcome> {
        lock(&self.state).outcome.clone()
    }

    pub fn is_busy(&self) -> bool {
        lock(&self.state).busy
    }

    pub fn subscribe_phase(&self) -> watch::Receiver<AttemptPhase> {
        self.pipeline.subscribe()
    }

    pub fn select_artifact(&self, artifact: Arc<dyn ArtifactSource>) {
        self.transition(|s| s.select_artifact(artifact));
    }

    pub fn set_rubric(&self, rubric: Rubric) {
        self.transition(|s| s.with_rubric(rubric));
    }

    /// Edit the rubric in place. Edits never reach an attempt already in flight.
    pub fn edit_rubric<R>(&self, f: impl FnOnce(&mut Rubric) -> R) -> R {
        f(&mut lock(&self.state).rubric)
    }

    /// Run one attempt with the current artifact and rubric.
    pub async fn trigger_evaluate(&self) -> TriggerOutcome {
        let (artifact, rubric) = {
            let mut state = lock(&self.state);
            if state.busy {
                debug!("evaluation already in flight; trigger ignored");
                return TriggerOutcome::Ignored;
            }
            let inputs = match state.ready() {
                Ok(inputs) => inputs,
                Err(precondition) => {
                    drop(state);
                    self.notifier.notify(Notice::Warning(precondition.to_string()));
                    return TriggerOutcome::Rejected(precondition);
                }
            };
            *state = std::mem::take(&mut *state).begin();
            inputs
        };
        let _busy = BusyGuard { state: &self.state };

        match self.pipeline.run(artifact.as_ref(), &rubric).await {
            Ok(outcome) => {
                let settled = outcome.clone();
                self.transition(|s| s.settle(settled));
                self.notifier.notify(Notice::Success(SUCCESS_MESSAGE.to_string()));
                TriggerOutcome::Settled(outcome)
            }
            Err(err) => {
                self.transition(SessionState::fail);
                self.notifier.notify(Notice::Failure(err.user_message()));
                TriggerOutcome::Failed(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{EvaluationClient, RetryPolicy};
    use crate::domain::Submission;
    use crate::engine::ScriptedEngine;
    use crate::validator::MissingCriterionPolicy;

    fn artifact() -> Arc<dyn ArtifactSource> {
        Arc::new(Submission::new("a.txt", "text/plain", b"text".to_vec()))
    }

    fn controller(engine: ScriptedEngine) -> (EvaluationController<ScriptedEngine>, Arc<RecordingNotifier>) {
        let notifier = Arc::new(RecordingNotifier::new());
        let pipeline = EvaluationPipeline::new(
            EvaluationClient::new(engine, RetryPolicy::no_retry()),
            MissingCriterionPolicy::Reject,
        );
        (
            EvaluationController::new(pipeline, Rubric::default(), notifier.clone()),
            notifier,
        )
    }

    #[test]
    fn test_select_artifact_clears_results() {
        let outcome = EvaluationOutcome {
            attempt_id: uuid::Uuid::new_v4(),
            rubric: Rubric::default(),
            results: Vec::new(),
            summary: crate::aggregate::ScoreSummary {
                total_score: 0.0,
                max_possible_score: 30,
                percentage: 0,
            },
            placeholders: Vec::new(),
        };
        let state = SessionState::default().settle(outcome);
        assert!(state.outcome.is_some());
        let state = state.select_artifact(artifact());
        assert!(state.outcome.is_none());
        assert!(state.artifact.is_some());
    }

    #[test]
    fn test_ready_checks_artifact_first() {
        let state = SessionState::new(Rubric::empty());
        assert_eq!(state.ready().err(), Some(PreconditionError::NoArtifact));
        let state = state.select_artifact(artifact());
        assert_eq!(state.ready().err(), Some(PreconditionError::EmptyRubric));
    }

    #[tokio::test]
    async fn test_trigger_without_artifact_warns() {
        let (c, notifier) = controller(ScriptedEngine::replying("[]"));
        let outcome = c.trigger_evaluate().await;
        assert!(matches!(outcome, TriggerOutcome::Rejected(PreconditionError::NoArtifact)));
        assert_eq!(
            notifier.notices(),
            vec![Notice::Warning("Please select a file to evaluate".into())]
        );
        assert!(!c.is_busy());
    }

    #[tokio::test]
    async fn test_failed_attempt_clears_previous_results() {
        let reply = r#"[{"criteriaId":"1","score":1,"feedback":""},{"criteriaId":"2","score":1,"feedback":""},{"criteriaId":"3","score":1,"feedback":""}]"#;
        let (c, notifier) = controller(ScriptedEngine::replying(reply).then_reply("not json"));
        c.select_artifact(artifact());

        assert!(matches!(c.trigger_evaluate().await, TriggerOutcome::Settled(_)));
        assert!(c.outcome().is_some());

        assert!(matches!(c.trigger_evaluate().await, TriggerOutcome::Failed(_)));
        assert!(c.outcome().is_none());
        assert!(!c.is_busy());

        let notices = notifier.notices();
        assert_eq!(notices[0], Notice::Success(SUCCESS_MESSAGE.into()));
        assert_eq!(
            notices[1],
            Notice::Failure("Failed to evaluate submission. Please try again.".into())
        );
    }
}
