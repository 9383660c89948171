//! End-to-end attempts through the controller and pipeline with a scripted engine.

use std::sync::Arc;
use std::time::Duration;

use rubric_lens_core::{
    ArtifactSource, AttemptError, AttemptPhase, EngineError, EvaluationClient,
    EvaluationController, EvaluationPipeline, MaxScore, MissingCriterionPolicy, Notice,
    PreconditionError, RecordingNotifier, RetryPolicy, Rubric, RubricCriterion, ScriptedEngine,
    Submission, TriggerOutcome, ValidationError,
};

fn clarity_accuracy() -> Rubric {
    Rubric::from_criteria(vec![
        RubricCriterion::new("1", "Clarity", MaxScore::default()),
        RubricCriterion::new("2", "Accuracy", MaxScore::default()),
    ])
    .unwrap()
}

fn png() -> Arc<dyn ArtifactSource> {
    Arc::new(Submission::new(
        "diagram.png",
        "image/png",
        vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A],
    ))
}

fn controller(
    engine: ScriptedEngine,
    rubric: Rubric,
    policy: MissingCriterionPolicy,
) -> (EvaluationController<ScriptedEngine>, Arc<RecordingNotifier>) {
    let notifier = Arc::new(RecordingNotifier::new());
    let pipeline = EvaluationPipeline::new(
        EvaluationClient::new(engine, RetryPolicy::no_retry()),
        policy,
    );
    (
        EvaluationController::new(pipeline, rubric, notifier.clone()),
        notifier,
    )
}

const FULL_DEFAULT_REPLY: &str = r#"[
    {"criteriaId":"1","score":7,"feedback":"tidy"},
    {"criteriaId":"2","score":9,"feedback":"correct"},
    {"criteriaId":"3","score":8,"feedback":"mostly complete"}
]"#;

#[tokio::test]
async fn reference_example_scores_18_of_20() {
    let engine = ScriptedEngine::replying(
        r#"[{"criteriaId":"1","score":8,"feedback":"Clear"},{"criteriaId":"2","score":10,"feedback":"Accurate"}]"#,
    );
    let (c, notifier) = controller(engine, clarity_accuracy(), MissingCriterionPolicy::Reject);
    c.select_artifact(png());

    let outcome = match c.trigger_evaluate().await {
        TriggerOutcome::Settled(outcome) => outcome,
        other => panic!("expected Settled, got {:?}", other),
    };

    assert_eq!(outcome.summary.total_score, 18.0);
    assert_eq!(outcome.summary.max_possible_score, 20);
    assert_eq!(outcome.summary.percentage, 90);
    assert_eq!(outcome.results[0].feedback, "Clear");
    assert_eq!(c.outcome(), Some(outcome));
    assert_eq!(
        notifier.notices(),
        vec![Notice::Success("Evaluation completed successfully".into())]
    );

    // The engine saw the raster artifact and the complete rubric.
    let requests = c.pipeline().client().engine().requests();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].artifact.as_str().starts_with("data:image/png;base64,"));
    assert_eq!(requests[0].rubric, clarity_accuracy());
}

#[tokio::test]
async fn results_are_a_bijection_onto_rubric_ids() {
    let replies = [
        FULL_DEFAULT_REPLY,
        // shuffled, extraneous id, duplicate, out-of-range scores, one missing
        r#"[
            {"criteriaId":"3","score":99,"feedback":""},
            {"criteriaId":"ghost","score":5,"feedback":""},
            {"criteriaId":"1","score":-4,"feedback":""},
            {"criteriaId":"1","score":6,"feedback":"late duplicate"}
        ]"#,
        "[]",
    ];

    for reply in replies {
        let rubric = Rubric::default();
        let (c, _) = controller(
            ScriptedEngine::replying(reply),
            rubric.clone(),
            MissingCriterionPolicy::ZeroPlaceholder,
        );
        c.select_artifact(png());

        let outcome = match c.trigger_evaluate().await {
            TriggerOutcome::Settled(outcome) => outcome,
            other => panic!("reply {:?} did not settle: {:?}", reply, other),
        };

        let ids: Vec<_> = outcome.results.iter().map(|r| r.criteria_id.clone()).collect();
        let expected: Vec<_> = rubric.criteria().iter().map(|c| c.id.clone()).collect();
        assert_eq!(ids, expected);

        for (criterion, result) in outcome.rows() {
            assert!(result.score >= 0.0);
            assert!(result.score <= f64::from(criterion.max_score.get()));
        }
        assert!(outcome.summary.total_score >= 0.0);
        assert!(outcome.summary.total_score <= f64::from(outcome.summary.max_possible_score));
        assert!(outcome.summary.percentage <= 100);
    }
}

#[tokio::test]
async fn missing_criterion_fails_atomically_under_reject() {
    let engine = ScriptedEngine::replying(FULL_DEFAULT_REPLY).then_reply(
        r#"[{"criteriaId":"1","score":7,"feedback":""},{"criteriaId":"2","score":9,"feedback":""}]"#,
    );
    let (c, notifier) = controller(engine, Rubric::default(), MissingCriterionPolicy::Reject);
    c.select_artifact(png());

    assert!(matches!(c.trigger_evaluate().await, TriggerOutcome::Settled(_)));

    match c.trigger_evaluate().await {
        TriggerOutcome::Failed(AttemptError::Validation(ValidationError::MissingCriteria(ids))) => {
            assert_eq!(ids.len(), 1);
            assert_eq!(ids[0].as_str(), "3");
        }
        other => panic!("expected missing-criteria failure, got {:?}", other),
    }

    // No partial results and no stale ones either.
    assert!(c.outcome().is_none());
    assert_eq!(*c.subscribe_phase().borrow(), AttemptPhase::Failed);
    assert_eq!(
        notifier.notices().last(),
        Some(&Notice::Failure(
            "Failed to evaluate submission. Please try again.".into()
        ))
    );
}

#[tokio::test]
async fn engine_failure_surfaces_once() {
    let engine = ScriptedEngine::failing(EngineError::Quota("exhausted".into()));
    let (c, _) = controller(engine, Rubric::default(), MissingCriterionPolicy::Reject);
    c.select_artifact(png());

    match c.trigger_evaluate().await {
        TriggerOutcome::Failed(err) => {
            assert!(err.is_fatal());
            assert!(matches!(err, AttemptError::Engine(EngineError::Quota(_))));
        }
        other => panic!("expected Failed, got {:?}", other),
    }
    assert_eq!(c.pipeline().client().engine().calls(), 1);
}

#[tokio::test]
async fn empty_rubric_blocks_before_the_engine() {
    let engine = ScriptedEngine::replying("[]");
    let (c, notifier) = controller(engine, Rubric::empty(), MissingCriterionPolicy::Reject);
    c.select_artifact(png());

    assert!(matches!(
        c.trigger_evaluate().await,
        TriggerOutcome::Rejected(PreconditionError::EmptyRubric)
    ));
    assert_eq!(c.pipeline().client().engine().calls(), 0);
    assert_eq!(*c.subscribe_phase().borrow(), AttemptPhase::Idle);
    assert_eq!(
        notifier.notices(),
        vec![Notice::Warning("Please add at least one rubric criteria".into())]
    );
}

#[tokio::test]
async fn second_trigger_while_busy_is_ignored() {
    let engine = ScriptedEngine::replying(FULL_DEFAULT_REPLY).with_delay(Duration::from_millis(50));
    let (c, _) = controller(engine, Rubric::default(), MissingCriterionPolicy::Reject);
    c.select_artifact(png());

    let (first, second) = tokio::join!(c.trigger_evaluate(), c.trigger_evaluate());

    assert!(matches!(first, TriggerOutcome::Settled(_)));
    assert!(matches!(second, TriggerOutcome::Ignored));
    assert_eq!(c.pipeline().client().engine().calls(), 1);
    assert!(!c.is_busy());
}

#[tokio::test]
async fn rubric_edits_during_flight_do_not_reach_the_request() {
    let engine = ScriptedEngine::replying(FULL_DEFAULT_REPLY).with_delay(Duration::from_millis(50));
    let (c, _) = controller(engine, Rubric::default(), MissingCriterionPolicy::Reject);
    c.select_artifact(png());

    let edit = async {
        tokio::time::sleep(Duration::from_millis(10)).await;
        c.edit_rubric(|r| {
            r.add();
        });
    };
    let (outcome, _) = tokio::join!(c.trigger_evaluate(), edit);

    let outcome = match outcome {
        TriggerOutcome::Settled(outcome) => outcome,
        other => panic!("expected Settled, got {:?}", other),
    };
    assert_eq!(outcome.rubric.len(), 3);
    assert_eq!(c.pipeline().client().engine().requests()[0].rubric.len(), 3);
    assert_eq!(c.state().rubric.len(), 4);
}

#[tokio::test]
async fn selecting_a_new_artifact_clears_results() {
    let (c, _) = controller(
        ScriptedEngine::replying(FULL_DEFAULT_REPLY),
        Rubric::default(),
        MissingCriterionPolicy::Reject,
    );
    c.select_artifact(png());
    assert!(matches!(c.trigger_evaluate().await, TriggerOutcome::Settled(_)));
    assert!(c.outcome().is_some());

    c.select_artifact(Arc::new(Submission::new(
        "notes.md",
        "text/markdown",
        b"# Notes".to_vec(),
    )));
    assert!(c.outcome().is_none());
}

#[tokio::test]
async fn phase_channel_ends_settled() {
    let (c, _) = controller(
        ScriptedEngine::replying(FULL_DEFAULT_REPLY),
        Rubric::default(),
        MissingCriterionPolicy::Reject,
    );
    let mut phases = c.subscribe_phase();
    c.select_artifact(png());

    assert!(matches!(c.trigger_evaluate().await, TriggerOutcome::Settled(_)));
    assert!(phases.has_changed().unwrap());
    assert_eq!(*phases.borrow_and_update(), AttemptPhase::Settled);
}
