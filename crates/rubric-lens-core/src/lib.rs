//! Rubric Lens Core Library
//!
//! Grades one artifact (image or document) against an ordered rubric through
//! an external evaluation engine: encode, request, validate, aggregate.

pub mod aggregate;
pub mod client;
pub mod config;
pub mod domain;
pub mod encoder;
pub mod engine;
pub mod metrics;
pub mod obs;
pub mod pipeline;
pub mod reporting;
pub mod rubric_file;
pub mod session;
pub mod telemetry;
pub mod validator;

pub use domain::{
    guess_media_type, ArtifactSource, AttemptError, CriterionField, CriterionId,
    EvaluationOutcome, EvaluationResult, FileArtifact, MaxScore, MediaKind, PreconditionError,
    Result, Rubric, RubricCriterion, RubricError, Submission, ACCEPTED_MEDIA_TYPES,
    DEFAULT_MAX_SCORE, GENERIC_FAILURE_MESSAGE, MAX_SCORE_CEILING,
};

pub use aggregate::{aggregate, format_score, AggregateError, ScoreSummary};
pub use client::{EvaluationClient, RetryPolicy};
pub use config::{ConfigError, EngineConfig, LensConfig};
pub use encoder::{
    decode_data_uri, encode_artifact, encode_bytes, snapshot_artifact, EncodeError,
    EncodedArtifact,
};
pub use engine::{
    EngineError, EvaluationEngine, EvaluationRequest, GeminiEngine, RawReply, ScriptedEngine,
};
pub use pipeline::{AttemptPhase, EvaluationPipeline};
pub use reporting::{
    read_report_json, render_report_md, write_report_json, write_report_md, ArtifactInfo,
    EvaluationReport,
};
pub use rubric_file::{load_rubric, save_rubric, RubricFormat};
pub use session::{
    EvaluationController, Notice, Notifier, RecordingNotifier, SessionState, TracingNotifier,
    TriggerOutcome,
};
pub use validator::{validate_reply, MissingCriterionPolicy, ValidatedResults, ValidationError};

pub use metrics::METRICS;
pub use obs::AttemptSpan;
pub use telemetry::{init_tracing, LogFormat};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
