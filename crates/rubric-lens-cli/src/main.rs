//! Rubric Lens - grade a submission against a rubric
//!
//! The `rubric-lens` command scores an image or document with a generative
//! evaluation engine and prints a per-criterion result card.
//!
//! ## Commands
//!
//! - `evaluate`: Run one evaluation and print the results
//! - `rubric`: Create, convert and inspect rubric files
//! - `inspect`: Show how an artifact would be encoded, without calling the engine

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn, Level};

use rubric_lens_core::{
    encode_artifact, load_rubric, render_report_md, save_rubric, snapshot_artifact,
    write_report_json, write_report_md, ArtifactInfo, AttemptError,
    EvaluationClient, EvaluationController, EvaluationEngine, EvaluationPipeline,
    EvaluationReport, FileArtifact, GeminiEngine, LensConfig, LogFormat, MissingCriterionPolicy,
    Rubric, TracingNotifier, TriggerOutcome, ACCEPTED_MEDIA_TYPES, METRICS,
};

#[derive(Parser)]
#[command(name = "rubric-lens")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Grade a submission against a rubric", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate a submission against a rubric
    Evaluate {
        /// Artifact to grade (image or document)
        #[arg(short, long)]
        file: PathBuf,

        /// Declared MIME type (guessed from the extension if omitted)
        #[arg(long)]
        media_type: Option<String>,

        /// Rubric file (.json keeps ids and max scores, .txt is one criterion per line)
        #[arg(short, long)]
        rubric: Option<PathBuf>,

        /// Inline criterion, repeatable; overrides --rubric
        #[arg(short, long = "criterion")]
        criteria: Vec<String>,

        /// What to do when the engine skips a criterion: reject | placeholder
        #[arg(long, env = "RUBRIC_LENS_MISSING_POLICY")]
        missing_policy: Option<MissingCriterionPolicy>,

        /// Write the JSON report here
        #[arg(long)]
        report_json: Option<PathBuf>,

        /// Write the Markdown result card here
        #[arg(long)]
        report_md: Option<PathBuf>,
    },

    /// Manage rubric files
    Rubric {
        #[command(subcommand)]
        action: RubricAction,
    },

    /// Show how an artifact is classified and encoded
    Inspect {
        /// Artifact to inspect
        #[arg(short, long)]
        file: PathBuf,

        /// Declared MIME type (guessed from the extension if omitted)
        #[arg(long)]
        media_type: Option<String>,
    },
}

#[derive(Subcommand)]
enum RubricAction {
    /// Write the starter rubric
    Init {
        /// Output path
        #[arg(short, long, default_value = "rubric.json")]
        output: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Convert a text rubric (one criterion per line) to JSON
    FromText {
        /// Text file to read
        input: PathBuf,

        /// JSON file to write
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Print the text form of a rubric
    ToText {
        /// Rubric file to read
        input: PathBuf,
    },

    /// List a rubric's criteria
    Show {
        /// Rubric file to read
        input: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let format = if cli.json {
        LogFormat::Json
    } else {
        LogFormat::from_env()
    };
    rubric_lens_core::init_tracing(format, level);

    match cli.command {
        Commands::Evaluate {
            file,
            media_type,
            rubric,
            criteria,
            missing_policy,
            report_json,
            report_md,
        } => {
            let opts = EvaluateOpts {
                file,
                media_type,
                rubric,
                criteria,
                report_json,
                report_md,
            };
            let mut config = LensConfig::from_env();
            if let Some(policy) = missing_policy {
                config = config.with_missing_policy(policy);
            }
            let result = cmd_evaluate(&opts, &config).await;
            METRICS.flush();
            result
        }
        Commands::Rubric { action } => match action {
            RubricAction::Init { output, force } => cmd_rubric_init(&output, force),
            RubricAction::FromText { input, output } => cmd_rubric_from_text(&input, &output),
            RubricAction::ToText { input } => cmd_rubric_to_text(&input),
            RubricAction::Show { input } => cmd_rubric_show(&input),
        },
        Commands::Inspect { file, media_type } => cmd_inspect(&file, media_type.as_deref()).await,
    }
}

// ---------------------------------------------------------------------------
// evaluate
// ---------------------------------------------------------------------------

struct EvaluateOpts {
    file: PathBuf,
    media_type: Option<String>,
    rubric: Option<PathBuf>,
    criteria: Vec<String>,
    report_json: Option<PathBuf>,
    report_md: Option<PathBuf>,
}

fn artifact_for(file: &Path, media_type: Option<&str>) -> FileArtifact {
    match media_type {
        Some(mt) => FileArtifact::with_media_type(file, mt),
        None => FileArtifact::new(file),
    }
}

/// Inline criteria win over a rubric file; neither means the starter rubric.
fn resolve_rubric(path: Option<&Path>, criteria: &[String]) -> Result<Rubric> {
    if !criteria.is_empty() {
        return Ok(Rubric::from_text_lossy(&criteria.join("\n")));
    }
    match path {
        Some(p) => load_rubric(p).with_context(|| format!("Failed to load rubric {:?}", p)),
        None => Ok(Rubric::default()),
    }
}

/// Evaluate with the configured HTTP engine and print the result card
async fn cmd_evaluate(opts: &EvaluateOpts, config: &LensConfig) -> Result<()> {
    let engine =
        GeminiEngine::new(&config.engine).context("Failed to configure evaluation engine")?;
    let report = run_evaluation(engine, config, opts).await?;
    print!("{}", render_report_md(&report));
    Ok(())
}

async fn run_evaluation<E: EvaluationEngine>(
    engine: E,
    config: &LensConfig,
    opts: &EvaluateOpts,
) -> Result<EvaluationReport> {
    let rubric = resolve_rubric(opts.rubric.as_deref(), &opts.criteria)?;

    // Read once: the report digest describes exactly the bytes that were graded.
    let source = artifact_for(&opts.file, opts.media_type.as_deref());
    let submission = snapshot_artifact(&source)
        .await
        .map_err(|e| attempt_failure(e.into()))?;
    let info = ArtifactInfo::from_submission(&submission);

    if !ACCEPTED_MEDIA_TYPES.contains(&info.media_type.as_str()) {
        warn!(
            media_type = %info.media_type,
            "media type is outside the accepted upload set; encoding it anyway"
        );
    }

    let pipeline = EvaluationPipeline::new(
        EvaluationClient::new(engine, config.retry.clone()),
        config.missing_policy,
    );
    let engine_name = pipeline.engine_name().to_string();
    let controller = EvaluationController::new(pipeline, rubric, Arc::new(TracingNotifier));
    controller.select_artifact(Arc::new(submission));

    let outcome = match controller.trigger_evaluate().await {
        TriggerOutcome::Settled(outcome) => outcome,
        TriggerOutcome::Rejected(precondition) => bail!("{}", precondition),
        TriggerOutcome::Failed(err) => return Err(attempt_failure(err)),
        TriggerOutcome::Ignored => bail!("an evaluation is already in progress"),
    };

    let report = EvaluationReport::new(&outcome, info, &engine_name);

    if let Some(path) = &opts.report_json {
        write_report_json(path, &report)?;
        info!(path = %path.display(), "wrote JSON report");
    }
    if let Some(path) = &opts.report_md {
        write_report_md(path, &report)?;
        info!(path = %path.display(), "wrote Markdown report");
    }

    Ok(report)
}

/// User-facing message on top, root cause kept in the chain.
fn attempt_failure(err: AttemptError) -> anyhow::Error {
    let message = err.user_message();
    anyhow::Error::new(err).context(message)
}

// ---------------------------------------------------------------------------
// rubric
// ---------------------------------------------------------------------------

/// Write the starter rubric
fn cmd_rubric_init(output: &Path, force: bool) -> Result<()> {
    if output.exists() && !force {
        bail!("{:?} already exists (use --force to overwrite)", output);
    }
    save_rubric(output, &Rubric::default())
        .with_context(|| format!("Failed to write rubric {:?}", output))?;
    println!("Wrote starter rubric to {}", output.display());
    Ok(())
}

/// Lossy text → JSON conversion
fn cmd_rubric_from_text(input: &Path, output: &Path) -> Result<()> {
    let text =
        std::fs::read_to_string(input).with_context(|| format!("Failed to read {:?}", input))?;
    let rubric = Rubric::from_text_lossy(&text);
    if rubric.is_empty() {
        bail!("{:?} contains no criteria", input);
    }

    eprintln!("Note: text conversion assigns new ids and resets every max score to 10.");
    save_rubric(output, &rubric).with_context(|| format!("Failed to write rubric {:?}", output))?;
    println!("Wrote {} criteria to {}", rubric.len(), output.display());
    Ok(())
}

fn cmd_rubric_to_text(input: &Path) -> Result<()> {
    let rubric = load_rubric(input).with_context(|| format!("Failed to load rubric {:?}", input))?;
    println!("{}", rubric.to_text());
    Ok(())
}

fn cmd_rubric_show(input: &Path) -> Result<()> {
    let rubric = load_rubric(input).with_context(|| format!("Failed to load rubric {:?}", input))?;
    print!("{}", render_rubric(&rubric));
    Ok(())
}

fn render_rubric(rubric: &Rubric) -> String {
    let mut out = String::new();
    for (i, c) in rubric.criteria().iter().enumerate() {
        out.push_str(&format!(
            "{}. [{}] {} (max {})\n",
            i + 1,
            c.id,
            c.criteria,
            c.max_score
        ));
    }
    out.push_str(&format!("Max possible score: {}\n", rubric.max_possible_score()));
    out
}

// ---------------------------------------------------------------------------
// inspect
// ---------------------------------------------------------------------------

/// Describe an artifact without calling the engine
async fn cmd_inspect(file: &Path, media_type: Option<&str>) -> Result<()> {
    let submission = snapshot_artifact(&artifact_for(file, media_type))
        .await
        .with_context(|| format!("Failed to read {:?}", file))?;
    let info = ArtifactInfo::from_submission(&submission);
    let encoded = encode_artifact(&submission)
        .await
        .with_context(|| format!("Failed to encode {:?}", file))?;

    println!("Name:       {}", info.name);
    println!("Media type: {}", info.media_type);
    println!("Kind:       {}", info.media_kind.as_str());
    println!("Size:       {} bytes", info.size_bytes);
    println!("SHA-256:    {}", info.sha256);
    println!("Encoded:    {} bytes", encoded.len());
    println!(
        "Accepted:   {}",
        if ACCEPTED_MEDIA_TYPES.contains(&info.media_type.as_str()) {
            "yes"
        } else {
            "no (will still be encoded)"
        }
    );
    Ok(())
}
