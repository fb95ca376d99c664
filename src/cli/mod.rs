//! Command-line interface for social-forge.
//!
//! Thin wrapper over the pipeline: load (or draft) a channel spec, run the
//! generation, write the rendered posts to disk. All generation logic lives
//! in the library; the CLI only wires configuration and reporting.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use tokio::sync::mpsc;

use crate::agents::retry::RetryPolicy;
use crate::channel::ChannelSpec;
use crate::export;
use crate::llm::LiteLlmClient;
use crate::pipeline::{ChannelOrchestrator, PipelineConfig, PipelineEvent};

/// Top-level CLI arguments.
#[derive(Parser)]
#[command(
    name = "social-forge",
    version,
    about = "Synthesize a fictitious social-network dataset: personas, an interaction script, and rendered posts"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Log level when RUST_LOG is not set (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,
}

/// Available commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Generate a channel dataset.
    Generate(GenerateArgs),
}

/// Arguments for the generate command.
#[derive(Parser, Debug)]
pub struct GenerateArgs {
    /// Channel spec file (YAML or JSON).
    #[arg(long, conflicts_with = "seed")]
    pub spec: Option<PathBuf>,

    /// Draft the channel spec from a seed description instead of a file.
    #[arg(long)]
    pub seed: Option<String>,

    /// Output path for the rendered posts.
    #[arg(long, default_value = "posts.json")]
    pub output: PathBuf,

    /// Output format for the rendered posts.
    #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
    pub format: OutputFormat,

    /// Also write the full dataset (spec, cast, script, posts) to this path.
    #[arg(long)]
    pub dataset: Option<PathBuf>,

    /// Retry attempts per generation stage.
    #[arg(long)]
    pub max_attempts: Option<u32>,

    /// Revision rounds per post before the last draft is kept.
    #[arg(long)]
    pub max_revision_rounds: Option<u32>,
}

/// Output formats for the rendered posts.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// One pretty-printed JSON array.
    Json,
    /// Newline-delimited JSON, one record per line.
    Ndjson,
}

/// Parses CLI arguments from the process environment.
pub fn parse_cli() -> Cli {
    Cli::parse()
}

/// Runs the CLI with parsed arguments.
pub async fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Generate(args) => generate(args).await,
    }
}

async fn generate(args: GenerateArgs) -> anyhow::Result<()> {
    let llm_client = Arc::new(
        LiteLlmClient::from_env().context("LLM client configuration")?,
    );

    let mut config = PipelineConfig::new();
    if let Some(max_attempts) = args.max_attempts {
        config = config.with_retry_policy(RetryPolicy::new().with_max_attempts(max_attempts));
    }
    if let Some(rounds) = args.max_revision_rounds {
        config = config.with_max_revision_rounds(rounds);
    }

    let orchestrator = ChannelOrchestrator::new(llm_client, config);

    let spec = match (&args.spec, &args.seed) {
        (Some(path), _) => ChannelSpec::from_file(path)
            .with_context(|| format!("loading channel spec from {}", path.display()))?,
        (None, Some(seed)) => {
            tracing::info!(seed = %seed, "Drafting channel spec from seed");
            orchestrator
                .synthesizer()
                .draft_spec(seed)
                .await
                .context("drafting channel spec")?
        }
        (None, None) => {
            anyhow::bail!("either --spec <file> or --seed <description> is required");
        }
    };

    let (event_tx, event_rx) = mpsc::channel(100);
    let reporter = tokio::spawn(report_events(event_rx));

    let dataset = orchestrator.run(&spec, event_tx).await?;
    reporter.await.ok();

    match args.format {
        OutputFormat::Json => export::write_posts_json(&dataset.posts, &args.output)?,
        OutputFormat::Ndjson => export::write_posts_ndjson(&dataset.posts, &args.output)?,
    }

    if let Some(dataset_path) = &args.dataset {
        export::write_dataset_json(&dataset, dataset_path)?;
    }

    tracing::info!(
        posts = dataset.posts.len(),
        output = %args.output.display(),
        "Generation finished"
    );
    Ok(())
}

/// Logs pipeline events as they arrive.
async fn report_events(mut event_rx: mpsc::Receiver<PipelineEvent>) {
    while let Some(event) = event_rx.recv().await {
        match event {
            PipelineEvent::StageStarted { stage, .. } => {
                tracing::info!(%stage, "Stage started");
            }
            PipelineEvent::ProfilesSynthesized { count, .. } => {
                tracing::info!(count, "Persona cast ready");
            }
            PipelineEvent::ScriptPlanned { count, .. } => {
                tracing::info!(count, "Script ready");
            }
            PipelineEvent::PostRendered {
                index,
                username,
                revision,
                ..
            } => {
                tracing::info!(index, %username, rounds = revision.rounds(), "Post rendered");
            }
            PipelineEvent::PipelineComplete {
                run_id,
                post_count,
                total_duration_ms,
            } => {
                tracing::info!(%run_id, post_count, total_duration_ms, "Pipeline complete");
            }
            PipelineEvent::PipelineFailed { error, stage, .. } => {
                tracing::error!(%stage, error = %error, "Pipeline failed");
            }
        }
    }
}
