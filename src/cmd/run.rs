//! The `run` command: one pipeline run over an events file.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use clap::Parser;

use crate::{
    config::{AppConfig, ConfigurationError},
    engine::pipeline::{AlertPipeline, PipelineError, RunReport},
    source::read_events,
};

/// Arguments for a single pipeline run.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Path to the events file (JSON Lines or a JSON array).
    #[arg(short, long)]
    pub events: PathBuf,

    /// Directory holding app.yaml, subscriptions.yaml, channels.yaml and
    /// assets.yaml.
    #[arg(short, long, default_value = "configs")]
    pub config_dir: String,

    /// Reference time for pruning expired state (RFC 3339). Defaults to now.
    #[arg(long)]
    pub as_of: Option<DateTime<Utc>>,

    /// Fail the run if any event is malformed instead of skipping it.
    #[arg(long)]
    pub strict: bool,
}

/// Runs the pipeline once: load, process, commit, then write the run
/// outputs. Ctrl-C before the commit discards the run.
pub async fn execute(args: RunArgs) -> Result<RunReport, PipelineError> {
    tracing::debug!(config_dir = %args.config_dir, "Loading application configuration...");
    let config = AppConfig::new(Some(args.config_dir.as_str())).map_err(ConfigurationError::from)?;
    tracing::debug!(
        state_path = %config.state_path.display(),
        feed_path = %config.feed_path.display(),
        output_dir = %config.output_dir.display(),
        "Configuration loaded."
    );

    let pipeline = AlertPipeline::from_config(&config)?.with_strict_input(args.strict);
    let batch = read_events(&args.events).await?;
    let as_of = args.as_of.unwrap_or_else(Utc::now);

    let outcome = tokio::select! {
        outcome = pipeline.process(batch, as_of) => outcome?,
        _ = tokio::signal::ctrl_c() => {
            tracing::warn!("Interrupted before commit, discarding run.");
            return Err(PipelineError::Interrupted);
        }
    };

    let report = pipeline.commit(outcome).await?;
    report.write_outputs(&config.output_dir).await?;
    tracing::info!(output_dir = %config.output_dir.display(), "Run outputs written.");
    Ok(report)
}
