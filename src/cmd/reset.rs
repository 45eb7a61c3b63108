//! The `reset-state` command.

use clap::Parser;

use crate::{
    config::{AppConfig, ConfigurationError},
    engine::pipeline::PipelineError,
    persistence::{JsonFileStateStore, traits::StateStore},
};

/// Arguments for resetting the suppression state.
#[derive(Parser, Debug)]
pub struct ResetArgs {
    /// Directory holding app.yaml.
    #[arg(short, long, default_value = "configs")]
    pub config_dir: String,
}

/// Deletes the persisted suppression state. The feed is left untouched.
pub async fn execute(args: ResetArgs) -> Result<(), PipelineError> {
    let config = AppConfig::new(Some(args.config_dir.as_str())).map_err(ConfigurationError::from)?;
    let store = JsonFileStateStore::new(&config.state_path);
    store.reset().await?;
    tracing::warn!(state_path = %store.path().display(), "Suppression state reset.");
    Ok(())
}
