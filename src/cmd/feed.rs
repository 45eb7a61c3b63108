//! The `feed` command: prints the newest alerts.

use clap::Parser;

use crate::{
    config::{AppConfig, ConfigurationError},
    engine::{feed::AlertFeed, pipeline::PipelineError},
    models::feed_item::AlertFeedItem,
    persistence::{JsonFileFeedStore, traits::FeedStore},
};

/// Arguments for printing the alert feed.
#[derive(Parser, Debug)]
pub struct FeedArgs {
    /// Directory holding app.yaml.
    #[arg(short, long, default_value = "configs")]
    pub config_dir: String,

    /// Maximum number of alerts to show.
    #[arg(short, long, default_value_t = 20)]
    pub limit: usize,
}

/// Returns the newest `limit` alerts of the persisted feed, newest first.
pub async fn execute(args: FeedArgs) -> Result<Vec<AlertFeedItem>, PipelineError> {
    let config = AppConfig::new(Some(args.config_dir.as_str())).map_err(ConfigurationError::from)?;
    let feed = AlertFeed::from_items(JsonFileFeedStore::new(&config.feed_path).load().await?);
    Ok(feed.latest(args.limit).into_iter().cloned().collect())
}
