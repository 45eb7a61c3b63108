//! One pipeline run: load state and feed, filter, suppress, route, append,
//! then commit feed and state as a unit.

use std::{collections::BTreeMap, path::Path, sync::Arc};

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::{
    config::{AppConfig, ConfigurationError},
    engine::{
        feed::{AlertFeed, FeedUpsert},
        filtering::FilterEngine,
        router::ChannelRouter,
        suppression::{Decision, SuppressionEngine, SuppressionReason, SuppressionSettings},
    },
    models::{
        delivery::{DeliveryOutcome, DeliveryRecord},
        feed_item::AlertFeedItem,
        suppression_state::SuppressionState,
    },
    persistence::{
        JsonFileFeedStore, JsonFileStateStore,
        error::PersistenceError,
        json_file::write_json_atomic,
        traits::{FeedStore, StateStore},
    },
    source::{EventBatch, MalformedEvent, SourceError},
};

/// Errors that abort a run.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Configuration was invalid; nothing was processed.
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    /// The events file could not be read.
    #[error(transparent)]
    Source(#[from] SourceError),

    /// State or feed could not be loaded or committed.
    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    /// Strict input mode and at least one record was malformed.
    #[error("{count} malformed event(s) in strict mode; first: {first}")]
    MalformedInput {
        /// How many records were malformed.
        count: usize,
        /// The first of them.
        first: MalformedEvent,
    },

    /// The run was interrupted before commit; nothing was written.
    #[error("Run interrupted before commit")]
    Interrupted,
}

/// Counters for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunMetrics {
    /// Input records, valid or not.
    pub events_total: u64,
    /// Records skipped as malformed.
    pub events_malformed: u64,
    /// Valid events that matched no subscription.
    pub events_unmatched: u64,
    /// Matched events that survived suppression.
    pub dedupe_kept: u64,
    /// Matched events that were suppressed for any reason.
    pub dedupe_suppressed: u64,
    /// Suppressed by cooldown.
    pub suppressed_cooldown: u64,
    /// Suppressed by a mute or by flapping detection.
    pub suppressed_flapping: u64,
    /// Delivery records with outcome `sent`.
    pub channels_sent: u64,
    /// Delivery records with outcome `skipped`.
    pub channels_skipped: u64,
    /// Kept alerts newly added to the feed.
    pub feed_appended: u64,
    /// Kept alerts whose `event_key` was already in the feed.
    pub feed_duplicates: u64,
    /// Matches per subscription id.
    pub per_subscription: BTreeMap<String, u64>,
    /// Sent deliveries per channel id.
    pub per_channel_sent: BTreeMap<String, u64>,
    /// Skipped deliveries per channel id.
    pub per_channel_skipped: BTreeMap<String, u64>,
}

impl RunMetrics {
    fn record_suppressed(&mut self, reason: SuppressionReason) {
        self.dedupe_suppressed += 1;
        match reason {
            SuppressionReason::Cooldown => self.suppressed_cooldown += 1,
            SuppressionReason::Muted | SuppressionReason::FlappingDetected =>
                self.suppressed_flapping += 1,
        }
    }

    fn record_delivery(&mut self, record: &DeliveryRecord) {
        let (total, per_channel) = match record.outcome {
            DeliveryOutcome::Sent => (&mut self.channels_sent, &mut self.per_channel_sent),
            DeliveryOutcome::Skipped => (&mut self.channels_skipped, &mut self.per_channel_skipped),
        };
        *total += 1;
        *per_channel.entry(record.channel_id.clone()).or_insert(0) += 1;
    }
}

/// What a run decided.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    /// The run's reference time, used for pruning.
    pub as_of: DateTime<Utc>,
    /// Counters.
    pub metrics: RunMetrics,
    /// Every channel decision, in processing order.
    pub deliveries: Vec<DeliveryRecord>,
    /// Alerts appended to the feed by this run, in feed order.
    pub appended: Vec<AlertFeedItem>,
    /// Records skipped as malformed.
    #[serde(skip)]
    pub malformed: Vec<MalformedEvent>,
}

impl RunReport {
    /// Writes `deliveries.json` and `metrics.json` into `output_dir`.
    pub async fn write_outputs(&self, output_dir: &Path) -> Result<(), PersistenceError> {
        write_json_atomic(&output_dir.join("deliveries.json"), &self.deliveries).await?;
        write_json_atomic(&output_dir.join("metrics.json"), &self.metrics).await?;
        Ok(())
    }
}

/// The result of processing a batch, not yet persisted.
///
/// Holds the pipeline's run lock until it is committed or dropped. Dropping it
/// discards the run.
pub struct RunOutcome {
    /// What the run decided.
    pub report: RunReport,
    state: SuppressionState,
    feed: AlertFeed,
    _run_guard: OwnedMutexGuard<()>,
}

impl RunOutcome {
    /// The state that `commit` would persist.
    pub fn state(&self) -> &SuppressionState {
        &self.state
    }

    /// The feed that `commit` would persist.
    pub fn feed(&self) -> &AlertFeed {
        &self.feed
    }
}

/// The alert processing pipeline.
pub struct AlertPipeline<S: StateStore, F: FeedStore> {
    filter: FilterEngine,
    settings: SuppressionSettings,
    router: ChannelRouter,
    state_store: Arc<S>,
    feed_store: Arc<F>,
    strict_input: bool,
    run_lock: Arc<Mutex<()>>,
}

impl AlertPipeline<JsonFileStateStore, JsonFileFeedStore> {
    /// Builds a pipeline with JSON file stores from application configuration,
    /// rejecting invalid suppression parameters before loading anything else.
    pub fn from_config(config: &AppConfig) -> Result<Self, PipelineError> {
        let settings = config.suppression_settings()?;
        let subscriptions = config.load_subscriptions()?;
        let channels = config.load_channels()?;
        let assets = config.load_assets()?;
        tracing::info!(
            subscriptions = subscriptions.len(),
            channels = channels.len(),
            assets = assets.len(),
            "Pipeline configuration loaded."
        );

        let filter = FilterEngine::new(subscriptions, &assets);
        let router = ChannelRouter::new(
            channels,
            config.outbox_dir.as_deref(),
            config.routing.audit_skipped_channels,
        )?;

        Ok(Self::new(
            filter,
            settings,
            router,
            Arc::new(JsonFileStateStore::new(&config.state_path)),
            Arc::new(JsonFileFeedStore::new(&config.feed_path)),
        ))
    }
}

impl<S: StateStore, F: FeedStore> AlertPipeline<S, F> {
    /// Creates a new pipeline.
    pub fn new(
        filter: FilterEngine,
        settings: SuppressionSettings,
        router: ChannelRouter,
        state_store: Arc<S>,
        feed_store: Arc<F>,
    ) -> Self {
        Self {
            filter,
            settings,
            router,
            state_store,
            feed_store,
            strict_input: false,
            run_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Fails runs whose batch contains malformed records.
    pub fn with_strict_input(mut self, strict: bool) -> Self {
        self.strict_input = strict;
        self
    }

    /// Processes `batch` against the persisted state without writing
    /// anything. Runs are serialized: a second call waits until the previous
    /// outcome is committed or dropped.
    pub async fn process(
        &self,
        mut batch: EventBatch,
        as_of: DateTime<Utc>,
    ) -> Result<RunOutcome, PipelineError> {
        if self.strict_input {
            if let Some(first) = batch.malformed.first() {
                return Err(PipelineError::MalformedInput {
                    count: batch.malformed.len(),
                    first: first.clone(),
                });
            }
        }

        let run_guard = Arc::clone(&self.run_lock).lock_owned().await;
        tracing::info!(%as_of, events = batch.events.len(), "Starting pipeline run.");

        let state = self.state_store.load().await?;
        let mut feed = AlertFeed::from_items(self.feed_store.load().await?);

        let mut engine = SuppressionEngine::new(self.settings.clone(), state);
        engine.prune_expired(as_of);

        let mut metrics = RunMetrics {
            events_total: batch.total() as u64,
            events_malformed: batch.malformed.len() as u64,
            per_subscription: self
                .filter
                .subscriptions()
                .iter()
                .map(|sub| (sub.id.clone(), 0))
                .collect(),
            ..Default::default()
        };
        let mut deliveries = Vec::new();
        let mut appended = Vec::new();

        batch.events.sort_by(|a, b| a.order_key().cmp(&b.order_key()));
        for event in &batch.events {
            let matched = self.filter.match_event(event);
            if !matched.matched {
                tracing::debug!(event_key = %event.event_key, "Event matched no subscription.");
                metrics.events_unmatched += 1;
                continue;
            }
            for id in &matched.matching_subscription_ids {
                *metrics.per_subscription.entry(id.clone()).or_insert(0) += 1;
            }

            let outcome = engine.evaluate(event, &matched.matching_subscription_ids);
            if let Decision::Suppressed(reason) = outcome.decision {
                metrics.record_suppressed(reason);
                continue;
            }
            metrics.dedupe_kept += 1;

            let item = AlertFeedItem::from_kept(
                event,
                &outcome.dedupe_key,
                outcome.first_seen_at,
                outcome.occurrence_count,
                &matched.matching_subscription_ids,
            );
            if feed.contains(&item.event_key) {
                tracing::debug!(event_key = %item.event_key, "Alert already in feed, not routed again.");
                metrics.feed_duplicates += 1;
                continue;
            }

            for record in self.router.route(&item).await {
                metrics.record_delivery(&record);
                deliveries.push(record);
            }
            if feed.upsert(item.clone()) == FeedUpsert::Appended {
                metrics.feed_appended += 1;
                appended.push(item);
            }
        }

        let mut state = engine.into_state();
        state.updated_at = Some(as_of);

        tracing::info!(
            events_total = metrics.events_total,
            events_malformed = metrics.events_malformed,
            events_unmatched = metrics.events_unmatched,
            dedupe_kept = metrics.dedupe_kept,
            dedupe_suppressed = metrics.dedupe_suppressed,
            channels_sent = metrics.channels_sent,
            channels_skipped = metrics.channels_skipped,
            feed_appended = metrics.feed_appended,
            "Pipeline run processed."
        );

        Ok(RunOutcome {
            report: RunReport {
                as_of,
                metrics,
                deliveries,
                appended,
                malformed: batch.malformed,
            },
            state,
            feed,
            _run_guard: run_guard,
        })
    }

    /// Persists the outcome: the feed first, then the suppression state.
    pub async fn commit(&self, outcome: RunOutcome) -> Result<RunReport, PipelineError> {
        let RunOutcome { report, state, feed, _run_guard } = outcome;

        if let Err(e) = self.feed_store.save(feed.items()).await {
            tracing::error!(error = %e, "Failed to save alert feed.");
            return Err(e.into());
        }
        if let Err(e) = self.state_store.commit(&state).await {
            tracing::error!(error = %e, "Failed to commit suppression state.");
            return Err(e.into());
        }

        tracing::info!(feed_items = feed.len(), "Pipeline run committed.");
        Ok(report)
    }

    /// Processes and commits in one step.
    pub async fn run_once(
        &self,
        batch: EventBatch,
        as_of: DateTime<Utc>,
    ) -> Result<RunReport, PipelineError> {
        let outcome = self.process(batch, as_of).await?;
        self.commit(outcome).await
    }
}
