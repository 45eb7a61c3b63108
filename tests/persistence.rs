//! Integration tests for suppression state carried across runs

use std::sync::Arc;

use chrono::TimeDelta;
use esg_alerts::{
    engine::{
        filtering::FilterEngine, pipeline::AlertPipeline, router::ChannelRouter,
        suppression::SuppressionSettings,
    },
    models::event::EventStatus,
    persistence::{JsonFileFeedStore, JsonFileStateStore, traits::StateStore},
    source::EventBatch,
    test_helpers::{EventBuilder, SubscriptionBuilder, at, suppression_settings},
};
use tempfile::TempDir;

type FilePipeline = AlertPipeline<JsonFileStateStore, JsonFileFeedStore>;

fn no_cooldown() -> SuppressionSettings {
    SuppressionSettings { cooldown: TimeDelta::zero(), ..suppression_settings() }
}

fn file_pipeline(dir: &TempDir, settings: SuppressionSettings) -> FilePipeline {
    AlertPipeline::new(
        FilterEngine::new(vec![SubscriptionBuilder::new("all").build()], &[]),
        settings,
        ChannelRouter::with_transports(vec![], false).unwrap(),
        Arc::new(JsonFileStateStore::new(dir.path().join("state.json"))),
        Arc::new(JsonFileFeedStore::new(dir.path().join("feed.json"))),
    )
}

fn status_event(key: &str, secs: i64, status: EventStatus) -> esg_alerts::models::event::Event {
    EventBuilder::new(key).at(secs).status(status).build()
}

fn batch(events: Vec<esg_alerts::models::event::Event>) -> EventBatch {
    EventBatch { events, malformed: vec![] }
}

#[tokio::test]
async fn test_flapping_mute_survives_restart() {
    let dir = TempDir::new().unwrap();

    let first = file_pipeline(&dir, no_cooldown());
    let report = first
        .run_once(
            batch(vec![
                status_event("e1", 0, EventStatus::Active),
                status_event("e2", 100, EventStatus::Resolved),
                status_event("e3", 200, EventStatus::Active),
            ]),
            at(200),
        )
        .await
        .unwrap();
    assert_eq!(report.metrics.dedupe_kept, 3);
    drop(first);

    // A fresh pipeline sees only what the first one committed.
    let second = file_pipeline(&dir, no_cooldown());
    let report = second
        .run_once(
            batch(vec![
                status_event("e4", 300, EventStatus::Resolved),
                status_event("e5", 310, EventStatus::Active),
            ]),
            at(310),
        )
        .await
        .unwrap();
    assert_eq!(report.metrics.dedupe_kept, 0);
    assert_eq!(report.metrics.suppressed_flapping, 2);

    let state = JsonFileStateStore::new(dir.path().join("state.json")).load().await.unwrap();
    let record = state.flapping.values().next().unwrap();
    assert!(record.muted);
    assert_eq!(record.mute_until, Some(at(2100)));
}

#[tokio::test]
async fn test_expired_dedupe_records_are_pruned_at_run_start() {
    let dir = TempDir::new().unwrap();
    let pipeline = file_pipeline(&dir, suppression_settings());

    pipeline.run_once(batch(vec![EventBuilder::new("e1").at(0).build()]), at(0)).await.unwrap();
    let outcome = pipeline.process(batch(vec![]), at(3601)).await.unwrap();

    assert!(outcome.state().dedupe.is_empty());
}

#[tokio::test]
async fn test_cooldown_spans_runs() {
    let dir = TempDir::new().unwrap();
    let pipeline = file_pipeline(&dir, suppression_settings());

    pipeline.run_once(batch(vec![EventBuilder::new("e1").at(0).build()]), at(0)).await.unwrap();
    let report =
        pipeline.run_once(batch(vec![EventBuilder::new("e2").at(120).build()]), at(120)).await.unwrap();
    assert_eq!(report.metrics.suppressed_cooldown, 1);

    let report =
        pipeline.run_once(batch(vec![EventBuilder::new("e3").at(400).build()]), at(400)).await.unwrap();
    assert_eq!(report.metrics.dedupe_kept, 1);
    assert_eq!(report.appended[0].occurrence_count, 3);
}
