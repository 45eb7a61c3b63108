//! The normalized, portal-facing alert record.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::event::{Event, EventStatus, Severity};

/// One entry of the alert feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertFeedItem {
    /// Idempotency key of the source event; unique within the feed.
    pub event_key: String,
    /// Dedupe key the alert was kept under.
    pub dedupe_key: String,
    /// Event topic.
    pub topic: String,
    /// Asset the alert concerns.
    pub asset_id: String,
    /// Severity on a 1-5 scale.
    pub severity: Severity,
    /// Rule that produced the event.
    pub rule_code: String,
    /// When the event occurred.
    pub occurred_at: DateTime<Utc>,
    /// Active or resolved.
    pub status: EventStatus,
    /// First occurrence of the dedupe key.
    pub first_seen_at: DateTime<Utc>,
    /// Occurrences of the dedupe key when the alert was kept.
    pub occurrence_count: u64,
    /// Display title.
    pub title: String,
    /// Subscriptions the event matched, sorted.
    pub subscription_ids: BTreeSet<String>,
    /// The event payload, passed through untouched.
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl AlertFeedItem {
    /// Normalizes a kept event.
    pub fn from_kept(
        event: &Event,
        dedupe_key: &str,
        first_seen_at: DateTime<Utc>,
        occurrence_count: u64,
        subscription_ids: &BTreeSet<String>,
    ) -> Self {
        Self {
            event_key: event.event_key.clone(),
            dedupe_key: dedupe_key.to_string(),
            topic: event.topic.clone(),
            asset_id: event.asset_id.clone(),
            severity: event.severity,
            rule_code: event.rule_code.clone(),
            occurred_at: event.occurred_at,
            status: event.status,
            first_seen_at,
            occurrence_count,
            title: title_for(event),
            subscription_ids: subscription_ids.clone(),
            payload: event.payload.clone(),
        }
    }

    /// The rule type: the `rule_code` segment before the first `.`.
    pub fn rule_type(&self) -> &str {
        self.rule_code.split('.').next().unwrap_or(&self.rule_code)
    }

    /// Feed ordering key: `(occurred_at, event_key)`.
    pub fn order_key(&self) -> (DateTime<Utc>, &str) {
        (self.occurred_at, self.event_key.as_str())
    }
}

fn title_for(event: &Event) -> String {
    let resolved = match event.status {
        EventStatus::Active => "",
        EventStatus::Resolved => " (resolved)",
    };
    format!(
        "[{}] {} / {} @ {}{}",
        event.severity.label().to_uppercase(),
        event.topic,
        event.rule_code,
        event.asset_id,
        resolved
    )
}
