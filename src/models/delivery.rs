//! Audit records for per-channel fan-out decisions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Whether a channel received the alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryOutcome {
    /// Handed to the channel.
    Sent,
    /// Not handed to the channel; see the reason.
    Skipped,
}

/// Why a channel did not receive the alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The channel's rolling window was full.
    RateLimited,
    /// The channel filter did not match (recorded only in audit mode).
    NoMatch,
    /// The channel is disabled (recorded only in audit mode).
    Disabled,
    /// The channel stub failed to write its message.
    DeliveryFailed,
}

/// One fan-out decision for an (event, channel) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryRecord {
    /// The channel the decision concerns.
    pub channel_id: String,
    /// The alert's idempotency key.
    pub event_key: String,
    /// The alert's dedupe key.
    pub dedupe_key: String,
    /// Decision time (the event time of the alert).
    pub decided_at: DateTime<Utc>,
    /// Sent or skipped.
    pub outcome: DeliveryOutcome,
    /// Present for skipped outcomes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<SkipReason>,
}

impl DeliveryRecord {
    /// Whether the channel received the alert.
    pub fn is_sent(&self) -> bool {
        self.outcome == DeliveryOutcome::Sent
    }
}
