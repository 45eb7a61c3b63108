//! Persisted suppression state: dedupe and flapping records.

use std::collections::BTreeMap;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::{engine::window::SlidingWindow, models::event::EventStatus};

/// Current on-disk layout version of [`SuppressionState`].
pub const STATE_VERSION: u32 = 1;

/// State kept for one dedupe key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DedupeRecord {
    /// The derived dedupe key.
    pub dedupe_key: String,
    /// First occurrence since the record was (re)created.
    pub first_seen_at: DateTime<Utc>,
    /// Latest occurrence; never moves backwards.
    pub last_seen_at: DateTime<Utc>,
    /// Events before this instant are suppressed as duplicates.
    pub cooldown_until: DateTime<Utc>,
    /// Occurrences since the record was (re)created, suppressed ones included.
    pub occurrence_count: u64,
}

impl DedupeRecord {
    /// A fresh record for a first occurrence at `now`.
    pub fn new(dedupe_key: &str, now: DateTime<Utc>) -> Self {
        Self {
            dedupe_key: dedupe_key.to_string(),
            first_seen_at: now,
            last_seen_at: now,
            cooldown_until: now,
            occurrence_count: 0,
        }
    }
}

/// State kept for one flapping key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlappingRecord {
    /// The derived flapping key.
    pub key: String,
    /// Status transitions inside the flap window, oldest first.
    pub transition_history: SlidingWindow,
    /// Whether the key is currently muted.
    pub muted: bool,
    /// End of the current mute.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mute_until: Option<DateTime<Utc>>,
    /// Status of the last kept candidate on this key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_status: Option<EventStatus>,
    /// When `last_status` was observed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_seen_at: Option<DateTime<Utc>>,
}

impl FlappingRecord {
    /// A record with no history for `key`.
    pub fn new(key: &str) -> Self {
        Self { key: key.to_string(), ..Default::default() }
    }

    /// A record with no transitions, no mute and a status baseline older
    /// than `window` carries nothing worth persisting.
    pub fn is_idle(&self, as_of: DateTime<Utc>, window: TimeDelta) -> bool {
        self.transition_history.is_empty()
            && !self.muted
            && self.last_seen_at.is_none_or(|seen| as_of.signed_duration_since(seen) >= window)
    }
}

/// Everything the suppression engine persists between runs.
///
/// Maps are ordered so the serialized file is stable and diffable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuppressionState {
    /// Layout version.
    pub version: u32,
    /// The `as_of` time of the run that produced this state.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    /// Dedupe records by dedupe key.
    #[serde(default)]
    pub dedupe: BTreeMap<String, DedupeRecord>,
    /// Flapping records by flapping key.
    #[serde(default)]
    pub flapping: BTreeMap<String, FlappingRecord>,
}

impl Default for SuppressionState {
    fn default() -> Self {
        Self {
            version: STATE_VERSION,
            updated_at: None,
            dedupe: BTreeMap::new(),
            flapping: BTreeMap::new(),
        }
    }
}
