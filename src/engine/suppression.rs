//! The suppression engine: stateful dedupe with cooldowns followed by
//! flapping detection.
//!
//! Decisions are made in event time (`occurred_at`), so replaying the same
//! ordered batch against the same state reproduces the same outcome.

use std::{collections::BTreeSet, fmt};

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    config::{ConfigurationError, DedupeConfig, FlappingConfig, checked_time_delta},
    models::{
        event::Event,
        key_field::{KeyField, derive_key},
        suppression_state::{DedupeRecord, FlappingRecord, SuppressionState},
    },
};

/// Flapping parameters in engine units.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlappingSettings {
    /// Transitions older than this are forgotten.
    pub window: TimeDelta,
    /// Transitions inside the window that mute the key.
    pub threshold: usize,
    /// How long a flapping key stays muted.
    pub mute: TimeDelta,
    /// Fields the flapping key is built from.
    pub key_fields: Vec<KeyField>,
}

/// Suppression parameters in engine units.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuppressionSettings {
    /// Idle time after which a dedupe record is treated as fresh.
    pub ttl: TimeDelta,
    /// Minimum spacing between two kept alerts on one dedupe key.
    pub cooldown: TimeDelta,
    /// Fields the dedupe key is built from.
    pub dedupe_key_fields: Vec<KeyField>,
    /// `None` when flapping detection is disabled.
    pub flapping: Option<FlappingSettings>,
}

impl SuppressionSettings {
    /// Validates configuration and converts it into engine settings.
    pub fn from_config(
        dedupe: &DedupeConfig,
        flapping: &FlappingConfig,
    ) -> Result<Self, ConfigurationError> {
        if dedupe.key_fields.is_empty() {
            return Err(ConfigurationError::EmptyKeyFields("dedupe"));
        }
        let flapping = if flapping.enabled {
            if flapping.threshold < 1 {
                return Err(ConfigurationError::InvalidFlapThreshold(flapping.threshold));
            }
            if flapping.key_fields.is_empty() {
                return Err(ConfigurationError::EmptyKeyFields("flapping"));
            }
            Some(FlappingSettings {
                window: checked_time_delta("flapping.window_secs", flapping.window_secs)?,
                threshold: flapping.threshold as usize,
                mute: checked_time_delta("flapping.mute_duration_secs", flapping.mute_duration_secs)?,
                key_fields: flapping.key_fields.clone(),
            })
        } else {
            None
        };

        Ok(Self {
            ttl: checked_time_delta("dedupe.ttl_secs", dedupe.ttl_secs)?,
            cooldown: checked_time_delta("dedupe.cooldown_secs", dedupe.cooldown_secs)?,
            dedupe_key_fields: dedupe.key_fields.clone(),
            flapping,
        })
    }
}

/// Why an event was suppressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuppressionReason {
    /// A previous alert on the same dedupe key is still cooling down.
    Cooldown,
    /// The flapping key is muted.
    Muted,
    /// This transition pushed the flapping key over its threshold.
    FlappingDetected,
}

impl fmt::Display for SuppressionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SuppressionReason::Cooldown => "cooldown",
            SuppressionReason::Muted => "muted",
            SuppressionReason::FlappingDetected => "flapping_detected",
        })
    }
}

/// Keep or suppress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Forward to the router and the feed.
    Kept,
    /// Counted but not forwarded.
    Suppressed(SuppressionReason),
}

/// The decision for one matched event plus the dedupe bookkeeping the feed
/// item is built from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuppressionOutcome {
    /// Keep or suppress.
    pub decision: Decision,
    /// The derived dedupe key.
    pub dedupe_key: String,
    /// First occurrence of the dedupe key.
    pub first_seen_at: DateTime<Utc>,
    /// Occurrences of the dedupe key including this one.
    pub occurrence_count: u64,
}

impl SuppressionOutcome {
    /// Whether the event survived both gates.
    pub fn is_kept(&self) -> bool {
        self.decision == Decision::Kept
    }
}

/// What run-start pruning removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PruneStats {
    /// Dedupe records past their TTL.
    pub dedupe_expired: usize,
    /// Flapping records with nothing left to track.
    pub flapping_dropped: usize,
}

/// Owns the dedupe and flapping records for the duration of a run.
///
/// Events must be fed in `(occurred_at, event_key)` order; `&mut self` makes
/// every key's updates sequential.
#[derive(Debug)]
pub struct SuppressionEngine {
    settings: SuppressionSettings,
    state: SuppressionState,
}

impl SuppressionEngine {
    /// Creates an engine over previously persisted state.
    pub fn new(settings: SuppressionSettings, state: SuppressionState) -> Self {
        Self { settings, state }
    }

    /// The working state.
    pub fn state(&self) -> &SuppressionState {
        &self.state
    }

    /// Hands the working state back for commit.
    pub fn into_state(self) -> SuppressionState {
        self.state
    }

    /// Drops dedupe records whose TTL elapsed before `as_of`, ages flapping
    /// histories, lifts expired mutes and drops flapping records with nothing
    /// left to track.
    pub fn prune_expired(&mut self, as_of: DateTime<Utc>) -> PruneStats {
        let ttl = self.settings.ttl;
        let before = self.state.dedupe.len();
        self.state.dedupe.retain(|_, record| record.last_seen_at + ttl >= as_of);
        let dedupe_expired = before - self.state.dedupe.len();

        let before = self.state.flapping.len();
        match &self.settings.flapping {
            Some(flapping) => {
                self.state.flapping.retain(|_, record| {
                    if record.muted && record.mute_until.is_none_or(|until| as_of >= until) {
                        unmute(record);
                    }
                    record.transition_history.evict(as_of, flapping.window);
                    !record.is_idle(as_of, flapping.window)
                });
            }
            None => self.state.flapping.clear(),
        }
        let flapping_dropped = before - self.state.flapping.len();

        tracing::debug!(%as_of, dedupe_expired, flapping_dropped, "Suppression state pruned.");
        PruneStats { dedupe_expired, flapping_dropped }
    }

    /// Runs the dedupe gate, then the flapping gate for kept candidates.
    pub fn evaluate(
        &mut self,
        event: &Event,
        subscription_ids: &BTreeSet<String>,
    ) -> SuppressionOutcome {
        let now = event.occurred_at;
        let dedupe_key = derive_key(&self.settings.dedupe_key_fields, event, subscription_ids);

        let (first_seen_at, occurrence_count, cooling_down) = self.dedupe_gate(&dedupe_key, now);

        let decision = if cooling_down {
            Decision::Suppressed(SuppressionReason::Cooldown)
        } else {
            self.flapping_gate(event, subscription_ids)
        };

        tracing::debug!(
            event_key = %event.event_key,
            dedupe_key = %dedupe_key,
            occurrence_count,
            decision = ?decision,
            "Suppression decision made."
        );

        SuppressionOutcome { decision, dedupe_key, first_seen_at, occurrence_count }
    }

    /// Updates the dedupe record and reports whether the key is cooling down.
    fn dedupe_gate(&mut self, key: &str, now: DateTime<Utc>) -> (DateTime<Utc>, u64, bool) {
        let record = self
            .state
            .dedupe
            .entry(key.to_string())
            .or_insert_with(|| DedupeRecord::new(key, now));

        if now.signed_duration_since(record.last_seen_at) > self.settings.ttl {
            tracing::debug!(dedupe_key = %key, last_seen_at = %record.last_seen_at, "Dedupe record expired, starting fresh.");
            *record = DedupeRecord::new(key, now);
        }

        let cooling_down = now < record.cooldown_until;
        if !cooling_down {
            record.cooldown_until = now + self.settings.cooldown;
        }
        record.last_seen_at = record.last_seen_at.max(now);
        record.occurrence_count += 1;

        (record.first_seen_at, record.occurrence_count, cooling_down)
    }

    fn flapping_gate(&mut self, event: &Event, subscription_ids: &BTreeSet<String>) -> Decision {
        let Some(settings) = &self.settings.flapping else {
            return Decision::Kept;
        };
        let now = event.occurred_at;
        let key = derive_key(&settings.key_fields, event, subscription_ids);
        let record =
            self.state.flapping.entry(key.clone()).or_insert_with(|| FlappingRecord::new(&key));

        let is_transition = record.last_status.is_some_and(|previous| previous != event.status);
        record.last_status = Some(event.status);
        record.last_seen_at = Some(record.last_seen_at.map_or(now, |seen| seen.max(now)));

        if record.muted {
            match record.mute_until {
                Some(until) if now < until => return Decision::Suppressed(SuppressionReason::Muted),
                _ => {
                    tracing::debug!(flapping_key = %key, "Mute expired, key unmuted.");
                    unmute(record);
                }
            }
        }

        if !is_transition {
            return Decision::Kept;
        }

        record.transition_history.evict(now, settings.window);
        record.transition_history.record(now);

        if record.transition_history.len() >= settings.threshold {
            let mute_until = now + settings.mute;
            record.muted = true;
            record.mute_until = Some(mute_until);
            tracing::info!(
                flapping_key = %key,
                transitions = record.transition_history.len(),
                %mute_until,
                "Flapping detected, key muted."
            );
            return Decision::Suppressed(SuppressionReason::FlappingDetected);
        }

        Decision::Kept
    }
}

fn unmute(record: &mut FlappingRecord) {
    record.muted = false;
    record.mute_until = None;
    record.transition_history.clear();
}
