//! This module defines the typed event envelope consumed by the pipeline.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The lowest severity an event may carry.
pub const MIN_SEVERITY: u8 = 1;

/// The highest severity an event may carry.
pub const MAX_SEVERITY: u8 = 5;

/// Error returned when a severity value falls outside `1..=5`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("severity must be between {MIN_SEVERITY} and {MAX_SEVERITY}, got {0}")]
pub struct InvalidSeverity(pub i64);

/// Event severity on a 1 (informational) to 5 (critical) scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u8")]
pub struct Severity(u8);

impl Severity {
    /// Creates a severity, rejecting values outside `1..=5`.
    pub fn new(value: i64) -> Result<Self, InvalidSeverity> {
        if (i64::from(MIN_SEVERITY)..=i64::from(MAX_SEVERITY)).contains(&value) {
            Ok(Self(value as u8))
        } else {
            Err(InvalidSeverity(value))
        }
    }

    /// The numeric value.
    pub fn value(self) -> u8 {
        self.0
    }

    /// Human-readable label used in titles and feed rendering.
    pub fn label(self) -> &'static str {
        match self.0 {
            1 => "info",
            2 => "low",
            3 => "medium",
            4 => "high",
            _ => "critical",
        }
    }

    /// Coarse bucket used to build dedupe keys that tolerate small severity
    /// changes.
    pub fn bucket(self) -> &'static str {
        match self.0 {
            1 | 2 => "minor",
            3 => "moderate",
            _ => "major",
        }
    }
}

impl TryFrom<i64> for Severity {
    type Error = InvalidSeverity;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Severity> for u8 {
    fn from(value: Severity) -> Self {
        value.0
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle status reported by the event source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    /// The condition is currently present.
    Active,
    /// The condition has cleared.
    Resolved,
}

impl EventStatus {
    /// The wire name of the status.
    pub fn as_str(self) -> &'static str {
        match self {
            EventStatus::Active => "active",
            EventStatus::Resolved => "resolved",
        }
    }
}

impl fmt::Display for EventStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One observed occurrence of a material ESG/risk event.
///
/// Routing and decision fields are strongly typed; `payload` is opaque and is
/// passed through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Idempotency key, stable across redeliveries of the same occurrence.
    pub event_key: String,

    /// Event topic (e.g. `policy.enforcement`, `sat.change`).
    pub topic: String,

    /// The asset the event is about.
    pub asset_id: String,

    /// Severity on a 1-5 scale.
    pub severity: Severity,

    /// The rule that produced the event (e.g. `emissions.co2_exceedance`).
    pub rule_code: String,

    /// When the event occurred. Also the decision time for suppression.
    pub occurred_at: DateTime<Utc>,

    /// Active or resolved.
    pub status: EventStatus,

    /// Opaque domain payload.
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl Event {
    /// The rule type: the `rule_code` segment before the first `.`, or the
    /// whole code when it has no namespace.
    pub fn rule_type(&self) -> &str {
        self.rule_code.split('.').next().unwrap_or(&self.rule_code)
    }

    /// Looks up a dot-separated path inside the payload.
    pub fn payload_value(&self, path: &str) -> Option<&serde_json::Value> {
        path.split('.').try_fold(&self.payload, |current, segment| current.get(segment))
    }

    /// The processing order key: `(occurred_at, event_key)`.
    pub fn order_key(&self) -> (DateTime<Utc>, &str) {
        (self.occurred_at, self.event_key.as_str())
    }
}
