use chrono::{DateTime, TimeDelta, Utc};

use crate::models::event::{Event, EventStatus, Severity};

/// The instant every builder-made event is offset from: 2024-01-01T00:00:00Z.
pub fn base_time() -> DateTime<Utc> {
    DateTime::from_timestamp(1_704_067_200, 0).unwrap()
}

/// `base_time()` plus `secs` seconds.
pub fn at(secs: i64) -> DateTime<Utc> {
    base_time() + TimeDelta::seconds(secs)
}

/// A builder for creating `Event` instances for testing.
pub struct EventBuilder {
    event_key: String,
    topic: String,
    asset_id: String,
    severity: i64,
    rule_code: String,
    occurred_at: DateTime<Utc>,
    status: EventStatus,
    payload: serde_json::Value,
}

impl EventBuilder {
    /// Creates a new `EventBuilder` with the given event key and defaults for
    /// every other field.
    pub fn new(event_key: &str) -> Self {
        Self {
            event_key: event_key.to_string(),
            topic: "policy.enforcement".to_string(),
            asset_id: "asset_1".to_string(),
            severity: 3,
            rule_code: "emissions.co2".to_string(),
            occurred_at: base_time(),
            status: EventStatus::Active,
            payload: serde_json::Value::Null,
        }
    }

    /// Sets the topic.
    pub fn topic(mut self, topic: &str) -> Self {
        self.topic = topic.to_string();
        self
    }

    /// Sets the asset id.
    pub fn asset(mut self, asset_id: &str) -> Self {
        self.asset_id = asset_id.to_string();
        self
    }

    /// Sets the severity. Panics on build if outside `1..=5`.
    pub fn severity(mut self, severity: i64) -> Self {
        self.severity = severity;
        self
    }

    /// Sets the rule code.
    pub fn rule_code(mut self, rule_code: &str) -> Self {
        self.rule_code = rule_code.to_string();
        self
    }

    /// Sets the occurrence time to `base_time() + secs`.
    pub fn at(mut self, secs: i64) -> Self {
        self.occurred_at = at(secs);
        self
    }

    /// Sets an absolute occurrence time.
    pub fn occurred_at(mut self, occurred_at: DateTime<Utc>) -> Self {
        self.occurred_at = occurred_at;
        self
    }

    /// Sets the status.
    pub fn status(mut self, status: EventStatus) -> Self {
        self.status = status;
        self
    }

    /// Shorthand for `status(EventStatus::Resolved)`.
    pub fn resolved(self) -> Self {
        self.status(EventStatus::Resolved)
    }

    /// Sets the payload.
    pub fn payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }

    /// Builds the `Event` instance.
    pub fn build(self) -> Event {
        Event {
            event_key: self.event_key,
            topic: self.topic,
            asset_id: self.asset_id,
            severity: Severity::new(self.severity).unwrap(),
            rule_code: self.rule_code,
            occurred_at: self.occurred_at,
            status: self.status,
            payload: self.payload,
        }
    }
}
