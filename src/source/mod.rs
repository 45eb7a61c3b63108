//! Event source adapter: reads a batch of raw events from JSON Lines or a
//! JSON array and validates them into typed [`Event`]s.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use thiserror::Error;

use crate::models::event::{Event, EventStatus, Severity};

/// Why a single input record could not be turned into an [`Event`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MalformedReason {
    /// The record is not valid JSON or has the wrong shape.
    #[error("invalid JSON: {0}")]
    InvalidJson(String),

    /// The line is not valid UTF-8.
    #[error("invalid encoding: {0}")]
    InvalidEncoding(String),

    /// A required field is absent or blank.
    #[error("missing required field '{0}'")]
    MissingField(&'static str),

    /// The severity is not an integer in `1..=5`.
    #[error("invalid severity: {0}")]
    InvalidSeverity(String),

    /// `occurred_at` is not an RFC 3339 timestamp.
    #[error("invalid occurred_at timestamp '{0}'")]
    InvalidTimestamp(String),

    /// `status` is neither `active` nor `resolved`.
    #[error("invalid status '{0}'")]
    InvalidStatus(String),
}

/// A skipped input record.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("malformed event at position {position}: {reason}")]
pub struct MalformedEvent {
    /// 1-based line number (JSON Lines) or array index (JSON array).
    pub position: usize,
    /// What was wrong with it.
    pub reason: MalformedReason,
}

/// Failures that prevent reading the batch at all.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The events file could not be read.
    #[error("failed to read events file: {0}")]
    Io(#[from] std::io::Error),

    /// The file looks like a JSON array but does not parse as one.
    #[error("events file is not a valid JSON array: {0}")]
    InvalidArray(#[from] serde_json::Error),
}

/// A validated batch of events in processing order plus the records that were
/// skipped.
#[derive(Debug, Default)]
pub struct EventBatch {
    /// Events sorted by `(occurred_at, event_key)`.
    pub events: Vec<Event>,
    /// Skipped records, in input order.
    pub malformed: Vec<MalformedEvent>,
}

impl EventBatch {
    /// Number of input records, valid or not.
    pub fn total(&self) -> usize {
        self.events.len() + self.malformed.len()
    }
}

/// Loosely-typed form of an input record. Every field is optional so that
/// validation can name the one that is missing.
#[derive(Debug, Deserialize)]
struct RawEvent {
    event_key: Option<String>,
    topic: Option<String>,
    asset_id: Option<String>,
    severity: Option<serde_json::Value>,
    rule_code: Option<String>,
    occurred_at: Option<String>,
    status: Option<String>,
    #[serde(default)]
    payload: serde_json::Value,
}

impl RawEvent {
    fn into_event(self) -> Result<Event, MalformedReason> {
        let severity = match self.severity {
            None | Some(serde_json::Value::Null) =>
                return Err(MalformedReason::MissingField("severity")),
            Some(value) => value
                .as_i64()
                .and_then(|v| Severity::new(v).ok())
                .ok_or_else(|| MalformedReason::InvalidSeverity(value.to_string()))?,
        };

        let occurred_at = required("occurred_at", self.occurred_at)?;
        let occurred_at = DateTime::parse_from_rfc3339(&occurred_at)
            .map_err(|_| MalformedReason::InvalidTimestamp(occurred_at.clone()))?
            .with_timezone(&Utc);

        let status = match self.status.as_deref().map(str::trim) {
            None | Some("") | Some("active") => EventStatus::Active,
            Some("resolved") => EventStatus::Resolved,
            Some(other) => return Err(MalformedReason::InvalidStatus(other.to_string())),
        };

        Ok(Event {
            event_key: required("event_key", self.event_key)?,
            topic: required("topic", self.topic)?,
            asset_id: required("asset_id", self.asset_id)?,
            severity,
            rule_code: required("rule_code", self.rule_code)?,
            occurred_at,
            status,
            payload: self.payload,
        })
    }
}

fn required(field: &'static str, value: Option<String>) -> Result<String, MalformedReason> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(MalformedReason::MissingField(field)),
    }
}

fn validate(position: usize, record: Result<RawEvent, serde_json::Error>) -> Result<Event, MalformedEvent> {
    record
        .map_err(|e| MalformedReason::InvalidJson(e.to_string()))
        .and_then(RawEvent::into_event)
        .map_err(|reason| MalformedEvent { position, reason })
}

/// Parses events from an in-memory document. A document whose first
/// non-whitespace byte is `[` is read as a JSON array, anything else as
/// JSON Lines. In JSON Lines a line that is not valid UTF-8 is malformed on
/// its own and does not affect its neighbours.
pub fn parse_events(content: impl AsRef<[u8]>) -> Result<EventBatch, SourceError> {
    let content = content.as_ref();
    let mut batch = EventBatch::default();

    let is_array = content.iter().find(|byte| !byte.is_ascii_whitespace()) == Some(&b'[');
    let results: Vec<Result<Event, MalformedEvent>> = if is_array {
        let records: Vec<serde_json::Value> = serde_json::from_slice(content)?;
        records
            .into_iter()
            .enumerate()
            .map(|(idx, value)| validate(idx + 1, serde_json::from_value(value)))
            .collect()
    } else {
        content
            .split(|byte| *byte == b'\n')
            .enumerate()
            .filter(|(_, line)| !line.trim_ascii().is_empty())
            .map(|(idx, line)| match std::str::from_utf8(line) {
                Ok(line) => validate(idx + 1, serde_json::from_str(line)),
                Err(e) => Err(MalformedEvent {
                    position: idx + 1,
                    reason: MalformedReason::InvalidEncoding(e.to_string()),
                }),
            })
            .collect()
    };

    for result in results {
        match result {
            Ok(event) => batch.events.push(event),
            Err(malformed) => {
                tracing::warn!(position = malformed.position, reason = %malformed.reason, "Skipping malformed event.");
                batch.malformed.push(malformed);
            }
        }
    }

    batch.events.sort_by(|a, b| a.order_key().cmp(&b.order_key()));
    Ok(batch)
}

/// Reads and validates the events file at `path`.
pub async fn read_events(path: &Path) -> Result<EventBatch, SourceError> {
    let content = tokio::fs::read(path).await?;
    let batch = parse_events(&content)?;
    tracing::info!(
        path = %path.display(),
        events = batch.events.len(),
        malformed = batch.malformed.len(),
        "Events loaded."
    );
    Ok(batch)
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = r#"{"event_key":"b","topic":"sat.change","asset_id":"a1","severity":4,"rule_code":"ndvi.drop","occurred_at":"2024-01-01T00:10:00Z","status":"active","payload":{"delta":0.3}}"#;

    #[test]
    fn test_parse_jsonl_sorts_and_skips_blank_lines() {
        let content = format!(
            "{}\n\n{}\n",
            VALID,
            r#"{"event_key":"a","topic":"t","asset_id":"a1","severity":2,"rule_code":"r","occurred_at":"2024-01-01T00:00:00+00:00"}"#
        );
        let batch = parse_events(&content).unwrap();

        assert!(batch.malformed.is_empty());
        let keys: Vec<_> = batch.events.iter().map(|e| e.event_key.as_str()).collect();
        assert_eq!(keys, vec!["a", "b"]);
        assert_eq!(batch.events[0].status, EventStatus::Active);
        assert_eq!(batch.events[1].payload["delta"], 0.3);
    }

    #[test]
    fn test_ties_are_broken_by_event_key() {
        let content = r#"[
            {"event_key":"z","topic":"t","asset_id":"a","severity":1,"rule_code":"r","occurred_at":"2024-01-01T00:00:00Z"},
            {"event_key":"m","topic":"t","asset_id":"a","severity":1,"rule_code":"r","occurred_at":"2024-01-01T00:00:00Z"}
        ]"#;
        let batch = parse_events(content).unwrap();
        assert_eq!(batch.events[0].event_key, "m");
        assert_eq!(batch.events[1].event_key, "z");
    }

    #[test]
    fn test_malformed_records_are_reported_with_position() {
        let content = [
            VALID,
            r#"{"event_key":"x","topic":"t","asset_id":"a","severity":9,"rule_code":"r","occurred_at":"2024-01-01T00:00:00Z"}"#,
            r#"{"event_key":"y","topic":"t","asset_id":"a","severity":3,"occurred_at":"2024-01-01T00:00:00Z"}"#,
            r#"{"event_key":"w","topic":"t","asset_id":"a","severity":3,"rule_code":"r","occurred_at":"yesterday"}"#,
            r#"{"event_key":"v","topic":"t","asset_id":"a","severity":3,"rule_code":"r","occurred_at":"2024-01-01T00:00:00Z","status":"open"}"#,
            "not json",
        ]
        .join("\n");
        let batch = parse_events(&content).unwrap();

        assert_eq!(batch.events.len(), 1);
        assert_eq!(batch.total(), 6);
        let reasons: Vec<_> = batch.malformed.iter().map(|m| (m.position, m.reason.clone())).collect();
        assert_eq!(reasons[0], (2, MalformedReason::InvalidSeverity("9".into())));
        assert_eq!(reasons[1], (3, MalformedReason::MissingField("rule_code")));
        assert_eq!(reasons[2], (4, MalformedReason::InvalidTimestamp("yesterday".into())));
        assert_eq!(reasons[3], (5, MalformedReason::InvalidStatus("open".into())));
        assert!(matches!(reasons[4], (6, MalformedReason::InvalidJson(_))));
    }

    #[test]
    fn test_invalid_utf8_line_is_skipped() {
        let mut content = VALID.as_bytes().to_vec();
        content.extend_from_slice(b"\n{\"event_key\":\"\xff\xfe\"}\n");

        let batch = parse_events(&content).unwrap();

        assert_eq!(batch.events.len(), 1);
        assert_eq!(batch.malformed.len(), 1);
        assert_eq!(batch.malformed[0].position, 2);
        assert!(matches!(batch.malformed[0].reason, MalformedReason::InvalidEncoding(_)));
    }

    #[test]
    fn test_broken_array_is_fatal() {
        assert!(matches!(parse_events("[{\"event_key\": "), Err(SourceError::InvalidArray(_))));
    }

    #[tokio::test]
    async fn test_read_events_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.jsonl");
        tokio::fs::write(&path, VALID).await.unwrap();

        let batch = read_events(&path).await.unwrap();
        assert_eq!(batch.events.len(), 1);
        assert!(read_events(&dir.path().join("missing.jsonl")).await.is_err());

        let mut content = VALID.as_bytes().to_vec();
        content.extend_from_slice(b"\n{\"event_key\":\"\xff\xfe\"}");
        tokio::fs::write(&path, content).await.unwrap();
        let batch = read_events(&path).await.unwrap();
        assert_eq!((batch.events.len(), batch.malformed.len()), (1, 1));
    }
}
