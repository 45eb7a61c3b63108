//! Configurable key derivation for dedupe and flapping records.

use std::{collections::BTreeSet, fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::event::Event;

/// Separator between field values in a derived key.
const KEY_SEPARATOR: &str = "|";

/// An event attribute that contributes to a derived key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum KeyField {
    /// `topic`
    Topic,
    /// `asset_id`
    AssetId,
    /// `rule_code`
    RuleCode,
    /// `rule_type`, the namespace of `rule_code`
    RuleType,
    /// `severity`, the exact value
    Severity,
    /// `severity_bucket`: minor (1-2), moderate (3), major (4-5)
    SeverityBucket,
    /// `status`
    Status,
    /// `subscription`: the sorted matching subscription ids
    Subscription,
    /// `payload.<path>`: a value inside the opaque payload
    Payload(String),
}

/// An unknown key field name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown key field '{0}'")]
pub struct UnknownKeyField(pub String);

impl FromStr for KeyField {
    type Err = UnknownKeyField;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "topic" => KeyField::Topic,
            "asset_id" => KeyField::AssetId,
            "rule_code" => KeyField::RuleCode,
            "rule_type" => KeyField::RuleType,
            "severity" => KeyField::Severity,
            "severity_bucket" => KeyField::SeverityBucket,
            "status" => KeyField::Status,
            "subscription" => KeyField::Subscription,
            other => match other.strip_prefix("payload.") {
                Some(path) if !path.is_empty() => KeyField::Payload(path.to_string()),
                _ => return Err(UnknownKeyField(other.to_string())),
            },
        })
    }
}

impl TryFrom<String> for KeyField {
    type Error = UnknownKeyField;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for KeyField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyField::Topic => f.write_str("topic"),
            KeyField::AssetId => f.write_str("asset_id"),
            KeyField::RuleCode => f.write_str("rule_code"),
            KeyField::RuleType => f.write_str("rule_type"),
            KeyField::Severity => f.write_str("severity"),
            KeyField::SeverityBucket => f.write_str("severity_bucket"),
            KeyField::Status => f.write_str("status"),
            KeyField::Subscription => f.write_str("subscription"),
            KeyField::Payload(path) => write!(f, "payload.{path}"),
        }
    }
}

impl From<KeyField> for String {
    fn from(value: KeyField) -> Self {
        value.to_string()
    }
}

impl KeyField {
    /// The value this field contributes for `event`.
    pub fn extract(&self, event: &Event, subscription_ids: &BTreeSet<String>) -> String {
        match self {
            KeyField::Topic => escape(&event.topic),
            KeyField::AssetId => escape(&event.asset_id),
            KeyField::RuleCode => escape(&event.rule_code),
            KeyField::RuleType => escape(event.rule_type()),
            KeyField::Severity => event.severity.to_string(),
            KeyField::SeverityBucket => event.severity.bucket().to_string(),
            KeyField::Status => event.status.to_string(),
            KeyField::Subscription =>
                subscription_ids.iter().map(|id| escape(id)).collect::<Vec<_>>().join(","),
            KeyField::Payload(path) => match event.payload_value(path) {
                Some(serde_json::Value::String(s)) => escape(s),
                Some(value) => escape(&value.to_string()),
                None => "null".to_string(),
            },
        }
    }
}

/// Backslash-escapes the key separators so distinct value tuples never join
/// into the same key.
fn escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '\\' | '|' | ',') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Joins the values of `fields` into a single key.
pub fn derive_key(fields: &[KeyField], event: &Event, subscription_ids: &BTreeSet<String>) -> String {
    fields
        .iter()
        .map(|field| field.extract(event, subscription_ids))
        .collect::<Vec<_>>()
        .join(KEY_SEPARATOR)
}

/// The default key: topic, asset, rule and severity bucket.
pub fn default_key_fields() -> Vec<KeyField> {
    vec![KeyField::Topic, KeyField::AssetId, KeyField::RuleCode, KeyField::SeverityBucket]
}
