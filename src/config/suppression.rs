use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::{deserialize_duration_from_seconds, serialize_duration_to_seconds};
use crate::models::key_field::{KeyField, default_key_fields};

/// Dedupe parameters.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct DedupeConfig {
    /// Idle time after which a dedupe record is dropped.
    #[serde(
        deserialize_with = "deserialize_duration_from_seconds",
        serialize_with = "serialize_duration_to_seconds"
    )]
    pub ttl_secs: Duration,

    /// Minimum spacing between two kept alerts on the same key.
    #[serde(
        deserialize_with = "deserialize_duration_from_seconds",
        serialize_with = "serialize_duration_to_seconds"
    )]
    pub cooldown_secs: Duration,

    /// Event fields the dedupe key is built from.
    pub key_fields: Vec<KeyField>,
}

impl Default for DedupeConfig {
    fn default() -> Self {
        Self {
            ttl_secs: Duration::from_secs(3600),
            cooldown_secs: Duration::from_secs(300),
            key_fields: default_key_fields(),
        }
    }
}

/// Flapping parameters.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct FlappingConfig {
    /// Turns flapping detection on or off.
    pub enabled: bool,

    /// Transitions older than this are forgotten. Zero disables detection
    /// for any threshold above one.
    #[serde(
        deserialize_with = "deserialize_duration_from_seconds",
        serialize_with = "serialize_duration_to_seconds"
    )]
    pub window_secs: Duration,

    /// Transitions inside the window that mute the key.
    pub threshold: u32,

    /// How long a flapping key stays muted.
    #[serde(
        deserialize_with = "deserialize_duration_from_seconds",
        serialize_with = "serialize_duration_to_seconds"
    )]
    pub mute_duration_secs: Duration,

    /// Event fields the flapping key is built from.
    pub key_fields: Vec<KeyField>,
}

impl Default for FlappingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            window_secs: Duration::from_secs(1800),
            threshold: 3,
            mute_duration_secs: Duration::from_secs(1800),
            key_fields: vec![KeyField::Topic, KeyField::AssetId, KeyField::RuleCode],
        }
    }
}

#[cfg(test)]
mod tests {
    use config::Config;

    use super::*;

    #[test]
    fn test_dedupe_config_defaults() {
        let config = DedupeConfig::default();
        assert_eq!(config.ttl_secs, Duration::from_secs(3600));
        assert_eq!(config.cooldown_secs, Duration::from_secs(300));
        assert_eq!(config.key_fields.len(), 4);
    }

    #[test]
    fn test_flapping_config_partial_override() {
        let yaml = "
            threshold: 5
            window_secs: 600
            key_fields: [\"asset_id\", \"payload.site\"]
        ";
        let builder =
            Config::builder().add_source(config::File::from_str(yaml, config::FileFormat::Yaml));
        let config: FlappingConfig = builder.build().unwrap().try_deserialize().unwrap();

        assert!(config.enabled);
        assert_eq!(config.threshold, 5);
        assert_eq!(config.window_secs, Duration::from_secs(600));
        assert_eq!(config.mute_duration_secs, Duration::from_secs(1800));
        assert_eq!(config.key_fields, vec![KeyField::AssetId, KeyField::Payload("site".into())]);
    }
}
