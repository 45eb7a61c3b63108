use chrono::TimeDelta;

use crate::{
    engine::suppression::{FlappingSettings, SuppressionSettings},
    models::key_field::{KeyField, default_key_fields},
};

/// Suppression settings used across tests: TTL 3600s, cooldown 300s,
/// flapping window 600s, threshold 3, mute 1800s.
pub fn suppression_settings() -> SuppressionSettings {
    SuppressionSettings {
        ttl: TimeDelta::seconds(3600),
        cooldown: TimeDelta::seconds(300),
        dedupe_key_fields: default_key_fields(),
        flapping: Some(FlappingSettings {
            window: TimeDelta::seconds(600),
            threshold: 3,
            mute: TimeDelta::seconds(1800),
            key_fields: vec![KeyField::Topic, KeyField::AssetId, KeyField::RuleCode],
        }),
    }
}
