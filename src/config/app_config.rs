use std::{
    collections::HashSet,
    path::{Path, PathBuf},
    time::Duration,
};

use chrono::TimeDelta;
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

use super::{ConfigurationError, DedupeConfig, FlappingConfig, RoutingConfig};
use crate::{
    engine::suppression::SuppressionSettings,
    loader::{load_config, load_optional_config},
    models::{AssetLocation, ChannelConfig, Subscription},
};

/// Longest duration accepted for any TTL, cooldown, window or mute (ten years).
const MAX_DURATION_SECS: u64 = 10 * 365 * 24 * 60 * 60;

/// Application configuration, loaded once per run from `<config_dir>/app.yaml`
/// with `ESG_ALERTS__*` environment overrides.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppConfig {
    /// Persisted suppression state (dedupe + flapping records).
    pub state_path: PathBuf,

    /// Persisted alert feed.
    pub feed_path: PathBuf,

    /// Directory receiving `deliveries.json` and `metrics.json` for each run.
    pub output_dir: PathBuf,

    /// When set, channel stubs write their messages below this directory.
    #[serde(default)]
    pub outbox_dir: Option<PathBuf>,

    /// Dedupe parameters.
    #[serde(default)]
    pub dedupe: DedupeConfig,

    /// Flapping parameters.
    #[serde(default)]
    pub flapping: FlappingConfig,

    /// Channel routing options.
    #[serde(default)]
    pub routing: RoutingConfig,

    /// Path to the subscriptions file.
    #[serde(skip_deserializing)]
    pub subscriptions_path: PathBuf,

    /// Path to the channels file.
    #[serde(skip_deserializing)]
    pub channels_path: PathBuf,

    /// Path to the optional asset locations file.
    #[serde(skip_deserializing)]
    pub assets_path: PathBuf,
}

impl AppConfig {
    /// Creates a new `AppConfig` by reading from the configuration directory.
    pub fn new(config_dir: Option<&str>) -> Result<Self, ConfigError> {
        let config_dir_str = config_dir.unwrap_or("configs");
        let s = Config::builder()
            .add_source(File::with_name(&format!("{}/app.yaml", config_dir_str)))
            .add_source(Environment::with_prefix("ESG_ALERTS").separator("__"))
            .build()?;
        let mut config: Self = s.try_deserialize()?;

        let config_path = Path::new(config_dir_str);
        config.subscriptions_path = config_path.join("subscriptions.yaml");
        config.channels_path = config_path.join("channels.yaml");
        config.assets_path = config_path.join("assets.yaml");

        Ok(config)
    }

    /// Validates the dedupe and flapping sections and converts them into
    /// engine settings.
    pub fn suppression_settings(&self) -> Result<SuppressionSettings, ConfigurationError> {
        SuppressionSettings::from_config(&self.dedupe, &self.flapping)
    }

    /// Loads and validates subscriptions; the file is required.
    pub fn load_subscriptions(&self) -> Result<Vec<Subscription>, ConfigurationError> {
        let subscriptions = load_config::<Subscription>(self.subscriptions_path.clone())?;
        ensure_unique("subscription", subscriptions.iter().map(|s| s.id.as_str()))?;
        tracing::debug!(count = subscriptions.len(), "Subscriptions loaded.");
        Ok(subscriptions)
    }

    /// Loads and validates channels; a missing file means no channels.
    pub fn load_channels(&self) -> Result<Vec<ChannelConfig>, ConfigurationError> {
        let channels = load_optional_config::<ChannelConfig>(self.channels_path.clone())?;
        ensure_unique("channel", channels.iter().map(|c| c.channel_id.as_str()))?;
        tracing::debug!(count = channels.len(), "Channels loaded.");
        Ok(channels)
    }

    /// Loads asset locations used by region selectors; optional.
    pub fn load_assets(&self) -> Result<Vec<AssetLocation>, ConfigurationError> {
        let assets = load_optional_config::<AssetLocation>(self.assets_path.clone())?;
        ensure_unique("asset", assets.iter().map(|a| a.asset_id.as_str()))?;
        Ok(assets)
    }

    /// Creates a new `AppConfigBuilder` for testing purposes.
    #[cfg(test)]
    pub fn builder() -> AppConfigBuilder {
        AppConfigBuilder::default()
    }
}

/// Converts a configured duration into a `TimeDelta` usable in timestamp
/// arithmetic, rejecting anything above ten years.
pub fn checked_time_delta(
    field: &'static str,
    value: Duration,
) -> Result<TimeDelta, ConfigurationError> {
    let out_of_range =
        || ConfigurationError::DurationOutOfRange { field, secs: value.as_secs(), max: MAX_DURATION_SECS };
    if value.as_secs() > MAX_DURATION_SECS {
        return Err(out_of_range());
    }
    TimeDelta::from_std(value).map_err(|_| out_of_range())
}

fn ensure_unique<'a>(
    kind: &'static str,
    ids: impl Iterator<Item = &'a str>,
) -> Result<(), ConfigurationError> {
    let mut seen = HashSet::new();
    for id in ids {
        if !seen.insert(id) {
            return Err(ConfigurationError::DuplicateId { kind, id: id.to_string() });
        }
    }
    Ok(())
}

/// A builder for creating `AppConfig` instances for testing.
#[cfg(test)]
#[derive(Default)]
pub struct AppConfigBuilder {
    config: AppConfig,
}

#[cfg(test)]
impl AppConfigBuilder {
    pub fn cooldown_secs(mut self, secs: u64) -> Self {
        self.config.dedupe.cooldown_secs = Duration::from_secs(secs);
        self
    }

    pub fn ttl_secs(mut self, secs: u64) -> Self {
        self.config.dedupe.ttl_secs = Duration::from_secs(secs);
        self
    }

    pub fn flap_threshold(mut self, threshold: u32) -> Self {
        self.config.flapping.threshold = threshold;
        self
    }

    pub fn flapping_enabled(mut self, enabled: bool) -> Self {
        self.config.flapping.enabled = enabled;
        self
    }

    pub fn dedupe_key_fields(mut self, fields: Vec<crate::models::KeyField>) -> Self {
        self.config.dedupe.key_fields = fields;
        self
    }

    pub fn config_dir(mut self, dir: &Path) -> Self {
        self.config.subscriptions_path = dir.join("subscriptions.yaml");
        self.config.channels_path = dir.join("channels.yaml");
        self.config.assets_path = dir.join("assets.yaml");
        self
    }

    pub fn build(self) -> AppConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const APP_YAML: &str = r#"
state_path: "data/state.json"
feed_path: "data/feed.json"
output_dir: "data/out"
dedupe:
  ttl_secs: 7200
  key_fields: ["topic", "asset_id"]
"#;

    fn write_config_dir(files: &[(&str, &str)]) -> tempfile::TempDir {
        let temp_dir = tempfile::tempdir().unwrap();
        for (name, content) in files {
            std::fs::write(temp_dir.path().join(name), content).unwrap();
        }
        temp_dir
    }

    #[test]
    fn test_app_config_from_file() {
        let temp_dir = write_config_dir(&[("app.yaml", APP_YAML)]);
        let config = AppConfig::new(Some(temp_dir.path().to_str().unwrap())).unwrap();

        assert_eq!(config.state_path, PathBuf::from("data/state.json"));
        assert_eq!(config.dedupe.ttl_secs, Duration::from_secs(7200));
        assert_eq!(config.dedupe.key_fields.len(), 2);
        assert!(config.flapping.enabled);
        assert!(config.outbox_dir.is_none());
        assert!(!config.routing.audit_skipped_channels);
        assert_eq!(config.subscriptions_path, temp_dir.path().join("subscriptions.yaml"));
        assert_eq!(config.channels_path, temp_dir.path().join("channels.yaml"));
        assert!(config.suppression_settings().is_ok());
    }

    #[test]
    fn test_app_config_from_file_with_env_var_override() {
        let temp_dir = write_config_dir(&[("app.yaml", APP_YAML)]);

        unsafe {
            std::env::set_var("ESG_ALERTS__FLAPPING__MUTE_DURATION_SECS", "900");
        }
        let config = AppConfig::new(Some(temp_dir.path().to_str().unwrap())).unwrap();
        unsafe {
            std::env::remove_var("ESG_ALERTS__FLAPPING__MUTE_DURATION_SECS");
        }

        assert_eq!(config.flapping.mute_duration_secs, Duration::from_secs(900));
    }

    #[test]
    fn test_suppression_settings_rejects_zero_threshold() {
        let config = AppConfig::builder().flap_threshold(0).build();
        assert!(matches!(
            config.suppression_settings(),
            Err(ConfigurationError::InvalidFlapThreshold(0))
        ));
    }

    #[test]
    fn test_suppression_settings_ignores_flapping_when_disabled() {
        let config = AppConfig::builder().flap_threshold(0).flapping_enabled(false).build();
        assert!(config.suppression_settings().unwrap().flapping.is_none());
    }

    #[test]
    fn test_suppression_settings_rejects_empty_dedupe_key() {
        let config = AppConfig::builder().dedupe_key_fields(vec![]).build();
        assert!(matches!(
            config.suppression_settings(),
            Err(ConfigurationError::EmptyKeyFields("dedupe"))
        ));
    }

    #[test]
    fn test_suppression_settings_rejects_huge_ttl() {
        let config = AppConfig::builder().ttl_secs(u64::MAX).build();
        assert!(matches!(
            config.suppression_settings(),
            Err(ConfigurationError::DurationOutOfRange { field: "dedupe.ttl_secs", .. })
        ));
    }

    #[test]
    fn test_load_subscriptions_rejects_duplicate_ids() {
        let temp_dir = write_config_dir(&[(
            "subscriptions.yaml",
            "subscriptions:\n  - id: dup\n  - id: dup\n",
        )]);
        let config = AppConfig::builder().config_dir(temp_dir.path()).build();

        assert!(matches!(
            config.load_subscriptions(),
            Err(ConfigurationError::DuplicateId { kind: "subscription", .. })
        ));
    }

    #[test]
    fn test_missing_channels_and_assets_are_empty() {
        let temp_dir = write_config_dir(&[]);
        let config = AppConfig::builder().config_dir(temp_dir.path()).build();

        assert!(config.load_channels().unwrap().is_empty());
        assert!(config.load_assets().unwrap().is_empty());
        assert!(config.load_subscriptions().is_err());
    }
}
