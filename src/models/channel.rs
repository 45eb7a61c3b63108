//! Channel definitions: routing targets with filters and rate limits.

use std::{collections::BTreeSet, time::Duration};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::{
    config::{deserialize_duration_from_seconds, serialize_duration_to_seconds},
    loader::{Loadable, LoaderError},
    models::subscription::SeverityFilter,
};

fn default_enabled() -> bool {
    true
}

/// Settings for the email stub.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailSettings {
    /// Recipients.
    pub to: Vec<String>,
    /// Optional subject prefix, e.g. `[ESG]`.
    #[serde(default)]
    pub subject_prefix: Option<String>,
}

/// Settings for the webhook stub.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookSettings {
    /// The endpoint the message would be posted to.
    pub url: Url,
}

/// The type of channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelType {
    /// Email stub.
    Email(EmailSettings),
    /// Webhook stub.
    Webhook(WebhookSettings),
}

impl ChannelType {
    /// Short type name used in logs and outbox messages.
    pub fn name(&self) -> &'static str {
        match self {
            ChannelType::Email(_) => "email",
            ChannelType::Webhook(_) => "webhook",
        }
    }
}

/// Subset of subscription-style predicates deciding which kept alerts a
/// channel receives. Empty fields are wildcards.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelFilter {
    /// Only alerts matched by one of these subscriptions.
    #[serde(default)]
    pub subscription_ids: BTreeSet<String>,

    /// Only alerts on these topics.
    #[serde(default)]
    pub topics: BTreeSet<String>,

    /// Severity set and/or range.
    #[serde(flatten)]
    pub severity: SeverityFilter,

    /// Only alerts whose rule type is listed.
    #[serde(default)]
    pub rule_types: BTreeSet<String>,
}

/// Rolling-window rate limit for a channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitPolicy {
    /// Maximum deliveries within any window of `interval_secs`.
    pub max_per_interval: u32,

    /// The window length in seconds.
    #[serde(
        deserialize_with = "deserialize_duration_from_seconds",
        serialize_with = "serialize_duration_to_seconds"
    )]
    pub interval_secs: Duration,
}

/// A routing target loaded from `channels.yaml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// Unique channel id.
    #[serde(alias = "id")]
    pub channel_id: String,

    /// Channel type and its settings.
    #[serde(flatten)]
    pub kind: ChannelType,

    /// Which alerts this channel receives.
    #[serde(default)]
    pub filter: ChannelFilter,

    /// Optional rate limit; unlimited when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate_limit: Option<RateLimitPolicy>,

    /// Disabled channels receive nothing.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

/// Errors raised while loading or validating channels.
#[derive(Debug, Error)]
pub enum ChannelConfigError {
    /// The file could not be loaded.
    #[error("Failed to load channels: {0}")]
    Loader(#[from] LoaderError),

    /// A channel without an id.
    #[error("Channel id cannot be empty.")]
    EmptyId,

    /// An email channel without recipients or with a malformed address.
    #[error("Email channel '{0}' needs at least one valid recipient address.")]
    InvalidRecipients(String),

    /// A webhook URL that is not http(s).
    #[error("Webhook channel '{0}' must use an http or https URL.")]
    InvalidWebhookUrl(String),

    /// A rate limit with zero capacity or a zero-length window.
    #[error("Channel '{0}' rate limit needs max_per_interval >= 1 and interval_secs >= 1.")]
    InvalidRateLimit(String),

    /// `min_severity` is greater than `max_severity`.
    #[error("Channel '{0}' has min_severity greater than max_severity.")]
    ContradictorySeverityRange(String),
}

impl Loadable for ChannelConfig {
    type Error = ChannelConfigError;

    const KEY: &'static str = "channels";

    fn validate(&mut self) -> Result<(), Self::Error> {
        if self.channel_id.trim().is_empty() {
            return Err(ChannelConfigError::EmptyId);
        }
        match &self.kind {
            ChannelType::Email(email) => {
                if email.to.is_empty() || email.to.iter().any(|addr| !addr.contains('@')) {
                    return Err(ChannelConfigError::InvalidRecipients(self.channel_id.clone()));
                }
            }
            ChannelType::Webhook(webhook) =>
                if !matches!(webhook.url.scheme(), "http" | "https") {
                    return Err(ChannelConfigError::InvalidWebhookUrl(self.channel_id.clone()));
                },
        }
        if let Some(limit) = &self.rate_limit {
            if limit.max_per_interval == 0 || limit.interval_secs.is_zero() {
                return Err(ChannelConfigError::InvalidRateLimit(self.channel_id.clone()));
            }
        }
        if self.filter.severity.is_contradictory() {
            return Err(ChannelConfigError::ContradictorySeverityRange(self.channel_id.clone()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::{loader::load_config, test_helpers::ChannelBuilder};

    #[test]
    fn test_load_channels_from_yaml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("channels.yaml");
        std::fs::write(
            &path,
            r#"
channels:
  - channel_id: ops_email
    email:
      to: ["ops@example.com"]
      subject_prefix: "[ESG]"
    filter:
      topics: ["policy.enforcement"]
      min_severity: 4
    rate_limit:
      max_per_interval: 5
      interval_secs: 3600
  - id: risk_hook
    webhook:
      url: "https://hooks.example.com/esg"
    enabled: false
"#,
        )
        .unwrap();

        let channels = load_config::<ChannelConfig>(path).unwrap();
        assert_eq!(channels.len(), 2);
        assert_eq!(channels[0].kind.name(), "email");
        assert_eq!(
            channels[0].rate_limit,
            Some(RateLimitPolicy {
                max_per_interval: 5,
                interval_secs: Duration::from_secs(3600)
            })
        );
        assert_eq!(channels[1].channel_id, "risk_hook");
        assert!(!channels[1].enabled);
        assert!(channels[1].rate_limit.is_none());
    }

    #[test]
    fn test_validate_rejects_empty_recipients() {
        let mut channel = ChannelBuilder::new("mail").email(&[]).build();
        assert!(matches!(channel.validate(), Err(ChannelConfigError::InvalidRecipients(_))));
    }

    #[test]
    fn test_validate_rejects_non_http_webhook() {
        let mut channel = ChannelBuilder::new("hook").webhook("ftp://example.com/drop").build();
        assert!(matches!(channel.validate(), Err(ChannelConfigError::InvalidWebhookUrl(_))));
    }

    #[test]
    fn test_validate_rejects_zero_capacity_rate_limit() {
        let mut channel = ChannelBuilder::new("hook").rate_limit(0, 60).build();
        assert!(matches!(channel.validate(), Err(ChannelConfigError::InvalidRateLimit(_))));

        let mut ok = ChannelBuilder::new("hook").rate_limit(3, 60).build();
        assert!(ok.validate().is_ok());
    }
}
