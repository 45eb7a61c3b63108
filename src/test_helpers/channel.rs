use std::time::Duration;

use url::Url;

use crate::models::{
    channel::{
        ChannelConfig, ChannelFilter, ChannelType, EmailSettings, RateLimitPolicy, WebhookSettings,
    },
    event::Severity,
};

/// A builder for creating `ChannelConfig` instances for testing.
///
/// Defaults to an enabled, unlimited webhook channel with a wildcard filter.
pub struct ChannelBuilder {
    channel_id: String,
    kind: ChannelType,
    filter: ChannelFilter,
    rate_limit: Option<RateLimitPolicy>,
    enabled: bool,
}

impl ChannelBuilder {
    /// Creates a new `ChannelBuilder` with the given id.
    pub fn new(channel_id: &str) -> Self {
        Self {
            channel_id: channel_id.to_string(),
            kind: ChannelType::Webhook(WebhookSettings {
                url: Url::parse(&format!("https://hooks.example.com/{channel_id}")).unwrap(),
            }),
            filter: ChannelFilter::default(),
            rate_limit: None,
            enabled: true,
        }
    }

    /// Makes this an email channel with the given recipients.
    pub fn email(mut self, to: &[&str]) -> Self {
        self.kind = ChannelType::Email(EmailSettings {
            to: to.iter().map(|addr| addr.to_string()).collect(),
            subject_prefix: None,
        });
        self
    }

    /// Makes this a webhook channel posting to `url`.
    pub fn webhook(mut self, url: &str) -> Self {
        self.kind = ChannelType::Webhook(WebhookSettings { url: Url::parse(url).unwrap() });
        self
    }

    /// Sets a rolling rate limit.
    pub fn rate_limit(mut self, max_per_interval: u32, interval_secs: u64) -> Self {
        self.rate_limit = Some(RateLimitPolicy {
            max_per_interval,
            interval_secs: Duration::from_secs(interval_secs),
        });
        self
    }

    /// Restricts the channel to the given subscriptions.
    pub fn subscriptions(mut self, ids: &[&str]) -> Self {
        self.filter.subscription_ids = ids.iter().map(|id| id.to_string()).collect();
        self
    }

    /// Restricts the channel to the given topics.
    pub fn topics(mut self, topics: &[&str]) -> Self {
        self.filter.topics = topics.iter().map(|t| t.to_string()).collect();
        self
    }

    /// Restricts the channel to severities of at least `min`.
    pub fn min_severity(mut self, min: i64) -> Self {
        self.filter.severity.min_severity = Some(Severity::new(min).unwrap());
        self
    }

    /// Restricts the channel to the given rule types.
    pub fn rule_types(mut self, rule_types: &[&str]) -> Self {
        self.filter.rule_types = rule_types.iter().map(|r| r.to_string()).collect();
        self
    }

    /// Disables the channel.
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Builds the `ChannelConfig` instance.
    pub fn build(self) -> ChannelConfig {
        ChannelConfig {
            channel_id: self.channel_id,
            kind: self.kind,
            filter: self.filter,
            rate_limit: self.rate_limit,
            enabled: self.enabled,
        }
    }
}
