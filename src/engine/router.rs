//! The channel router: fans kept alerts out to channels, enforcing each
//! channel's rolling rate limit.

use std::path::Path;

use chrono::TimeDelta;
use dashmap::DashMap;

use crate::{
    channels::{Channel, build_channel},
    config::{ConfigurationError, checked_time_delta},
    engine::window::SlidingWindow,
    models::{
        channel::{ChannelConfig, ChannelFilter},
        delivery::{DeliveryOutcome, DeliveryRecord, SkipReason},
        feed_item::AlertFeedItem,
    },
};

/// A rate limit in engine units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RateLimit {
    window: TimeDelta,
    capacity: usize,
}

struct Route {
    config: ChannelConfig,
    rate_limit: Option<RateLimit>,
    transport: Box<dyn Channel>,
}

/// Routes kept alerts to channels.
///
/// Rate-limit windows live only for the lifetime of the router and are
/// measured in event time.
pub struct ChannelRouter {
    routes: Vec<Route>,
    limiters: DashMap<String, SlidingWindow>,
    audit_skipped: bool,
}

impl ChannelRouter {
    /// Creates a router with the stub transport for every channel.
    pub fn new(
        channels: Vec<ChannelConfig>,
        outbox_dir: Option<&Path>,
        audit_skipped: bool,
    ) -> Result<Self, ConfigurationError> {
        let routes = channels
            .into_iter()
            .map(|config| {
                let transport = build_channel(&config, outbox_dir);
                (config, transport)
            })
            .collect();
        Self::with_transports(routes, audit_skipped)
    }

    /// Creates a router over explicit transports.
    pub fn with_transports(
        channels: Vec<(ChannelConfig, Box<dyn Channel>)>,
        audit_skipped: bool,
    ) -> Result<Self, ConfigurationError> {
        let routes = channels
            .into_iter()
            .map(|(config, transport)| {
                let rate_limit = match &config.rate_limit {
                    Some(policy) => Some(RateLimit {
                        window: checked_time_delta("rate_limit.interval_secs", policy.interval_secs)?,
                        capacity: policy.max_per_interval as usize,
                    }),
                    None => None,
                };
                Ok(Route { config, rate_limit, transport })
            })
            .collect::<Result<Vec<_>, ConfigurationError>>()?;

        Ok(Self { routes, limiters: DashMap::new(), audit_skipped })
    }

    /// Decides, for every channel, whether `alert` is sent, and hands it to
    /// the channels that admit it. Channels that are disabled or whose filter
    /// does not match produce no record unless auditing is on.
    pub async fn route(&self, alert: &AlertFeedItem) -> Vec<DeliveryRecord> {
        let mut records = Vec::new();

        for route in &self.routes {
            let channel_id = &route.config.channel_id;
            let channel_type = route.config.kind.name();
            let skipped = |reason| record(channel_id, alert, DeliveryOutcome::Skipped, Some(reason));

            if !route.config.enabled {
                if self.audit_skipped {
                    records.push(skipped(SkipReason::Disabled));
                }
                continue;
            }
            if !filter_matches(&route.config.filter, alert) {
                if self.audit_skipped {
                    records.push(skipped(SkipReason::NoMatch));
                }
                continue;
            }

            if let Some(limit) = route.rate_limit {
                let admitted = self.limiters.entry(channel_id.clone()).or_default().try_acquire(
                    alert.occurred_at,
                    limit.window,
                    limit.capacity,
                );
                if !admitted {
                    tracing::debug!(channel_id = %channel_id, channel_type, event_key = %alert.event_key, "Channel rate limit reached, skipping.");
                    records.push(skipped(SkipReason::RateLimited));
                    continue;
                }
            }

            match route.transport.deliver(alert).await {
                Ok(()) => records.push(record(channel_id, alert, DeliveryOutcome::Sent, None)),
                Err(e) => {
                    tracing::warn!(channel_id = %channel_id, channel_type, event_key = %alert.event_key, error = %e, "Channel delivery failed.");
                    records.push(skipped(SkipReason::DeliveryFailed));
                }
            }
        }

        records
    }
}

fn record(
    channel_id: &str,
    alert: &AlertFeedItem,
    outcome: DeliveryOutcome,
    reason: Option<SkipReason>,
) -> DeliveryRecord {
    DeliveryRecord {
        channel_id: channel_id.to_string(),
        event_key: alert.event_key.clone(),
        dedupe_key: alert.dedupe_key.clone(),
        decided_at: alert.occurred_at,
        outcome,
        reason,
    }
}

fn filter_matches(filter: &ChannelFilter, alert: &AlertFeedItem) -> bool {
    (filter.subscription_ids.is_empty()
        || !filter.subscription_ids.is_disjoint(&alert.subscription_ids))
        && (filter.topics.is_empty() || filter.topics.contains(&alert.topic))
        && filter.severity.matches(alert.severity)
        && (filter.rule_types.is_empty() || filter.rule_types.contains(alert.rule_type()))
}
