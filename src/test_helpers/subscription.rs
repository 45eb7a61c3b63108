use crate::models::{
    event::Severity,
    geo::Region,
    subscription::{SeverityFilter, Subscription},
};

/// A builder for creating `Subscription` instances for testing.
///
/// Without further calls the subscription matches every event.
pub struct SubscriptionBuilder {
    subscription: Subscription,
}

impl SubscriptionBuilder {
    /// Creates a new `SubscriptionBuilder` with the given id.
    pub fn new(id: &str) -> Self {
        Self {
            subscription: Subscription {
                id: id.to_string(),
                topics: Default::default(),
                severity: SeverityFilter::default(),
                assets: Default::default(),
                region: None,
                rule_types: Default::default(),
                payload_min: Default::default(),
                suppress_if: Default::default(),
                enabled: true,
            },
        }
    }

    /// Sets the topics of interest.
    pub fn topics(mut self, topics: &[&str]) -> Self {
        self.subscription.topics = topics.iter().map(|t| t.to_string()).collect();
        self
    }

    /// Sets the explicit severity set.
    pub fn severities(mut self, severities: &[i64]) -> Self {
        self.subscription.severity.severities =
            severities.iter().map(|s| Severity::new(*s).unwrap()).collect();
        self
    }

    /// Sets an inclusive severity range.
    pub fn severity_range(mut self, min: i64, max: i64) -> Self {
        self.subscription.severity.min_severity = Some(Severity::new(min).unwrap());
        self.subscription.severity.max_severity = Some(Severity::new(max).unwrap());
        self
    }

    /// Sets a lower severity bound only.
    pub fn min_severity(mut self, min: i64) -> Self {
        self.subscription.severity.min_severity = Some(Severity::new(min).unwrap());
        self
    }

    /// Sets the explicit asset list.
    pub fn assets(mut self, assets: &[&str]) -> Self {
        self.subscription.assets = assets.iter().map(|a| a.to_string()).collect();
        self
    }

    /// Sets an area-of-interest selector.
    pub fn region(mut self, region: Region) -> Self {
        self.subscription.region = Some(region);
        self
    }

    /// Sets the rule types.
    pub fn rule_types(mut self, rule_types: &[&str]) -> Self {
        self.subscription.rule_types = rule_types.iter().map(|r| r.to_string()).collect();
        self
    }

    /// Adds a numeric payload threshold.
    pub fn payload_min(mut self, path: &str, min: f64) -> Self {
        self.subscription.payload_min.insert(path.to_string(), min);
        self
    }

    /// Adds an exclusion condition.
    pub fn suppress_if(mut self, path: &str, value: serde_json::Value) -> Self {
        self.subscription.suppress_if.insert(path.to_string(), value);
        self
    }

    /// Disables the subscription.
    pub fn disabled(mut self) -> Self {
        self.subscription.enabled = false;
        self
    }

    /// Builds the `Subscription` instance.
    pub fn build(self) -> Subscription {
        self.subscription
    }
}
