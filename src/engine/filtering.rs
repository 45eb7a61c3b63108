//! This module defines the `FilterEngine`, which matches events against
//! subscriptions.

use std::collections::{BTreeSet, HashMap};

use crate::models::{
    event::Event,
    geo::{AssetLocation, GeoPoint},
    subscription::{AssetSelector, Subscription},
};

/// The result of matching one event against every subscription.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchResult {
    /// True when at least one subscription matched.
    pub matched: bool,
    /// Ids of the matching subscriptions, sorted.
    pub matching_subscription_ids: BTreeSet<String>,
}

/// Stateless matcher over a fixed set of subscriptions.
///
/// Holds the asset location index used by region selectors; nothing else
/// survives between events.
#[derive(Debug, Clone)]
pub struct FilterEngine {
    subscriptions: Vec<Subscription>,
    locations: HashMap<String, GeoPoint>,
}

impl FilterEngine {
    /// Creates a new `FilterEngine`.
    pub fn new(subscriptions: Vec<Subscription>, assets: &[AssetLocation]) -> Self {
        let locations = assets.iter().map(|a| (a.asset_id.clone(), a.point())).collect();
        Self { subscriptions, locations }
    }

    /// The configured subscriptions.
    pub fn subscriptions(&self) -> &[Subscription] {
        &self.subscriptions
    }

    /// Matches `event` against every subscription.
    pub fn match_event(&self, event: &Event) -> MatchResult {
        let matching_subscription_ids: BTreeSet<String> = self
            .subscriptions
            .iter()
            .filter(|sub| self.matches(sub, event))
            .map(|sub| sub.id.clone())
            .collect();

        tracing::trace!(
            event_key = %event.event_key,
            matches = matching_subscription_ids.len(),
            "Event matched against subscriptions."
        );

        MatchResult { matched: !matching_subscription_ids.is_empty(), matching_subscription_ids }
    }

    fn matches(&self, sub: &Subscription, event: &Event) -> bool {
        sub.enabled
            && (sub.topics.is_empty() || sub.topics.contains(&event.topic))
            && sub.severity.matches(event.severity)
            && self.asset_matches(sub, &event.asset_id)
            && (sub.rule_types.is_empty() || sub.rule_types.contains(event.rule_type()))
            && payload_thresholds_met(sub, event)
            && !is_excluded(sub, event)
    }

    fn asset_matches(&self, sub: &Subscription, asset_id: &str) -> bool {
        match sub.asset_selector() {
            AssetSelector::Any => true,
            AssetSelector::Assets(assets) => assets.contains(asset_id),
            AssetSelector::Region(region) =>
                self.locations.get(asset_id).is_some_and(|point| region.contains(*point)),
        }
    }
}

fn payload_thresholds_met(sub: &Subscription, event: &Event) -> bool {
    sub.payload_min.iter().all(|(path, min)| {
        event.payload_value(path).and_then(serde_json::Value::as_f64).is_some_and(|v| v >= *min)
    })
}

fn is_excluded(sub: &Subscription, event: &Event) -> bool {
    !sub.suppress_if.is_empty()
        && sub.suppress_if.iter().all(|(path, expected)| {
            event.payload_value(path).is_some_and(|actual| values_equal(actual, expected))
        })
}

/// JSON equality that treats `1` and `1.0` as the same number.
fn values_equal(a: &serde_json::Value, b: &serde_json::Value) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) if a.is_number() && b.is_number() => x == y,
        _ => a == b,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::{
        models::geo::Region,
        test_helpers::{EventBuilder, SubscriptionBuilder},
    };

    fn ids(result: &MatchResult) -> Vec<&str> {
        result.matching_subscription_ids.iter().map(String::as_str).collect()
    }

    #[test]
    fn test_wildcard_subscription_matches_everything() {
        let engine = FilterEngine::new(vec![SubscriptionBuilder::new("all").build()], &[]);
        let result = engine.match_event(&EventBuilder::new("e1").build());
        assert!(result.matched);
        assert_eq!(ids(&result), vec!["all"]);
    }

    #[test]
    fn test_topic_severity_and_rule_type_predicates() {
        let engine = FilterEngine::new(
            vec![
                SubscriptionBuilder::new("policy_high")
                    .topics(&["policy.enforcement"])
                    .min_severity(4)
                    .build(),
                SubscriptionBuilder::new("emissions_only").rule_types(&["emissions"]).build(),
                SubscriptionBuilder::new("odd_severities").severities(&[1, 3, 5]).build(),
            ],
            &[],
        );

        let high = EventBuilder::new("e1").severity(4).rule_code("water.discharge").build();
        assert_eq!(ids(&engine.match_event(&high)), vec!["policy_high"]);

        let medium = EventBuilder::new("e2").severity(3).rule_code("emissions.co2").build();
        assert_eq!(ids(&engine.match_event(&medium)), vec!["emissions_only", "odd_severities"]);

        let other_topic = EventBuilder::new("e3").topic("sat.change").severity(2).rule_code("ndvi").build();
        let result = engine.match_event(&other_topic);
        assert!(!result.matched);
        assert!(result.matching_subscription_ids.is_empty());
    }

    #[test]
    fn test_disabled_subscription_never_matches() {
        let engine = FilterEngine::new(vec![SubscriptionBuilder::new("off").disabled().build()], &[]);
        assert!(!engine.match_event(&EventBuilder::new("e1").build()).matched);
    }

    #[test]
    fn test_explicit_assets_and_region_selectors() {
        let assets = vec![
            AssetLocation { asset_id: "inside".into(), lat: 0.5, lon: 0.5 },
            AssetLocation { asset_id: "outside".into(), lat: 5.0, lon: 5.0 },
        ];
        let region = Region::Bbox { min_lat: 0.0, min_lon: 0.0, max_lat: 1.0, max_lon: 1.0 };
        let engine = FilterEngine::new(
            vec![
                SubscriptionBuilder::new("listed").assets(&["outside"]).build(),
                SubscriptionBuilder::new("aoi").region(region).build(),
            ],
            &assets,
        );

        assert_eq!(ids(&engine.match_event(&EventBuilder::new("e1").asset("inside").build())), vec!["aoi"]);
        assert_eq!(ids(&engine.match_event(&EventBuilder::new("e2").asset("outside").build())), vec![
            "listed"
        ]);
        // No registered location: the region cannot contain it.
        assert!(!engine.match_event(&EventBuilder::new("e3").asset("unknown").build()).matched);
    }

    #[test]
    fn test_payload_min_and_suppress_if() {
        let engine = FilterEngine::new(
            vec![
                SubscriptionBuilder::new("big_drop")
                    .payload_min("delta.ndvi", 0.2)
                    .suppress_if("source", json!("test"))
                    .suppress_if("retries", json!(1))
                    .build(),
            ],
            &[],
        );

        let big = EventBuilder::new("e1").payload(json!({"delta": {"ndvi": 0.25}})).build();
        assert!(engine.match_event(&big).matched);

        let small = EventBuilder::new("e2").payload(json!({"delta": {"ndvi": 0.1}})).build();
        assert!(!engine.match_event(&small).matched);

        let missing = EventBuilder::new("e3").payload(json!({"delta": {}})).build();
        assert!(!engine.match_event(&missing).matched);

        let excluded = EventBuilder::new("e4")
            .payload(json!({"delta": {"ndvi": 0.9}, "source": "test", "retries": 1.0}))
            .build();
        assert!(!engine.match_event(&excluded).matched);

        // Only one of the two exclusion conditions holds.
        let partial = EventBuilder::new("e5")
            .payload(json!({"delta": {"ndvi": 0.9}, "source": "test", "retries": 2}))
            .build();
        assert!(engine.match_event(&partial).matched);
    }
}
