//! Subscriptions: standing interest filters loaded from `subscriptions.yaml`.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    loader::{Loadable, LoaderError},
    models::{
        event::Severity,
        geo::{GeoError, Region},
    },
};

fn default_enabled() -> bool {
    true
}

/// Severity predicate shared by subscriptions and channel filters: an
/// explicit set and/or an inclusive range. Everything empty means any
/// severity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityFilter {
    /// Explicit allowed severities.
    #[serde(default)]
    pub severities: BTreeSet<Severity>,

    /// Inclusive lower bound.
    #[serde(default)]
    pub min_severity: Option<Severity>,

    /// Inclusive upper bound.
    #[serde(default)]
    pub max_severity: Option<Severity>,
}

impl SeverityFilter {
    /// Returns true if `severity` passes the set and the range.
    pub fn matches(&self, severity: Severity) -> bool {
        if !self.severities.is_empty() && !self.severities.contains(&severity) {
            return false;
        }
        if self.min_severity.is_some_and(|min| severity < min) {
            return false;
        }
        if self.max_severity.is_some_and(|max| severity > max) {
            return false;
        }
        true
    }

    /// A range whose lower bound exceeds its upper bound can never match.
    pub fn is_contradictory(&self) -> bool {
        matches!((self.min_severity, self.max_severity), (Some(min), Some(max)) if min > max)
    }
}

/// How a subscription selects assets.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AssetSelector<'a> {
    /// Every asset.
    Any,
    /// Explicit asset-id membership.
    Assets(&'a BTreeSet<String>),
    /// Assets whose registered location lies inside the region.
    Region(&'a Region),
}

/// A standing interest filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subscription {
    /// Unique subscription id.
    pub id: String,

    /// Topics of interest. Empty means any topic.
    #[serde(default)]
    pub topics: BTreeSet<String>,

    /// Severity set and/or range.
    #[serde(flatten)]
    pub severity: SeverityFilter,

    /// Explicit asset ids. Empty or `"*"` means any asset.
    #[serde(default)]
    pub assets: BTreeSet<String>,

    /// Area-of-interest selector, exclusive with `assets`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<Region>,

    /// Rule types (namespace of `rule_code`). Empty means any rule.
    #[serde(default)]
    pub rule_types: BTreeSet<String>,

    /// Numeric payload thresholds: the value at each path must be at least
    /// the given number.
    #[serde(default)]
    pub payload_min: BTreeMap<String, f64>,

    /// Exclusion rule: the event is dropped when every listed payload path
    /// equals the given value.
    #[serde(default)]
    pub suppress_if: BTreeMap<String, serde_json::Value>,

    /// Disabled subscriptions never match.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

impl Subscription {
    /// The effective asset selector.
    pub fn asset_selector(&self) -> AssetSelector<'_> {
        if let Some(region) = &self.region {
            return AssetSelector::Region(region);
        }
        if self.assets.is_empty() || self.assets.contains("*") {
            AssetSelector::Any
        } else {
            AssetSelector::Assets(&self.assets)
        }
    }
}

/// Errors raised while loading or validating subscriptions.
#[derive(Debug, Error)]
pub enum SubscriptionError {
    /// The file could not be loaded.
    #[error("Failed to load subscriptions: {0}")]
    Loader(#[from] LoaderError),

    /// A subscription without an id.
    #[error("Subscription id cannot be empty.")]
    EmptyId,

    /// Both an explicit asset list and a region were given.
    #[error("Subscription '{0}' sets both 'assets' and 'region'; choose one asset selector.")]
    ConflictingAssetSelector(String),

    /// The region geometry is invalid.
    #[error("Subscription '{id}' has an invalid region: {source}")]
    InvalidRegion {
        /// The subscription id.
        id: String,
        /// The geometry error.
        source: GeoError,
    },

    /// `min_severity` is greater than `max_severity`.
    #[error("Subscription '{0}' has min_severity greater than max_severity.")]
    ContradictorySeverityRange(String),
}

impl Loadable for Subscription {
    type Error = SubscriptionError;

    const KEY: &'static str = "subscriptions";

    fn validate(&mut self) -> Result<(), Self::Error> {
        if self.id.trim().is_empty() {
            return Err(SubscriptionError::EmptyId);
        }
        let explicit_assets = !self.assets.is_empty() && !self.assets.contains("*");
        if let Some(region) = &self.region {
            if explicit_assets {
                return Err(SubscriptionError::ConflictingAssetSelector(self.id.clone()));
            }
            region
                .validate()
                .map_err(|source| SubscriptionError::InvalidRegion { id: self.id.clone(), source })?;
        }
        if self.severity.is_contradictory() {
            return Err(SubscriptionError::ContradictorySeverityRange(self.id.clone()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use tempfile::TempDir;

    use super::*;
    use crate::{loader::load_config, test_helpers::SubscriptionBuilder};

    fn sev(value: i64) -> Severity {
        Severity::new(value).unwrap()
    }

    fn write(dir: &TempDir, content: &str) -> PathBuf {
        let path = dir.path().join("subscriptions.yaml");
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_severity_filter_set_and_range() {
        let filter = SeverityFilter {
            severities: [sev(2), sev(4), sev(5)].into(),
            min_severity: Some(sev(3)),
            max_severity: None,
        };
        assert!(!filter.matches(sev(2)));
        assert!(!filter.matches(sev(3)));
        assert!(filter.matches(sev(4)));
        assert!(SeverityFilter::default().matches(sev(1)));
    }

    #[test]
    fn test_asset_selector_variants() {
        let any = SubscriptionBuilder::new("s1").assets(&["*"]).build();
        assert_eq!(any.asset_selector(), AssetSelector::Any);

        let explicit = SubscriptionBuilder::new("s2").assets(&["asset_1"]).build();
        assert!(matches!(explicit.asset_selector(), AssetSelector::Assets(set) if set.len() == 1));

        let region = Region::Bbox { min_lat: 0.0, min_lon: 0.0, max_lat: 1.0, max_lon: 1.0 };
        let aoi = SubscriptionBuilder::new("s3").region(region.clone()).build();
        assert_eq!(aoi.asset_selector(), AssetSelector::Region(&region));
    }

    #[test]
    fn test_validate_rejects_conflicting_selector() {
        let mut sub = SubscriptionBuilder::new("s1")
            .assets(&["asset_1"])
            .region(Region::Bbox { min_lat: 0.0, min_lon: 0.0, max_lat: 1.0, max_lon: 1.0 })
            .build();
        assert!(matches!(sub.validate(), Err(SubscriptionError::ConflictingAssetSelector(_))));
    }

    #[test]
    fn test_validate_rejects_inverted_severity_range() {
        let mut sub = SubscriptionBuilder::new("s1").severity_range(5, 2).build();
        assert!(matches!(sub.validate(), Err(SubscriptionError::ContradictorySeverityRange(_))));
    }

    #[test]
    fn test_load_subscriptions_from_yaml() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            r#"
subscriptions:
  - id: policy_high_plus
    topics: ["policy.enforcement"]
    min_severity: 4
    assets: ["*"]
    rule_types: ["emissions"]
  - id: sat_ndvi_drop
    topics: ["sat.change"]
    severities: [3, 4, 5]
    region:
      bbox: { min_lat: -5.0, min_lon: 30.0, max_lat: 5.0, max_lon: 40.0 }
    payload_min:
      delta.ndvi: 0.2
  - id: muted
    enabled: false
"#,
        );

        let subs = load_config::<Subscription>(path).unwrap();
        assert_eq!(subs.len(), 3);
        assert_eq!(subs[0].severity.min_severity, Some(sev(4)));
        assert_eq!(subs[1].severity.severities.len(), 3);
        assert!(matches!(subs[1].region, Some(Region::Bbox { .. })));
        assert_eq!(subs[1].payload_min.get("delta.ndvi"), Some(&0.2));
        assert!(!subs[2].enabled);
        assert!(subs[0].enabled);
    }

    #[test]
    fn test_load_subscriptions_rejects_invalid_severity() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            r#"
subscriptions:
  - id: broken
    severities: [7]
"#,
        );

        assert!(matches!(load_config::<Subscription>(path), Err(SubscriptionError::Loader(_))));
    }
}
