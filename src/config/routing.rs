use serde::{Deserialize, Serialize};

/// Channel routing options.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct RoutingConfig {
    /// Also record `skipped` deliveries for channels that were disabled or
    /// whose filter did not match. Off by default, so an alert that matches
    /// no channel leaves no delivery records.
    pub audit_skipped_channels: bool,
}
