use thiserror::Error;

use crate::models::{
    channel::ChannelConfigError, geo::AssetLoaderError, subscription::SubscriptionError,
};

/// Fatal configuration problems. A run aborts before processing any event.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    /// `app.yaml` or its environment overrides could not be read.
    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),

    /// `subscriptions.yaml` is unreadable or invalid.
    #[error(transparent)]
    Subscriptions(#[from] SubscriptionError),

    /// `channels.yaml` is unreadable or invalid.
    #[error(transparent)]
    Channels(#[from] ChannelConfigError),

    /// `assets.yaml` is unreadable or invalid.
    #[error(transparent)]
    Assets(#[from] AssetLoaderError),

    /// A flap threshold below one.
    #[error("flapping.threshold must be at least 1, got {0}")]
    InvalidFlapThreshold(u32),

    /// A key definition without fields.
    #[error("{0}.key_fields cannot be empty")]
    EmptyKeyFields(&'static str),

    /// A duration too large to add to a timestamp.
    #[error("{field} of {secs}s exceeds the supported maximum of {max}s")]
    DurationOutOfRange {
        /// The offending field.
        field: &'static str,
        /// The configured value.
        secs: u64,
        /// The supported maximum.
        max: u64,
    },

    /// Two items of the same kind share an id.
    #[error("duplicate {kind} id '{id}'")]
    DuplicateId {
        /// "subscription", "channel" or "asset".
        kind: &'static str,
        /// The repeated id.
        id: String,
    },
}
