//! This module contains the data models for the alert pipeline.

pub mod channel;
pub mod delivery;
pub mod event;
pub mod feed_item;
pub mod geo;
pub mod key_field;
pub mod subscription;
pub mod suppression_state;

pub use channel::{ChannelConfig, ChannelFilter, ChannelType, RateLimitPolicy};
pub use delivery::{DeliveryOutcome, DeliveryRecord, SkipReason};
pub use event::{Event, EventStatus, Severity};
pub use feed_item::AlertFeedItem;
pub use geo::{AssetLocation, GeoPoint, Region};
pub use key_field::KeyField;
pub use subscription::{SeverityFilter, Subscription};
pub use suppression_state::{DedupeRecord, FlappingRecord, SuppressionState};
