//! Configuration module: application settings, suppression parameters and
//! shared serde helpers.

mod app_config;
mod error;
mod helpers;
mod routing;
mod suppression;

pub use app_config::{AppConfig, checked_time_delta};
pub use error::ConfigurationError;
pub use helpers::{deserialize_duration_from_seconds, serialize_duration_to_seconds};
pub use routing::RoutingConfig;
pub use suppression::{DedupeConfig, FlappingConfig};
