//! A set of helpers for testing

mod channel;
mod event;
mod settings;
mod subscription;

pub use channel::ChannelBuilder;
pub use event::{EventBuilder, at, base_time};
pub use settings::suppression_settings;
pub use subscription::SubscriptionBuilder;
