//! # Channels
//!
//! Delivery stubs for the routing targets defined in `channels.yaml`. A stub
//! logs the alert it would send and, when an outbox directory is configured,
//! writes the message as JSON so runs can be inspected. No network calls are
//! made.
//!
//! - **`Channel` trait**: the interface the router hands kept alerts to.
//! - **`EmailChannel`** / **`WebhookChannel`**: the two stub transports.
//! - **`Outbox`**: the shared `<outbox>/<channel_id>/<event_key>.json` writer.

use std::path::Path;

use crate::models::channel::{ChannelConfig, ChannelType};

mod email;
pub mod error;
mod outbox;
mod traits;
mod webhook;

pub use email::EmailChannel;
pub use outbox::Outbox;
#[cfg(test)]
pub use traits::MockChannel;
pub use traits::Channel;
pub use webhook::WebhookChannel;

/// Builds the stub transport for a channel definition.
pub fn build_channel(config: &ChannelConfig, outbox_dir: Option<&Path>) -> Box<dyn Channel> {
    let outbox = Outbox::new(outbox_dir);
    match &config.kind {
        ChannelType::Email(settings) =>
            Box::new(EmailChannel::new(&config.channel_id, settings.clone(), outbox)),
        ChannelType::Webhook(settings) =>
            Box::new(WebhookChannel::new(&config.channel_id, settings.clone(), outbox)),
    }
}
