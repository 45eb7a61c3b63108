use serde::Serialize;
use url::Url;

use crate::{
    channels::{error::ChannelError, outbox::Outbox, traits::Channel},
    models::{channel::WebhookSettings, feed_item::AlertFeedItem},
};

/// The request a webhook stub would post.
#[derive(Debug, Serialize)]
struct WebhookMessage<'a> {
    channel_id: &'a str,
    url: &'a Url,
    method: &'static str,
    body: &'a AlertFeedItem,
}

/// A webhook channel stub. No network call is made.
pub struct WebhookChannel {
    channel_id: String,
    settings: WebhookSettings,
    outbox: Outbox,
}

impl WebhookChannel {
    /// Creates a new `WebhookChannel`.
    pub fn new(channel_id: &str, settings: WebhookSettings, outbox: Outbox) -> Self {
        Self { channel_id: channel_id.to_string(), settings, outbox }
    }
}

#[async_trait::async_trait]
impl Channel for WebhookChannel {
    async fn deliver(&self, alert: &AlertFeedItem) -> Result<(), ChannelError> {
        let message = WebhookMessage {
            channel_id: &self.channel_id,
            url: &self.settings.url,
            method: "POST",
            body: alert,
        };
        let path = self.outbox.write(&self.channel_id, &alert.event_key, &message).await?;
        tracing::info!(
            channel_id = %self.channel_id,
            event_key = %alert.event_key,
            url = %self.settings.url,
            outbox = ?path,
            "Webhook stub delivered alert."
        );
        Ok(())
    }
}
