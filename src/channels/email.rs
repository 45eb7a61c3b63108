use serde::Serialize;

use crate::{
    channels::{error::ChannelError, outbox::Outbox, traits::Channel},
    models::{channel::EmailSettings, feed_item::AlertFeedItem},
};

/// The message an email stub would send.
#[derive(Debug, Serialize)]
struct EmailMessage<'a> {
    channel_id: &'a str,
    to: &'a [String],
    subject: String,
    body: String,
    payload: &'a serde_json::Value,
}

/// An email channel stub: logs the message and drops it in the outbox.
pub struct EmailChannel {
    channel_id: String,
    settings: EmailSettings,
    outbox: Outbox,
}

impl EmailChannel {
    /// Creates a new `EmailChannel`.
    pub fn new(channel_id: &str, settings: EmailSettings, outbox: Outbox) -> Self {
        Self { channel_id: channel_id.to_string(), settings, outbox }
    }

    fn subject(&self, alert: &AlertFeedItem) -> String {
        match &self.settings.subject_prefix {
            Some(prefix) => format!("{} {}", prefix, alert.title),
            None => alert.title.clone(),
        }
    }
}

fn render_body(alert: &AlertFeedItem) -> String {
    let subscriptions = alert.subscription_ids.iter().cloned().collect::<Vec<_>>().join(", ");
    format!(
        "{}\n\nTopic: {}\nAsset: {}\nRule: {}\nSeverity: {} ({})\nStatus: {}\nOccurred at: {}\nFirst seen: {}\nOccurrences: {}\nSubscriptions: {}\nEvent: {}\n",
        alert.title,
        alert.topic,
        alert.asset_id,
        alert.rule_code,
        alert.severity,
        alert.severity.label(),
        alert.status,
        alert.occurred_at.to_rfc3339(),
        alert.first_seen_at.to_rfc3339(),
        alert.occurrence_count,
        subscriptions,
        alert.event_key,
    )
}

#[async_trait::async_trait]
impl Channel for EmailChannel {
    async fn deliver(&self, alert: &AlertFeedItem) -> Result<(), ChannelError> {
        let message = EmailMessage {
            channel_id: &self.channel_id,
            to: &self.settings.to,
            subject: self.subject(alert),
            body: render_body(alert),
            payload: &alert.payload,
        };
        let path = self.outbox.write(&self.channel_id, &alert.event_key, &message).await?;
        tracing::info!(
            channel_id = %self.channel_id,
            event_key = %alert.event_key,
            to = ?self.settings.to,
            subject = %message.subject,
            outbox = ?path,
            "Email stub delivered alert."
        );
        Ok(())
    }
}
