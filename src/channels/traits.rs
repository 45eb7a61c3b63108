use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use crate::{channels::error::ChannelError, models::feed_item::AlertFeedItem};

/// A routing target that a kept alert can be handed to.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Channel: Send + Sync {
    /// Hands `alert` to the channel.
    async fn deliver(&self, alert: &AlertFeedItem) -> Result<(), ChannelError>;
}
