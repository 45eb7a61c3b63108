//! Load/commit boundaries for everything the pipeline persists between runs.

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use crate::{
    models::{feed_item::AlertFeedItem, suppression_state::SuppressionState},
    persistence::error::PersistenceError,
};

/// Durable home of the suppression engine's dedupe and flapping records.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Loads the persisted state; a store that was never written (or was
    /// reset) yields an empty state.
    async fn load(&self) -> Result<SuppressionState, PersistenceError>;

    /// Replaces the persisted state with `state` as a single unit.
    async fn commit(&self, state: &SuppressionState) -> Result<(), PersistenceError>;

    /// Discards the persisted state. The next `load` returns an empty state.
    async fn reset(&self) -> Result<(), PersistenceError>;
}

/// Durable home of the alert feed.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait FeedStore: Send + Sync {
    /// Loads every persisted feed item.
    async fn load(&self) -> Result<Vec<AlertFeedItem>, PersistenceError>;

    /// Replaces the persisted feed with `items`.
    async fn save(&self, items: &[AlertFeedItem]) -> Result<(), PersistenceError>;
}
