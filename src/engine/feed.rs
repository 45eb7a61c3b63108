//! The alert feed: the ordered, `event_key`-deduplicated union of every kept
//! alert across runs.

use std::collections::HashSet;

use crate::models::feed_item::AlertFeedItem;

/// What an upsert did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedUpsert {
    /// The item was new and is now in the feed.
    Appended,
    /// An item with the same `event_key` was already present; nothing changed.
    Duplicate,
}

/// In-memory feed, always sorted by `(occurred_at, event_key)`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AlertFeed {
    items: Vec<AlertFeedItem>,
    keys: HashSet<String>,
}

impl AlertFeed {
    /// An empty feed.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a feed from persisted items, restoring order and dropping
    /// repeated event keys (first occurrence wins).
    pub fn from_items(items: Vec<AlertFeedItem>) -> Self {
        let mut feed = Self::new();
        for item in items {
            feed.upsert(item);
        }
        feed
    }

    /// Inserts `item` at its ordered position unless its `event_key` is
    /// already present.
    pub fn upsert(&mut self, item: AlertFeedItem) -> FeedUpsert {
        if self.keys.contains(&item.event_key) {
            return FeedUpsert::Duplicate;
        }
        let position = self.items.partition_point(|existing| existing.order_key() < item.order_key());
        self.keys.insert(item.event_key.clone());
        self.items.insert(position, item);
        FeedUpsert::Appended
    }

    /// Whether an item with `event_key` is present.
    pub fn contains(&self, event_key: &str) -> bool {
        self.keys.contains(event_key)
    }

    /// Items in feed order.
    pub fn items(&self) -> &[AlertFeedItem] {
        &self.items
    }

    /// Up to `limit` items, newest first. The portal view.
    pub fn latest(&self, limit: usize) -> Vec<&AlertFeedItem> {
        self.items.iter().rev().take(limit).collect()
    }

    /// Number of items.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the feed is empty.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;
    use crate::test_helpers::EventBuilder;

    fn item(key: &str, secs: i64) -> AlertFeedItem {
        let event = EventBuilder::new(key).at(secs).build();
        AlertFeedItem::from_kept(&event, "dk", event.occurred_at, 1, &BTreeSet::new())
    }

    fn keys(feed: &AlertFeed) -> Vec<&str> {
        feed.items().iter().map(|i| i.event_key.as_str()).collect()
    }

    #[test]
    fn test_upsert_keeps_order_and_ignores_duplicates() {
        let mut feed = AlertFeed::new();
        assert_eq!(feed.upsert(item("c", 200)), FeedUpsert::Appended);
        assert_eq!(feed.upsert(item("a", 0)), FeedUpsert::Appended);
        assert_eq!(feed.upsert(item("b2", 100)), FeedUpsert::Appended);
        assert_eq!(feed.upsert(item("b1", 100)), FeedUpsert::Appended);

        // Same key, different content: the first version stays.
        let mut replay = item("a", 0);
        replay.occurrence_count = 7;
        assert_eq!(feed.upsert(replay), FeedUpsert::Duplicate);

        assert_eq!(keys(&feed), vec!["a", "b1", "b2", "c"]);
        assert_eq!(feed.items()[0].occurrence_count, 1);
        assert!(feed.contains("b1"));
        assert_eq!(feed.len(), 4);
    }

    #[test]
    fn test_from_items_is_order_independent() {
        let forward = AlertFeed::from_items(vec![item("a", 0), item("b", 10), item("c", 20)]);
        let shuffled =
            AlertFeed::from_items(vec![item("c", 20), item("a", 0), item("b", 10), item("a", 0)]);

        assert_eq!(forward, shuffled);
        assert_eq!(
            serde_json::to_string(forward.items()).unwrap(),
            serde_json::to_string(shuffled.items()).unwrap()
        );
    }

    #[test]
    fn test_latest_is_newest_first() {
        let feed = AlertFeed::from_items(vec![item("a", 0), item("b", 10), item("c", 20)]);
        let latest: Vec<_> = feed.latest(2).into_iter().map(|i| i.event_key.as_str()).collect();
        assert_eq!(latest, vec!["c", "b"]);
        assert_eq!(feed.latest(10).len(), 3);
        assert!(AlertFeed::new().latest(5).is_empty());
    }
}
