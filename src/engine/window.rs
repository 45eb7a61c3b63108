//! Bounded time-window counter shared by channel rate limiting and flapping
//! detection.

use std::collections::VecDeque;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

/// Ordered timestamps observed inside a rolling window.
///
/// The window itself is supplied on every call so the persisted form stays a
/// plain list of timestamps. An entry is evicted once `now - entry >= window`,
/// so a zero-length window only ever holds entries stamped exactly `now`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SlidingWindow {
    entries: VecDeque<DateTime<Utc>>,
}

impl SlidingWindow {
    /// Creates an empty window.
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops every entry that has aged out of `window` relative to `now`.
    pub fn evict(&mut self, now: DateTime<Utc>, window: TimeDelta) {
        // Entries stamped after `now` (out-of-order input) are kept.
        self.entries.retain(|entry| now.signed_duration_since(*entry) < window);
    }

    /// Records an occurrence at `now`, keeping the entries sorted.
    pub fn record(&mut self, now: DateTime<Utc>) {
        let position = self.entries.partition_point(|entry| *entry <= now);
        self.entries.insert(position, now);
    }

    /// Evicts, then records `now` only if fewer than `capacity` entries remain.
    /// Returns whether the occurrence was admitted.
    pub fn try_acquire(&mut self, now: DateTime<Utc>, window: TimeDelta, capacity: usize) -> bool {
        self.evict(now, window);
        if self.entries.len() < capacity {
            self.record(now);
            true
        } else {
            false
        }
    }

    /// Number of entries currently held.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the window is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Removes every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// The recorded timestamps, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &DateTime<Utc>> {
        self.entries.iter()
    }
}
