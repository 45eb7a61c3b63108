//! Human-readable JSON file stores, replaced atomically on every write.

use std::{
    ffi::OsString,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use serde::Serialize;
use tokio::io::AsyncWriteExt;

use crate::{
    models::{
        feed_item::AlertFeedItem,
        suppression_state::{STATE_VERSION, SuppressionState},
    },
    persistence::{
        error::PersistenceError,
        traits::{FeedStore, StateStore},
    },
};

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> PersistenceError + '_ {
    move |source| PersistenceError::Io { path: path.to_path_buf(), source }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut tmp = OsString::from(path.as_os_str());
    tmp.push(".tmp");
    PathBuf::from(tmp)
}

/// Writes `bytes` to `<path>.tmp`, syncs it, then renames it over `path`.
/// Readers see either the old file or the new one, never a partial write.
pub async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), PersistenceError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(io_error(parent))?;
    }

    let tmp = tmp_path(path);
    let mut file = tokio::fs::File::create(&tmp).await.map_err(io_error(&tmp))?;
    file.write_all(bytes).await.map_err(io_error(&tmp))?;
    file.flush().await.map_err(io_error(&tmp))?;
    file.sync_all().await.map_err(io_error(&tmp))?;
    drop(file);

    tokio::fs::rename(&tmp, path).await.map_err(io_error(path))?;
    Ok(())
}

/// Serializes `value` as pretty JSON (with a trailing newline) and writes it
/// atomically.
pub async fn write_json_atomic<T: Serialize + ?Sized>(
    path: &Path,
    value: &T,
) -> Result<(), PersistenceError> {
    let mut bytes = serde_json::to_vec_pretty(value)?;
    bytes.push(b'\n');
    write_atomic(path, &bytes).await
}

/// Reads `path`, returning `None` when it does not exist.
async fn read_optional(path: &Path) -> Result<Option<Vec<u8>>, PersistenceError> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(io_error(path)(e)),
    }
}

/// Suppression state kept in a single versioned JSON document.
#[derive(Debug, Clone)]
pub struct JsonFileStateStore {
    path: PathBuf,
}

impl JsonFileStateStore {
    /// Creates a store backed by `path`. Nothing is read until `load`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl StateStore for JsonFileStateStore {
    #[tracing::instrument(skip(self), fields(path = %self.path.display()), level = "debug")]
    async fn load(&self) -> Result<SuppressionState, PersistenceError> {
        let Some(bytes) = read_optional(&self.path).await? else {
            tracing::info!("No suppression state found, starting from a clean slate.");
            return Ok(SuppressionState::default());
        };

        let corrupt = |source| PersistenceError::Corrupt { path: self.path.clone(), source };
        let value: serde_json::Value = serde_json::from_slice(&bytes).map_err(corrupt)?;
        let found = value.get("version").and_then(serde_json::Value::as_u64).unwrap_or(0);
        if found != u64::from(STATE_VERSION) {
            return Err(PersistenceError::UnsupportedVersion {
                path: self.path.clone(),
                found: u32::try_from(found).unwrap_or(u32::MAX),
                expected: STATE_VERSION,
            });
        }
        let state: SuppressionState = serde_json::from_value(value).map_err(corrupt)?;

        tracing::debug!(
            dedupe_records = state.dedupe.len(),
            flapping_records = state.flapping.len(),
            "Suppression state loaded."
        );
        Ok(state)
    }

    #[tracing::instrument(skip(self, state), fields(path = %self.path.display()), level = "debug")]
    async fn commit(&self, state: &SuppressionState) -> Result<(), PersistenceError> {
        write_json_atomic(&self.path, state).await?;
        tracing::debug!(
            dedupe_records = state.dedupe.len(),
            flapping_records = state.flapping.len(),
            "Suppression state committed."
        );
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(path = %self.path.display()), level = "debug")]
    async fn reset(&self) -> Result<(), PersistenceError> {
        for path in [self.path.clone(), tmp_path(&self.path)] {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => tracing::info!(path = %path.display(), "Removed suppression state file."),
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(io_error(&path)(e)),
            }
        }
        Ok(())
    }
}

/// The alert feed kept as a pretty JSON array.
#[derive(Debug, Clone)]
pub struct JsonFileFeedStore {
    path: PathBuf,
}

impl JsonFileFeedStore {
    /// Creates a store backed by `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl FeedStore for JsonFileFeedStore {
    #[tracing::instrument(skip(self), fields(path = %self.path.display()), level = "debug")]
    async fn load(&self) -> Result<Vec<AlertFeedItem>, PersistenceError> {
        let Some(bytes) = read_optional(&self.path).await? else {
            return Ok(Vec::new());
        };
        serde_json::from_slice(&bytes)
            .map_err(|source| PersistenceError::Corrupt { path: self.path.clone(), source })
    }

    #[tracing::instrument(skip(self, items), fields(path = %self.path.display(), items = items.len()), level = "debug")]
    async fn save(&self, items: &[AlertFeedItem]) -> Result<(), PersistenceError> {
        write_json_atomic(&self.path, items).await
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;
    use crate::{
        models::suppression_state::{DedupeRecord, FlappingRecord},
        test_helpers::{EventBuilder, at},
    };

    fn sample_state() -> SuppressionState {
        let mut state = SuppressionState { updated_at: Some(at(500)), ..Default::default() };
        state.dedupe.insert("k".into(), DedupeRecord::new("k", at(0)));
        let mut flapping = FlappingRecord::new("f");
        flapping.transition_history.record(at(100));
        state.flapping.insert("f".into(), flapping);
        state
    }

    #[tokio::test]
    async fn test_missing_state_file_is_empty_state() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStateStore::new(dir.path().join("state.json"));
        assert_eq!(store.load().await.unwrap(), SuppressionState::default());
    }

    #[tokio::test]
    async fn test_commit_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStateStore::new(dir.path().join("nested").join("state.json"));
        let state = sample_state();

        store.commit(&state).await.unwrap();

        assert_eq!(store.load().await.unwrap(), state);
        assert!(!tmp_path(store.path()).exists());
        let text = std::fs::read_to_string(store.path()).unwrap();
        assert!(text.contains("\"version\": 1"));
    }

    #[tokio::test]
    async fn test_corrupt_state_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, "{ not json").unwrap();

        let store = JsonFileStateStore::new(&path);
        assert!(matches!(store.load().await, Err(PersistenceError::Corrupt { .. })));
        // Never silently replaced.
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "{ not json");
    }

    #[tokio::test]
    async fn test_unsupported_version_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, r#"{"version": 2, "dedupe": {}, "flapping": {}}"#).unwrap();

        let store = JsonFileStateStore::new(&path);
        assert!(matches!(
            store.load().await,
            Err(PersistenceError::UnsupportedVersion { found: 2, expected: 1, .. })
        ));
    }

    #[tokio::test]
    async fn test_reset_removes_state() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStateStore::new(dir.path().join("state.json"));
        store.commit(&sample_state()).await.unwrap();

        store.reset().await.unwrap();
        assert_eq!(store.load().await.unwrap(), SuppressionState::default());
        // Resetting twice is fine.
        store.reset().await.unwrap();
    }

    #[tokio::test]
    async fn test_feed_store_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileFeedStore::new(dir.path().join("feed.json"));
        assert!(store.load().await.unwrap().is_empty());

        let event = EventBuilder::new("e1").build();
        let item = AlertFeedItem::from_kept(&event, "k", event.occurred_at, 1, &BTreeSet::new());
        store.save(std::slice::from_ref(&item)).await.unwrap();

        assert_eq!(store.load().await.unwrap(), vec![item]);
    }
}
