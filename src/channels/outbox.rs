use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::channels::error::ChannelError;

/// Where channel stubs drop the messages they would have sent.
///
/// Messages land in `<dir>/<channel_id>/<event_key>.json`. Without a
/// directory the stubs only log.
#[derive(Debug, Clone, Default)]
pub struct Outbox {
    dir: Option<PathBuf>,
}

impl Outbox {
    /// Creates an outbox rooted at `dir`, or a log-only outbox for `None`.
    pub fn new(dir: Option<&Path>) -> Self {
        Self { dir: dir.map(Path::to_path_buf) }
    }

    /// Writes `message` for the given channel and event. Returns the file
    /// path, or `None` for a log-only outbox.
    pub async fn write<T: Serialize + Sync>(
        &self,
        channel_id: &str,
        event_key: &str,
        message: &T,
    ) -> Result<Option<PathBuf>, ChannelError> {
        let Some(dir) = &self.dir else {
            return Ok(None);
        };
        let channel_dir = dir.join(file_safe(channel_id));
        tokio::fs::create_dir_all(&channel_dir).await?;

        let path = channel_dir.join(format!("{}.json", file_safe(event_key)));
        let body = serde_json::to_vec_pretty(message)?;
        tokio::fs::write(&path, body).await?;
        Ok(Some(path))
    }
}

/// Percent-encodes every byte outside `[A-Za-z0-9._-]`, so distinct names
/// map to distinct files.
fn file_safe(name: &str) -> String {
    let mut safe = String::with_capacity(name.len());
    for byte in name.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'_' | b'.') {
            safe.push(char::from(byte));
        } else {
            safe.push_str(&format!("%{byte:02X}"));
        }
    }
    safe
}
