//! Durable record of completed posts.
//!
//! The checkpoint file is a pretty-printed JSON object keyed by post id:
//!
//! ```json
//! {
//!   "7345": { "timestamp": "2024-03-01T12:00:00.000Z" },
//!   "7346": { "timestamp": "2024-03-02T08:30:00.000Z", "failed_media": ["video.mp4"] }
//! }
//! ```
//!
//! Presence of a record is the only signal that a post is fully processed.
//! Every [`CheckpointStore::commit`] rewrites the whole file through a
//! temporary sibling and an atomic rename, so the file on disk is always a
//! complete snapshot of some committed state.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, instrument};

/// Renders an instant as ISO 8601 UTC with millisecond precision and a `Z`.
#[must_use]
pub fn format_iso_millis(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Millis, true)
}

mod iso_millis {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub(super) fn serialize<S: Serializer>(
        instant: &DateTime<Utc>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_iso_millis(*instant))
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<DateTime<Utc>, D::Error> {
        DateTime::<Utc>::deserialize(deserializer)
    }
}

/// Completion metadata for one post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointRecord {
    /// The post's resolved creation time.
    #[serde(with = "iso_millis")]
    pub timestamp: DateTime<Utc>,
    /// File names whose fetch failed when the post was processed.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failed_media: Vec<String>,
}

impl CheckpointRecord {
    /// A record with no failed media.
    #[must_use]
    pub fn new(timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            failed_media: Vec::new(),
        }
    }

    /// Attaches the names of media that could not be fetched.
    #[must_use]
    pub fn with_failed_media(mut self, failed_media: Vec<String>) -> Self {
        self.failed_media = failed_media;
        self
    }
}

/// Errors from loading or persisting the checkpoint file. All are fatal to a run.
#[derive(Debug, Error)]
pub enum CheckpointError {
    /// The file exists but could not be read.
    #[error("cannot read checkpoint file {path}: {source}")]
    Read {
        /// Checkpoint path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The file is not a valid checkpoint mapping.
    #[error("checkpoint file {path} is corrupt: {source}")]
    Corrupt {
        /// Checkpoint path.
        path: PathBuf,
        /// Parser error.
        #[source]
        source: serde_json::Error,
    },

    /// The mapping could not be serialized.
    #[error("cannot serialize checkpoint: {0}")]
    Serialize(#[source] serde_json::Error),

    /// The file could not be written or renamed into place.
    #[error("cannot write checkpoint file {path}: {source}")]
    Write {
        /// Path being written.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
}

impl CheckpointError {
    fn write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Write {
            path: path.into(),
            source,
        }
    }
}

/// In-memory checkpoint mapping bound to its file.
#[derive(Debug)]
pub struct CheckpointStore {
    path: PathBuf,
    records: BTreeMap<String, CheckpointRecord>,
}

impl CheckpointStore {
    /// Loads the mapping from `path`; a missing file yields an empty store.
    ///
    /// # Errors
    ///
    /// Returns [`CheckpointError::Read`] or [`CheckpointError::Corrupt`] when
    /// an existing file cannot be used. Progress is never silently reset.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, CheckpointError> {
        let path = path.as_ref().to_path_buf();
        let records = match tokio::fs::read_to_string(&path).await {
            Ok(text) if text.trim().is_empty() => BTreeMap::new(),
            Ok(text) => serde_json::from_str(&text).map_err(|source| CheckpointError::Corrupt {
                path: path.clone(),
                source,
            })?,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("no checkpoint file yet, starting empty");
                BTreeMap::new()
            }
            Err(source) => return Err(CheckpointError::Read { path, source }),
        };
        info!(records = records.len(), "checkpoint loaded");
        Ok(Self { path, records })
    }

    /// Path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// True if `id` has been committed.
    #[must_use]
    pub fn has(&self, id: &str) -> bool {
        self.records.contains_key(id)
    }

    /// The committed record for `id`.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&CheckpointRecord> {
        self.records.get(id)
    }

    /// Number of committed posts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True when nothing has been committed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records `id` and immediately persists the full mapping.
    ///
    /// # Errors
    ///
    /// Returns [`CheckpointError`] when the file cannot be written; the
    /// previous file contents stay intact in that case.
    pub async fn commit(
        &mut self,
        id: impl Into<String>,
        record: CheckpointRecord,
    ) -> Result<(), CheckpointError> {
        let id = id.into();
        self.records.insert(id.clone(), record);
        let json = serde_json::to_string_pretty(&self.records).map_err(CheckpointError::Serialize)?;
        atomic_write(&self.path, json.as_bytes()).await?;
        debug!(post_id = %id, total = self.records.len(), "checkpoint committed");
        Ok(())
    }
}

async fn atomic_write(path: &Path, data: &[u8]) -> Result<(), CheckpointError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| CheckpointError::write(parent, e))?;
    }

    let file_name = path
        .file_name()
        .map_or_else(|| "checkpoint".into(), |n| n.to_string_lossy().into_owned());
    let temp_path = path.with_file_name(format!(".{file_name}.tmp"));

    let result = write_synced(&temp_path, data).await;
    let result = match result {
        Ok(()) => tokio::fs::rename(&temp_path, path)
            .await
            .map_err(|e| CheckpointError::write(path, e)),
        Err(e) => Err(e),
    };
    if result.is_err() {
        let _ = tokio::fs::remove_file(&temp_path).await;
    }
    result
}

async fn write_synced(temp_path: &Path, data: &[u8]) -> Result<(), CheckpointError> {
    let mut file = tokio::fs::File::create(temp_path)
        .await
        .map_err(|e| CheckpointError::write(temp_path, e))?;
    file.write_all(data)
        .await
        .map_err(|e| CheckpointError::write(temp_path, e))?;
    file.sync_all()
        .await
        .map_err(|e| CheckpointError::write(temp_path, e))
}
