//! Per-post processing: directory, caption, media, checkpoint.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::checkpoint::{CheckpointError, CheckpointRecord, CheckpointStore, format_iso_millis};
use crate::download::{FetchOutcome, MediaFetcher};
use crate::media::filename::sanitize_filename;
use crate::media::{CAPTION_FILE_NAME, extract_media};
use crate::source::Post;

/// Caption text used when a post has none.
pub const CAPTION_PLACEHOLDER: &str = "No caption";

/// How processing one post ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessingOutcome {
    /// Already checkpointed; nothing was touched.
    Skipped,
    /// Every media reference is on disk.
    Completed,
    /// Checkpointed, but some media could not be fetched.
    PartiallyFailed {
        /// File names whose fetch failed.
        failed: Vec<String>,
    },
}

/// Outcome of one post plus the per-media tallies behind it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemReport {
    /// Overall outcome.
    pub outcome: ProcessingOutcome,
    /// Media fetched during this call.
    pub downloaded: usize,
    /// Media that were already on disk.
    pub already_present: usize,
    /// Whether the post's timestamp was missing or malformed and the current
    /// time was used instead.
    pub timestamp_substituted: bool,
}

impl ItemReport {
    fn skipped() -> Self {
        Self {
            outcome: ProcessingOutcome::Skipped,
            downloaded: 0,
            already_present: 0,
            timestamp_substituted: false,
        }
    }

    /// Number of media whose fetch failed.
    #[must_use]
    pub fn failed(&self) -> usize {
        match &self.outcome {
            ProcessingOutcome::PartiallyFailed { failed } => failed.len(),
            _ => 0,
        }
    }
}

/// Failures that leave a post uncommitted. Media failures are not among them.
#[derive(Debug, Error)]
pub enum ProcessError {
    /// The post directory could not be created.
    #[error("cannot create directory {path} for post {post_id}: {source}")]
    CreateDir {
        /// Post being processed.
        post_id: String,
        /// Directory path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The caption file could not be written.
    #[error("cannot write caption {path} for post {post_id}: {source}")]
    WriteCaption {
        /// Post being processed.
        post_id: String,
        /// Caption file path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The checkpoint could not be persisted.
    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),
}

/// Processes posts one at a time into `backup_root/<post id>/`.
#[derive(Debug, Clone)]
pub struct ItemProcessor {
    backup_root: PathBuf,
    fetcher: MediaFetcher,
    retry_failed_media: bool,
}

impl ItemProcessor {
    /// Creates a processor writing under `backup_root`.
    #[must_use]
    pub fn new(backup_root: impl Into<PathBuf>, fetcher: MediaFetcher) -> Self {
        Self {
            backup_root: backup_root.into(),
            fetcher,
            retry_failed_media: false,
        }
    }

    /// Reprocess checkpointed posts whose record lists failed media.
    #[must_use]
    pub fn with_retry_failed_media(mut self, enabled: bool) -> Self {
        self.retry_failed_media = enabled;
        self
    }

    /// Root directory holding one subdirectory per post.
    #[must_use]
    pub fn backup_root(&self) -> &Path {
        &self.backup_root
    }

    /// Directory for `post`.
    #[must_use]
    pub fn post_dir(&self, post: &Post) -> PathBuf {
        self.backup_root.join(sanitize_filename(post.id.as_str()))
    }

    /// Processes `post`, committing its checkpoint record once every media
    /// reference has been attempted.
    ///
    /// # Errors
    ///
    /// Returns [`ProcessError`] when the post directory, caption file, or
    /// checkpoint cannot be written. The post is not checkpointed then.
    #[instrument(skip(self, post, checkpoint), fields(post_id = %post.id))]
    pub async fn process(
        &self,
        post: &Post,
        checkpoint: &mut CheckpointStore,
    ) -> Result<ItemReport, ProcessError> {
        if let Some(record) = checkpoint.get(post.id.as_str()) {
            if !(self.retry_failed_media && !record.failed_media.is_empty()) {
                info!("post already backed up, skipping");
                return Ok(ItemReport::skipped());
            }
            info!(
                failed = record.failed_media.len(),
                "reprocessing post with failed media"
            );
        }

        let post_dir = self.post_dir(post);
        tokio::fs::create_dir_all(&post_dir)
            .await
            .map_err(|source| ProcessError::CreateDir {
                post_id: post.id.to_string(),
                path: post_dir.clone(),
                source,
            })?;

        let (timestamp, timestamp_substituted) = resolve_timestamp(post);
        self.write_caption(post, &post_dir, timestamp).await?;

        let mut report = ItemReport {
            outcome: ProcessingOutcome::Completed,
            downloaded: 0,
            already_present: 0,
            timestamp_substituted,
        };
        let mut failed = Vec::new();
        for reference in extract_media(post) {
            let destination = post_dir.join(&reference.file_name);
            match self.fetcher.fetch(&reference.url, &destination).await {
                FetchOutcome::AlreadyPresent => report.already_present += 1,
                FetchOutcome::Downloaded { .. } => report.downloaded += 1,
                FetchOutcome::Failed(reason) => {
                    warn!(
                        kind = %reference.kind,
                        file = %reference.file_name,
                        %reason,
                        "media reference failed"
                    );
                    failed.push(reference.file_name);
                }
            }
        }

        checkpoint
            .commit(
                post.id.as_str(),
                CheckpointRecord::new(timestamp).with_failed_media(failed.clone()),
            )
            .await?;

        if failed.is_empty() {
            info!(
                downloaded = report.downloaded,
                already_present = report.already_present,
                "post backed up"
            );
        } else {
            warn!(failed = failed.len(), "post backed up with failed media");
            report.outcome = ProcessingOutcome::PartiallyFailed { failed };
        }
        Ok(report)
    }

    async fn write_caption(
        &self,
        post: &Post,
        post_dir: &Path,
        timestamp: DateTime<Utc>,
    ) -> Result<(), ProcessError> {
        let path = post_dir.join(CAPTION_FILE_NAME);
        tokio::fs::write(&path, caption_text(post, timestamp))
            .await
            .map_err(|source| ProcessError::WriteCaption {
                post_id: post.id.to_string(),
                path,
                source,
            })
    }
}

/// The post's creation time, or now when it is missing or malformed.
fn resolve_timestamp(post: &Post) -> (DateTime<Utc>, bool) {
    match post.created_at() {
        Some(timestamp) => (timestamp, false),
        None => {
            warn!(
                post_id = %post.id,
                timestamp = ?post.timestamp,
                date = ?post.date,
                "post timestamp missing or malformed, using current time"
            );
            (Utc::now(), true)
        }
    }
}

fn caption_text(post: &Post, timestamp: DateTime<Utc>) -> String {
    let caption = post
        .caption
        .as_deref()
        .filter(|c| !c.trim().is_empty())
        .unwrap_or(CAPTION_PLACEHOLDER);
    format!(
        "Timestamp: {}\nCaption:\n{caption}",
        format_iso_millis(timestamp)
    )
}
