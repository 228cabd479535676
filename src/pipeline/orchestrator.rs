//! Drives a full backup run.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::checkpoint::{CheckpointError, CheckpointStore};
use crate::download::RetryPolicy;
use crate::source::PostSource;

use super::pager::{PageError, Pager};
use super::processor::{ItemProcessor, ItemReport, ProcessError, ProcessingOutcome};

/// Default number of posts requested per page.
pub const DEFAULT_PAGE_SIZE: usize = 20;

/// Consecutive failed pages tolerated under [`PageErrorPolicy::Skip`].
pub const MAX_CONSECUTIVE_PAGE_FAILURES: usize = 3;

/// What to do when a page still fails after retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PageErrorPolicy {
    /// Stop the run with an error.
    Abort,
    /// Log it, move on to the next offset.
    #[default]
    Skip,
}

/// Knobs for a run.
#[derive(Debug, Clone)]
pub struct BackupOptions {
    /// Posts per page request.
    pub page_size: usize,
    /// Handling of pages that cannot be fetched.
    pub page_error_policy: PageErrorPolicy,
    /// Consecutive skipped pages after which the run stops anyway.
    pub max_consecutive_page_failures: usize,
    /// Retry policy for page requests.
    pub page_retry_policy: RetryPolicy,
}

impl Default for BackupOptions {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            page_error_policy: PageErrorPolicy::default(),
            max_consecutive_page_failures: MAX_CONSECUTIVE_PAGE_FAILURES,
            page_retry_policy: RetryPolicy::default(),
        }
    }
}

/// Aggregated counts for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackupSummary {
    /// Pages returned by the source.
    pub pages_fetched: usize,
    /// Pages skipped after exhausting retries.
    pub pages_failed: usize,
    /// Posts already in the checkpoint.
    pub posts_skipped: usize,
    /// Posts backed up with every media reference.
    pub posts_completed: usize,
    /// Posts committed with at least one failed media reference.
    pub posts_partially_failed: usize,
    /// Posts left uncommitted because their directory or caption failed.
    pub posts_failed: usize,
    /// Media files fetched this run.
    pub media_downloaded: usize,
    /// Media files found on disk and not fetched.
    pub media_already_present: usize,
    /// Media references that could not be fetched.
    pub media_failed: usize,
    /// Posts whose timestamp was replaced by the current time.
    pub timestamp_fallbacks: usize,
}

impl BackupSummary {
    fn record(&mut self, report: &ItemReport) {
        match report.outcome {
            ProcessingOutcome::Skipped => self.posts_skipped += 1,
            ProcessingOutcome::Completed => self.posts_completed += 1,
            ProcessingOutcome::PartiallyFailed { .. } => self.posts_partially_failed += 1,
        }
        self.media_downloaded += report.downloaded;
        self.media_already_present += report.already_present;
        self.media_failed += report.failed();
        if report.timestamp_substituted {
            self.timestamp_fallbacks += 1;
        }
    }

    /// Posts seen on fetched pages.
    #[must_use]
    pub fn posts_seen(&self) -> usize {
        self.posts_skipped + self.posts_completed + self.posts_partially_failed + self.posts_failed
    }

    /// True when every page was fetched and every post committed.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.pages_failed == 0 && self.posts_failed == 0
    }
}

impl fmt::Display for BackupSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} posts ({} new, {} with failed media, {} skipped), {} media downloaded, \
             {} already present, {} failed, {} pages fetched",
            self.posts_seen(),
            self.posts_completed,
            self.posts_partially_failed,
            self.posts_skipped,
            self.media_downloaded,
            self.media_already_present,
            self.media_failed,
            self.pages_fetched,
        )?;
        if self.pages_failed > 0 {
            write!(f, ", {} pages skipped", self.pages_failed)?;
        }
        if self.posts_failed > 0 {
            write!(f, ", {} posts not written", self.posts_failed)?;
        }
        Ok(())
    }
}

/// Run-level failures. Progress committed before the error stays valid.
#[derive(Debug, Error)]
pub enum BackupError {
    /// The backup root directory could not be created.
    #[error("cannot create backup directory {path}: {source}")]
    BackupRoot {
        /// Backup root.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The checkpoint file could not be loaded.
    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),

    /// A page failed and the policy is to abort.
    #[error("aborting: {0}")]
    PageFetchFailed(#[source] PageError),

    /// Too many consecutive pages failed under the skip policy.
    #[error("aborting after {count} consecutive failed pages: {last}")]
    TooManyPageFailures {
        /// Consecutive failures observed.
        count: usize,
        /// The most recent failure.
        #[source]
        last: PageError,
    },
}

/// Ties pager, processor and checkpoint together for one collection.
pub struct BackupOrchestrator {
    source: Arc<dyn PostSource>,
    processor: ItemProcessor,
    collection: String,
    checkpoint_path: PathBuf,
    options: BackupOptions,
}

impl BackupOrchestrator {
    /// Creates an orchestrator.
    #[must_use]
    pub fn new(
        source: Arc<dyn PostSource>,
        processor: ItemProcessor,
        collection: impl Into<String>,
        checkpoint_path: impl Into<PathBuf>,
        options: BackupOptions,
    ) -> Self {
        Self {
            source,
            processor,
            collection: collection.into(),
            checkpoint_path: checkpoint_path.into(),
            options,
        }
    }

    /// Enumerates the whole collection, processing posts strictly in order.
    ///
    /// # Errors
    ///
    /// Returns [`BackupError`] for run-level failures: backup root or
    /// checkpoint unusable, a page failure under [`PageErrorPolicy::Abort`],
    /// or too many consecutive page failures. A post whose directory or
    /// caption cannot be written is counted in
    /// [`BackupSummary::posts_failed`] and left uncommitted.
    #[instrument(skip(self), fields(collection = %self.collection, source = self.source.name()))]
    pub async fn run(&self) -> Result<BackupSummary, BackupError> {
        let root = self.processor.backup_root();
        tokio::fs::create_dir_all(root)
            .await
            .map_err(|source| BackupError::BackupRoot {
                path: root.to_path_buf(),
                source,
            })?;
        let mut checkpoint = CheckpointStore::load(&self.checkpoint_path).await?;

        let mut pager = Pager::new(
            Arc::clone(&self.source),
            self.collection.clone(),
            self.options.page_size,
            self.options.page_retry_policy.clone(),
        );
        let mut summary = BackupSummary::default();
        let mut consecutive_failures = 0;

        loop {
            let page = match pager.next_page().await {
                Ok(Some(page)) => page,
                Ok(None) => break,
                Err(error) => {
                    summary.pages_failed += 1;
                    consecutive_failures += 1;
                    match self.options.page_error_policy {
                        PageErrorPolicy::Abort => return Err(BackupError::PageFetchFailed(error)),
                        PageErrorPolicy::Skip
                            if consecutive_failures > self.options.max_consecutive_page_failures =>
                        {
                            return Err(BackupError::TooManyPageFailures {
                                count: consecutive_failures,
                                last: error,
                            });
                        }
                        PageErrorPolicy::Skip => {
                            warn!(error = %error, "page failed, continuing with next page");
                            pager.skip_page();
                            continue;
                        }
                    }
                }
            };

            consecutive_failures = 0;
            summary.pages_fetched += 1;
            info!(offset = page.offset, posts = page.posts.len(), "processing page");
            for post in &page.posts {
                match self.processor.process(post, &mut checkpoint).await {
                    Ok(report) => summary.record(&report),
                    Err(ProcessError::Checkpoint(error)) => return Err(error.into()),
                    Err(error) => {
                        // Uncommitted, so the next run picks it up again.
                        warn!(post_id = %post.id, %error, "post not backed up");
                        summary.posts_failed += 1;
                    }
                }
            }
        }

        info!(
            posts = summary.posts_seen(),
            completed = summary.posts_completed,
            skipped = summary.posts_skipped,
            partially_failed = summary.posts_partially_failed,
            failed = summary.posts_failed,
            media_downloaded = summary.media_downloaded,
            media_failed = summary.media_failed,
            timestamp_fallbacks = summary.timestamp_fallbacks,
            pages_failed = summary.pages_failed,
            "backup finished"
        );
        Ok(summary)
    }
}
