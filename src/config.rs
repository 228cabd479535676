//! Validated runtime configuration for a backup run.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::download::{DEFAULT_MAX_RETRIES, RetryPolicy};
use crate::pipeline::{
    BackupOptions, DEFAULT_PAGE_SIZE, MAX_CONSECUTIVE_PAGE_FAILURES, PageErrorPolicy,
};
use crate::source::DEFAULT_API_BASE_URL;

/// Default backup root.
pub const DEFAULT_BACKUP_DIR: &str = "./tumblr_backup";

/// Default checkpoint file.
pub const DEFAULT_PROGRESS_FILE: &str = "./progress.json";

/// Largest `limit` the posts endpoint honors; larger requests come back
/// truncated to this and would read as a short final page.
pub const MAX_PAGE_SIZE: usize = 20;

/// Largest accepted retry count.
pub const MAX_RETRIES_LIMIT: u32 = 10;

/// Rejected configuration values.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// No collection (blog) was named.
    #[error("blog name is required (set --blog or BLOG_NAME)")]
    MissingCollection,

    /// The API key is empty or unusable.
    #[error("API key is required and must not contain control characters (set --api-key or API_KEY)")]
    InvalidApiKey,

    /// Page size outside `1..=MAX_PAGE_SIZE`.
    #[error("page size must be between 1 and {MAX_PAGE_SIZE}, got {0}")]
    InvalidPageSize(usize),

    /// Retry count above the limit.
    #[error("max retries must be at most {MAX_RETRIES_LIMIT}, got {0}")]
    InvalidMaxRetries(u32),

    /// A path option was empty.
    #[error("{0} must not be empty")]
    EmptyPath(&'static str),
}

/// Everything a run needs.
#[derive(Clone)]
pub struct BackupConfig {
    /// Blog to back up.
    pub blog: String,
    /// API consumer key. Never logged.
    pub api_key: String,
    /// Root directory holding one folder per post.
    pub backup_dir: PathBuf,
    /// Checkpoint file path.
    pub progress_file: PathBuf,
    /// Posts requested per page.
    pub page_size: usize,
    /// Retries after the first attempt for transient failures.
    pub max_retries: u32,
    /// Handling of pages that still fail after retries.
    pub page_error_policy: PageErrorPolicy,
    /// Reprocess checkpointed posts whose record lists failed media.
    pub retry_failed_media: bool,
    /// yt-dlp executable for video-host links.
    pub yt_dlp_path: PathBuf,
    /// Base URL of the posts API.
    pub api_base_url: String,
}

impl BackupConfig {
    /// Config with defaults for everything but the collection and credential.
    #[must_use]
    pub fn new(blog: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            blog: blog.into(),
            api_key: api_key.into(),
            backup_dir: PathBuf::from(DEFAULT_BACKUP_DIR),
            progress_file: PathBuf::from(DEFAULT_PROGRESS_FILE),
            page_size: DEFAULT_PAGE_SIZE,
            max_retries: DEFAULT_MAX_RETRIES,
            page_error_policy: PageErrorPolicy::Skip,
            retry_failed_media: false,
            yt_dlp_path: PathBuf::from("yt-dlp"),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
        }
    }

    /// Checks every value.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.blog.trim().is_empty() {
            return Err(ConfigError::MissingCollection);
        }
        if self.api_key.trim().is_empty() || self.api_key.chars().any(char::is_control) {
            return Err(ConfigError::InvalidApiKey);
        }
        if !(1..=MAX_PAGE_SIZE).contains(&self.page_size) {
            return Err(ConfigError::InvalidPageSize(self.page_size));
        }
        if self.max_retries > MAX_RETRIES_LIMIT {
            return Err(ConfigError::InvalidMaxRetries(self.max_retries));
        }
        if self.backup_dir.as_os_str().is_empty() {
            return Err(ConfigError::EmptyPath("backup directory"));
        }
        if self.progress_file.as_os_str().is_empty() {
            return Err(ConfigError::EmptyPath("progress file"));
        }
        Ok(())
    }

    /// Retry policy shared by page requests and media fetches.
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::with_max_retries(self.max_retries)
    }

    /// Orchestrator options derived from this config.
    #[must_use]
    pub fn backup_options(&self) -> BackupOptions {
        BackupOptions {
            page_size: self.page_size,
            page_error_policy: self.page_error_policy,
            max_consecutive_page_failures: MAX_CONSECUTIVE_PAGE_FAILURES,
            page_retry_policy: self.retry_policy(),
        }
    }
}

impl fmt::Debug for BackupConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackupConfig")
            .field("blog", &self.blog)
            .field("api_key", &"<redacted>")
            .field("backup_dir", &self.backup_dir)
            .field("progress_file", &self.progress_file)
            .field("page_size", &self.page_size)
            .field("max_retries", &self.max_retries)
            .field("page_error_policy", &self.page_error_policy)
            .field("retry_failed_media", &self.retry_failed_media)
            .field("yt_dlp_path", &self.yt_dlp_path)
            .field("api_base_url", &self.api_base_url)
            .finish()
    }
}
