//! CLI argument definitions using clap derive macros.
//!
//! Every option can also come from the environment (or a `.env` file).

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use post_backup_core::config::{DEFAULT_BACKUP_DIR, DEFAULT_PROGRESS_FILE};
use post_backup_core::download::DEFAULT_MAX_RETRIES;
use post_backup_core::pipeline::DEFAULT_PAGE_SIZE;
use post_backup_core::source::DEFAULT_API_BASE_URL;
use post_backup_core::{BackupConfig, PageErrorPolicy};

/// What to do with a page that still fails after retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OnPageError {
    /// Move on to the next page (stops after 3 consecutive failures).
    Skip,
    /// Stop the run and exit non-zero.
    Abort,
}

impl From<OnPageError> for PageErrorPolicy {
    fn from(value: OnPageError) -> Self {
        match value {
            OnPageError::Abort => Self::Abort,
            OnPageError::Skip => Self::Skip,
        }
    }
}

/// Incrementally back up a blog's posts, captions and media.
///
/// Re-running resumes where the last run stopped: committed posts are
/// skipped and media already on disk are never fetched again.
#[derive(Parser, Debug)]
#[command(name = "post-backup")]
#[command(author, version, about)]
pub struct Args {
    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,

    /// Blog to back up (e.g. `staff` or `staff.tumblr.com`)
    #[arg(short, long, env = "BLOG_NAME")]
    pub blog: String,

    /// API consumer key
    #[arg(long, env = "API_KEY", hide_env_values = true)]
    pub api_key: String,

    /// Root directory for per-post folders
    #[arg(short = 'o', long, env = "BACKUP_DIR", default_value = DEFAULT_BACKUP_DIR)]
    pub backup_dir: PathBuf,

    /// Checkpoint file recording completed posts
    #[arg(long, env = "PROGRESS_FILE", default_value = DEFAULT_PROGRESS_FILE)]
    pub progress_file: PathBuf,

    /// Posts requested per page (1-20, the API maximum)
    #[arg(short = 'n', long, env = "PAGE_SIZE", default_value_t = DEFAULT_PAGE_SIZE as u8, value_parser = clap::value_parser!(u8).range(1..=20))]
    pub page_size: u8,

    /// Maximum retry attempts for transient failures (0-10)
    #[arg(short = 'r', long, env = "MAX_RETRIES", default_value_t = DEFAULT_MAX_RETRIES as u8, value_parser = clap::value_parser!(u8).range(0..=10))]
    pub max_retries: u8,

    /// Handling of pages that cannot be fetched
    #[arg(long, env = "ON_PAGE_ERROR", value_enum, default_value_t = OnPageError::Skip)]
    pub on_page_error: OnPageError,

    /// Reprocess backed-up posts whose media previously failed
    #[arg(long, env = "RETRY_FAILED_MEDIA")]
    pub retry_failed_media: bool,

    /// yt-dlp executable used for video-host links
    #[arg(long = "yt-dlp", env = "YT_DLP_PATH", default_value = "yt-dlp")]
    pub yt_dlp: PathBuf,

    /// API base URL
    #[arg(long, env = "TUMBLR_API_BASE_URL", default_value = DEFAULT_API_BASE_URL, hide = true)]
    pub api_base_url: String,
}

impl Args {
    /// Converts parsed arguments into the library configuration.
    #[must_use]
    pub fn into_config(self) -> BackupConfig {
        BackupConfig {
            blog: self.blog,
            api_key: self.api_key,
            backup_dir: self.backup_dir,
            progress_file: self.progress_file,
            page_size: usize::from(self.page_size),
            max_retries: u32::from(self.max_retries),
            page_error_policy: self.on_page_error.into(),
            retry_failed_media: self.retry_failed_media,
            yt_dlp_path: self.yt_dlp,
            api_base_url: self.api_base_url,
        }
    }
}
