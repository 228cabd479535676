//! Media fetching.
//!
//! [`MediaFetcher::fetch`] is the entry point: it declines to touch the
//! network when the destination already exists, routes recognized video-host
//! pages through a [`StreamExtractor`], and streams everything else through
//! [`HttpClient`] with retry on transient failures.
//!
//! Every download lands in a hidden `.<name>.part` file first and is renamed
//! into place only when complete.
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! use post_backup_core::download::{HttpClient, MediaFetcher, RetryPolicy, YtDlpExtractor};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let fetcher = MediaFetcher::new(
//!     HttpClient::new()?,
//!     Arc::new(YtDlpExtractor::default()),
//!     RetryPolicy::default(),
//! );
//! let outcome = fetcher
//!     .fetch("https://example.com/a.jpg", Path::new("./backup/123/a.jpg"))
//!     .await;
//! println!("{outcome}");
//! # Ok(())
//! # }
//! ```

mod client;
pub mod constants;
mod error;
mod fetcher;
mod retry;
mod stream;

pub use client::HttpClient;
pub use error::DownloadError;
pub use fetcher::{FetchOutcome, MediaFetcher};
pub use retry::{
    DEFAULT_MAX_RETRIES, FailureType, RetryDecision, RetryPolicy, classify_error,
    parse_retry_after,
};
pub use stream::{BEST_STREAM_FORMAT, StreamExtractor, YtDlpExtractor};
