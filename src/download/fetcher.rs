//! Per-reference media fetch with idempotency and retry.

use std::fmt;
use std::io::ErrorKind;
use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info, warn};

use super::client::HttpClient;
use super::error::DownloadError;
use super::retry::{RetryDecision, RetryPolicy, classify_error, parse_retry_after};
use super::stream::StreamExtractor;
use crate::media::is_video_host_url;

/// Result of fetching one media reference. Never an error: failures are
/// reported as [`FetchOutcome::Failed`] so the caller can continue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// A file already existed at the destination; nothing was requested.
    AlreadyPresent,
    /// The file was fetched and finalized.
    Downloaded {
        /// Size of the finalized file.
        bytes: u64,
    },
    /// The fetch failed; the destination was left absent.
    Failed(String),
}

impl FetchOutcome {
    /// True for [`FetchOutcome::Failed`].
    #[must_use]
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

impl fmt::Display for FetchOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyPresent => f.write_str("already present"),
            Self::Downloaded { bytes } => write!(f, "downloaded ({bytes} bytes)"),
            Self::Failed(reason) => write!(f, "failed: {reason}"),
        }
    }
}

/// Fetches media to exact destination paths.
///
/// Recognized video-host pages go through the [`StreamExtractor`]; every
/// other URL is streamed by the [`HttpClient`] with transient-failure retry.
#[derive(Clone)]
pub struct MediaFetcher {
    http: HttpClient,
    streams: Arc<dyn StreamExtractor>,
    retry_policy: RetryPolicy,
}

impl fmt::Debug for MediaFetcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaFetcher")
            .field("streams", &self.streams.name())
            .field("retry_policy", &self.retry_policy)
            .finish_non_exhaustive()
    }
}

impl MediaFetcher {
    /// Creates a fetcher.
    #[must_use]
    pub fn new(http: HttpClient, streams: Arc<dyn StreamExtractor>, retry_policy: RetryPolicy) -> Self {
        Self {
            http,
            streams,
            retry_policy,
        }
    }

    /// Fetches `url` into `destination` unless a file is already there.
    pub async fn fetch(&self, url: &str, destination: &Path) -> FetchOutcome {
        match tokio::fs::metadata(destination).await {
            Ok(_) => {
                info!(path = %destination.display(), "media already present, skipping");
                return FetchOutcome::AlreadyPresent;
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => {
                let error = DownloadError::io(destination, e);
                warn!(url, error = %error, "cannot inspect media destination");
                return FetchOutcome::Failed(error.to_string());
            }
        }

        let result = if is_video_host_url(url) {
            self.fetch_stream(url, destination).await
        } else {
            self.fetch_with_retry(url, destination).await
        };

        match result {
            Ok(bytes) => {
                info!(url, path = %destination.display(), bytes, "media downloaded");
                FetchOutcome::Downloaded { bytes }
            }
            Err(error) => {
                warn!(url, path = %destination.display(), error = %error, "media fetch failed");
                FetchOutcome::Failed(error.to_string())
            }
        }
    }

    /// Extractors run their own internal retries, so one attempt here.
    async fn fetch_stream(&self, url: &str, destination: &Path) -> Result<u64, DownloadError> {
        debug!(url, extractor = self.streams.name(), "resolving video-host stream");
        self.streams.download_best(url, destination).await?;
        let meta = tokio::fs::metadata(destination)
            .await
            .map_err(|e| DownloadError::io(destination, e))?;
        Ok(meta.len())
    }

    async fn fetch_with_retry(&self, url: &str, destination: &Path) -> Result<u64, DownloadError> {
        let mut attempt = 1;
        loop {
            let error = match self.http.download_to_path(url, destination).await {
                Ok(bytes) => return Ok(bytes),
                Err(error) => error,
            };

            match self.retry_policy.should_retry(classify_error(&error), attempt) {
                RetryDecision::Retry {
                    delay,
                    attempt: next,
                } => {
                    let delay = retry_after_of(&error).unwrap_or(delay);
                    warn!(
                        url,
                        attempt,
                        delay_ms = delay.as_millis(),
                        error = %error,
                        "transient media failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt = next;
                }
                RetryDecision::DoNotRetry { reason } => {
                    debug!(url, attempt, %reason, "giving up on media");
                    return Err(error);
                }
            }
        }
    }
}

fn retry_after_of(error: &DownloadError) -> Option<std::time::Duration> {
    match error {
        DownloadError::HttpStatus {
            retry_after: Some(value),
            ..
        } => parse_retry_after(value),
        _ => None,
    }
}
