//! Offset-based enumeration of a remote collection.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::download::{RetryDecision, RetryPolicy, parse_retry_after};
use crate::source::{Post, PostSource, SourceError};

/// One successfully fetched page.
#[derive(Debug, Clone)]
pub struct Page {
    /// Offset the page was requested at.
    pub offset: usize,
    /// Posts in remote order.
    pub posts: Vec<Post>,
}

/// A page request that failed after all retries.
///
/// This is distinct from end of collection: the caller decides whether to
/// abort or skip the page.
#[derive(Debug, Error)]
#[error("page at offset {offset} failed after {attempts} attempt(s): {source}")]
pub struct PageError {
    /// Offset of the failed page.
    pub offset: usize,
    /// Requests made for this page.
    pub attempts: u32,
    /// The last error returned by the source.
    #[source]
    pub source: SourceError,
}

/// Walks a collection page by page until a short page is returned.
pub struct Pager {
    source: Arc<dyn PostSource>,
    collection: String,
    page_size: usize,
    offset: usize,
    retry_policy: RetryPolicy,
    finished: bool,
    requests: usize,
}

impl Pager {
    /// Starts at offset 0.
    #[must_use]
    pub fn new(
        source: Arc<dyn PostSource>,
        collection: impl Into<String>,
        page_size: usize,
        retry_policy: RetryPolicy,
    ) -> Self {
        Self {
            source,
            collection: collection.into(),
            page_size: page_size.max(1),
            offset: 0,
            retry_policy,
            finished: false,
            requests: 0,
        }
    }

    /// Offset of the next page to request.
    #[must_use]
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Total requests issued so far, retries included.
    #[must_use]
    pub fn requests(&self) -> usize {
        self.requests
    }

    /// Fetches the next page, or `Ok(None)` once the collection is exhausted.
    ///
    /// A page shorter than the page size (including an empty one) is returned
    /// and ends enumeration.
    ///
    /// # Errors
    ///
    /// Returns [`PageError`] when the page could not be fetched. The offset is
    /// left unchanged; call [`Pager::skip_page`] to move past it.
    #[instrument(skip(self), fields(collection = %self.collection, offset = self.offset))]
    pub async fn next_page(&mut self) -> Result<Option<Page>, PageError> {
        if self.finished {
            return Ok(None);
        }

        let offset = self.offset;
        let posts = self.fetch_with_retry(offset).await?;

        if posts.len() < self.page_size {
            debug!(count = posts.len(), "short page, end of collection");
            self.finished = true;
        }
        self.offset += self.page_size;
        Ok(Some(Page { offset, posts }))
    }

    /// Advances past a page that could not be fetched.
    pub fn skip_page(&mut self) {
        warn!(offset = self.offset, "skipping unfetchable page");
        self.offset += self.page_size;
    }

    async fn fetch_with_retry(&mut self, offset: usize) -> Result<Vec<Post>, PageError> {
        let mut attempt = 1;
        loop {
            self.requests += 1;
            let error = match self
                .source
                .list_posts(&self.collection, offset, self.page_size)
                .await
            {
                Ok(posts) => return Ok(posts),
                Err(error) => error,
            };

            match self.retry_policy.should_retry(error.failure_type(), attempt) {
                RetryDecision::Retry {
                    delay,
                    attempt: next,
                } => {
                    let delay = error.retry_after().and_then(parse_retry_after).unwrap_or(delay);
                    warn!(
                        offset,
                        attempt,
                        delay_ms = delay.as_millis(),
                        error = %error,
                        "page request failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt = next;
                }
                RetryDecision::DoNotRetry { reason } => {
                    debug!(offset, attempt, %reason, "giving up on page");
                    return Err(PageError {
                        offset,
                        attempts: attempt,
                        source: error,
                    });
                }
            }
        }
    }
}
