//! Remote content source.
//!
//! - [`PostSource`] - Async trait for listing a collection's posts by offset
//! - [`TumblrClient`] - Tumblr v2 API implementation
//! - [`Post`] - The remote item model
//!
//! Authentication is limited to handing the client its credential; session
//! setup beyond that is the caller's concern.

mod error;
mod post;
mod tumblr;

pub use error::SourceError;
pub use post::{Photo, PhotoSize, Post, PostId};
pub use tumblr::{DEFAULT_API_BASE_URL, TumblrClient};

use async_trait::async_trait;

/// A paginated collection of posts.
///
/// Uses `async_trait` so the orchestrator can hold a `dyn PostSource`.
#[async_trait]
pub trait PostSource: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Lists up to `limit` posts of `collection` starting at `offset`.
    ///
    /// A page shorter than `limit` means the collection is exhausted. Failures
    /// are returned as errors, never as an empty page.
    async fn list_posts(
        &self,
        collection: &str,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<Post>, SourceError>;
}
