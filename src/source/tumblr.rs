//! Tumblr v2 API client.
//!
//! Lists a blog's posts through `GET /v2/blog/{blog}/posts` authenticated with
//! an application API key. Only the fields the backup needs are decoded.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::RETRY_AFTER;
use serde::Deserialize;
use tracing::{debug, instrument};
use url::Url;

use crate::http_client::{HttpTimeouts, build_http_client};
use crate::user_agent;

use super::{Post, PostSource, SourceError};

/// Default Tumblr API base URL.
pub const DEFAULT_API_BASE_URL: &str = "https://api.tumblr.com";

const CONNECT_TIMEOUT_SECS: u64 = 10;
const READ_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Deserialize)]
struct ApiEnvelope {
    response: Option<PostsResponse>,
}

#[derive(Debug, Deserialize)]
struct PostsResponse {
    #[serde(default)]
    posts: Vec<Post>,
}

/// Remote source backed by the Tumblr API.
pub struct TumblrClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl TumblrClient {
    /// Creates a client against the public Tumblr API.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] if the key is unusable or the HTTP client
    /// cannot be built.
    pub fn new(api_key: impl Into<String>) -> Result<Self, SourceError> {
        Self::with_base_url(api_key, DEFAULT_API_BASE_URL)
    }

    /// Creates a client against a custom base URL (used with wiremock).
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] if the key is unusable, the base URL does not
    /// parse, or the HTTP client cannot be built.
    pub fn with_base_url(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Result<Self, SourceError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() || api_key.chars().any(char::is_control) {
            return Err(SourceError::invalid_request(
                "API key is empty or contains control characters",
            ));
        }
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Url::parse(&base_url).map_err(|e| {
            SourceError::invalid_request(format!("invalid API base URL {base_url}: {e}"))
        })?;

        let client = build_http_client(
            &user_agent::default_api_user_agent(),
            HttpTimeouts::from_secs(CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS)
                .with_total(Duration::from_secs(READ_TIMEOUT_SECS)),
        )?;

        Ok(Self {
            client,
            base_url,
            api_key,
        })
    }

    fn posts_url(&self, blog: &str, offset: usize, limit: usize) -> Result<Url, SourceError> {
        let endpoint = format!(
            "{}/v2/blog/{}/posts",
            self.base_url,
            urlencoding::encode(blog)
        );
        let offset = offset.to_string();
        let limit = limit.to_string();
        Url::parse_with_params(
            &endpoint,
            &[
                ("api_key", self.api_key.as_str()),
                ("offset", offset.as_str()),
                ("limit", limit.as_str()),
            ],
        )
        .map_err(|e| SourceError::invalid_request(format!("cannot build posts URL: {e}")))
    }
}

impl std::fmt::Debug for TumblrClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TumblrClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl PostSource for TumblrClient {
    fn name(&self) -> &'static str {
        "tumblr"
    }

    #[instrument(skip(self), fields(source = "tumblr"))]
    async fn list_posts(
        &self,
        collection: &str,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<Post>, SourceError> {
        if collection.trim().is_empty() {
            return Err(SourceError::invalid_request("blog name is empty"));
        }
        let url = self.posts_url(collection, offset, limit)?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| SourceError::from_reqwest(collection, e))?;

        let status = response.status();
        if matches!(status.as_u16(), 401 | 403) {
            return Err(SourceError::Unauthorized {
                collection: collection.to_string(),
                status: status.as_u16(),
            });
        }
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .map(ToString::to_string);
            return Err(SourceError::HttpStatus {
                collection: collection.to_string(),
                status: status.as_u16(),
                retry_after,
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| SourceError::from_reqwest(collection, e))?;
        let envelope: ApiEnvelope = serde_json::from_str(&body)
            .map_err(|e| SourceError::decode(collection, e.to_string()))?;
        let posts = envelope
            .response
            .ok_or_else(|| SourceError::decode(collection, "missing `response` object"))?
            .posts;

        debug!(count = posts.len(), "fetched posts page");
        Ok(posts)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::test_support::socket_guard::start_mock_server_or_skip;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, ResponseTemplate};

    #[test]
    fn test_new_rejects_empty_api_key() {
        assert!(matches!(
            TumblrClient::new("   "),
            Err(SourceError::InvalidRequest { .. })
        ));
        assert!(matches!(
            TumblrClient::new("key\nwith-newline"),
            Err(SourceError::InvalidRequest { .. })
        ));
    }

    #[test]
    fn test_with_base_url_rejects_garbage() {
        assert!(matches!(
            TumblrClient::with_base_url("key", "not a url"),
            Err(SourceError::InvalidRequest { .. })
        ));
    }

    #[test]
    fn test_debug_hides_api_key() {
        let client = TumblrClient::new("super-secret").unwrap();
        let rendered = format!("{client:?}");
        assert!(!rendered.contains("super-secret"), "leaked key: {rendered}");
    }

    #[test]
    fn test_posts_url_carries_paging_params() {
        let client = TumblrClient::with_base_url("k", "https://api.example.test/").unwrap();
        let url = client.posts_url("staff.tumblr.com", 40, 20).unwrap();
        assert_eq!(url.path(), "/v2/blog/staff.tumblr.com/posts");
        let query: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert!(query.contains(&("offset".to_string(), "40".to_string())));
        assert!(query.contains(&("limit".to_string(), "20".to_string())));
        assert!(query.contains(&("api_key".to_string(), "k".to_string())));
    }

    #[tokio::test]
    async fn test_list_posts_decodes_page() {
        let Some(server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("GET"))
            .and(path("/v2/blog/staff/posts"))
            .and(query_param("offset", "20"))
            .and(query_param("limit", "20"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "meta": {"status": 200, "msg": "OK"},
                "response": {"posts": [
                    {"id": 1, "caption": "one"},
                    {"id": "2", "photos": [{"original_size": {"url": "https://x.test/a.jpg"}}]}
                ]}
            })))
            .mount(&server)
            .await;

        let client = TumblrClient::with_base_url("k", server.uri()).unwrap();
        let posts = client.list_posts("staff", 20, 20).await.unwrap();
        assert_eq!(posts.len(), 2);
        assert_eq!(posts[0].id.as_str(), "1");
        assert_eq!(posts[1].photos.len(), 1);
    }

    #[tokio::test]
    async fn test_list_posts_server_error_is_not_empty_page() {
        let Some(server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503).insert_header("Retry-After", "3"))
            .mount(&server)
            .await;

        let client = TumblrClient::with_base_url("k", server.uri()).unwrap();
        match client.list_posts("staff", 0, 20).await {
            Err(SourceError::HttpStatus {
                status, retry_after, ..
            }) => {
                assert_eq!(status, 503);
                assert_eq!(retry_after.as_deref(), Some("3"));
            }
            other => panic!("expected HttpStatus error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_list_posts_unauthorized() {
        let Some(server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let client = TumblrClient::with_base_url("k", server.uri()).unwrap();
        let result = client.list_posts("staff", 0, 20).await;
        assert!(matches!(
            result,
            Err(SourceError::Unauthorized { status: 401, .. })
        ));
    }

    #[tokio::test]
    async fn test_list_posts_missing_response_is_decode_error() {
        let Some(server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"meta": {}})))
            .mount(&server)
            .await;

        let client = TumblrClient::with_base_url("k", server.uri()).unwrap();
        let result = client.list_posts("staff", 0, 20).await;
        assert!(matches!(result, Err(SourceError::Decode { .. })));
    }
}
