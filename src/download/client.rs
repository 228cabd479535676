//! Streaming HTTP fetches for plain media URLs.
//!
//! Bodies are streamed into a hidden `.<name>.part` file beside the
//! destination and renamed into place only after the full body has been
//! written and synced. A failed fetch never leaves a file at the destination.

use std::path::{Path, PathBuf};

use futures_util::StreamExt;
use reqwest::Client;
use reqwest::header::RETRY_AFTER;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, instrument};
use url::Url;

use super::constants::{CONNECT_TIMEOUT_SECS, PARTIAL_SUFFIX, READ_TIMEOUT_SECS};
use super::error::DownloadError;
use crate::http_client::{HttpTimeouts, build_http_client};
use crate::user_agent;

/// HTTP client for media downloads.
///
/// Create once and reuse; the inner reqwest client pools connections.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    /// Creates a client with the default media timeouts.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::Client`] if the reqwest client cannot be built.
    pub fn new() -> Result<Self, DownloadError> {
        Self::with_timeouts(HttpTimeouts::from_secs(
            CONNECT_TIMEOUT_SECS,
            READ_TIMEOUT_SECS,
        ))
    }

    /// Creates a client with explicit timeouts.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::Client`] if the reqwest client cannot be built.
    pub fn with_timeouts(timeouts: HttpTimeouts) -> Result<Self, DownloadError> {
        let client = build_http_client(&user_agent::default_media_user_agent(), timeouts)?;
        Ok(Self { client })
    }

    /// Downloads `url` to exactly `destination`, returning the byte count.
    ///
    /// # Errors
    ///
    /// Returns `DownloadError` if the URL is not http(s), the request fails,
    /// the server answers with a non-success status, the body is shorter than
    /// its Content-Length, or the file cannot be written.
    #[instrument(skip(self, destination), fields(url = %url))]
    pub async fn download_to_path(&self, url: &str, destination: &Path) -> Result<u64, DownloadError> {
        let parsed = Url::parse(url).map_err(|_| DownloadError::invalid_url(url))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(DownloadError::invalid_url(url));
        }

        let response = self.send_get(parsed, url).await?;
        let expected_bytes = response.content_length();

        let temp_path = partial_path(destination);
        let result = write_then_finalize(response, url, &temp_path, destination, expected_bytes).await;
        if result.is_err() {
            debug!(path = %temp_path.display(), "removing partial file after error");
            let _ = tokio::fs::remove_file(&temp_path).await;
        }
        result
    }

    async fn send_get(&self, parsed: Url, url: &str) -> Result<reqwest::Response, DownloadError> {
        let response = self
            .client
            .get(parsed)
            .send()
            .await
            .map_err(|e| DownloadError::network(url, e))?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .map(ToString::to_string);
            return Err(DownloadError::http_status(url, status.as_u16(), retry_after));
        }
        Ok(response)
    }
}

/// Hidden in-progress path for `destination`: `dir/.<name>.part`.
pub(crate) fn partial_path(destination: &Path) -> PathBuf {
    let name = destination
        .file_name()
        .map_or_else(|| "download".into(), |n| n.to_string_lossy().into_owned());
    destination.with_file_name(format!(".{name}{PARTIAL_SUFFIX}"))
}

async fn write_then_finalize(
    response: reqwest::Response,
    url: &str,
    temp_path: &Path,
    destination: &Path,
    expected_bytes: Option<u64>,
) -> Result<u64, DownloadError> {
    let file = File::create(temp_path)
        .await
        .map_err(|e| DownloadError::io(temp_path, e))?;
    let bytes_written = stream_to_file(file, response, url, temp_path).await?;

    if let Some(expected) = expected_bytes.filter(|&expected| expected != bytes_written) {
        return Err(DownloadError::Truncated {
            url: url.to_string(),
            expected_bytes: expected,
            actual_bytes: bytes_written,
        });
    }

    tokio::fs::rename(temp_path, destination)
        .await
        .map_err(|e| DownloadError::io(destination, e))?;
    debug!(path = %destination.display(), bytes = bytes_written, "media file finalized");
    Ok(bytes_written)
}

async fn stream_to_file(
    file: File,
    response: reqwest::Response,
    url: &str,
    file_path: &Path,
) -> Result<u64, DownloadError> {
    let mut writer = BufWriter::new(file);
    let mut stream = response.bytes_stream();
    let mut bytes_written: u64 = 0;

    while let Some(chunk_result) = stream.next().await {
        let chunk = chunk_result.map_err(|e| DownloadError::network(url, e))?;
        writer
            .write_all(&chunk)
            .await
            .map_err(|e| DownloadError::io(file_path, e))?;
        bytes_written += chunk.len() as u64;
    }

    writer
        .flush()
        .await
        .map_err(|e| DownloadError::io(file_path, e))?;
    writer
        .get_ref()
        .sync_all()
        .await
        .map_err(|e| DownloadError::io(file_path, e))?;

    Ok(bytes_written)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::test_support::socket_guard::start_mock_server_or_skip;
    use std::time::Duration;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, ResponseTemplate};

    #[test]
    fn test_partial_path_is_hidden_sibling() {
        let path = partial_path(Path::new("/backup/123/photo.jpg"));
        assert_eq!(path, PathBuf::from("/backup/123/.photo.jpg.part"));
    }

    #[tokio::test]
    async fn test_download_rejects_non_http_scheme() {
        let dir = TempDir::new().unwrap();
        let client = HttpClient::new().unwrap();
        let result = client
            .download_to_path("ftp://x.test/a.jpg", &dir.path().join("a.jpg"))
            .await;
        assert!(matches!(result, Err(DownloadError::InvalidUrl { .. })));

        let result = client
            .download_to_path("not a url", &dir.path().join("a.jpg"))
            .await;
        assert!(matches!(result, Err(DownloadError::InvalidUrl { .. })));
    }

    #[tokio::test]
    async fn test_download_writes_exact_destination() {
        let Some(server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("GET"))
            .and(path("/media/a.jpg"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"jpeg-bytes".to_vec()))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let destination = dir.path().join("a.jpg");
        let client = HttpClient::new().unwrap();
        let bytes = client
            .download_to_path(&format!("{}/media/a.jpg", server.uri()), &destination)
            .await
            .unwrap();

        assert_eq!(bytes, 10);
        assert_eq!(std::fs::read(&destination).unwrap(), b"jpeg-bytes");
        assert!(!partial_path(&destination).exists());
    }

    #[tokio::test]
    async fn test_download_http_error_leaves_no_files() {
        let Some(server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "7"))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let destination = dir.path().join("a.jpg");
        let client = HttpClient::new().unwrap();
        let result = client
            .download_to_path(&format!("{}/a.jpg", server.uri()), &destination)
            .await;

        match result {
            Err(DownloadError::HttpStatus {
                status, retry_after, ..
            }) => {
                assert_eq!(status, 429);
                assert_eq!(retry_after.as_deref(), Some("7"));
            }
            other => panic!("expected HttpStatus, got {other:?}"),
        }
        assert!(!destination.exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    /// Serves one response whose body arrives one byte every `gap`.
    async fn serve_trickle(bytes: usize, gap: Duration) -> Option<String> {
        use tokio::io::AsyncReadExt;

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.ok()?;
        let addr = listener.local_addr().ok()?;
        tokio::spawn(async move {
            let Ok((mut socket, _)) = listener.accept().await else {
                return;
            };
            let _ = socket.set_nodelay(true);
            let mut request = [0u8; 2048];
            let _ = socket.read(&mut request).await;
            let head = format!(
                "HTTP/1.1 200 OK\r\ncontent-length: {bytes}\r\nconnection: close\r\n\r\n"
            );
            if socket.write_all(head.as_bytes()).await.is_err() {
                return;
            }
            for _ in 0..bytes {
                tokio::time::sleep(gap).await;
                if socket.write_all(b"x").await.is_err() {
                    return;
                }
            }
        });
        Some(format!("http://{addr}/slow.bin"))
    }

    fn short_read_timeouts() -> HttpTimeouts {
        HttpTimeouts {
            connect: Duration::from_secs(2),
            read: Duration::from_millis(400),
            total: None,
        }
    }

    #[tokio::test]
    async fn test_download_slow_body_outlasting_read_timeout_completes() {
        let Some(url) = serve_trickle(5, Duration::from_millis(150)).await else {
            return;
        };
        let dir = TempDir::new().unwrap();
        let destination = dir.path().join("slow.bin");
        let client = HttpClient::with_timeouts(short_read_timeouts()).unwrap();

        let bytes = client.download_to_path(&url, &destination).await.unwrap();

        assert_eq!(bytes, 5);
        assert_eq!(std::fs::read(&destination).unwrap(), b"xxxxx");
    }

    #[tokio::test]
    async fn test_download_total_deadline_still_applies_when_set() {
        let Some(url) = serve_trickle(5, Duration::from_millis(150)).await else {
            return;
        };
        let dir = TempDir::new().unwrap();
        let destination = dir.path().join("slow.bin");
        let timeouts = short_read_timeouts().with_total(Duration::from_millis(300));
        let client = HttpClient::with_timeouts(timeouts).unwrap();

        let result = client.download_to_path(&url, &destination).await;

        assert!(matches!(
            result,
            Err(DownloadError::Timeout { .. } | DownloadError::Network { .. })
        ));
        assert!(!destination.exists());
        assert!(!partial_path(&destination).exists());
    }

    #[tokio::test]
    async fn test_download_into_missing_directory_is_io_error() {
        let Some(server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"x".to_vec()))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let destination = dir.path().join("missing").join("a.jpg");
        let client = HttpClient::new().unwrap();
        let result = client
            .download_to_path(&format!("{}/a.jpg", server.uri()), &destination)
            .await;
        assert!(matches!(result, Err(DownloadError::Io { .. })));
    }
}
