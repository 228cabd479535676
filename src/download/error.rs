//! Error types for media downloads.

use std::path::PathBuf;

use thiserror::Error;

use crate::http_client::ClientBuildError;

/// Errors that can occur while fetching one media reference.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// Network-level error (DNS resolution, connection refused, TLS, reset).
    #[error("network error downloading {url}: {source}")]
    Network {
        /// The URL that failed to download.
        url: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// Request timed out before completion.
    #[error("timeout downloading {url}")]
    Timeout {
        /// The URL that timed out.
        url: String,
    },

    /// HTTP error response (4xx, 5xx).
    #[error("HTTP {status} downloading {url}")]
    HttpStatus {
        /// The URL that returned an error status.
        url: String,
        /// The HTTP status code.
        status: u16,
        /// The Retry-After header value, if present.
        retry_after: Option<String>,
    },

    /// File system error while writing or finalizing the file.
    #[error("IO error writing to {path}: {source}")]
    Io {
        /// The file path where the error occurred.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The URL is malformed or not http(s).
    #[error("invalid URL: {url}")]
    InvalidUrl {
        /// The invalid URL string.
        url: String,
    },

    /// The body ended before the advertised Content-Length.
    #[error("truncated download of {url}: expected {expected_bytes} bytes, got {actual_bytes}")]
    Truncated {
        /// The URL being downloaded.
        url: String,
        /// Content-Length advertised by the server.
        expected_bytes: u64,
        /// Bytes actually received.
        actual_bytes: u64,
    },

    /// The video host's stream extraction failed.
    #[error("stream extraction failed for {url}: {message}")]
    StreamExtraction {
        /// The video page URL.
        url: String,
        /// Extractor diagnostic (exit status, stderr tail).
        message: String,
    },

    /// The HTTP client could not be constructed.
    #[error(transparent)]
    Client(#[from] ClientBuildError),
}

impl DownloadError {
    /// Creates a network error, mapping reqwest timeouts to [`DownloadError::Timeout`].
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        let url = url.into();
        if source.is_timeout() {
            Self::Timeout { url }
        } else {
            Self::Network { url, source }
        }
    }

    /// Creates an HTTP status error.
    pub fn http_status(url: impl Into<String>, status: u16, retry_after: Option<String>) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
            retry_after,
        }
    }

    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates an invalid URL error.
    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }

    /// Creates a stream extraction error.
    pub fn stream_extraction(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::StreamExtraction {
            url: url.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_download_error_http_status_display() {
        let msg = DownloadError::http_status("https://x.test/a.jpg", 404, None).to_string();
        assert!(msg.contains("404"), "Expected '404' in: {msg}");
        assert!(msg.contains("https://x.test/a.jpg"), "Expected URL in: {msg}");
    }

    #[test]
    fn test_download_error_io_display() {
        let io_error = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let msg = DownloadError::io("/tmp/post/a.jpg", io_error).to_string();
        assert!(msg.contains("/tmp/post/a.jpg"), "Expected path in: {msg}");
    }

    #[test]
    fn test_download_error_truncated_display() {
        let error = DownloadError::Truncated {
            url: "https://x.test/v.mp4".to_string(),
            expected_bytes: 100,
            actual_bytes: 40,
        };
        let msg = error.to_string();
        assert!(msg.contains("100") && msg.contains("40"), "Expected sizes in: {msg}");
    }

    #[test]
    fn test_download_error_stream_extraction_display() {
        let msg = DownloadError::stream_extraction("https://youtu.be/a", "exit status 1")
            .to_string();
        assert!(msg.contains("youtu.be"), "Expected URL in: {msg}");
        assert!(msg.contains("exit status 1"), "Expected reason in: {msg}");
    }
}
