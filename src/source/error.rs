//! Error types for remote source requests.

use thiserror::Error;

use crate::download::FailureType;
use crate::http_client::ClientBuildError;

/// Errors raised while listing posts from the remote source.
///
/// A failed request is always one of these variants; it is never reported as
/// an empty page.
#[derive(Debug, Error)]
pub enum SourceError {
    /// Connection-level failure (DNS, refused, TLS, reset).
    #[error("network error listing posts for {collection}: {source}")]
    Network {
        /// Collection being listed.
        collection: String,
        /// The underlying reqwest error.
        #[source]
        source: reqwest::Error,
    },

    /// The request did not finish within the configured timeout.
    #[error("timeout listing posts for {collection}")]
    Timeout {
        /// Collection being listed.
        collection: String,
    },

    /// The API answered with a non-success status.
    #[error("API returned HTTP {status} listing posts for {collection}")]
    HttpStatus {
        /// Collection being listed.
        collection: String,
        /// HTTP status code.
        status: u16,
        /// Raw `Retry-After` header, when present.
        retry_after: Option<String>,
    },

    /// Credentials were rejected.
    #[error("API rejected credentials (HTTP {status}) for {collection}")]
    Unauthorized {
        /// Collection being listed.
        collection: String,
        /// HTTP status code (401 or 403).
        status: u16,
    },

    /// The response body was not the expected JSON shape.
    #[error("malformed API response for {collection}: {message}")]
    Decode {
        /// Collection being listed.
        collection: String,
        /// Parser diagnostic.
        message: String,
    },

    /// The request could not be built (bad base URL, collection name).
    #[error("invalid API request: {message}")]
    InvalidRequest {
        /// What was wrong.
        message: String,
    },

    /// The HTTP client could not be constructed.
    #[error(transparent)]
    Client(#[from] ClientBuildError),
}

impl SourceError {
    /// Creates a network error, mapping reqwest timeouts to [`SourceError::Timeout`].
    ///
    /// The request URL is dropped from the error because it carries the API key.
    pub fn from_reqwest(collection: impl Into<String>, source: reqwest::Error) -> Self {
        let collection = collection.into();
        if source.is_timeout() {
            Self::Timeout { collection }
        } else {
            Self::Network {
                collection,
                source: source.without_url(),
            }
        }
    }

    /// Creates a decode error.
    pub fn decode(collection: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            collection: collection.into(),
            message: message.into(),
        }
    }

    /// Creates an invalid-request error.
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
        }
    }

    /// Classifies the error for retry decisions.
    #[must_use]
    pub fn failure_type(&self) -> FailureType {
        match self {
            Self::Network { .. } | Self::Timeout { .. } => FailureType::Transient,
            Self::HttpStatus { status, .. } => FailureType::from_http_status(*status),
            Self::Unauthorized { .. } => FailureType::NeedsAuth,
            Self::Decode { .. } | Self::InvalidRequest { .. } | Self::Client(_) => {
                FailureType::Permanent
            }
        }
    }

    /// Returns the raw `Retry-After` header, if the server sent one.
    #[must_use]
    pub fn retry_after(&self) -> Option<&str> {
        match self {
            Self::HttpStatus { retry_after, .. } => retry_after.as_deref(),
            _ => None,
        }
    }
}
