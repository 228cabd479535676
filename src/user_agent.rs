//! Shared User-Agent strings for API and media HTTP clients.

/// Project URL for User-Agent identification (RFC 9308).
const PROJECT_UA_URL: &str = "https://github.com/fierce/post-backup";

/// Default User-Agent for media downloads.
#[must_use]
pub(crate) fn default_media_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("post-backup/{version} (archival-tool; +{PROJECT_UA_URL})")
}

/// Default User-Agent for remote API requests.
#[must_use]
pub(crate) fn default_api_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("post-backup/{version} (api-client; +{PROJECT_UA_URL})")
}
