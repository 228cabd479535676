//! Constants for the download module.

use std::time::Duration;

/// Default HTTP connect timeout for media requests (30 seconds).
pub const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Longest stall between body chunks of a media response. Media downloads
/// have no overall deadline, so long videos are limited only by this.
pub const READ_TIMEOUT_SECS: u64 = 60;

/// Largest Retry-After delay honored before falling back to the cap.
pub const MAX_RETRY_AFTER: Duration = Duration::from_secs(600);

/// Suffix of in-progress download files.
pub const PARTIAL_SUFFIX: &str = ".part";
