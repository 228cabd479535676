//! Retry classification and exponential backoff.
//!
//! Both page requests and plain media fetches are retried through a
//! [`RetryPolicy`]. Errors are first classified into a [`FailureType`];
//! only transient and rate-limited failures are retried.

use std::time::{Duration, SystemTime};

use rand::Rng;
use tracing::{debug, warn};

use super::DownloadError;
use super::constants::MAX_RETRY_AFTER;

/// Default number of retries after the first attempt.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);
const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(32);
const DEFAULT_BACKOFF_MULTIPLIER: f64 = 2.0;
const DEFAULT_MAX_JITTER: Duration = Duration::from_millis(500);

/// Classification of a failed request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureType {
    /// May succeed on retry (network, timeout, 5xx, 408).
    Transient,
    /// Will not succeed on retry (4xx, invalid URL, filesystem).
    Permanent,
    /// Credentials are missing or rejected.
    NeedsAuth,
    /// Server asked us to slow down (429).
    RateLimited,
}

impl FailureType {
    /// Classifies an HTTP status code.
    #[must_use]
    pub fn from_http_status(status: u16) -> Self {
        match status {
            401 | 403 | 407 => Self::NeedsAuth,
            408 => Self::Transient,
            429 => Self::RateLimited,
            500..=599 => Self::Transient,
            _ => Self::Permanent,
        }
    }

    fn is_retryable(self) -> bool {
        matches!(self, Self::Transient | Self::RateLimited)
    }
}

/// Outcome of consulting the policy after a failed attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Sleep for `delay`, then make attempt number `attempt`.
    Retry {
        /// Backoff before the next attempt.
        delay: Duration,
        /// 1-indexed number of the next attempt.
        attempt: u32,
    },
    /// Give up.
    DoNotRetry {
        /// Human-readable reason.
        reason: String,
    },
}

/// Exponential backoff with jitter.
///
/// `delay = min(base_delay * multiplier^(attempt-1), max_delay) + jitter`
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
    backoff_multiplier: f64,
    max_jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::with_max_retries(DEFAULT_MAX_RETRIES)
    }
}

impl RetryPolicy {
    /// Creates a policy with explicit backoff settings.
    ///
    /// `max_attempts` includes the first attempt and is clamped to at least 1.
    #[must_use]
    pub fn new(
        max_attempts: u32,
        base_delay: Duration,
        max_delay: Duration,
        backoff_multiplier: f64,
    ) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay,
            backoff_multiplier,
            max_jitter: DEFAULT_MAX_JITTER,
        }
    }

    /// Creates a default-backoff policy allowing `max_retries` retries after
    /// the first attempt.
    #[must_use]
    pub fn with_max_retries(max_retries: u32) -> Self {
        Self::new(
            max_retries.saturating_add(1),
            DEFAULT_BASE_DELAY,
            DEFAULT_MAX_DELAY,
            DEFAULT_BACKOFF_MULTIPLIER,
        )
    }

    /// Single attempt, never retries.
    #[must_use]
    pub fn no_retry() -> Self {
        Self::with_max_retries(0)
    }

    /// Replaces the maximum random jitter added to each delay.
    #[must_use]
    pub fn with_jitter(mut self, max_jitter: Duration) -> Self {
        self.max_jitter = max_jitter;
        self
    }

    /// Maximum attempts, including the first.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Decides whether to retry after `attempt` (1-indexed) failed with
    /// `failure_type`.
    #[must_use]
    pub fn should_retry(&self, failure_type: FailureType, attempt: u32) -> RetryDecision {
        if !failure_type.is_retryable() {
            return RetryDecision::DoNotRetry {
                reason: format!("{failure_type:?} failure is not retryable"),
            };
        }
        if attempt >= self.max_attempts {
            return RetryDecision::DoNotRetry {
                reason: format!("max attempts ({}) exhausted", self.max_attempts),
            };
        }

        let delay = self.backoff_delay(attempt) + self.jitter();
        debug!(attempt, delay_ms = delay.as_millis(), "will retry");
        RetryDecision::Retry {
            delay,
            attempt: attempt + 1,
        }
    }

    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_precision_loss,
        clippy::cast_sign_loss
    )]
    fn backoff_delay(&self, attempt: u32) -> Duration {
        let exponent = f64::from(attempt.saturating_sub(1));
        let delay_ms = self.base_delay.as_millis() as f64 * self.backoff_multiplier.powf(exponent);
        let capped_ms = delay_ms.min(self.max_delay.as_millis() as f64);
        Duration::from_millis(capped_ms as u64)
    }

    #[allow(clippy::cast_possible_truncation)]
    fn jitter(&self) -> Duration {
        let max_ms = self.max_jitter.as_millis() as u64;
        if max_ms == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::thread_rng().gen_range(0..=max_ms))
    }
}

/// Classifies a download error for retry decisions.
#[must_use]
pub fn classify_error(error: &DownloadError) -> FailureType {
    match error {
        DownloadError::HttpStatus { status, .. } => FailureType::from_http_status(*status),
        DownloadError::Timeout { .. } | DownloadError::Truncated { .. } => FailureType::Transient,
        DownloadError::Network { source, .. } => {
            if source.is_builder() || source.is_redirect() {
                FailureType::Permanent
            } else {
                FailureType::Transient
            }
        }
        DownloadError::Io { .. }
        | DownloadError::InvalidUrl { .. }
        | DownloadError::StreamExtraction { .. }
        | DownloadError::Client(_) => FailureType::Permanent,
    }
}

/// Parses a `Retry-After` header (delta seconds or HTTP-date), capped at
/// [`MAX_RETRY_AFTER`]. Returns `None` for unparseable or past values.
#[must_use]
pub fn parse_retry_after(header_value: &str) -> Option<Duration> {
    let header_value = header_value.trim();

    let delay = if let Ok(seconds) = header_value.parse::<u64>() {
        Duration::from_secs(seconds)
    } else {
        let at = httpdate::parse_http_date(header_value).ok()?;
        at.duration_since(SystemTime::now()).ok()?
    };

    if delay > MAX_RETRY_AFTER {
        warn!(
            delay_secs = delay.as_secs(),
            max_secs = MAX_RETRY_AFTER.as_secs(),
            "Retry-After exceeds maximum, capping"
        );
        return Some(MAX_RETRY_AFTER);
    }
    Some(delay)
}
