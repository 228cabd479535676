//! Shared HTTP client construction policy.
//!
//! The API client and the media client both go through [`build_http_client`]
//! so they agree on compression, proxy handling, and timeout wiring.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::time::Duration;

use reqwest::{Client, ClientBuilder, Proxy};
use thiserror::Error;
use tracing::warn;

/// Timeouts applied to a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpTimeouts {
    /// TCP/TLS connect timeout.
    pub connect: Duration,
    /// Longest wait for the next read, reset after every chunk.
    pub read: Duration,
    /// Deadline for the whole request including the body, if any.
    pub total: Option<Duration>,
}

impl HttpTimeouts {
    /// Creates connect and per-read timeouts from second counts, with no
    /// overall deadline.
    #[must_use]
    pub fn from_secs(connect_secs: u64, read_secs: u64) -> Self {
        Self {
            connect: Duration::from_secs(connect_secs),
            read: Duration::from_secs(read_secs),
            total: None,
        }
    }

    /// Adds a deadline for the whole request.
    #[must_use]
    pub fn with_total(mut self, total: Duration) -> Self {
        self.total = Some(total);
        self
    }
}

/// Failure to construct a reqwest client.
#[derive(Debug, Error)]
pub enum ClientBuildError {
    /// The builder rejected the configuration.
    #[error("HTTP client construction failed: {0}")]
    Build(#[from] reqwest::Error),

    /// The builder panicked even with system proxy lookup disabled.
    #[error("HTTP client construction panicked while loading proxy settings")]
    Panicked,
}

/// Builds a client, retrying with env-only proxy settings if the platform
/// proxy lookup panics (seen in some sandboxed macOS environments).
///
/// # Errors
///
/// Returns [`ClientBuildError`] when neither attempt yields a client.
pub fn build_http_client(
    user_agent: &str,
    timeouts: HttpTimeouts,
) -> Result<Client, ClientBuildError> {
    match try_build(user_agent, timeouts, false) {
        Err(BuildFailure::Panic) => {
            warn!("HTTP client builder panicked on system proxy lookup; using env-proxy fallback");
            match try_build(user_agent, timeouts, true) {
                Ok(client) => Ok(client),
                Err(BuildFailure::Build(error)) => Err(ClientBuildError::Build(error)),
                Err(BuildFailure::Panic) => Err(ClientBuildError::Panicked),
            }
        }
        Err(BuildFailure::Build(error)) => Err(ClientBuildError::Build(error)),
        Ok(client) => Ok(client),
    }
}

enum BuildFailure {
    Panic,
    Build(reqwest::Error),
}

fn try_build(
    user_agent: &str,
    timeouts: HttpTimeouts,
    disable_system_proxy_lookup: bool,
) -> Result<Client, BuildFailure> {
    let user_agent = user_agent.to_string();
    catch_unwind(AssertUnwindSafe(move || {
        let mut builder = Client::builder()
            .connect_timeout(timeouts.connect)
            .read_timeout(timeouts.read)
            .gzip(true)
            .user_agent(user_agent);
        if let Some(total) = timeouts.total {
            builder = builder.timeout(total);
        }
        if disable_system_proxy_lookup {
            builder = apply_env_proxy_fallback(builder.no_proxy());
        }
        builder.build().map_err(BuildFailure::Build)
    }))
    .map_err(|_| BuildFailure::Panic)?
}

fn apply_env_proxy_fallback(mut builder: ClientBuilder) -> ClientBuilder {
    if let Some(proxy) = env_proxy_for_scheme("https")
        && let Ok(resolved) = Proxy::https(&proxy)
    {
        builder = builder.proxy(resolved);
    }
    if let Some(proxy) = env_proxy_for_scheme("http")
        && let Ok(resolved) = Proxy::http(&proxy)
    {
        builder = builder.proxy(resolved);
    }
    builder
}

fn env_proxy_for_scheme(scheme: &str) -> Option<String> {
    let names: &[&str] = match scheme {
        "https" => &["HTTPS_PROXY", "https_proxy", "ALL_PROXY", "all_proxy"],
        "http" => &["HTTP_PROXY", "http_proxy", "ALL_PROXY", "all_proxy"],
        _ => return None,
    };
    names.iter().find_map(|name| {
        std::env::var(name)
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    })
}
