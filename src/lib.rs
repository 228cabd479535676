//! Post Backup Core Library
//!
//! Incremental, resumable backup of a remote post collection (captions,
//! images, videos) to a local directory tree. A run can be interrupted at
//! any point and restarted without redoing committed work.
//!
//! # Architecture
//!
//! - [`source`] - Remote collection client ([`PostSource`], [`TumblrClient`])
//! - [`media`] - Media reference extraction from a post
//! - [`download`] - Media fetching with streaming, retry, and stream extraction
//! - [`checkpoint`] - Durable completion record
//! - [`pipeline`] - Pager, item processor, and orchestrator
//! - [`config`] - Validated run configuration

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod checkpoint;
pub mod config;
pub mod download;
pub mod http_client;
pub mod media;
pub mod pipeline;
pub mod source;
mod user_agent;

#[cfg(test)]
pub(crate) mod test_support;

// Re-export commonly used types
pub use checkpoint::{CheckpointError, CheckpointRecord, CheckpointStore};
pub use config::{BackupConfig, ConfigError};
pub use download::{
    DownloadError, FailureType, FetchOutcome, HttpClient, MediaFetcher, RetryPolicy,
    StreamExtractor, YtDlpExtractor,
};
pub use media::{MediaKind, MediaReference, extract_media};
pub use pipeline::{
    BackupError, BackupOptions, BackupOrchestrator, BackupSummary, ItemProcessor,
    PageErrorPolicy, ProcessingOutcome,
};
pub use source::{Post, PostId, PostSource, SourceError, TumblrClient};
