//! The resumable ingestion pipeline.
//!
//! - [`Pager`] walks the remote collection by offset
//! - [`ItemProcessor`] backs up one post and commits its checkpoint
//! - [`BackupOrchestrator`] runs the two over the whole collection
//!
//! Everything runs sequentially. Resumption relies on two markers: a post's
//! checkpoint record, and the existence of each media file on disk.

mod orchestrator;
mod pager;
mod processor;

pub use orchestrator::{
    BackupError, BackupOptions, BackupOrchestrator, BackupSummary, DEFAULT_PAGE_SIZE,
    MAX_CONSECUTIVE_PAGE_FAILURES, PageErrorPolicy,
};
pub use pager::{Page, PageError, Pager};
pub use processor::{
    CAPTION_PLACEHOLDER, ItemProcessor, ItemReport, ProcessError, ProcessingOutcome,
};
