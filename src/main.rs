//! CLI entry point for post-backup.

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use post_backup_core::{
    BackupConfig, BackupOrchestrator, BackupSummary, HttpClient, ItemProcessor, MediaFetcher,
    TumblrClient, YtDlpExtractor,
};
use tracing::{debug, error, info, warn};

mod cli;

use cli::Args;

/// Process exit outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ProcessExit {
    /// Collection fully enumerated.
    Success,
    /// Finished, but some pages or posts were left for the next run.
    Partial,
    /// Fatal error.
    Failure,
}

impl From<ProcessExit> for ExitCode {
    fn from(value: ProcessExit) -> Self {
        match value {
            ProcessExit::Success => Self::SUCCESS,
            ProcessExit::Failure => Self::from(1),
            ProcessExit::Partial => Self::from(2),
        }
    }
}

fn determine_exit_outcome(summary: &BackupSummary) -> ProcessExit {
    if summary.is_complete() {
        ProcessExit::Success
    } else {
        ProcessExit::Partial
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env before parsing so env-backed flags see its values
    let dotenv_result = dotenvy::dotenv();

    let args = Args::parse();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match dotenv_result {
        Ok(path) => debug!(path = %path.display(), "loaded .env"),
        Err(e) if e.not_found() => {}
        Err(e) => warn!(error = %e, "ignoring unreadable .env file"),
    }

    let config = args.into_config();
    debug!(?config, "configuration resolved");

    match run(config).await {
        Ok(summary) => {
            info!(%summary, "backup complete");
            determine_exit_outcome(&summary).into()
        }
        Err(e) => {
            error!("{e:#}");
            ProcessExit::Failure.into()
        }
    }
}

async fn run(config: BackupConfig) -> Result<BackupSummary> {
    config.validate()?;
    info!(blog = %config.blog, backup_dir = %config.backup_dir.display(), "post-backup starting");

    let source = TumblrClient::with_base_url(&config.api_key, &config.api_base_url)
        .context("cannot set up API client")?;
    let http = HttpClient::new().context("cannot set up media client")?;
    let fetcher = MediaFetcher::new(
        http,
        Arc::new(YtDlpExtractor::new(&config.yt_dlp_path)),
        config.retry_policy(),
    );
    let processor = ItemProcessor::new(&config.backup_dir, fetcher)
        .with_retry_failed_media(config.retry_failed_media);

    let orchestrator = BackupOrchestrator::new(
        Arc::new(source),
        processor,
        config.blog.clone(),
        &config.progress_file,
        config.backup_options(),
    );
    let summary = orchestrator.run().await?;
    if !summary.is_complete() {
        warn!(
            pages_failed = summary.pages_failed,
            posts_failed = summary.posts_failed,
            "backup has gaps; rerun to fill them"
        );
    }
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_outcome_success_when_all_pages_fetched() {
        let summary = BackupSummary {
            pages_fetched: 3,
            ..BackupSummary::default()
        };
        assert_eq!(determine_exit_outcome(&summary), ProcessExit::Success);
    }

    #[test]
    fn test_exit_outcome_partial_when_posts_unwritten() {
        let summary = BackupSummary {
            pages_fetched: 1,
            posts_failed: 1,
            ..BackupSummary::default()
        };
        assert_eq!(determine_exit_outcome(&summary), ProcessExit::Partial);
    }

    #[test]
    fn test_exit_outcome_partial_when_pages_skipped() {
        let summary = BackupSummary {
            pages_fetched: 2,
            pages_failed: 1,
            ..BackupSummary::default()
        };
        assert_eq!(determine_exit_outcome(&summary), ProcessExit::Partial);
    }
}
