//! Stream extraction for video-host pages.
//!
//! Pages on recognized video hosts are not media files; the best stream has
//! to be resolved and fetched by an external extractor. [`YtDlpExtractor`]
//! shells out to `yt-dlp`, asking for an mp4 stream when one exists.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, instrument};

use super::client::partial_path;
use super::error::DownloadError;

/// Format selector: best single-file mp4, else best single-file stream.
pub const BEST_STREAM_FORMAT: &str = "best[ext=mp4]/best";

const STDERR_TAIL_CHARS: usize = 400;

/// Resolves a video page URL to its best stream and saves it.
#[async_trait]
pub trait StreamExtractor: Send + Sync {
    /// Short label for logs.
    fn name(&self) -> &str;

    /// Saves the best available stream of `url` to exactly `destination`.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::StreamExtraction`] when the extractor fails
    /// and [`DownloadError::Io`] when the result cannot be moved into place.
    async fn download_best(&self, url: &str, destination: &Path) -> Result<(), DownloadError>;
}

/// [`StreamExtractor`] backed by the `yt-dlp` executable.
#[derive(Debug, Clone)]
pub struct YtDlpExtractor {
    program: PathBuf,
}

impl Default for YtDlpExtractor {
    fn default() -> Self {
        Self::new("yt-dlp")
    }
}

impl YtDlpExtractor {
    /// Uses `program` (a name on `PATH` or an explicit path).
    #[must_use]
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// The executable that will be invoked.
    #[must_use]
    pub fn program(&self) -> &Path {
        &self.program
    }

    fn command(&self, url: &str, output: &Path) -> Command {
        let mut command = Command::new(&self.program);
        command
            .arg("--no-playlist")
            .arg("--no-progress")
            .arg("--quiet")
            .arg("--no-warnings")
            .arg("--no-part")
            .arg("--format")
            .arg(BEST_STREAM_FORMAT)
            .arg("--output")
            .arg(escape_output_template(&output.to_string_lossy()))
            .arg(url)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        command
    }
}

#[async_trait]
impl StreamExtractor for YtDlpExtractor {
    fn name(&self) -> &'static str {
        "yt-dlp"
    }

    #[instrument(skip(self, destination), fields(url = %url))]
    async fn download_best(&self, url: &str, destination: &Path) -> Result<(), DownloadError> {
        let temp_path = partial_path(destination);
        let result = self.run(url, &temp_path, destination).await;
        if result.is_err() {
            let _ = tokio::fs::remove_file(&temp_path).await;
        }
        result
    }
}

impl YtDlpExtractor {
    async fn run(&self, url: &str, temp_path: &Path, destination: &Path) -> Result<(), DownloadError> {
        let output = self.command(url, temp_path).output().await.map_err(|e| {
            DownloadError::stream_extraction(
                url,
                format!("cannot run {}: {e}", self.program.display()),
            )
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(DownloadError::stream_extraction(
                url,
                format!("{} ({})", output.status, stderr_tail(&stderr)),
            ));
        }

        match tokio::fs::metadata(temp_path).await {
            Ok(meta) if meta.is_file() => {}
            _ => {
                return Err(DownloadError::stream_extraction(
                    url,
                    "extractor exited successfully but produced no file",
                ));
            }
        }

        tokio::fs::rename(temp_path, destination)
            .await
            .map_err(|e| DownloadError::io(destination, e))?;
        debug!(path = %destination.display(), "stream saved");
        Ok(())
    }
}

/// yt-dlp treats `%` in `--output` as a template field.
fn escape_output_template(path: &str) -> String {
    path.replace('%', "%%")
}

fn stderr_tail(stderr: &str) -> String {
    let trimmed = stderr.trim();
    if trimmed.is_empty() {
        return "no diagnostic output".to_string();
    }
    let count = trimmed.chars().count();
    if count <= STDERR_TAIL_CHARS {
        return trimmed.to_string();
    }
    trimmed.chars().skip(count - STDERR_TAIL_CHARS).collect()
}
