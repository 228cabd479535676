//! Shared fixtures for integration tests: an in-memory post source, a fake
//! stream extractor, and helpers to wire them into an orchestrator.

#![allow(dead_code)]

pub mod socket_guard;

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use post_backup_core::{
    BackupOptions, BackupOrchestrator, DownloadError, HttpClient, ItemProcessor, MediaFetcher,
    Post, PostSource, RetryPolicy, SourceError, StreamExtractor,
};

/// Serves a fixed list of posts by offset and counts requests.
pub struct MemorySource {
    posts: Vec<Post>,
    failing_offsets: Mutex<HashSet<usize>>,
    requests: AtomicUsize,
}

impl MemorySource {
    pub fn new(posts: Vec<Post>) -> Arc<Self> {
        Arc::new(Self {
            posts,
            failing_offsets: Mutex::new(HashSet::new()),
            requests: AtomicUsize::new(0),
        })
    }

    /// Makes every request at `offset` answer with HTTP 500.
    pub fn fail_at(&self, offset: usize) {
        self.failing_offsets.lock().unwrap().insert(offset);
    }

    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PostSource for MemorySource {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn list_posts(
        &self,
        collection: &str,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<Post>, SourceError> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        if self.failing_offsets.lock().unwrap().contains(&offset) {
            return Err(SourceError::HttpStatus {
                collection: collection.to_string(),
                status: 500,
                retry_after: None,
            });
        }
        Ok(self.posts.iter().skip(offset).take(limit).cloned().collect())
    }
}

/// Writes `stream:<url>` to the destination, failing for URLs that contain
/// any of the configured markers.
#[derive(Default)]
pub struct FakeStreams {
    calls: Mutex<Vec<String>>,
    failing_markers: Vec<String>,
}

impl FakeStreams {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing_on(marker: &str) -> Arc<Self> {
        Arc::new(Self {
            failing_markers: vec![marker.to_string()],
            ..Self::default()
        })
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl StreamExtractor for FakeStreams {
    fn name(&self) -> &'static str {
        "fake-streams"
    }

    async fn download_best(&self, url: &str, destination: &Path) -> Result<(), DownloadError> {
        self.calls.lock().unwrap().push(url.to_string());
        if self.failing_markers.iter().any(|m| url.contains(m.as_str())) {
            return Err(DownloadError::stream_extraction(url, "video unavailable"));
        }
        tokio::fs::write(destination, format!("stream:{url}"))
            .await
            .map_err(|e| DownloadError::io(destination, e))
    }
}

/// Paths of one test backup.
pub struct Layout {
    pub root: PathBuf,
    pub progress: PathBuf,
}

impl Layout {
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            root: dir.join("backup"),
            progress: dir.join("progress.json"),
        }
    }

    pub fn post_dir(&self, id: &str) -> PathBuf {
        self.root.join(id)
    }
}

/// Options with no retry delays.
pub fn fast_options(page_size: usize) -> BackupOptions {
    BackupOptions {
        page_size,
        page_retry_policy: RetryPolicy::no_retry(),
        ..BackupOptions::default()
    }
}

pub fn orchestrator(
    source: Arc<MemorySource>,
    streams: Arc<FakeStreams>,
    layout: &Layout,
    options: BackupOptions,
) -> BackupOrchestrator {
    let fetcher = MediaFetcher::new(
        HttpClient::new().unwrap(),
        streams,
        RetryPolicy::no_retry(),
    );
    let processor = ItemProcessor::new(&layout.root, fetcher);
    BackupOrchestrator::new(source, processor, "testblog", &layout.progress, options)
}

/// Relative path -> contents of every file under `root`.
pub fn snapshot(root: &Path) -> BTreeMap<String, Vec<u8>> {
    let mut files = BTreeMap::new();
    collect(root, root, &mut files);
    files
}

fn collect(root: &Path, dir: &Path, files: &mut BTreeMap<String, Vec<u8>>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries {
        let path = entry.unwrap().path();
        if path.is_dir() {
            collect(root, &path, files);
        } else {
            let relative = path.strip_prefix(root).unwrap().to_string_lossy().into_owned();
            files.insert(relative, std::fs::read(&path).unwrap());
        }
    }
}
