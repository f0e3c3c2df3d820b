//! Shared test helpers: scripted fetcher, fake taggers and downloader setup.

use crate::config::Config;
use crate::downloader::MediaDownloader;
use crate::error::{FetchError, TagError};
use crate::fetcher::{FetchProgress, FetchRequest, MediaFetcher, ProgressReporter, RetrievalError};
use crate::job::JobDescriptor;
use crate::tagging::MetadataTagger;
use crate::task::TaskHandle;
use crate::types::{Status, TaskId, TaskInfo};
use async_trait::async_trait;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::tempdir;
use tokio::io::AsyncWriteExt;
use tokio::sync::Semaphore;

/// One recorded call to [`ScriptedFetcher::retrieve`]
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct FetchCall {
    pub(crate) locator: String,
    pub(crate) resumable: bool,
    pub(crate) start_offset: u64,
}

/// Fetcher that writes `<stem>.<ext>.part` in fixed chunks, then renames it
///
/// With a gate, every chunk waits for one semaphore permit, which lets a test
/// stop a retrieval at an exact percentage.
pub(crate) struct ScriptedFetcher {
    total_bytes: u64,
    chunks: u64,
    step_delay: Duration,
    gate: Option<Arc<Semaphore>>,
    failing: Mutex<HashSet<String>>,
    calls: Mutex<Vec<FetchCall>>,
    active: AtomicUsize,
    max_active: AtomicUsize,
}

impl ScriptedFetcher {
    /// 1000 bytes in 10 chunks, 5 ms apart
    pub(crate) fn new() -> Self {
        Self {
            total_bytes: 1000,
            chunks: 10,
            step_delay: Duration::from_millis(5),
            gate: None,
            failing: Mutex::new(HashSet::new()),
            calls: Mutex::new(Vec::new()),
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
        }
    }

    /// Chunks wait for permits of `gate` instead of sleeping
    pub(crate) fn gated(gate: Arc<Semaphore>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::new()
        }
    }

    pub(crate) fn with_step_delay(mut self, delay: Duration) -> Self {
        self.step_delay = delay;
        self
    }

    /// Retrievals of `locator` fail immediately
    pub(crate) fn fail_on(self, locator: &str) -> Self {
        self.failing.lock().unwrap().insert(locator.to_string());
        self
    }

    pub(crate) fn calls(&self) -> Vec<FetchCall> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn calls_for(&self, locator: &str) -> Vec<FetchCall> {
        self.calls()
            .into_iter()
            .filter(|call| call.locator == locator)
            .collect()
    }

    pub(crate) fn max_active(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    async fn wait_for_step(&self, reporter: &ProgressReporter) -> Result<(), RetrievalError> {
        match &self.gate {
            Some(gate) => tokio::select! {
                permit = gate.acquire() => {
                    permit.expect("gate closed").forget();
                    Ok(())
                }
                interrupt = reporter.interrupted() => Err(interrupt.into()),
            },
            None => tokio::select! {
                _ = tokio::time::sleep(self.step_delay) => Ok(()),
                interrupt = reporter.interrupted() => Err(interrupt.into()),
            },
        }
    }
}

struct ActiveGuard<'a>(&'a AtomicUsize);

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl MediaFetcher for ScriptedFetcher {
    async fn retrieve(
        &self,
        request: &FetchRequest,
        reporter: &ProgressReporter,
    ) -> Result<PathBuf, RetrievalError> {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);
        let _guard = ActiveGuard(&self.active);

        let part = request
            .destination
            .join(format!("{}.{}.part", request.stem, request.extension));
        let mut offset = if request.resumable {
            tokio::fs::metadata(&part).await.map(|m| m.len()).unwrap_or(0)
        } else {
            0
        };
        self.calls.lock().unwrap().push(FetchCall {
            locator: request.locator.clone(),
            resumable: request.resumable,
            start_offset: offset,
        });

        if self.failing.lock().unwrap().contains(&request.locator) {
            return Err(FetchError::Retrieval {
                locator: request.locator.clone(),
                reason: "HTTP Error 404: Not Found".to_string(),
            }
            .into());
        }

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(request.resumable)
            .write(true)
            .truncate(!request.resumable)
            .open(&part)
            .await
            .map_err(FetchError::Io)?;

        let chunk = self.total_bytes / self.chunks;
        while offset < self.total_bytes {
            self.wait_for_step(reporter).await?;
            let len = chunk.min(self.total_bytes - offset);
            file.write_all(&vec![b'x'; len as usize])
                .await
                .map_err(FetchError::Io)?;
            file.flush().await.map_err(FetchError::Io)?;
            offset += len;
            reporter.report(FetchProgress {
                downloaded_bytes: offset,
                total_bytes: Some(self.total_bytes),
                eta: Some(Duration::from_secs((self.total_bytes - offset) / chunk)),
            })?;
        }
        drop(file);

        tokio::fs::rename(&part, &request.expected_path)
            .await
            .map_err(FetchError::Io)?;
        Ok(request.expected_path.clone())
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Tagger that copies the source and appends `key=value` lines
#[derive(Default)]
pub(crate) struct CopyingTagger {
    skip_output: bool,
    pub(crate) runs: AtomicUsize,
}

impl CopyingTagger {
    /// Reports success without writing the target
    pub(crate) fn without_output() -> Self {
        Self {
            skip_output: true,
            ..Self::default()
        }
    }

    pub(crate) fn runs(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MetadataTagger for CopyingTagger {
    async fn write_tagged_copy(
        &self,
        source: &Path,
        target: &Path,
        tags: &[(String, String)],
    ) -> Result<(), TagError> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        if self.skip_output {
            return Ok(());
        }
        let mut content = tokio::fs::read(source)
            .await
            .map_err(|e| TagError::ToolFailed {
                status: "io".into(),
                stderr: e.to_string(),
            })?;
        for (key, value) in tags {
            content.extend_from_slice(format!("\n{}={}", key, value).as_bytes());
        }
        tokio::fs::write(target, content)
            .await
            .map_err(|e| TagError::ToolFailed {
                status: "io".into(),
                stderr: e.to_string(),
            })
    }

    fn name(&self) -> &str {
        "copying"
    }
}

/// Tagger that leaves a half-written temp file and fails
pub(crate) struct FailingTagger;

#[async_trait]
impl MetadataTagger for FailingTagger {
    async fn write_tagged_copy(
        &self,
        _source: &Path,
        target: &Path,
        _tags: &[(String, String)],
    ) -> Result<(), TagError> {
        tokio::fs::write(target, b"garbage").await.ok();
        Err(TagError::ToolFailed {
            status: "exit status: 1".into(),
            stderr: "Invalid data found when processing input".into(),
        })
    }

    fn name(&self) -> &str {
        "failing"
    }
}

/// Tagger that never finishes
pub(crate) struct HangingTagger;

#[async_trait]
impl MetadataTagger for HangingTagger {
    async fn write_tagged_copy(
        &self,
        _source: &Path,
        target: &Path,
        _tags: &[(String, String)],
    ) -> Result<(), TagError> {
        tokio::fs::write(target, b"partial").await.ok();
        std::future::pending().await
    }

    fn name(&self) -> &str {
        "hanging"
    }
}

/// Reporter bound to a fresh Downloading task for `job`
pub(crate) fn reporter_for(job: JobDescriptor) -> (ProgressReporter, Arc<TaskHandle>) {
    let handle = Arc::new(TaskHandle::new(TaskId(1), Arc::new(job)));
    handle.begin_download();
    let (event_tx, _rx) = tokio::sync::broadcast::channel(64);
    (ProgressReporter::new(handle.clone(), event_tx), handle)
}

/// Config with `capacity` slots and short timeouts, rooted in `root`
pub(crate) fn test_config(root: &Path, capacity: usize) -> Config {
    let mut config = Config::default();
    config.download.download_dir = root.join("downloads");
    config.download.max_concurrent_downloads = capacity;
    config.tools.tag_timeout = Duration::from_secs(5);
    config.tools.search_path = false;
    config.shutdown_timeout = Duration::from_secs(5);
    config
}

/// Downloader over the given adapters. Returns the tempdir, which must be kept alive.
pub(crate) async fn create_test_downloader(
    capacity: usize,
    fetcher: Arc<dyn MediaFetcher>,
    tagger: Arc<dyn MetadataTagger>,
) -> (MediaDownloader, tempfile::TempDir) {
    let temp_dir = tempdir().unwrap();
    let config = test_config(temp_dir.path(), capacity);
    std::fs::create_dir_all(&config.download.download_dir).unwrap();
    let downloader = MediaDownloader::with_adapters(config, fetcher, tagger)
        .await
        .unwrap();
    (downloader, temp_dir)
}

/// Jobs `0..count` titled `Job <n>` with locators `https://example.com/<n>`
pub(crate) fn jobs(destination: &Path, count: usize) -> Vec<JobDescriptor> {
    (0..count)
        .map(|n| {
            JobDescriptor::new(
                n,
                format!("https://example.com/{}", n),
                destination,
                format!("Job {}", n),
            )
        })
        .collect()
}

/// Poll `id` until `predicate` holds, panicking after five seconds
pub(crate) async fn wait_for_task<F>(downloader: &MediaDownloader, id: TaskId, predicate: F) -> TaskInfo
where
    F: Fn(&TaskInfo) -> bool,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let info = downloader.task(id).await.expect("unknown task");
        if predicate(&info) {
            return info;
        }
        if tokio::time::Instant::now() > deadline {
            panic!("timed out waiting for task {}: {:?}", id, info);
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

/// Poll `id` until it reaches `status`
pub(crate) async fn wait_for_status(
    downloader: &MediaDownloader,
    id: TaskId,
    status: Status,
) -> TaskInfo {
    wait_for_task(downloader, id, |info| info.status == status).await
}

/// Wait for the downloader to go idle, panicking after five seconds
pub(crate) async fn wait_idle(downloader: &MediaDownloader) {
    tokio::time::timeout(Duration::from_secs(5), downloader.wait_until_idle())
        .await
        .expect("downloader did not become idle");
}
