//! Startup tool checks and shutdown coordination.

use crate::config::ToolsConfig;
use crate::error::{Error, Result};
use crate::fetcher::YtDlpFetcher;
use crate::tagging::FfmpegTagger;
use crate::types::{Event, Status};
use crate::utils::{remove_partial_artifacts, remove_tag_temporaries};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;
use std::time::Duration;

use super::MediaDownloader;

/// Interval between slot checks while shutdown waits for workers
const DRAIN_POLL_INTERVAL: Duration = Duration::from_millis(100);

const FETCHER_HINT: &str =
    "install yt-dlp (https://github.com/yt-dlp/yt-dlp#installation) or set fetcher_path";
const TAGGER_HINT: &str =
    "install ffmpeg (https://ffmpeg.org/download.html) or set tagger_path";

fn resolve_tool(
    tool: &str,
    explicit: Option<&Path>,
    search_path: bool,
    hint: &str,
) -> Result<PathBuf> {
    let missing = || Error::ToolMissing {
        tool: tool.to_string(),
        hint: hint.to_string(),
    };
    match explicit {
        Some(path) if path.is_file() => Ok(path.to_path_buf()),
        Some(path) => {
            tracing::error!(tool, path = %path.display(), "Configured tool path does not exist");
            Err(missing())
        }
        None if search_path => which::which(tool).map_err(|_| missing()),
        None => Err(missing()),
    }
}

/// Locate yt-dlp per `tools`
pub(crate) fn resolve_fetcher(tools: &ToolsConfig) -> Result<YtDlpFetcher> {
    resolve_tool(
        "yt-dlp",
        tools.fetcher_path.as_deref(),
        tools.search_path,
        FETCHER_HINT,
    )
    .map(YtDlpFetcher::new)
}

/// Locate ffmpeg per `tools`
pub(crate) fn resolve_tagger(tools: &ToolsConfig) -> Result<FfmpegTagger> {
    resolve_tool(
        "ffmpeg",
        tools.tagger_path.as_deref(),
        tools.search_path,
        TAGGER_HINT,
    )
    .map(FfmpegTagger::new)
}

/// Locate ffmpeg and yt-dlp, in that order
///
/// Run this before reading any input so a missing tool is the first thing
/// reported.
pub fn resolve_tools(tools: &ToolsConfig) -> Result<(YtDlpFetcher, FfmpegTagger)> {
    let tagger = resolve_tagger(tools)?;
    let fetcher = resolve_fetcher(tools)?;
    Ok((fetcher, tagger))
}

impl MediaDownloader {
    /// Gracefully shut down the downloader
    ///
    /// This method performs a graceful shutdown sequence:
    /// 1. Stops accepting new jobs
    /// 2. Cancels all non-terminal tasks
    /// 3. Waits for occupied slots to drain, bounded by `shutdown_timeout`
    /// 4. Stops the scheduler loop
    /// 5. Sweeps partial artifacts of unfinished tasks and tagger temporaries
    /// 6. Emits [`Event::Shutdown`]
    ///
    /// Calling it more than once is harmless.
    pub async fn shutdown(&self) -> Result<()> {
        tracing::info!("Initiating graceful shutdown");

        // 1. Stop accepting new jobs
        self.queue_state.accepting_new.store(false, Ordering::SeqCst);

        // 2. Cancel everything that is still running or waiting
        if let Err(e) = self.cancel_all().await {
            tracing::warn!(error = %e, "Failed to cancel tasks during shutdown");
        }

        // 3. Wait for workers to unwind
        let timeout = self.config.shutdown_timeout;
        match tokio::time::timeout(timeout, self.wait_for_active_tasks()).await {
            Ok(()) => tracing::info!("All workers stopped"),
            Err(_) => tracing::warn!(
                timeout_secs = timeout.as_secs(),
                "Timeout waiting for workers, proceeding with shutdown"
            ),
        }

        // 4. Stop the scheduler
        self.queue_state.shutdown_token.cancel();

        // 5. Sweep leftovers
        let removed = self.sweep_artifacts().await;
        if removed > 0 {
            tracing::info!(removed, "Removed leftover artifacts");
        }

        // 6. Emit shutdown event
        self.emit_event(Event::Shutdown);

        tracing::info!("Graceful shutdown complete");
        Ok(())
    }

    /// Wait until no slot is occupied
    async fn wait_for_active_tasks(&self) {
        loop {
            let active_count = self.queue_state.scheduler.lock().await.active_count();
            if active_count == 0 {
                return;
            }
            tracing::debug!(active_count, "Waiting for active tasks to stop");
            tokio::time::sleep(DRAIN_POLL_INTERVAL).await;
        }
    }

    /// Remove partial artifacts of every unfinished task and every tagger
    /// temporary in the destinations; returns the number of files removed
    pub(crate) async fn sweep_artifacts(&self) -> usize {
        let mut removed = 0;
        let mut destinations = BTreeSet::new();

        for handle in self.handles().await {
            let job = handle.job();
            destinations.insert(job.destination.clone());
            if handle.status() != Status::Completed {
                removed += remove_partial_artifacts(&job.destination, &job.file_stem())
                    .await
                    .len();
            }
        }
        for destination in destinations {
            removed += remove_tag_temporaries(&destination).await.len();
        }
        removed
    }
}
