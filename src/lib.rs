//! # media-dl
//!
//! Batch media downloader: a fixed pool of worker slots retrieves remote media
//! listed in a table, tags every file with metadata, and reports per-task
//! progress.
//!
//! ## Design
//!
//! - **Bounded concurrency** - at most `max_concurrent_downloads` tasks occupy
//!   a slot; the rest wait in a FIFO queue
//! - **Cooperative control** - pause, resume and cancel are observed by the
//!   worker at every progress tick
//! - **Clean disk** - cancelled tasks leave no partial files behind
//! - **Event-driven** - consumers subscribe to [`Event`]s or poll snapshots
//!
//! Retrieval and tagging sit behind the [`MediaFetcher`] and [`MetadataTagger`]
//! traits; the default implementations drive `yt-dlp` and `ffmpeg`.
//!
//! ## Quick Start
//!
//! ```no_run
//! use media_dl::{Config, JobDescriptor, MediaDownloader};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let downloader = MediaDownloader::new(Config::default()).await?;
//!
//!     let mut events = downloader.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     downloader
//!         .add_jobs(vec![JobDescriptor::new(
//!             0,
//!             "https://example.com/watch?v=abc",
//!             "./downloads",
//!             "Romans 8",
//!         )])
//!         .await?;
//!     downloader.wait_until_idle().await;
//!     downloader.shutdown().await?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Configuration types
pub mod config;
/// Core downloader implementation (decomposed into focused submodules)
pub mod downloader;
/// Error types
pub mod error;
/// Retrieval boundary and the yt-dlp fetcher
pub mod fetcher;
/// Input table parsing
pub mod input;
/// Job descriptors and admission
pub mod job;
/// Metadata tagging boundary and the ffmpeg tagger
pub mod tagging;
/// Per-task runtime state
pub mod task;
/// Core types and events
pub mod types;
/// Utility functions
pub mod utils;

// Re-export commonly used types
pub use config::{Config, DownloadConfig, InputConfig, ToolsConfig};
pub use downloader::{MediaDownloader, resolve_tools};
pub use error::{Error, FetchError, Interrupt, Result, TagError};
pub use fetcher::{
    FetchAdapter, FetchOutcome, FetchProgress, FetchRequest, MediaFetcher, ProgressReporter,
    RetrievalError, YtDlpFetcher,
};
pub use input::{InputBatch, InputWarning, load_jobs};
pub use job::{Admission, JobDescriptor, RejectedJob, TagAttributes, enumerate};
pub use tagging::{FfmpegTagger, MetadataTagger, TagAdapter, TagOutcome};
pub use types::{Event, MetadataStatus, QueueStats, Status, TaskId, TaskInfo, TaskOutcome};

/// Helper function to run the downloader with graceful signal handling.
///
/// Waits for a termination signal and then calls the downloader's `shutdown()` method.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// # Example
///
/// ```no_run
/// use media_dl::{Config, MediaDownloader, run_with_shutdown};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = Config::default();
///     let downloader = MediaDownloader::new(config).await?;
///
///     // Run with automatic signal handling
///     run_with_shutdown(downloader).await?;
///
///     Ok(())
/// }
/// ```
pub async fn run_with_shutdown(downloader: MediaDownloader) -> Result<()> {
    wait_for_signal().await;
    downloader.shutdown().await
}

/// Wait for SIGTERM or SIGINT
#[cfg(unix)]
pub async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Set up signal handlers - these may fail in restricted environments (containers, tests)
    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT signal (Ctrl+C)");
                }
            }
        }
        (Err(e), _) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for SIGINT only");
            if let Ok(mut sigint) = signal(SignalKind::interrupt()) {
                sigint.recv().await;
                tracing::info!("Received SIGINT signal (Ctrl+C)");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
        (_, Err(e)) => {
            tracing::warn!(error = %e, "Could not register SIGINT handler, waiting for SIGTERM only");
            if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
                sigterm.recv().await;
                tracing::info!("Received SIGTERM signal");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
    }
}

/// Wait for Ctrl+C
#[cfg(not(unix))]
pub async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        }
    }
}
