//! Boundary to the media retrieval capability.
//!
//! The core abstraction is the [`MediaFetcher`] trait: given a locator and a
//! destination it retrieves one artifact, reporting progress through a
//! [`ProgressReporter`] whose checkpoints carry pause and cancel requests.
//! [`FetchAdapter`] wraps a fetcher with the existing-artifact short-circuit
//! and partial-artifact bookkeeping, and [`YtDlpFetcher`] is the production
//! implementation.

mod adapter;
mod progress;
mod ytdlp;

pub use adapter::{FetchAdapter, FetchOutcome};
pub use progress::ProgressReporter;
pub use ytdlp::YtDlpFetcher;

use crate::error::{FetchError, Interrupt};
use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Duration;

/// Everything a fetcher needs to retrieve one artifact
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FetchRequest {
    /// Source URL
    pub locator: String,
    /// Directory receiving the artifact
    pub destination: PathBuf,
    /// Sanitized file stem
    pub stem: String,
    /// Container extension of the final artifact
    pub extension: String,
    /// Format selector
    pub format: String,
    /// Continue an existing partial artifact instead of starting over
    pub resumable: bool,
    /// `<destination>/<stem>.<extension>`
    pub expected_path: PathBuf,
}

/// One progress tick from a fetcher
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FetchProgress {
    /// Bytes retrieved so far
    pub downloaded_bytes: u64,
    /// Total size, when known
    pub total_bytes: Option<u64>,
    /// Remaining time, when known
    pub eta: Option<Duration>,
}

impl FetchProgress {
    /// Percentage of `total_bytes`, if the total is known and non-zero
    pub fn percent(&self) -> Option<f32> {
        match self.total_bytes {
            Some(total) if total > 0 => {
                Some((self.downloaded_bytes as f64 / total as f64 * 100.0) as f32)
            }
            _ => None,
        }
    }
}

/// Why [`MediaFetcher::retrieve`] did not produce an artifact
#[derive(Debug, thiserror::Error)]
pub enum RetrievalError {
    /// A checkpoint raised a pause or cancel request
    #[error(transparent)]
    Interrupted(Interrupt),
    /// Retrieval failed
    #[error(transparent)]
    Failed(#[from] FetchError),
}

impl From<Interrupt> for RetrievalError {
    fn from(interrupt: Interrupt) -> Self {
        RetrievalError::Interrupted(interrupt)
    }
}

/// Retrieval capability
///
/// Implementations must pass every progress tick through
/// [`ProgressReporter::report`] and stop as soon as it returns an
/// [`Interrupt`]. While blocked without progress they can await
/// [`ProgressReporter::interrupted`] instead.
#[async_trait]
pub trait MediaFetcher: Send + Sync {
    /// Retrieve the artifact, returning its path on disk
    async fn retrieve(
        &self,
        request: &FetchRequest,
        reporter: &ProgressReporter,
    ) -> Result<PathBuf, RetrievalError>;

    /// Name for logs
    fn name(&self) -> &str;
}
