//! Fetch adapter: existing-artifact short-circuit and outcome translation.

use super::{FetchRequest, MediaFetcher, ProgressReporter, RetrievalError};
use crate::error::{FetchError, Interrupt};
use crate::job::JobDescriptor;
use crate::utils::{final_artifact_path, find_partial_artifacts, remove_partial_artifacts};
use std::path::PathBuf;
use std::sync::Arc;

/// How a fetch ended
#[derive(Debug)]
pub enum FetchOutcome {
    /// Retrieval produced the artifact
    Downloaded(PathBuf),
    /// The final artifact was already on disk; nothing was retrieved
    AlreadySatisfied(PathBuf),
    /// Stopped by a pause request; the partial artifact is kept
    Paused {
        /// Resumable partial artifact, when one was found
        partial: Option<PathBuf>,
    },
    /// Stopped by a cancel request; partial artifacts were removed
    Cancelled,
    /// Retrieval failed
    Failed(FetchError),
}

/// Wraps a [`MediaFetcher`] with the bookkeeping every fetch needs
pub struct FetchAdapter {
    fetcher: Arc<dyn MediaFetcher>,
    extension: String,
    format: String,
}

impl FetchAdapter {
    /// Create an adapter producing `<stem>.<extension>` artifacts
    pub fn new(
        fetcher: Arc<dyn MediaFetcher>,
        extension: impl Into<String>,
        format: impl Into<String>,
    ) -> Self {
        Self {
            fetcher,
            extension: extension.into(),
            format: format.into(),
        }
    }

    /// Name of the wrapped fetcher
    pub fn fetcher_name(&self) -> &str {
        self.fetcher.name()
    }

    /// Expected final artifact of `job`
    pub fn expected_path(&self, job: &JobDescriptor) -> PathBuf {
        final_artifact_path(&job.destination, &job.file_stem(), &self.extension)
    }

    /// Build the request handed to the fetcher
    pub fn request(&self, job: &JobDescriptor, resumable: bool) -> FetchRequest {
        FetchRequest {
            locator: job.locator.clone(),
            destination: job.destination.clone(),
            stem: job.file_stem(),
            extension: self.extension.clone(),
            format: self.format.clone(),
            resumable,
            expected_path: self.expected_path(job),
        }
    }

    /// Retrieve `job`, honoring pause and cancel requests
    pub async fn fetch(
        &self,
        job: &JobDescriptor,
        reporter: &ProgressReporter,
        resumable: bool,
    ) -> FetchOutcome {
        let request = self.request(job, resumable);
        let task_id = reporter.task_id().0;

        if tokio::fs::try_exists(&request.expected_path)
            .await
            .unwrap_or(false)
        {
            tracing::info!(
                task_id,
                path = %request.expected_path.display(),
                "Final artifact already exists, skipping retrieval"
            );
            return FetchOutcome::AlreadySatisfied(request.expected_path);
        }

        if let Err(e) = tokio::fs::create_dir_all(&request.destination).await {
            tracing::error!(
                task_id,
                destination = %request.destination.display(),
                error = %e,
                "Failed to create destination directory"
            );
            return FetchOutcome::Failed(FetchError::Io(e));
        }

        let result = match reporter.checkpoint() {
            Err(interrupt) => Err(RetrievalError::Interrupted(interrupt)),
            Ok(()) => {
                tracing::debug!(
                    task_id,
                    fetcher = self.fetcher.name(),
                    locator = %request.locator,
                    resumable,
                    "Starting retrieval"
                );
                self.fetcher.retrieve(&request, reporter).await
            }
        };

        match result {
            Ok(path) => {
                if tokio::fs::try_exists(&path).await.unwrap_or(false) {
                    FetchOutcome::Downloaded(path)
                } else if path != request.expected_path
                    && tokio::fs::try_exists(&request.expected_path)
                        .await
                        .unwrap_or(false)
                {
                    FetchOutcome::Downloaded(request.expected_path)
                } else {
                    FetchOutcome::Failed(FetchError::MissingArtifact { path })
                }
            }
            Err(RetrievalError::Interrupted(Interrupt::Pause)) => {
                let partial = find_partial_artifacts(&request.destination, &request.stem)
                    .await
                    .ok()
                    .and_then(|found| {
                        let in_progress = found
                            .iter()
                            .position(|path| path.extension().is_some_and(|ext| ext == "part"))
                            .unwrap_or(0);
                        found.into_iter().nth(in_progress)
                    });
                tracing::info!(
                    task_id,
                    partial = ?partial,
                    "Retrieval paused"
                );
                FetchOutcome::Paused { partial }
            }
            Err(RetrievalError::Interrupted(Interrupt::Cancel)) => {
                let removed = remove_partial_artifacts(&request.destination, &request.stem).await;
                tracing::info!(
                    task_id,
                    removed = removed.len(),
                    "Retrieval cancelled, partial artifacts removed"
                );
                FetchOutcome::Cancelled
            }
            Err(RetrievalError::Failed(e)) => {
                tracing::warn!(task_id, error = %e, "Retrieval failed");
                FetchOutcome::Failed(e)
            }
        }
    }
}
