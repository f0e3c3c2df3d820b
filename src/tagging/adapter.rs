//! Atomic-replace wrapper around a [`MetadataTagger`]

use super::MetadataTagger;
use crate::error::TagError;
use crate::fetcher::ProgressReporter;
use crate::job::JobDescriptor;
use crate::utils::{remove_file_if_exists, tag_temp_path};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// How a tagging run ended
#[derive(Debug)]
pub enum TagOutcome {
    /// Tags were written and the original replaced
    Applied,
    /// Tagging failed; the original is untouched
    Failed(TagError),
    /// A cancel request aborted the tagger
    Cancelled,
}

/// Runs a tagger against a temporary sibling and swaps it in
pub struct TagAdapter {
    tagger: Arc<dyn MetadataTagger>,
    timeout: Duration,
}

impl TagAdapter {
    /// Create an adapter with a per-run time bound
    pub fn new(tagger: Arc<dyn MetadataTagger>, timeout: Duration) -> Self {
        Self { tagger, timeout }
    }

    /// Name of the wrapped tagger
    pub fn tagger_name(&self) -> &str {
        self.tagger.name()
    }

    /// Tag `path` with the title and attributes of `job`
    pub async fn tag(
        &self,
        path: &Path,
        job: &JobDescriptor,
        reporter: &ProgressReporter,
    ) -> TagOutcome {
        let task_id = reporter.task_id().0;
        let Some(temp) = tag_temp_path(path) else {
            return TagOutcome::Failed(TagError::InvalidPath {
                path: path.to_path_buf(),
            });
        };
        let tags = job.attributes.to_tags(&job.title);

        tracing::debug!(
            task_id,
            tagger = self.tagger.name(),
            path = %path.display(),
            tags = tags.len(),
            "Writing metadata"
        );

        let run = tokio::time::timeout(
            self.timeout,
            self.tagger.write_tagged_copy(path, &temp, &tags),
        );
        let result = tokio::select! {
            _ = reporter.cancelled() => {
                remove_file_if_exists(&temp).await;
                tracing::info!(task_id, "Tagging aborted by cancel request");
                return TagOutcome::Cancelled;
            }
            result = run => result,
        };

        let result = match result {
            Ok(result) => result,
            Err(_) => Err(TagError::Timeout {
                path: path.to_path_buf(),
                timeout: self.timeout,
            }),
        };

        if let Err(e) = result {
            remove_file_if_exists(&temp).await;
            tracing::warn!(task_id, error = %e, "Tagging failed, keeping untagged file");
            return TagOutcome::Failed(e);
        }

        if !tokio::fs::try_exists(&temp).await.unwrap_or(false) {
            tracing::warn!(task_id, temp = %temp.display(), "Tagger produced no output");
            return TagOutcome::Failed(TagError::MissingOutput { path: temp });
        }

        if let Err(e) = tokio::fs::rename(&temp, path).await {
            remove_file_if_exists(&temp).await;
            tracing::warn!(task_id, error = %e, "Failed to replace original with tagged copy");
            return TagOutcome::Failed(TagError::Replace {
                path: path.to_path_buf(),
                reason: e.to_string(),
            });
        }

        TagOutcome::Applied
    }
}
