//! Download task context -- shared state for one worker run.

use crate::fetcher::{FetchAdapter, ProgressReporter};
use crate::job::JobDescriptor;
use crate::tagging::TagAdapter;
use crate::task::TaskHandle;
use crate::types::{Event, TaskId};
use std::sync::Arc;

/// Shared context for a single worker run, reducing parameter passing between helpers.
pub(crate) struct DownloadTaskContext {
    pub(crate) handle: Arc<TaskHandle>,
    pub(crate) slot: usize,
    pub(crate) event_tx: tokio::sync::broadcast::Sender<Event>,
    pub(crate) fetch_adapter: Arc<FetchAdapter>,
    pub(crate) tag_adapter: Arc<TagAdapter>,
    pub(crate) resumable: bool,
}

impl DownloadTaskContext {
    pub(super) fn id(&self) -> TaskId {
        self.handle.id()
    }

    pub(super) fn job(&self) -> Arc<JobDescriptor> {
        Arc::clone(self.handle.job())
    }

    pub(super) fn reporter(&self) -> ProgressReporter {
        ProgressReporter::new(Arc::clone(&self.handle), self.event_tx.clone())
    }

    pub(super) fn emit(&self, event: Event) {
        self.event_tx.send(event).ok();
    }
}
