//! Core downloader implementation split into focused submodules.
//!
//! The `MediaDownloader` struct and its methods are organized by domain:
//! - [`queue`] - Job admission, work queue and queries
//! - [`scheduler`] - Slot assignment and completion draining
//! - [`control`] - Task lifecycle control (pause/resume/cancel)
//! - [`lifecycle`] - Startup tool checks and shutdown coordination
//! - [`download_task`] - Worker: retrieval, tagging and finalization

mod control;
mod download_task;
mod lifecycle;
mod queue;
mod scheduler;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

pub use lifecycle::resolve_tools;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::fetcher::{FetchAdapter, MediaFetcher};
use crate::tagging::{MetadataTagger, TagAdapter};
use crate::task::TaskHandle;
use crate::types::{Event, TaskId, TaskOutcome};
use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64};

/// Message a worker run sends when it ends
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Completion {
    pub(crate) id: TaskId,
    pub(crate) slot: usize,
    pub(crate) outcome: TaskOutcome,
}

/// Slot occupancy and the FIFO work queue, guarded together
#[derive(Debug)]
pub(crate) struct SchedulerState {
    /// Tasks waiting for a slot, in admission order
    pub(crate) queue: VecDeque<TaskId>,
    /// One entry per slot
    pub(crate) slots: Vec<Option<TaskId>>,
}

impl SchedulerState {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            queue: VecDeque::new(),
            slots: vec![None; capacity],
        }
    }

    /// Lowest-index free slot
    pub(crate) fn free_slot(&self) -> Option<usize> {
        self.slots.iter().position(Option::is_none)
    }

    /// Slot holding `id`
    pub(crate) fn slot_of(&self, id: TaskId) -> Option<usize> {
        self.slots.iter().position(|slot| *slot == Some(id))
    }

    pub(crate) fn active_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    /// Remove `id` from the queue, returning whether it was queued
    pub(crate) fn remove_queued(&mut self, id: TaskId) -> bool {
        let before = self.queue.len();
        self.queue.retain(|queued| *queued != id);
        self.queue.len() < before
    }

    pub(crate) fn is_idle(&self) -> bool {
        self.queue.is_empty() && self.active_count() == 0
    }
}

/// Queue, slots and task registry
#[derive(Clone)]
pub(crate) struct QueueState {
    /// Slot occupancy and work queue (one lock for both)
    pub(crate) scheduler: Arc<tokio::sync::Mutex<SchedulerState>>,
    /// Every task ever enqueued, terminal ones included
    pub(crate) tasks: Arc<tokio::sync::RwLock<BTreeMap<TaskId, Arc<TaskHandle>>>>,
    /// Next task id
    pub(crate) next_id: Arc<AtomicU64>,
    /// Wakes the scheduler loop after queue changes
    pub(crate) wake: Arc<tokio::sync::Notify>,
    /// Signalled after any change of slots or queue
    pub(crate) changed: Arc<tokio::sync::Notify>,
    /// Completion signals from workers
    pub(crate) completion_tx: tokio::sync::mpsc::UnboundedSender<Completion>,
    /// Flag to indicate whether new jobs are accepted (set to false during shutdown)
    pub(crate) accepting_new: Arc<AtomicBool>,
    /// Stops the scheduler loop
    pub(crate) shutdown_token: tokio_util::sync::CancellationToken,
}

/// Retrieval and tagging capabilities
#[derive(Clone)]
pub(crate) struct Adapters {
    pub(crate) fetch: Arc<FetchAdapter>,
    pub(crate) tag: Arc<TagAdapter>,
}

/// Batch media downloader (cloneable - all fields are Arc-wrapped)
#[derive(Clone)]
pub struct MediaDownloader {
    /// Event broadcast channel sender (multiple subscribers supported)
    pub(crate) event_tx: tokio::sync::broadcast::Sender<Event>,
    /// Configuration (wrapped in Arc for sharing across tasks)
    pub(crate) config: Arc<Config>,
    /// Queue, slots and task registry
    pub(crate) queue_state: QueueState,
    /// Fetcher and tagger
    pub(crate) adapters: Adapters,
}

impl MediaDownloader {
    /// Create a downloader backed by `yt-dlp` and `ffmpeg`
    ///
    /// Both executables are resolved before anything else happens: from the
    /// explicit paths in [`ToolsConfig`](crate::config::ToolsConfig), or from
    /// `PATH` when `search_path` is set. A missing tool is
    /// [`Error::ToolMissing`].
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use media_dl::{Config, MediaDownloader};
    ///
    /// #[tokio::main]
    /// async fn main() -> Result<(), Box<dyn std::error::Error>> {
    ///     let downloader = MediaDownloader::new(Config::default()).await?;
    ///     let mut events = downloader.subscribe();
    ///     tokio::spawn(async move {
    ///         while let Ok(event) = events.recv().await {
    ///             println!("Event: {:?}", event);
    ///         }
    ///     });
    ///     Ok(())
    /// }
    /// ```
    pub async fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let (fetcher, tagger) = lifecycle::resolve_tools(&config.tools)?;
        tracing::info!(
            fetcher = %fetcher.binary_path().display(),
            tagger = %tagger.binary_path().display(),
            "External tools resolved"
        );
        Self::with_adapters(config, Arc::new(fetcher), Arc::new(tagger)).await
    }

    /// Create a downloader with custom fetcher and tagger implementations
    ///
    /// Starts the scheduler loop on the current tokio runtime.
    pub async fn with_adapters(
        config: Config,
        fetcher: Arc<dyn MediaFetcher>,
        tagger: Arc<dyn MetadataTagger>,
    ) -> Result<Self> {
        config.validate()?;

        // Create broadcast channel with buffer size of 1000 events
        let (event_tx, _rx) = tokio::sync::broadcast::channel(1000);
        let (completion_tx, completion_rx) = tokio::sync::mpsc::unbounded_channel();

        let capacity = config.download.max_concurrent_downloads;
        let queue_state = QueueState {
            scheduler: Arc::new(tokio::sync::Mutex::new(SchedulerState::new(capacity))),
            tasks: Arc::new(tokio::sync::RwLock::new(BTreeMap::new())),
            next_id: Arc::new(AtomicU64::new(1)),
            wake: Arc::new(tokio::sync::Notify::new()),
            changed: Arc::new(tokio::sync::Notify::new()),
            completion_tx,
            accepting_new: Arc::new(AtomicBool::new(true)),
            shutdown_token: tokio_util::sync::CancellationToken::new(),
        };

        let adapters = Adapters {
            fetch: Arc::new(FetchAdapter::new(
                fetcher,
                config.download.output_extension.clone(),
                config.download.format.clone(),
            )),
            tag: Arc::new(TagAdapter::new(tagger, config.tools.tag_timeout)),
        };

        tracing::info!(
            capacity,
            fetcher = adapters.fetch.fetcher_name(),
            tagger = adapters.tag.tagger_name(),
            "Media downloader initialized"
        );

        let downloader = Self {
            event_tx,
            config: Arc::new(config),
            queue_state,
            adapters,
        };
        downloader.start_scheduler(completion_rx);
        Ok(downloader)
    }

    /// Subscribe to task events
    ///
    /// Multiple subscribers are supported. Each subscriber receives all events independently.
    /// A subscriber that falls behind by more than 1000 events receives `RecvError::Lagged`.
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Get the current configuration
    pub fn get_config(&self) -> Arc<Config> {
        Arc::clone(&self.config)
    }

    /// Emit an event to all subscribers; dropped when nobody listens
    pub(crate) fn emit_event(&self, event: Event) {
        self.event_tx.send(event).ok();
    }

    /// Look up a task handle
    pub(crate) async fn handle(&self, id: TaskId) -> Result<Arc<TaskHandle>> {
        self.queue_state
            .tasks
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(Error::TaskNotFound { id: id.0 })
    }

    /// All task handles in sequence order
    pub(crate) async fn handles(&self) -> Vec<Arc<TaskHandle>> {
        let mut handles: Vec<Arc<TaskHandle>> =
            self.queue_state.tasks.read().await.values().cloned().collect();
        handles.sort_by_key(|handle| (handle.job().sequence, handle.id()));
        handles
    }

    /// Remove partial artifacts of `handle` and mark it terminated
    pub(crate) async fn discard(&self, handle: &TaskHandle) -> bool {
        let job = handle.job();
        let removed =
            crate::utils::remove_partial_artifacts(&job.destination, &job.file_stem()).await;
        if !handle.terminate() {
            return false;
        }
        tracing::info!(
            task_id = handle.id().0,
            removed = removed.len(),
            "Task terminated"
        );
        self.emit_event(Event::Terminated { id: handle.id() });
        true
    }
}
