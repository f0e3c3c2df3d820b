//! Runtime task state and its transition rules.
//!
//! Every enqueued job gets one [`TaskHandle`]. The handle owns the mutable
//! [`TaskState`] behind a per-task mutex and mirrors the control signal into a
//! `watch` channel so adapters blocked on I/O can be woken. All transitions
//! are methods on the handle; each one re-checks the current state under the
//! lock and reports whether it applied.

use crate::error::Interrupt;
use crate::job::JobDescriptor;
use crate::types::{MetadataStatus, Status, TaskId, TaskInfo};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::watch;

/// Control request attached to a task
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ControlSignal {
    /// No request, keep working
    Run,
    /// Stop at the next checkpoint and keep the partial artifact
    Pause,
    /// Stop at the next checkpoint and discard everything. Never cleared.
    Cancel,
}

impl ControlSignal {
    /// The interrupt a checkpoint raises for this signal
    pub fn interrupt(self) -> Option<Interrupt> {
        match self {
            ControlSignal::Run => None,
            ControlSignal::Pause => Some(Interrupt::Pause),
            ControlSignal::Cancel => Some(Interrupt::Cancel),
        }
    }
}

/// Mutable part of a task
#[derive(Clone, Debug)]
pub struct TaskState {
    /// Lifecycle state
    pub status: Status,
    /// 0-100, never decreases
    pub progress_percent: f32,
    /// Remaining time reported by the fetcher, `None` when unknown
    pub eta: Option<Duration>,
    /// Pending control request
    pub signal: ControlSignal,
    /// Resumable partial artifact left by a pause
    pub partial_artifact: Option<PathBuf>,
    /// Final artifact on success
    pub final_artifact: Option<PathBuf>,
    /// Outcome of the tagging phase
    pub metadata: MetadataStatus,
    /// Failure description
    pub error: Option<String>,
    /// Bytes retrieved so far
    pub downloaded_bytes: u64,
    /// Total bytes when known
    pub total_bytes: Option<u64>,
    /// How many times the task was admitted into a slot
    pub admissions: u32,
}

impl Default for TaskState {
    fn default() -> Self {
        Self {
            status: Status::Pending,
            progress_percent: 0.0,
            eta: None,
            signal: ControlSignal::Run,
            partial_artifact: None,
            final_artifact: None,
            metadata: MetadataStatus::NotApplied,
            error: None,
            downloaded_bytes: 0,
            total_bytes: None,
            admissions: 0,
        }
    }
}

/// Shared handle to one task
pub struct TaskHandle {
    id: TaskId,
    job: Arc<JobDescriptor>,
    state: Mutex<TaskState>,
    signal_tx: watch::Sender<ControlSignal>,
}

impl std::fmt::Debug for TaskHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskHandle")
            .field("id", &self.id)
            .field("title", &self.job.title)
            .field("status", &self.status())
            .finish()
    }
}

impl TaskHandle {
    /// Create a Pending task for `job`
    pub fn new(id: TaskId, job: Arc<JobDescriptor>) -> Self {
        let (signal_tx, _rx) = watch::channel(ControlSignal::Run);
        Self {
            id,
            job,
            state: Mutex::new(TaskState::default()),
            signal_tx,
        }
    }

    /// Task id
    pub fn id(&self) -> TaskId {
        self.id
    }

    /// The job this task runs
    pub fn job(&self) -> &Arc<JobDescriptor> {
        &self.job
    }

    // A panicking holder cannot leave the state half-written: every
    // transition assigns whole fields, so a poisoned lock is still usable.
    fn lock(&self) -> MutexGuard<'_, TaskState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Copy of the current state
    pub fn state(&self) -> TaskState {
        self.lock().clone()
    }

    /// Current status
    pub fn status(&self) -> Status {
        self.lock().status
    }

    /// Current control signal
    pub fn signal(&self) -> ControlSignal {
        self.lock().signal
    }

    /// Receiver that observes control signal changes
    pub fn watch_signal(&self) -> watch::Receiver<ControlSignal> {
        self.signal_tx.subscribe()
    }

    /// Point-in-time view for presentation layers
    pub fn snapshot(&self) -> TaskInfo {
        let state = self.lock();
        TaskInfo {
            id: self.id,
            sequence: self.job.sequence,
            title: self.job.title.clone(),
            locator: self.job.locator.clone(),
            status: state.status,
            progress_percent: state.progress_percent,
            eta_seconds: state.eta.map(|eta| eta.as_secs()),
            downloaded_bytes: state.downloaded_bytes,
            total_bytes: state.total_bytes,
            pause_requested: state.signal == ControlSignal::Pause,
            cancel_requested: state.signal == ControlSignal::Cancel,
            partial_artifact: state.partial_artifact.clone(),
            final_artifact: state.final_artifact.clone(),
            metadata: state.metadata.clone(),
            error: state.error.clone(),
        }
    }

    fn set_signal(&self, state: &mut TaskState, signal: ControlSignal) -> bool {
        if state.signal == ControlSignal::Cancel || state.signal == signal {
            return false;
        }
        state.signal = signal;
        self.signal_tx.send_replace(signal);
        true
    }

    /// Ask the worker to stop at the next checkpoint and keep its partial artifact
    ///
    /// Ignored once tagging has started and on terminal tasks.
    pub fn request_pause(&self) -> bool {
        let mut state = self.lock();
        match state.status {
            Status::Downloading => self.set_signal(&mut state, ControlSignal::Pause),
            _ => false,
        }
    }

    /// Withdraw a pending pause request of a task that is still running
    pub fn withdraw_pause(&self) -> bool {
        let mut state = self.lock();
        if state.signal != ControlSignal::Pause || state.status.is_terminal() {
            return false;
        }
        self.set_signal(&mut state, ControlSignal::Run)
    }

    /// Mark the task cancelled; sticky
    pub fn request_cancel(&self) -> bool {
        let mut state = self.lock();
        if state.status.is_terminal() {
            return false;
        }
        self.set_signal(&mut state, ControlSignal::Cancel)
    }

    /// `Pending -> Paused`: hold a queued task out of the queue
    pub fn hold(&self) -> bool {
        let mut state = self.lock();
        if state.status != Status::Pending || state.signal == ControlSignal::Cancel {
            return false;
        }
        state.status = Status::Paused;
        self.set_signal(&mut state, ControlSignal::Pause);
        true
    }

    /// `Paused -> Pending`: put a paused task back in line
    pub fn requeue(&self) -> bool {
        let mut state = self.lock();
        if state.status != Status::Paused || state.signal == ControlSignal::Cancel {
            return false;
        }
        state.status = Status::Pending;
        state.eta = None;
        self.set_signal(&mut state, ControlSignal::Run);
        true
    }

    /// `Pending -> Downloading` at slot admission
    ///
    /// Returns whether this is a re-admission, or `None` when the task is no
    /// longer admissible.
    pub fn begin_download(&self) -> Option<bool> {
        let mut state = self.lock();
        if state.status != Status::Pending || state.signal != ControlSignal::Run {
            return None;
        }
        state.status = Status::Downloading;
        state.error = None;
        let resumed = state.admissions > 0;
        state.admissions += 1;
        Some(resumed)
    }

    /// Apply a progress tick and return the checkpoint verdict
    ///
    /// `percent` is only applied when it raises the recorded value.
    pub fn record_progress(
        &self,
        percent: Option<f32>,
        downloaded_bytes: u64,
        total_bytes: Option<u64>,
        eta: Option<Duration>,
    ) -> ProgressUpdate {
        let mut state = self.lock();
        if let Some(interrupt) = state.signal.interrupt() {
            return ProgressUpdate::Interrupted(interrupt);
        }
        if state.status != Status::Downloading {
            return ProgressUpdate::Ignored;
        }
        if let Some(percent) = percent {
            let percent = percent.clamp(0.0, 100.0);
            if percent > state.progress_percent {
                state.progress_percent = percent;
            }
        }
        state.downloaded_bytes = state.downloaded_bytes.max(downloaded_bytes);
        if total_bytes.is_some() {
            state.total_bytes = total_bytes;
        }
        state.eta = eta;
        ProgressUpdate::Applied {
            percent: state.progress_percent,
            eta,
        }
    }

    /// Retrieval finished: progress is pinned to 100
    pub fn finish_fetch(&self) {
        let mut state = self.lock();
        if state.status == Status::Downloading {
            state.progress_percent = 100.0;
            state.eta = None;
            state.partial_artifact = None;
            if let Some(total) = state.total_bytes {
                state.downloaded_bytes = total;
            }
        }
    }

    /// `Downloading -> AddingMetadata`
    ///
    /// A pending pause is dropped here because there is nothing left to resume.
    pub fn begin_tagging(&self) -> Result<(), Interrupt> {
        let mut state = self.lock();
        if state.signal == ControlSignal::Cancel {
            return Err(Interrupt::Cancel);
        }
        if state.status != Status::Downloading {
            return Err(Interrupt::Cancel);
        }
        if state.signal == ControlSignal::Pause {
            self.set_signal(&mut state, ControlSignal::Run);
        }
        state.status = Status::AddingMetadata;
        Ok(())
    }

    /// `Downloading | AddingMetadata -> Completed`
    ///
    /// Refused when a cancel request is already recorded, so completion and
    /// cancellation can never both happen.
    pub fn complete(&self, path: PathBuf, metadata: MetadataStatus) -> bool {
        let mut state = self.lock();
        if state.signal == ControlSignal::Cancel
            || !matches!(state.status, Status::Downloading | Status::AddingMetadata)
        {
            return false;
        }
        if state.signal == ControlSignal::Pause {
            self.set_signal(&mut state, ControlSignal::Run);
        }
        state.status = Status::Completed;
        state.progress_percent = 100.0;
        state.eta = None;
        state.partial_artifact = None;
        state.final_artifact = Some(path);
        state.metadata = metadata;
        true
    }

    /// `Downloading -> Paused`, keeping the partial artifact
    ///
    /// Refused when the task was cancelled meanwhile.
    pub fn pause_with_partial(&self, partial: Option<PathBuf>) -> bool {
        let mut state = self.lock();
        if state.signal == ControlSignal::Cancel || state.status != Status::Downloading {
            return false;
        }
        state.status = Status::Paused;
        state.eta = None;
        state.partial_artifact = partial;
        true
    }

    /// `Downloading -> Error`
    ///
    /// Refused when the task was cancelled meanwhile; the caller terminates it instead.
    pub fn fail(&self, message: impl Into<String>) -> bool {
        let mut state = self.lock();
        if state.signal == ControlSignal::Cancel || state.status.is_terminal() {
            return false;
        }
        state.status = Status::Error;
        state.eta = None;
        state.error = Some(message.into());
        true
    }

    /// Any non-terminal state `-> Terminated`
    ///
    /// The caller is responsible for removing partial artifacts.
    pub fn terminate(&self) -> bool {
        let mut state = self.lock();
        if state.status.is_terminal() {
            return false;
        }
        self.set_signal(&mut state, ControlSignal::Cancel);
        state.status = Status::Terminated;
        state.eta = None;
        state.partial_artifact = None;
        true
    }
}

/// Result of [`TaskHandle::record_progress`]
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ProgressUpdate {
    /// Recorded; carries the effective (monotonic) percent
    Applied {
        /// Effective percent after the update
        percent: f32,
        /// Reported remaining time
        eta: Option<Duration>,
    },
    /// The task is not downloading; nothing recorded
    Ignored,
    /// A control request is pending; the fetcher must stop
    Interrupted(Interrupt),
}
