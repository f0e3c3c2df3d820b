//! Task lifecycle control: pause, resume, cancel.
//!
//! Every operation runs under the scheduler lock, so it sees a consistent
//! picture of queue and slots. Requests for running tasks are recorded on the
//! task and observed by the worker at its next checkpoint; tasks outside the
//! slots are transitioned directly.

use crate::error::Result;
use crate::task::TaskHandle;
use crate::types::{Event, Status, TaskId};

use super::{MediaDownloader, SchedulerState};

impl MediaDownloader {
    /// Pause a task
    ///
    /// A queued task is taken out of the queue and becomes Paused at once. A
    /// downloading task stops at its next progress checkpoint, keeping its
    /// partial artifact for [`resume`](Self::resume). Tasks that are already
    /// paused, tagging or finished are left alone.
    ///
    /// # Errors
    ///
    /// [`Error::TaskNotFound`](crate::Error::TaskNotFound) for an unknown id.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use media_dl::*;
    /// # async fn example(downloader: MediaDownloader, id: TaskId) -> Result<()> {
    /// downloader.pause(id).await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn pause(&self, id: TaskId) -> Result<()> {
        let mut state = self.queue_state.scheduler.lock().await;
        let handle = self.handle(id).await?;
        let changed = self.pause_locked(&mut state, &handle);
        drop(state);
        if changed {
            self.queue_state.changed.notify_waiters();
        }
        Ok(())
    }

    /// Resume a paused task
    ///
    /// The task re-enters the back of the work queue and continues from its
    /// partial artifact once admitted. A pause request that the worker has
    /// not observed yet is simply withdrawn.
    ///
    /// # Errors
    ///
    /// [`Error::TaskNotFound`](crate::Error::TaskNotFound) for an unknown id.
    pub async fn resume(&self, id: TaskId) -> Result<()> {
        let mut state = self.queue_state.scheduler.lock().await;
        let handle = self.handle(id).await?;
        let requeued = self.resume_locked(&mut state, &handle);
        drop(state);
        if requeued {
            self.queue_state.wake.notify_one();
            self.queue_state.changed.notify_waiters();
        }
        Ok(())
    }

    /// Cancel a task
    ///
    /// The task ends Terminated and its partial artifacts are removed before
    /// its slot is released. Cancelling a finished task does nothing.
    ///
    /// # Errors
    ///
    /// [`Error::TaskNotFound`](crate::Error::TaskNotFound) for an unknown id.
    pub async fn cancel(&self, id: TaskId) -> Result<()> {
        let mut state = self.queue_state.scheduler.lock().await;
        let handle = self.handle(id).await?;
        let changed = self.cancel_locked(&mut state, &handle).await;
        drop(state);
        if changed {
            self.queue_state.changed.notify_waiters();
        }
        Ok(())
    }

    /// Pause every non-terminal task
    pub async fn pause_all(&self) -> Result<()> {
        let mut state = self.queue_state.scheduler.lock().await;
        let mut paused = 0usize;
        for handle in self.handles().await {
            if self.pause_locked(&mut state, &handle) {
                paused += 1;
            }
        }
        drop(state);

        tracing::info!(paused, "Paused all tasks");
        self.emit_event(Event::QueuePaused);
        self.queue_state.changed.notify_waiters();
        Ok(())
    }

    /// Resume every paused task, in sequence order
    pub async fn resume_all(&self) -> Result<()> {
        let mut state = self.queue_state.scheduler.lock().await;
        let mut resumed = 0usize;
        for handle in self.handles().await {
            if self.resume_locked(&mut state, &handle) {
                resumed += 1;
            }
        }
        drop(state);

        tracing::info!(resumed, "Resumed all tasks");
        self.emit_event(Event::QueueResumed);
        self.queue_state.wake.notify_one();
        self.queue_state.changed.notify_waiters();
        Ok(())
    }

    /// Cancel every non-terminal task
    pub async fn cancel_all(&self) -> Result<()> {
        let mut state = self.queue_state.scheduler.lock().await;
        let mut cancelled = 0usize;
        for handle in self.handles().await {
            if self.cancel_locked(&mut state, &handle).await {
                cancelled += 1;
            }
        }
        drop(state);

        tracing::info!(cancelled, "Cancelled all tasks");
        self.queue_state.changed.notify_waiters();
        Ok(())
    }

    fn pause_locked(&self, state: &mut SchedulerState, handle: &TaskHandle) -> bool {
        let id = handle.id();
        match handle.status() {
            Status::Pending => {
                if !handle.hold() {
                    return false;
                }
                state.remove_queued(id);
                tracing::info!(task_id = id.0, "Queued task paused");
                self.emit_event(Event::Paused {
                    id,
                    partial: handle.state().partial_artifact,
                });
                true
            }
            Status::Downloading => {
                let requested = handle.request_pause();
                if requested {
                    tracing::debug!(task_id = id.0, "Pause requested");
                }
                requested
            }
            Status::Paused
            | Status::AddingMetadata
            | Status::Completed
            | Status::Error
            | Status::Terminated => false,
        }
    }

    fn resume_locked(&self, state: &mut SchedulerState, handle: &TaskHandle) -> bool {
        let id = handle.id();
        match handle.status() {
            // Worker still unwinding; the scheduler re-queues it on completion
            Status::Paused if state.slot_of(id).is_some() => {
                handle.withdraw_pause();
                false
            }
            Status::Paused => {
                if !handle.requeue() {
                    return false;
                }
                state.queue.push_back(id);
                tracing::info!(task_id = id.0, "Task resumed");
                self.emit_event(Event::Resumed { id });
                true
            }
            Status::Downloading => {
                if handle.withdraw_pause() {
                    tracing::debug!(task_id = id.0, "Pending pause withdrawn");
                }
                false
            }
            Status::Pending
            | Status::AddingMetadata
            | Status::Completed
            | Status::Error
            | Status::Terminated => false,
        }
    }

    async fn cancel_locked(&self, state: &mut SchedulerState, handle: &TaskHandle) -> bool {
        let id = handle.id();
        let status = handle.status();
        if status.is_terminal() {
            return false;
        }

        if state.slot_of(id).is_some() {
            // The worker (or the scheduler, for a paused run) cleans up
            let requested = handle.request_cancel();
            if requested {
                tracing::debug!(task_id = id.0, ?status, "Cancel requested");
            }
            return requested;
        }

        state.remove_queued(id);
        self.discard(handle).await
    }
}
