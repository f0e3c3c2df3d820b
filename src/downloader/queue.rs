//! Job admission, work queue and queries.

use crate::error::{Error, Result};
use crate::job::{JobDescriptor, enumerate};
use crate::task::TaskHandle;
use crate::types::{Event, QueueStats, Status, TaskId, TaskInfo};
use std::sync::Arc;
use std::sync::atomic::Ordering;

use super::MediaDownloader;

impl MediaDownloader {
    /// Enqueue a batch of jobs
    ///
    /// Malformed descriptors are skipped and reported through
    /// [`Event::Rejected`]; the rest become Pending tasks, appended to the work
    /// queue in input order. Returns the ids of the accepted jobs.
    ///
    /// # Errors
    ///
    /// [`Error::ShuttingDown`] once [`shutdown`](Self::shutdown) has started.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use media_dl::*;
    /// # async fn example(downloader: MediaDownloader) -> Result<()> {
    /// let ids = downloader
    ///     .add_jobs(vec![JobDescriptor::new(
    ///         0,
    ///         "https://example.com/watch?v=abc",
    ///         "./downloads",
    ///         "Romans 8",
    ///     )])
    ///     .await?;
    /// downloader.wait_until_idle().await;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn add_jobs(&self, jobs: Vec<JobDescriptor>) -> Result<Vec<TaskId>> {
        if !self.queue_state.accepting_new.load(Ordering::SeqCst) {
            return Err(Error::ShuttingDown);
        }

        let admission = enumerate(jobs);
        for rejected in admission.rejected {
            self.emit_event(Event::Rejected {
                sequence: rejected.sequence,
                reason: rejected.reason,
            });
        }

        let mut ids = Vec::with_capacity(admission.accepted.len());
        {
            let mut state = self.queue_state.scheduler.lock().await;
            let mut tasks = self.queue_state.tasks.write().await;
            for job in admission.accepted {
                let id = TaskId(self.queue_state.next_id.fetch_add(1, Ordering::SeqCst));
                let title = job.title.clone();
                tasks.insert(id, Arc::new(TaskHandle::new(id, Arc::new(job))));
                state.queue.push_back(id);
                ids.push(id);
                tracing::debug!(task_id = id.0, %title, "Task queued");
                self.emit_event(Event::Queued { id, title });
            }
        }

        tracing::info!(queued = ids.len(), "Jobs added to queue");
        self.queue_state.wake.notify_one();
        self.queue_state.changed.notify_waiters();
        Ok(ids)
    }

    /// Enqueue a single job
    pub async fn add_job(&self, job: JobDescriptor) -> Result<TaskId> {
        let sequence = job.sequence;
        if let Err(reason) = job.validate() {
            return Err(Error::Other(format!("job {} rejected: {}", sequence, reason)));
        }
        let ids = self.add_jobs(vec![job]).await?;
        ids.into_iter()
            .next()
            .ok_or_else(|| Error::Other(format!("job {} was not queued", sequence)))
    }

    /// Snapshot of one task
    pub async fn task(&self, id: TaskId) -> Option<TaskInfo> {
        self.handle(id).await.ok().map(|handle| handle.snapshot())
    }

    /// Snapshots of all tasks in sequence order
    pub async fn tasks(&self) -> Vec<TaskInfo> {
        self.handles()
            .await
            .iter()
            .map(|handle| handle.snapshot())
            .collect()
    }

    /// Current slot occupancy
    pub async fn slots(&self) -> Vec<Option<TaskId>> {
        self.queue_state.scheduler.lock().await.slots.clone()
    }

    /// Ids waiting for a slot, in admission order
    pub async fn queued(&self) -> Vec<TaskId> {
        self.queue_state
            .scheduler
            .lock()
            .await
            .queue
            .iter()
            .copied()
            .collect()
    }

    /// Counts of tasks per state and slot usage
    pub async fn stats(&self) -> QueueStats {
        let (queued, active, capacity) = {
            let state = self.queue_state.scheduler.lock().await;
            (state.queue.len(), state.active_count(), state.slots.len())
        };
        let mut stats = QueueStats {
            queued,
            active,
            capacity,
            ..QueueStats::default()
        };
        for handle in self.queue_state.tasks.read().await.values() {
            match handle.status() {
                Status::Paused => stats.paused += 1,
                Status::Completed => stats.completed += 1,
                Status::Error => stats.failed += 1,
                Status::Terminated => stats.terminated += 1,
                Status::Pending | Status::Downloading | Status::AddingMetadata => {}
            }
        }
        stats
    }

    /// Whether every task reached a terminal state
    pub async fn is_finished(&self) -> bool {
        self.queue_state
            .tasks
            .read()
            .await
            .values()
            .all(|handle| handle.status().is_terminal())
    }

    /// Wait until the queue is empty and no slot is occupied
    ///
    /// Paused tasks parked outside the slots do not count as work.
    pub async fn wait_until_idle(&self) {
        loop {
            let changed = self.queue_state.changed.notified();
            tokio::pin!(changed);
            changed.as_mut().enable();

            if self.queue_state.scheduler.lock().await.is_idle() {
                return;
            }
            changed.await;
        }
    }
}
