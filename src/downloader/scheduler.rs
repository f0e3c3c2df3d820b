//! Scheduler loop: assigns queued tasks to free slots and drains completions.

use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use super::download_task::{DownloadTaskContext, finalize_panicked, run_download_task};
use super::{Completion, MediaDownloader};
use crate::task::{ControlSignal, TaskHandle};
use crate::types::{Event, TaskOutcome};

impl MediaDownloader {
    /// Start the scheduler task
    ///
    /// The loop owns slot occupancy. Each turn it:
    /// 1. Admits queued tasks into free slots, lowest slot index first
    /// 2. Waits for a completion signal, a queue change or shutdown
    /// 3. Frees the slot of every completed worker run
    ///
    /// Slots are only ever freed from completion signals.
    pub(crate) fn start_scheduler(
        &self,
        mut completions: tokio::sync::mpsc::UnboundedReceiver<Completion>,
    ) -> tokio::task::JoinHandle<()> {
        let downloader = self.clone();
        let token = self.queue_state.shutdown_token.clone();
        let wake = self.queue_state.wake.clone();

        tokio::spawn(async move {
            loop {
                downloader.fill_slots().await;

                tokio::select! {
                    _ = token.cancelled() => {
                        tracing::debug!("Scheduler stopping");
                        break;
                    }
                    completion = completions.recv() => match completion {
                        Some(completion) => downloader.handle_completion(completion).await,
                        None => break,
                    },
                    _ = wake.notified() => {}
                }
            }
        })
    }

    /// Admit queued tasks into free slots
    pub(crate) async fn fill_slots(&self) {
        if self.queue_state.shutdown_token.is_cancelled() {
            return;
        }
        let mut state = self.queue_state.scheduler.lock().await;
        let mut admitted = false;

        while let Some(slot) = state.free_slot() {
            let Some(id) = state.queue.pop_front() else {
                break;
            };
            let Ok(handle) = self.handle(id).await else {
                tracing::warn!(task_id = id.0, "Queued task is not registered");
                continue;
            };
            let Some(resumed) = handle.begin_download() else {
                tracing::debug!(
                    task_id = id.0,
                    status = ?handle.status(),
                    "Skipping task that is no longer admissible"
                );
                continue;
            };

            state.slots[slot] = Some(id);
            admitted = true;
            tracing::info!(task_id = id.0, slot, resumed, "Task admitted");
            self.emit_event(Event::Started { id, slot, resumed });
            self.spawn_worker(handle, slot, resumed);
        }

        drop(state);
        if admitted {
            self.queue_state.changed.notify_waiters();
        }
    }

    fn spawn_worker(&self, handle: Arc<TaskHandle>, slot: usize, resumed: bool) {
        let ctx = DownloadTaskContext {
            handle: Arc::clone(&handle),
            slot,
            event_tx: self.event_tx.clone(),
            fetch_adapter: Arc::clone(&self.adapters.fetch),
            tag_adapter: Arc::clone(&self.adapters.tag),
            // A paused task always continues from its partial artifact
            resumable: resumed || self.config.download.resumable,
        };
        let completion_tx = self.queue_state.completion_tx.clone();
        let event_tx = self.event_tx.clone();

        tokio::spawn(async move {
            let id = handle.id();
            let outcome = match AssertUnwindSafe(run_download_task(ctx)).catch_unwind().await {
                Ok(outcome) => outcome,
                Err(_) => {
                    tracing::error!(task_id = id.0, slot, "Download task panicked");
                    finalize_panicked(&handle, &event_tx).await
                }
            };
            if completion_tx.send(Completion { id, slot, outcome }).is_err() {
                tracing::debug!(task_id = id.0, "Scheduler gone, completion dropped");
            }
        });
    }

    /// Free the slot of a finished worker run and settle paused tasks
    pub(crate) async fn handle_completion(&self, completion: Completion) {
        let Completion { id, slot, outcome } = completion;
        let mut state = self.queue_state.scheduler.lock().await;

        if outcome == TaskOutcome::Paused
            && let Ok(handle) = self.handle(id).await
        {
            match handle.signal() {
                // Cancelled while unwinding: partials go before the slot is released
                ControlSignal::Cancel => {
                    self.discard(&handle).await;
                }
                // Resumed while unwinding
                ControlSignal::Run => {
                    if handle.requeue() {
                        state.queue.push_back(id);
                        tracing::info!(task_id = id.0, "Paused task re-queued");
                        self.emit_event(Event::Resumed { id });
                    }
                }
                ControlSignal::Pause => {}
            }
        }

        if state.slots.get(slot).copied().flatten() == Some(id) {
            state.slots[slot] = None;
        } else {
            tracing::warn!(
                task_id = id.0,
                slot,
                "Completion does not match slot occupancy"
            );
            if let Some(actual) = state.slot_of(id) {
                state.slots[actual] = None;
            }
        }
        tracing::debug!(task_id = id.0, slot, ?outcome, "Slot released");

        drop(state);
        self.queue_state.changed.notify_waiters();
    }
}
