//! Progress reporting and checkpoints for a running fetch.

use super::FetchProgress;
use crate::error::Interrupt;
use crate::task::{ControlSignal, ProgressUpdate, TaskHandle};
use crate::types::{Event, TaskId};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Channel from a fetcher back into its task
///
/// Each [`report`](Self::report) call is a checkpoint: it records progress in
/// the task state, emits [`Event::Progress`], and returns the interrupt of a
/// pending pause or cancel request.
#[derive(Clone)]
pub struct ProgressReporter {
    handle: Arc<TaskHandle>,
    event_tx: broadcast::Sender<Event>,
}

impl ProgressReporter {
    /// Create a reporter for `handle`
    pub fn new(handle: Arc<TaskHandle>, event_tx: broadcast::Sender<Event>) -> Self {
        Self { handle, event_tx }
    }

    /// Task this reporter writes to
    pub fn task_id(&self) -> TaskId {
        self.handle.id()
    }

    /// Record a progress tick
    pub fn report(&self, progress: FetchProgress) -> Result<(), Interrupt> {
        let update = self.handle.record_progress(
            progress.percent(),
            progress.downloaded_bytes,
            progress.total_bytes,
            progress.eta,
        );
        match update {
            ProgressUpdate::Applied { percent, eta } => {
                self.event_tx
                    .send(Event::Progress {
                        id: self.handle.id(),
                        percent,
                        eta_seconds: eta.map(|eta| eta.as_secs()),
                    })
                    .ok();
                Ok(())
            }
            ProgressUpdate::Ignored => Ok(()),
            ProgressUpdate::Interrupted(interrupt) => {
                tracing::debug!(
                    task_id = self.handle.id().0,
                    %interrupt,
                    "Checkpoint interrupted fetch"
                );
                Err(interrupt)
            }
        }
    }

    /// Checkpoint without progress
    pub fn checkpoint(&self) -> Result<(), Interrupt> {
        match self.handle.signal().interrupt() {
            Some(interrupt) => Err(interrupt),
            None => Ok(()),
        }
    }

    /// Resolve once a pause or cancel request is made
    pub async fn interrupted(&self) -> Interrupt {
        let mut rx = self.handle.watch_signal();
        let signal = match rx.wait_for(|signal| *signal != ControlSignal::Run).await {
            Ok(signal) => *signal,
            // The handle owns the sender, so this only happens while it is torn down
            Err(_) => ControlSignal::Run,
        };
        match signal.interrupt() {
            Some(interrupt) => interrupt,
            None => std::future::pending().await,
        }
    }

    /// Resolve once a cancel request is made; pause requests are ignored
    pub async fn cancelled(&self) {
        let mut rx = self.handle.watch_signal();
        if rx
            .wait_for(|signal| *signal == ControlSignal::Cancel)
            .await
            .is_err()
        {
            std::future::pending::<()>().await;
        }
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::JobDescriptor;
    use std::time::Duration;

    fn reporter() -> (ProgressReporter, Arc<TaskHandle>, broadcast::Receiver<Event>) {
        let handle = Arc::new(TaskHandle::new(
            TaskId(7),
            Arc::new(JobDescriptor::new(0, "https://example.com/a", "/media", "A")),
        ));
        handle.begin_download();
        let (tx, rx) = broadcast::channel(16);
        (ProgressReporter::new(handle.clone(), tx), handle, rx)
    }

    #[tokio::test]
    async fn report_emits_progress_event() {
        let (reporter, handle, mut rx) = reporter();

        reporter
            .report(FetchProgress {
                downloaded_bytes: 25,
                total_bytes: Some(100),
                eta: Some(Duration::from_secs(9)),
            })
            .unwrap();

        match rx.recv().await.unwrap() {
            Event::Progress {
                id,
                percent,
                eta_seconds,
            } => {
                assert_eq!(id, TaskId(7));
                assert_eq!(percent, 25.0);
                assert_eq!(eta_seconds, Some(9));
            }
            other => panic!("expected Progress, got {other:?}"),
        }
        assert_eq!(handle.state().eta, Some(Duration::from_secs(9)));
    }

    #[tokio::test]
    async fn report_returns_interrupt_after_pause() {
        let (reporter, handle, _rx) = reporter();
        handle.request_pause();

        assert_eq!(
            reporter.report(FetchProgress::default()),
            Err(Interrupt::Pause)
        );
        assert_eq!(reporter.checkpoint(), Err(Interrupt::Pause));
    }

    #[tokio::test]
    async fn interrupted_wakes_on_cancel() {
        let (reporter, handle, _rx) = reporter();

        let waiter = tokio::spawn({
            let reporter = reporter.clone();
            async move { reporter.interrupted().await }
        });
        tokio::task::yield_now().await;
        handle.request_cancel();

        let interrupt = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("interrupted() did not wake")
            .unwrap();
        assert_eq!(interrupt, Interrupt::Cancel);
    }

    #[tokio::test]
    async fn cancelled_ignores_pause() {
        let (reporter, handle, _rx) = reporter();
        handle.request_pause();

        let waited =
            tokio::time::timeout(Duration::from_millis(50), reporter.cancelled()).await;
        assert!(waited.is_err(), "pause must not resolve cancelled()");

        handle.request_cancel();
        tokio::time::timeout(Duration::from_secs(1), reporter.cancelled())
            .await
            .expect("cancelled() did not wake");
    }
}
