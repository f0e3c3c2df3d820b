use super::*;
use crate::downloader::test_helpers::{
    CopyingTagger, FailingTagger, ScriptedFetcher, create_test_downloader, jobs, wait_for_status,
    wait_for_task, wait_idle,
};
use crate::types::{MetadataStatus, Status};
use std::time::Duration;
use tokio::sync::Semaphore;

mod scheduler;

/// Collect events until `done` matches one, panicking after five seconds
async fn collect_until<F>(
    events: &mut tokio::sync::broadcast::Receiver<Event>,
    done: F,
) -> Vec<Event>
where
    F: Fn(&Event) -> bool,
{
    let mut seen = Vec::new();
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match events.recv().await {
                Ok(event) => {
                    let stop = done(&event);
                    seen.push(event);
                    if stop {
                        return;
                    }
                }
                Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                Err(e) => panic!("event channel closed: {e}"),
            }
        }
    })
    .await
    .expect("expected event did not arrive");
    seen
}
