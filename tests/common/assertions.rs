//! Custom test assertions for integration tests

use media_dl::{Event, MediaDownloader, Status, TaskId, TaskInfo};
use std::path::Path;
use std::time::Duration;
use tokio::sync::broadcast;

/// Poll `id` until it reaches a terminal status
///
/// Returns `None` on timeout.
pub async fn wait_for_terminal(
    downloader: &MediaDownloader,
    id: TaskId,
    timeout: Duration,
) -> Option<TaskInfo> {
    wait_for(downloader, id, timeout, |info| info.status.is_terminal()).await
}

/// Poll `id` until it reaches `status`
pub async fn wait_for_status(
    downloader: &MediaDownloader,
    id: TaskId,
    status: Status,
    timeout: Duration,
) -> Option<TaskInfo> {
    wait_for(downloader, id, timeout, |info| info.status == status).await
}

/// Poll `id` until `predicate` holds
pub async fn wait_for<F>(
    downloader: &MediaDownloader,
    id: TaskId,
    timeout: Duration,
    predicate: F,
) -> Option<TaskInfo>
where
    F: Fn(&TaskInfo) -> bool,
{
    tokio::time::timeout(timeout, async {
        loop {
            if let Some(info) = downloader.task(id).await
                && predicate(&info)
            {
                return info;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .ok()
}

/// Collect events until `predicate` matches one (inclusive) or the timeout passes
pub async fn collect_events_until<F>(
    events: &mut broadcast::Receiver<Event>,
    timeout: Duration,
    predicate: F,
) -> Vec<Event>
where
    F: Fn(&Event) -> bool,
{
    let mut collected = Vec::new();
    let _ = tokio::time::timeout(timeout, async {
        loop {
            match events.recv().await {
                Ok(event) => {
                    let done = predicate(&event);
                    collected.push(event);
                    if done {
                        return;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return,
            }
        }
    })
    .await;
    collected
}

/// File names in `dir` that look like leftovers of an unfinished retrieval or tagging run
pub fn leftover_artifacts(dir: &Path) -> Vec<String> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .filter(|name| name.ends_with(".part") || name.contains("_meta."))
        .collect()
}
