//! Task finalization -- commit terminal (or paused) states and emit their events.

use crate::error::FetchError;
use crate::task::TaskHandle;
use crate::types::{Event, MetadataStatus, Status, TaskOutcome};
use crate::utils::{remove_file_if_exists, remove_partial_artifacts};
use std::path::{Path, PathBuf};

use super::context::DownloadTaskContext;

/// Commit `Completed`, or terminate when a cancel won the race.
///
/// A pre-existing artifact (`AlreadyFinalized`) is never deleted on that path;
/// one produced by this run is.
pub(super) async fn finalize_completed(
    ctx: &DownloadTaskContext,
    path: PathBuf,
    metadata: MetadataStatus,
) -> TaskOutcome {
    let id = ctx.id();
    if !ctx.handle.complete(path.clone(), metadata.clone()) {
        let produced_here = metadata != MetadataStatus::AlreadyFinalized;
        let owned = produced_here.then_some(path.as_path());
        return finalize_terminated(ctx, owned).await;
    }

    match &metadata {
        MetadataStatus::Failed(reason) => tracing::warn!(
            task_id = id.0,
            path = %path.display(),
            %reason,
            "Task completed without metadata"
        ),
        _ => tracing::info!(
            task_id = id.0,
            path = %path.display(),
            ?metadata,
            "Task completed"
        ),
    }
    ctx.emit(Event::Completed { id, path, metadata });
    TaskOutcome::Completed
}

/// Commit `Paused`, or terminate when the task was cancelled meanwhile.
pub(super) async fn finalize_paused(
    ctx: &DownloadTaskContext,
    partial: Option<PathBuf>,
) -> TaskOutcome {
    let id = ctx.id();
    if !ctx.handle.pause_with_partial(partial.clone()) {
        return finalize_terminated(ctx, None).await;
    }
    tracing::info!(task_id = id.0, partial = ?partial, "Task paused");
    ctx.emit(Event::Paused { id, partial });
    TaskOutcome::Paused
}

/// Commit `Error`. Partial artifacts stay on disk until shutdown.
pub(super) async fn finalize_failed(ctx: &DownloadTaskContext, error: FetchError) -> TaskOutcome {
    let id = ctx.id();
    let message = error.to_string();
    if !ctx.handle.fail(message.clone()) {
        return finalize_terminated(ctx, None).await;
    }
    tracing::error!(task_id = id.0, error = %message, "Task failed");
    ctx.emit(Event::Failed { id, error: message });
    TaskOutcome::Failed
}

/// Remove partial artifacts (and `artifact`, when given), then commit `Terminated`.
pub(super) async fn finalize_terminated(
    ctx: &DownloadTaskContext,
    artifact: Option<&Path>,
) -> TaskOutcome {
    let id = ctx.id();
    let job = ctx.job();

    let mut removed = remove_partial_artifacts(&job.destination, &job.file_stem())
        .await
        .len();
    if let Some(artifact) = artifact
        && remove_file_if_exists(artifact).await
    {
        removed += 1;
    }

    if ctx.handle.terminate() {
        tracing::info!(task_id = id.0, removed, "Task terminated");
        ctx.emit(Event::Terminated { id });
    }
    TaskOutcome::Terminated
}

/// Record a panicked worker run as a failure
pub(crate) async fn finalize_panicked(
    handle: &TaskHandle,
    event_tx: &tokio::sync::broadcast::Sender<Event>,
) -> TaskOutcome {
    let id = handle.id();
    match handle.status() {
        Status::Completed => return TaskOutcome::Completed,
        Status::Error => return TaskOutcome::Failed,
        Status::Terminated => return TaskOutcome::Terminated,
        _ => {}
    }

    let message = "internal error: download task panicked".to_string();
    if handle.fail(message.clone()) {
        event_tx.send(Event::Failed { id, error: message }).ok();
        return TaskOutcome::Failed;
    }

    let job = handle.job();
    remove_partial_artifacts(&job.destination, &job.file_stem()).await;
    if handle.terminate() {
        event_tx.send(Event::Terminated { id }).ok();
    }
    TaskOutcome::Terminated
}
