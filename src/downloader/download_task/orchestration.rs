//! Download task orchestration -- top-level lifecycle for a single worker run.

use crate::fetcher::FetchOutcome;
use crate::tagging::TagOutcome;
use crate::types::{Event, MetadataStatus, TaskOutcome};

use super::context::DownloadTaskContext;
use super::finalization::{
    finalize_completed, finalize_failed, finalize_paused, finalize_terminated,
};

/// Core worker -- runs one admitted task until it pauses or ends.
///
/// Phases:
/// 1. Retrieve the artifact (or find it already on disk)
/// 2. Move to AddingMetadata and tag it
/// 3. Commit the terminal state
///
/// Every exit path commits exactly one state through
/// [`finalization`](super::finalization) and returns the matching outcome,
/// which the caller forwards to the scheduler.
pub(crate) async fn run_download_task(ctx: DownloadTaskContext) -> TaskOutcome {
    let id = ctx.id();
    let job = ctx.job();
    let reporter = ctx.reporter();

    tracing::info!(
        task_id = id.0,
        slot = ctx.slot,
        title = %job.title,
        "Download task started"
    );

    // Phase 1: retrieval
    let path = match ctx.fetch_adapter.fetch(&job, &reporter, ctx.resumable).await {
        FetchOutcome::Downloaded(path) => path,
        FetchOutcome::AlreadySatisfied(path) => {
            ctx.handle.finish_fetch();
            return finalize_completed(&ctx, path, MetadataStatus::AlreadyFinalized).await;
        }
        FetchOutcome::Paused { partial } => return finalize_paused(&ctx, partial).await,
        FetchOutcome::Cancelled => return finalize_terminated(&ctx, None).await,
        FetchOutcome::Failed(e) => return finalize_failed(&ctx, e).await,
    };

    ctx.handle.finish_fetch();
    ctx.emit(Event::Progress {
        id,
        percent: 100.0,
        eta_seconds: None,
    });

    // Phase 2: tagging
    if ctx.handle.begin_tagging().is_err() {
        return finalize_terminated(&ctx, Some(&path)).await;
    }
    ctx.emit(Event::AddingMetadata { id });

    let metadata = match ctx.tag_adapter.tag(&path, &job, &reporter).await {
        TagOutcome::Applied => MetadataStatus::Applied,
        TagOutcome::Failed(e) => MetadataStatus::Failed(e.to_string()),
        TagOutcome::Cancelled => return finalize_terminated(&ctx, Some(&path)).await,
    };

    // Phase 3: commit
    finalize_completed(&ctx, path, metadata).await
}
