//! Download task execution -- one worker run of a task in a slot.
//!
//! Split into focused submodules:
//! - [`context`] - Shared state handed to a worker
//! - [`orchestration`] - Top-level worker lifecycle (fetch, then tag)
//! - [`finalization`] - Terminal state commits and their events

mod context;
mod finalization;
mod orchestration;


pub(crate) use context::DownloadTaskContext;
pub(crate) use finalization::finalize_panicked;
pub(crate) use orchestration::run_download_task;
