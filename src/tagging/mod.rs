//! Metadata tagging of finished artifacts.
//!
//! [`MetadataTagger`] writes a tagged copy of a file; [`TagAdapter`] turns
//! that into an in-place update: temporary sibling, bounded wait, existence
//! check, then replace. [`FfmpegTagger`] is the production implementation.

mod adapter;
mod ffmpeg;

pub use adapter::{TagAdapter, TagOutcome};
pub use ffmpeg::FfmpegTagger;

use crate::error::TagError;
use async_trait::async_trait;
use std::path::Path;

/// Metadata rewrite capability
#[async_trait]
pub trait MetadataTagger: Send + Sync {
    /// Write a copy of `source` carrying `tags` to `target`
    ///
    /// `source` must be left untouched. Dropping the returned future must
    /// abort any work in progress.
    async fn write_tagged_copy(
        &self,
        source: &Path,
        target: &Path,
        tags: &[(String, String)],
    ) -> Result<(), TagError>;

    /// Name for logs
    fn name(&self) -> &str;
}
