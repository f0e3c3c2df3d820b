//! Test configuration and downloader construction

use super::fixtures::{AppendingTagger, ChunkedFetcher};
use media_dl::{Config, MediaDownloader};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// Config with `capacity` slots rooted in `root`, never searching PATH
pub fn test_config(root: &Path, capacity: usize) -> Config {
    let mut config = Config::default();
    config.download.download_dir = root.join("downloads");
    config.download.max_concurrent_downloads = capacity;
    config.tools.search_path = false;
    config.tools.tag_timeout = Duration::from_secs(5);
    config.shutdown_timeout = Duration::from_secs(5);
    config
}

/// Downloader over [`ChunkedFetcher`] and [`AppendingTagger`]
///
/// Returns the temp dir, which must outlive the downloader.
pub async fn create_downloader(
    capacity: usize,
    fetcher: ChunkedFetcher,
) -> (MediaDownloader, TempDir) {
    let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
    let config = test_config(temp_dir.path(), capacity);
    std::fs::create_dir_all(config.download_dir()).expect("Failed to create download dir");

    let downloader =
        MediaDownloader::with_adapters(config, Arc::new(fetcher), Arc::new(AppendingTagger))
            .await
            .expect("Failed to create downloader");
    (downloader, temp_dir)
}
