//! Fake fetcher and tagger, input tables and stand-in tool scripts

use async_trait::async_trait;
use media_dl::{
    FetchError, FetchProgress, FetchRequest, MediaFetcher, MetadataTagger, ProgressReporter,
    RetrievalError, TagError,
};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;

/// Header row using the default column names
pub const CSV_HEADER: &str = "Title - Verses,Date,Speaker,Sermon Series,Sermon URL";

/// Fetcher that writes `<stem>.<ext>.part` in chunks and renames it when done
///
/// Locators containing `fail` are refused with a 404-style error.
#[derive(Clone, Debug)]
pub struct ChunkedFetcher {
    pub total_bytes: u64,
    pub chunks: u64,
    pub step_delay: Duration,
}

impl Default for ChunkedFetcher {
    fn default() -> Self {
        Self {
            total_bytes: 1000,
            chunks: 10,
            step_delay: Duration::from_millis(5),
        }
    }
}

impl ChunkedFetcher {
    /// Slow enough that a test can act while a retrieval is running
    pub fn slow() -> Self {
        Self {
            step_delay: Duration::from_millis(50),
            ..Self::default()
        }
    }
}

#[async_trait]
impl MediaFetcher for ChunkedFetcher {
    async fn retrieve(
        &self,
        request: &FetchRequest,
        reporter: &ProgressReporter,
    ) -> Result<PathBuf, RetrievalError> {
        if request.locator.contains("fail") {
            return Err(FetchError::Retrieval {
                locator: request.locator.clone(),
                reason: "HTTP Error 404: Not Found".to_string(),
            }
            .into());
        }

        let part = request
            .destination
            .join(format!("{}.{}.part", request.stem, request.extension));
        let mut offset = if request.resumable {
            tokio::fs::metadata(&part).await.map(|m| m.len()).unwrap_or(0)
        } else {
            0
        };
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&part)
            .await
            .map_err(FetchError::Io)?;

        let chunk = self.total_bytes / self.chunks;
        while offset < self.total_bytes {
            tokio::select! {
                _ = tokio::time::sleep(self.step_delay) => {}
                interrupt = reporter.interrupted() => return Err(interrupt.into()),
            }
            let len = chunk.min(self.total_bytes - offset);
            file.write_all(&vec![b'm'; len as usize])
                .await
                .map_err(FetchError::Io)?;
            file.flush().await.map_err(FetchError::Io)?;
            offset += len;
            reporter.report(FetchProgress {
                downloaded_bytes: offset,
                total_bytes: Some(self.total_bytes),
                eta: None,
            })?;
        }
        drop(file);

        tokio::fs::rename(&part, &request.expected_path)
            .await
            .map_err(FetchError::Io)?;
        Ok(request.expected_path.clone())
    }

    fn name(&self) -> &str {
        "chunked"
    }
}

/// Tagger that copies the source and appends one `key=value` line per tag
#[derive(Clone, Copy, Debug, Default)]
pub struct AppendingTagger;

#[async_trait]
impl MetadataTagger for AppendingTagger {
    async fn write_tagged_copy(
        &self,
        source: &Path,
        target: &Path,
        tags: &[(String, String)],
    ) -> Result<(), TagError> {
        let to_error = |e: std::io::Error| TagError::ToolFailed {
            status: "io".to_string(),
            stderr: e.to_string(),
        };
        let mut content = tokio::fs::read(source).await.map_err(to_error)?;
        for (key, value) in tags {
            content.extend_from_slice(format!("\n{}={}", key, value).as_bytes());
        }
        tokio::fs::write(target, content).await.map_err(to_error)
    }

    fn name(&self) -> &str {
        "appending"
    }
}

/// Write a CSV file with the default header and the given data rows
pub fn write_csv(dir: &Path, rows: &[&str]) -> PathBuf {
    let path = dir.join("input.csv");
    let mut content = String::from(CSV_HEADER);
    for row in rows {
        content.push('\n');
        content.push_str(row);
    }
    content.push('\n');
    std::fs::write(&path, content).expect("Failed to write csv");
    path
}

/// Tags appended by [`AppendingTagger`] to `path`
pub fn read_tags(path: &Path) -> Vec<(String, String)> {
    let content = std::fs::read(path).expect("Failed to read artifact");
    String::from_utf8_lossy(&content)
        .lines()
        .filter_map(|line| line.split_once('='))
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// Shell stand-in for yt-dlp: honors `-o`, prints two progress lines and the final path
pub const FAKE_FETCHER_SCRIPT: &str = r#"#!/bin/sh
out=""
url=""
while [ $# -gt 0 ]; do
  case "$1" in
    -o) out="$2"; shift 2 ;;
    --) url="$2"; shift 2 ;;
    *) shift ;;
  esac
done
case "$url" in
  *fail*)
    echo "ERROR: [generic] Unable to download webpage: HTTP Error 404: Not Found" >&2
    exit 1 ;;
esac
path=$(printf '%s' "$out" | sed 's/%(ext)s/mp4/')
echo "[download] Destination: $path"
echo "DLPROG 500 1000 1"
echo "DLPROG 1000 1000 0"
printf 'media' > "$path"
echo "$path"
"#;

/// Shell stand-in for ffmpeg: copies `-i` to the last argument and appends tags
pub const FAKE_TAGGER_SCRIPT: &str = r#"#!/bin/sh
src=""
tags=""
while [ $# -gt 1 ]; do
  case "$1" in
    -i) src="$2"; shift 2 ;;
    -metadata) tags="$tags
$2"; shift 2 ;;
    *) shift ;;
  esac
done
cp "$src" "$1" && printf '%s' "$tags" >> "$1"
"#;

/// Install executable `yt-dlp` and `ffmpeg` stand-ins in `dir`
#[cfg(unix)]
pub fn install_fake_tools(dir: &Path) -> (PathBuf, PathBuf) {
    use std::os::unix::fs::PermissionsExt;

    let install = |name: &str, script: &str| {
        let path = dir.join(name);
        std::fs::write(&path, script).expect("Failed to write script");
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
            .expect("Failed to make script executable");
        path
    };
    (
        install("yt-dlp", FAKE_FETCHER_SCRIPT),
        install("ffmpeg", FAKE_TAGGER_SCRIPT),
    )
}
