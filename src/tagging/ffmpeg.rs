//! ffmpeg backed tagger

use super::MetadataTagger;
use crate::error::TagError;
use async_trait::async_trait;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

/// Bytes of stderr kept for error messages
const STDERR_TAIL_BYTES: usize = 512;

/// Tagger that rewrites container metadata with `ffmpeg -c copy`
///
/// Streams are copied, never re-encoded.
#[derive(Clone, Debug)]
pub struct FfmpegTagger {
    binary_path: PathBuf,
}

impl FfmpegTagger {
    /// Create a tagger with an explicit binary path
    pub fn new(binary_path: PathBuf) -> Self {
        Self { binary_path }
    }

    /// Attempt to find ffmpeg in PATH
    pub fn from_path() -> Option<Self> {
        which::which("ffmpeg").ok().map(Self::new)
    }

    /// Path of the executable
    pub fn binary_path(&self) -> &Path {
        &self.binary_path
    }

    /// Command-line arguments for one tagging run
    pub fn arguments(source: &Path, target: &Path, tags: &[(String, String)]) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "-y".into(),
            "-loglevel".into(),
            "error".into(),
            "-i".into(),
            source.as_os_str().to_owned(),
            "-map".into(),
            "0".into(),
            "-c".into(),
            "copy".into(),
        ];
        for (key, value) in tags {
            args.push("-metadata".into());
            args.push(format!("{}={}", key, value).into());
        }
        args.push(target.as_os_str().to_owned());
        args
    }
}

fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let text = text.trim();
    match text.char_indices().rev().nth(STDERR_TAIL_BYTES) {
        Some((start, _)) => text[start..].to_string(),
        None => text.to_string(),
    }
}

#[async_trait]
impl MetadataTagger for FfmpegTagger {
    async fn write_tagged_copy(
        &self,
        source: &Path,
        target: &Path,
        tags: &[(String, String)],
    ) -> Result<(), TagError> {
        let output = Command::new(&self.binary_path)
            .args(Self::arguments(source, target, tags))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| TagError::Spawn {
                tool: self.binary_path.display().to_string(),
                reason: e.to_string(),
            })?;

        if !output.status.success() {
            return Err(TagError::ToolFailed {
                status: output.status.to_string(),
                stderr: stderr_tail(&output.stderr),
            });
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "ffmpeg"
    }
}
