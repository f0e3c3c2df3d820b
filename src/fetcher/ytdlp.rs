//! yt-dlp backed fetcher

use super::{FetchProgress, FetchRequest, MediaFetcher, ProgressReporter, RetrievalError};
use crate::error::FetchError;
use async_trait::async_trait;
use regex::Regex;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::LazyLock;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;

/// Marker that starts every progress line written by the template below
const PROGRESS_MARKER: &str = "DLPROG";

/// `--progress-template` argument; fields are downloaded, total (or estimate), eta
const PROGRESS_TEMPLATE: &str = "download:DLPROG %(progress.downloaded_bytes)s \
     %(progress.total_bytes,progress.total_bytes_estimate)s %(progress.eta)s";

/// Number of stderr lines kept for error messages
const STDERR_TAIL_LINES: usize = 8;

static PROGRESS_LINE: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::expect_used)]
    let pattern = Regex::new(&format!(r"^{PROGRESS_MARKER}\s+(\S+)\s+(\S+)\s+(\S+)\s*$"))
        .expect("progress pattern is valid");
    pattern
});

/// Fetcher that drives the external `yt-dlp` executable
///
/// # Examples
///
/// ```no_run
/// use media_dl::fetcher::YtDlpFetcher;
/// use std::path::PathBuf;
///
/// // Create with explicit path
/// let fetcher = YtDlpFetcher::new(PathBuf::from("/usr/local/bin/yt-dlp"));
///
/// // Or auto-discover from PATH
/// let fetcher = YtDlpFetcher::from_path();
/// ```
#[derive(Clone, Debug)]
pub struct YtDlpFetcher {
    binary_path: PathBuf,
}

impl YtDlpFetcher {
    /// Create a fetcher with an explicit binary path
    pub fn new(binary_path: PathBuf) -> Self {
        Self { binary_path }
    }

    /// Attempt to find yt-dlp in PATH
    pub fn from_path() -> Option<Self> {
        which::which("yt-dlp").ok().map(Self::new)
    }

    /// Path of the executable
    pub fn binary_path(&self) -> &Path {
        &self.binary_path
    }

    /// Command-line arguments for `request`
    pub fn arguments(request: &FetchRequest) -> Vec<String> {
        let output_template = request
            .destination
            .join(format!("{}.%(ext)s", request.stem));
        vec![
            "-f".to_string(),
            request.format.clone(),
            "--merge-output-format".to_string(),
            request.extension.clone(),
            "-o".to_string(),
            output_template.to_string_lossy().into_owned(),
            "--newline".to_string(),
            "--progress".to_string(),
            "--progress-template".to_string(),
            PROGRESS_TEMPLATE.to_string(),
            "--print".to_string(),
            "after_move:filepath".to_string(),
            "--no-simulate".to_string(),
            if request.resumable {
                "--continue".to_string()
            } else {
                "--no-continue".to_string()
            },
            "--".to_string(),
            request.locator.clone(),
        ]
    }
}

/// Parse one progress line; `NA` fields are unknown
pub(crate) fn parse_progress_line(line: &str) -> Option<FetchProgress> {
    let captures = PROGRESS_LINE.captures(line.trim())?;
    let number = |index: usize| -> Option<f64> {
        captures
            .get(index)
            .and_then(|m| m.as_str().parse::<f64>().ok())
            .filter(|v| v.is_finite() && *v >= 0.0)
    };
    Some(FetchProgress {
        downloaded_bytes: number(1).map(|v| v as u64).unwrap_or(0),
        total_bytes: number(2).map(|v| v as u64),
        eta: number(3).map(|v| Duration::from_secs(v as u64)),
    })
}

#[derive(Clone, Copy, Debug)]
enum Stream {
    Stdout,
    Stderr,
}

fn forward_lines<R>(reader: R, stream: Stream, tx: mpsc::UnboundedSender<(Stream, String)>)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if tx.send((stream, line)).is_err() {
                break;
            }
        }
    });
}

#[async_trait]
impl MediaFetcher for YtDlpFetcher {
    async fn retrieve(
        &self,
        request: &FetchRequest,
        reporter: &ProgressReporter,
    ) -> Result<PathBuf, RetrievalError> {
        let task_id = reporter.task_id().0;
        let mut child = Command::new(&self.binary_path)
            .args(Self::arguments(request))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| FetchError::Spawn {
                tool: self.binary_path.display().to_string(),
                reason: e.to_string(),
            })?;

        let (tx, mut rx) = mpsc::unbounded_channel();
        if let Some(stdout) = child.stdout.take() {
            forward_lines(stdout, Stream::Stdout, tx.clone());
        }
        if let Some(stderr) = child.stderr.take() {
            forward_lines(stderr, Stream::Stderr, tx);
        } else {
            drop(tx);
        }

        let mut printed_path: Option<PathBuf> = None;
        let mut stderr_tail: VecDeque<String> = VecDeque::with_capacity(STDERR_TAIL_LINES);

        loop {
            let next = tokio::select! {
                interrupt = reporter.interrupted() => {
                    tracing::debug!(task_id, %interrupt, "Stopping yt-dlp");
                    if let Err(e) = child.kill().await {
                        tracing::warn!(task_id, error = %e, "Failed to kill yt-dlp");
                    }
                    return Err(RetrievalError::Interrupted(interrupt));
                }
                next = rx.recv() => next,
            };
            let Some((stream, line)) = next else {
                break;
            };

            if let Some(progress) = parse_progress_line(&line) {
                if let Err(interrupt) = reporter.report(progress) {
                    if let Err(e) = child.kill().await {
                        tracing::warn!(task_id, error = %e, "Failed to kill yt-dlp");
                    }
                    return Err(RetrievalError::Interrupted(interrupt));
                }
                continue;
            }

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            match stream {
                Stream::Stdout if !trimmed.starts_with('[') => {
                    printed_path = Some(PathBuf::from(trimmed));
                }
                Stream::Stdout => tracing::trace!(task_id, line = trimmed, "yt-dlp"),
                Stream::Stderr => {
                    if stderr_tail.len() == STDERR_TAIL_LINES {
                        stderr_tail.pop_front();
                    }
                    stderr_tail.push_back(trimmed.to_string());
                }
            }
        }

        let status = child.wait().await.map_err(FetchError::Io)?;
        if !status.success() {
            let tail = stderr_tail.into_iter().collect::<Vec<_>>().join("; ");
            let reason = if tail.is_empty() {
                format!("yt-dlp exited with {}", status)
            } else {
                format!("yt-dlp exited with {}: {}", status, tail)
            };
            return Err(FetchError::Retrieval {
                locator: request.locator.clone(),
                reason,
            }
            .into());
        }

        Ok(printed_path.unwrap_or_else(|| request.expected_path.clone()))
    }

    fn name(&self) -> &str {
        "yt-dlp"
    }
}
