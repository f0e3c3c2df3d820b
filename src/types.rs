//! Core types for media-dl

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Unique identifier for a task
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub u64);

impl TaskId {
    /// Create a new TaskId
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the inner value
    pub fn get(&self) -> u64 {
        self.0
    }
}

impl From<u64> for TaskId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for TaskId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}

/// Task status
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    /// Enqueued, waiting for a free slot
    Pending,
    /// Occupying a slot, retrieval in progress
    Downloading,
    /// Stopped by request, partial artifact kept for resumption
    Paused,
    /// Retrieval done, tagger running
    AddingMetadata,
    /// Finished successfully (with or without metadata)
    Completed,
    /// Retrieval failed
    Error,
    /// Cancelled by request
    Terminated,
}

impl Status {
    /// Whether no further transition can happen
    pub fn is_terminal(&self) -> bool {
        matches!(self, Status::Completed | Status::Error | Status::Terminated)
    }
}

/// What happened to the metadata of a finished artifact
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "reason", rename_all = "snake_case")]
pub enum MetadataStatus {
    /// Tagging has not run (yet)
    NotApplied,
    /// Tags were written
    Applied,
    /// The final artifact existed before the run and was left as-is
    AlreadyFinalized,
    /// Tagging failed; the downloaded artifact is kept untagged
    Failed(String),
}

/// How a worker run ended, carried by its completion signal
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskOutcome {
    /// Reached `Completed`
    Completed,
    /// Reached `Error`
    Failed,
    /// Reached `Paused`; the task may be re-admitted
    Paused,
    /// Reached `Terminated`
    Terminated,
}

/// Event emitted during task lifecycle
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Task added to the work queue
    Queued {
        /// Task ID
        id: TaskId,
        /// Display title
        title: String,
    },

    /// A job descriptor was refused at admission
    Rejected {
        /// Sequence index of the refused job
        sequence: usize,
        /// Why it was refused
        reason: String,
    },

    /// Task admitted into a slot
    Started {
        /// Task ID
        id: TaskId,
        /// Slot index
        slot: usize,
        /// Whether this is a re-admission after a pause
        resumed: bool,
    },

    /// Retrieval progress
    Progress {
        /// Task ID
        id: TaskId,
        /// Progress percentage (0.0 to 100.0)
        percent: f32,
        /// Estimated seconds remaining (None if unknown)
        eta_seconds: Option<u64>,
    },

    /// Task paused
    Paused {
        /// Task ID
        id: TaskId,
        /// Partial artifact kept for resumption
        partial: Option<PathBuf>,
    },

    /// Paused task will be re-admitted
    Resumed {
        /// Task ID
        id: TaskId,
    },

    /// Retrieval finished, tagging started
    AddingMetadata {
        /// Task ID
        id: TaskId,
    },

    /// Task completed
    Completed {
        /// Task ID
        id: TaskId,
        /// Final artifact
        path: PathBuf,
        /// Metadata result
        metadata: MetadataStatus,
    },

    /// Task failed
    Failed {
        /// Task ID
        id: TaskId,
        /// Error message
        error: String,
    },

    /// Task cancelled
    Terminated {
        /// Task ID
        id: TaskId,
    },

    /// All active tasks were asked to pause
    QueuePaused,

    /// All paused tasks were resumed
    QueueResumed,

    /// Graceful shutdown finished
    Shutdown,
}

/// Point-in-time view of a task, for presentation layers
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TaskInfo {
    /// Task ID
    pub id: TaskId,
    /// Sequence index from the input
    pub sequence: usize,
    /// Display title
    pub title: String,
    /// Source URL
    pub locator: String,
    /// Current status
    pub status: Status,
    /// Progress percentage (0.0 to 100.0)
    pub progress_percent: f32,
    /// Estimated seconds remaining (None if unknown)
    pub eta_seconds: Option<u64>,
    /// Bytes retrieved so far
    pub downloaded_bytes: u64,
    /// Total bytes, when the fetcher knows it
    pub total_bytes: Option<u64>,
    /// A pause request is pending or in effect
    pub pause_requested: bool,
    /// A cancel request was made
    pub cancel_requested: bool,
    /// Resumable partial artifact, if any
    pub partial_artifact: Option<PathBuf>,
    /// Final artifact, on success
    pub final_artifact: Option<PathBuf>,
    /// Metadata result
    pub metadata: MetadataStatus,
    /// Failure description for `Error` tasks
    pub error: Option<String>,
}

impl TaskInfo {
    /// Human-readable status line, e.g. `Downloading 42.0%` or `Completed (Exists)`
    pub fn status_text(&self) -> String {
        match self.status {
            Status::Pending => "Pending".to_string(),
            Status::Downloading => format!("Downloading {:.1}%", self.progress_percent),
            Status::Paused => "Paused".to_string(),
            Status::AddingMetadata => "Adding Metadata".to_string(),
            Status::Completed => match self.metadata {
                MetadataStatus::AlreadyFinalized => "Completed (Exists)".to_string(),
                MetadataStatus::Failed(_) => "Completed (No Metadata)".to_string(),
                _ => "Completed".to_string(),
            },
            Status::Error => format!("Error: {}", self.error.as_deref().unwrap_or("unknown")),
            Status::Terminated => "Terminated".to_string(),
        }
    }
}

/// Counts of tasks per state and slot usage
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
    /// Tasks waiting in the queue
    pub queued: usize,
    /// Occupied slots
    pub active: usize,
    /// Configured slot count
    pub capacity: usize,
    /// Paused tasks
    pub paused: usize,
    /// Completed tasks
    pub completed: usize,
    /// Failed tasks
    pub failed: usize,
    /// Cancelled tasks
    pub terminated: usize,
}
