//! Error types for media-dl
//!
//! This module provides the error taxonomy of the library:
//! - Batch-level errors ([`Error::Validation`], [`Error::NotFound`], [`Error::ToolMissing`])
//!   abort a run before any job is scheduled
//! - Task-level errors ([`FetchError`], [`TagError`]) are recorded on the task and never
//!   raised to the controlling caller
//! - Control-flow interruptions ([`Interrupt`]) are not failures at all; they are how a
//!   fetch observes a pause or cancel request at a checkpoint

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for media-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for media-dl
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "max_concurrent_downloads")
        key: Option<String>,
    },

    /// Input table is malformed (missing required columns, unreadable header)
    #[error("validation error: {message}")]
    Validation {
        /// Human-readable description
        message: String,
        /// Required columns that were not found
        missing_columns: Vec<String>,
        /// Columns that were present in the header
        detected_columns: Vec<String>,
    },

    /// A selected path (input file, destination directory) does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// No task with this id was ever enqueued
    #[error("task {id} not found")]
    TaskNotFound {
        /// The unknown task id
        id: u64,
    },

    /// A required external executable is not installed
    #[error("required tool '{tool}' not found: {hint}")]
    ToolMissing {
        /// Executable name (e.g. "ffmpeg")
        tool: String,
        /// Installation hint shown to the user
        hint: String,
    },

    /// Shutdown in progress - not accepting new jobs
    #[error("shutdown in progress: not accepting new jobs")]
    ShuttingDown,

    /// Retrieval failed
    #[error("fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// Metadata tagging failed
    #[error("tag error: {0}")]
    Tag(#[from] TagError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV decoding error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Retrieval failures. Each one moves its task to the `Error` state.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The fetcher executable could not be started
    #[error("failed to execute {tool}: {reason}")]
    Spawn {
        /// Executable that failed to start
        tool: String,
        /// Underlying OS error
        reason: String,
    },

    /// The fetcher ran and reported a failure
    #[error("retrieval of {locator} failed: {reason}")]
    Retrieval {
        /// Source URL
        locator: String,
        /// Failure description (exit status, stderr tail)
        reason: String,
    },

    /// The fetcher reported success but the artifact is not on disk
    #[error("retrieval reported success but {path} does not exist")]
    MissingArtifact {
        /// Expected artifact path
        path: PathBuf,
    },

    /// Filesystem error around the retrieval (creating the destination, moving files)
    #[error("I/O error during retrieval: {0}")]
    Io(#[from] std::io::Error),
}

/// Tagging failures. These degrade a task to completed-without-metadata.
#[derive(Debug, Error)]
pub enum TagError {
    /// The tagger executable could not be started
    #[error("failed to execute {tool}: {reason}")]
    Spawn {
        /// Executable that failed to start
        tool: String,
        /// Underlying OS error
        reason: String,
    },

    /// The tagger exited unsuccessfully
    #[error("tagger exited with {status}: {stderr}")]
    ToolFailed {
        /// Exit status description
        status: String,
        /// Tail of the tool's stderr
        stderr: String,
    },

    /// The tagger exceeded its time bound
    #[error("tagging {path} timed out after {timeout:?}")]
    Timeout {
        /// File being tagged
        path: PathBuf,
        /// The configured bound
        timeout: Duration,
    },

    /// The temporary sibling was not produced
    #[error("temporary file {path} was not created")]
    MissingOutput {
        /// Expected temporary file
        path: PathBuf,
    },

    /// Replacing the original with the tagged copy failed
    #[error("failed to replace {path}: {reason}")]
    Replace {
        /// Original file
        path: PathBuf,
        /// Underlying error
        reason: String,
    },

    /// The path has no usable file name
    #[error("invalid path {path}")]
    InvalidPath {
        /// Offending path
        path: PathBuf,
    },
}

/// Control-flow interruption raised at a fetch checkpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Interrupt {
    /// Pause requested: stop, keep the partial artifact
    #[error("pause requested")]
    Pause,
    /// Cancellation requested: stop, the partial artifact will be removed
    #[error("cancellation requested")]
    Cancel,
}
