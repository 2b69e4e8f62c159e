//! Error types for the analysis pipeline and the job API.

use crate::domain::jobs::JobStatus;
use std::path::PathBuf;
use thiserror::Error;

pub type AnalysisResult<T> = Result<T, AnalysisError>;

/// Errors raised by a pipeline stage. Every one of them is fatal for the job.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("Unreadable video: {0}")]
    UnreadableVideo(String),

    #[error("Frame dimensions differ: expected {expected_width}x{expected_height}, got {actual_width}x{actual_height}")]
    DimensionMismatch {
        expected_width: u32,
        expected_height: u32,
        actual_width: u32,
        actual_height: u32,
    },

    #[error("Frame {index} is out of range (video has {frame_count} frames)")]
    IndexOutOfRange { index: u64, frame_count: u64 },

    #[error("Could not extract frame {index}: {reason}")]
    FrameExtraction { index: u64, reason: String },

    #[error("Could not encode thumbnail: {0}")]
    Encode(String),

    #[error("Stage ran before the '{0}' section was available")]
    MissingSection(&'static str),

    #[error("Analysis worker failed: {0}")]
    Worker(String),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("Job was cancelled")]
    Cancelled,
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Storage failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Could not serialize report: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StorageError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StorageError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Errors returned to callers of the job API.
#[derive(Debug, Error)]
pub enum JobError {
    #[error("Job not found: {0}")]
    NotFound(String),

    #[error("Job already exists: {0}")]
    AlreadyExists(String),

    #[error("Job not completed yet (status: {status}, progress: {progress}%)")]
    NotReady { status: JobStatus, progress: u8 },

    #[error("Job failed: {0}")]
    Failed(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}
