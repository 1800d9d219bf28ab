//! Error types for session management and report output

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the profiler outside the measurement hot path
#[derive(Debug, Error)]
pub enum ProfilerError {
    #[error("a profiling session is already open on this thread")]
    SessionActive,

    #[error("invalid table capacity {0}: need at least 2 slots (slot 0 is reserved)")]
    InvalidCapacity(usize),

    #[error("failed to write report to {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, ProfilerError>;
