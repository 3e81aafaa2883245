//! Error types for the retrieval core.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Errors produced by indexing, retrieval, persistence, and evaluation.
#[derive(Debug, Error)]
pub enum Error {
    /// A retrieval backend failed to answer a query.
    #[error("{backend} backend failed: {message}")]
    Backend { backend: String, message: String },

    /// A retrieval backend did not answer within its deadline.
    #[error("{backend} backend timed out after {}ms", .after.as_millis())]
    Timeout { backend: String, after: Duration },

    /// Neither the sparse nor the dense side produced results.
    #[error("all retrieval backends failed (sparse: {sparse}; dense: {dense})")]
    AllBackendsFailed { sparse: String, dense: String },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A persisted artifact is unreadable, partial, or inconsistent.
    #[error("corrupt artifact {}: {reason}", .path.display())]
    CorruptArtifact { path: PathBuf, reason: String },

    #[error("malformed dataset {}: {reason}", .path.display())]
    Dataset { path: PathBuf, reason: String },

    #[error("malformed corpus {}: {reason}", .path.display())]
    Corpus { path: PathBuf, reason: String },

    #[error("chunk {0} is already indexed")]
    DuplicateChunk(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Bincode(#[from] bincode::Error),
}

impl Error {
    pub fn backend(backend: impl Into<String>, message: impl ToString) -> Self {
        Error::Backend {
            backend: backend.into(),
            message: message.to_string(),
        }
    }

    pub fn corrupt(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Error::CorruptArtifact {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
