//! Error types for the signed virtual file system.

use thiserror::Error;

/// Errors surfaced by VFS operations.
#[derive(Debug, Error)]
pub enum VfsError {
    #[error("not found")]
    NotFound,

    #[error("too many files")]
    TooManyFiles,

    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("invalid header: {0}")]
    InvalidHeader(&'static str),

    #[error("several nodes with the same path: {0}")]
    DuplicatePath(String),

    #[error("parent dir not found: {0}")]
    ParentNotFound(String),

    #[error("parent dir is deleted: {0}")]
    ParentDeleted(String),

    #[error("commit rejected: {0}")]
    CommitRejected(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl VfsError {
    /// True for rejections of caller input, as opposed to environment faults.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            VfsError::InvalidPath(_)
                | VfsError::InvalidHeader(_)
                | VfsError::DuplicatePath(_)
                | VfsError::ParentNotFound(_)
                | VfsError::ParentDeleted(_)
                | VfsError::CommitRejected(_)
                | VfsError::TooManyFiles
        )
    }
}
