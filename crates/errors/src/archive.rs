//! Archive validation and extraction error types

use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum ArchiveError {
    #[error("cannot open archive {path}: {message}")]
    OpenFailed { path: String, message: String },

    #[error("archive creation failed: {message}")]
    CreateFailed { message: String },

    #[error("archive task failed: {message}")]
    TaskFailed { message: String },
}
