//! Update scanner error types

use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum ScanError {
    #[error("scan task failed: {message}")]
    TaskFailed { message: String },
}
