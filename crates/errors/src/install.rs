//! Installer launcher error types

use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum InstallError {
    #[error("updater binary unavailable: {message}")]
    UpdaterUnavailable { message: String },

    #[error("failed to spawn {program}: {message}")]
    SpawnFailed { program: String, message: String },

    #[error("trust token rejected: {reason}")]
    TokenRejected { reason: String },
}
