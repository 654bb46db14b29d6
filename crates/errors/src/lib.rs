#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Error types for the ism update lifecycle manager
//!
//! This crate provides fine-grained error types organized by domain.
//! All error types implement Clone for easier handling across task
//! boundaries.

use thiserror::Error;

pub mod archive;
pub mod config;
pub mod install;
pub mod provision;
pub mod scan;
pub mod version;

// Re-export all error types at the root
pub use archive::ArchiveError;
pub use config::ConfigError;
pub use install::InstallError;
pub use provision::ProvisionError;
pub use scan::ScanError;
pub use version::VersionError;

/// Generic error type for cross-crate boundaries
#[derive(Debug, Clone, Error)]
pub enum Error {
    #[error("archive error: {0}")]
    Archive(#[from] ArchiveError),

    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("install error: {0}")]
    Install(#[from] InstallError),

    #[error("provisioning error: {0}")]
    Provision(#[from] ProvisionError),

    #[error("scan error: {0}")]
    Scan(#[from] ScanError),

    #[error("version error: {0}")]
    Version(#[from] VersionError),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("I/O error: {message}")]
    Io {
        kind: std::io::ErrorKind,
        message: String,
        path: Option<std::path::PathBuf>,
    },
}

impl Error {
    /// Create an internal error with a message
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Create an Io error with an associated path
    pub fn io_with_path(err: &std::io::Error, path: impl Into<std::path::PathBuf>) -> Self {
        Self::Io {
            kind: err.kind(),
            message: err.to_string(),
            path: Some(path.into()),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            kind: err.kind(),
            message: err.to_string(),
            path: None,
        }
    }
}

/// Result type alias for ism operations
pub type Result<T> = std::result::Result<T, Error>;
