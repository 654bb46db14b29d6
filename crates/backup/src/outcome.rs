//! Typed backup and restore outcomes

use ism_types::BackupDefinition;

/// Result of one backup run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackupOutcome {
    /// The archive was written and recorded
    Completed(BackupDefinition),

    /// Another backup or restore is already running
    Busy,

    /// The title would escape the backups directory
    InvalidTitle,

    /// The node began shutting down mid-run
    Aborted,

    /// Every attempt failed; no partial archive remains
    Failed { attempts: u32, message: String },
}

impl BackupOutcome {
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Completed(_))
    }
}

/// Result of one restore run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestoreOutcome {
    /// The archive was unpacked into the cache directory
    Completed { files_restored: usize },

    /// Another backup or restore is already running
    Busy,

    /// The title would escape the backups directory
    InvalidTitle,

    /// No archive with that title exists
    NotFound,

    /// The resolved path does not sit directly inside the backups directory
    Refused { message: String },

    /// The archive failed validation or could not be unpacked
    Failed { message: String },
}
