use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Backup and restore events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum BackupEvent {
    /// A backup run began
    Started { title: String },

    /// An attempt failed and another one is scheduled
    RetryScheduled {
        title: String,
        attempt: u32,
        delay_secs: u64,
    },

    /// A backup archive was written and recorded
    Completed {
        title: String,
        file_path: PathBuf,
        size_bytes: u64,
    },

    /// All attempts failed, partial output was removed
    Failed {
        title: String,
        attempts: u32,
        message: String,
    },

    /// Retention pruning removed old archives
    Pruned { removed: usize },

    /// A scheduled run was skipped because the node was busy
    ScheduleSkipped { reason: String },

    /// Restoring a backup into the cache folder began
    RestoreStarted { title: String },

    /// A restore finished
    RestoreCompleted { title: String, files_restored: usize },
}
