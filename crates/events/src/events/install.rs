use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Installer launch and restart events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum InstallEvent {
    /// An install run began
    Started {
        sources: usize,
        target: PathBuf,
        in_process: bool,
    },

    /// The detached helper process was spawned
    HelperSpawned { pid: u32, helper: PathBuf },

    /// The helper could not be spawned
    SpawnFailed { message: String },

    /// The host was asked to shut down so the swap can proceed
    ShutdownRequested { hard: bool },

    /// The install request was refused before any work started
    Refused { reason: String },

    /// An in-process install finished applying its archives
    Completed { sources: usize },
}
