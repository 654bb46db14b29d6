use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Update-folder scan events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ScanEvent {
    /// A scan pass over the update folder began
    Started { root: PathBuf },

    /// The primary update folder yielded nothing, scanning its fallback instead
    FallbackUsed { root: PathBuf },

    /// A scan pass finished
    Completed {
        /// Archives eligible for evaluation
        candidates: usize,
        /// Applied archives still waiting for cleanup
        leftovers: usize,
    },

    /// The scan task itself failed
    Failed { message: String },
}
