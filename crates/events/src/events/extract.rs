use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Archive validation and extraction events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ExtractEvent {
    /// Extraction of an archive into a target directory began
    Started { archive: PathBuf, target: PathBuf },

    /// Extraction finished with every entry written
    Completed {
        archive: PathBuf,
        files_written: usize,
        bytes_written: u64,
    },

    /// The archive failed validation and nothing was written
    Suspicious { archive: PathBuf, reason: String },

    /// A single entry could not be written, extraction continued
    EntryFailed {
        archive: PathBuf,
        entry: String,
        message: String,
    },

    /// An applied archive was renamed out of the scanner's view
    Marked { archive: PathBuf, renamed_to: PathBuf },
}
