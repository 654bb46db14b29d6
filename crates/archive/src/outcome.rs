//! Typed extraction outcomes

use std::fmt;

/// Result of extracting one archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractOutcome {
    /// Every entry was validated and written
    Completed {
        files_written: usize,
        bytes_written: u64,
    },

    /// Validation rejected the archive, nothing was written
    Suspicious { reason: SuspicionReason },

    /// Some entries were written, others were skipped or failed
    PartialFailure {
        files_written: usize,
        failures: Vec<EntryFailure>,
    },
}

impl ExtractOutcome {
    /// Whether every entry was applied
    #[must_use]
    pub fn is_complete(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }

    /// Number of files that landed on disk
    #[must_use]
    pub fn files_written(&self) -> usize {
        match self {
            Self::Completed { files_written, .. }
            | Self::PartialFailure { files_written, .. } => *files_written,
            Self::Suspicious { .. } => 0,
        }
    }
}

/// Why validation rejected an archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SuspicionReason {
    /// One entry inflates past the per-entry compression ratio limit
    EntryRatio {
        entry: String,
        compressed: u64,
        decompressed: u64,
    },

    /// The archive decompresses past the cumulative size limit
    TotalSize { bytes: u64 },

    /// More entries than the limit allows
    EntryCount { count: usize },

    /// The zip structure itself cannot be read
    Malformed { message: String },
}

impl fmt::Display for SuspicionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EntryRatio {
                entry,
                compressed,
                decompressed,
            } => write!(
                f,
                "entry {entry} inflates {compressed} bytes to {decompressed}"
            ),
            Self::TotalSize { bytes } => {
                write!(f, "archive decompresses to more than {bytes} bytes")
            }
            Self::EntryCount { count } => write!(f, "archive holds {count} entries"),
            Self::Malformed { message } => write!(f, "unreadable zip structure: {message}"),
        }
    }
}

/// One entry that could not be written during extraction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryFailure {
    pub entry: String,
    pub message: String,
}
