//! Backup archive records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One cache backup archive on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupDefinition {
    pub title: String,
    pub timestamp_utc: DateTime<Utc>,
    pub file_path: PathBuf,
    pub size_bytes: u64,
}
