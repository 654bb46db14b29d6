#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Cache folder backup and restore
//!
//! Backs the node's cache directory up into zip archives under the backups
//! directory, retrying over transient contention (typically a file the host
//! still has locked), pruning old archives down to a retention count, and
//! restoring archives back into the cache through the validating extractor.
//! A timer drives periodic backups, anchored to the last recorded run so a
//! restart does not reset the cadence.

mod manager;
mod outcome;

pub use manager::{BackupManager, UploadSink, BACKUP_EXTENSION};
pub use outcome::{BackupOutcome, RestoreOutcome};
