//! Two-pass secure extraction

use crate::outcome::{EntryFailure, ExtractOutcome, SuspicionReason};
use ism_errors::{ArchiveError, Error};
use ism_events::{AppEvent, EventEmitter, EventSender, ExtractEvent};
use ism_types::OLD_SUFFIX;
use std::fs::File;
use std::io::{Read, Seek};
use std::path::{Path, PathBuf};
use tokio::task;

/// Entries may not inflate beyond this multiple of their compressed size
const MAX_ENTRY_RATIO: u64 = 10;
/// Whole archives may not decompress beyond this many bytes
const MAX_TOTAL_BYTES: u64 = 1024 * 1024 * 1024;
/// Entry count ceiling
const MAX_ENTRIES: usize = 10_000;

const VALIDATE_CHUNK: usize = 64 * 1024;

/// Validates and extracts update archives
#[derive(Clone)]
pub struct SafeExtractor {
    max_entry_ratio: u64,
    max_total_bytes: u64,
    max_entries: usize,
    tx: Option<EventSender>,
}

impl Default for SafeExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl EventEmitter for SafeExtractor {
    fn event_sender(&self) -> Option<&EventSender> {
        self.tx.as_ref()
    }
}

impl SafeExtractor {
    /// Create an extractor with the default validation limits
    #[must_use]
    pub fn new() -> Self {
        Self {
            max_entry_ratio: MAX_ENTRY_RATIO,
            max_total_bytes: MAX_TOTAL_BYTES,
            max_entries: MAX_ENTRIES,
            tx: None,
        }
    }

    /// Override the validation limits
    #[must_use]
    pub fn with_limits(mut self, entry_ratio: u64, total_bytes: u64, entries: usize) -> Self {
        self.max_entry_ratio = entry_ratio;
        self.max_total_bytes = total_bytes;
        self.max_entries = entries;
        self
    }

    /// Attach an event channel
    #[must_use]
    pub fn with_events(mut self, tx: EventSender) -> Self {
        self.tx = Some(tx);
        self
    }

    /// Validate and extract an archive into a target directory
    ///
    /// Pass one streams every entry without writing anything and rejects the
    /// whole archive as `Suspicious` when a decompression limit is crossed.
    /// Pass two writes entries, skipping any whose resolved path would land
    /// outside `target_dir`; existing files are overwritten. Skipped or
    /// failed entries never abort their siblings.
    ///
    /// # Errors
    ///
    /// Returns an error if the archive file cannot be opened, the target
    /// directory cannot be prepared, or the blocking task fails. Content
    /// problems are reported through the outcome, not as errors.
    pub async fn extract(
        &self,
        archive_path: &Path,
        target_dir: &Path,
    ) -> Result<ExtractOutcome, Error> {
        self.emit(AppEvent::Extract(ExtractEvent::Started {
            archive: archive_path.to_path_buf(),
            target: target_dir.to_path_buf(),
        }));

        let extractor = self.clone();
        let archive = archive_path.to_path_buf();
        let target = target_dir.to_path_buf();
        let outcome = task::spawn_blocking(move || extractor.extract_sync(&archive, &target))
            .await
            .map_err(|e| ArchiveError::TaskFailed {
                message: e.to_string(),
            })??;

        match &outcome {
            ExtractOutcome::Completed {
                files_written,
                bytes_written,
            } => {
                self.emit(AppEvent::Extract(ExtractEvent::Completed {
                    archive: archive_path.to_path_buf(),
                    files_written: *files_written,
                    bytes_written: *bytes_written,
                }));
            }
            ExtractOutcome::Suspicious { reason } => {
                self.emit(AppEvent::Extract(ExtractEvent::Suspicious {
                    archive: archive_path.to_path_buf(),
                    reason: reason.to_string(),
                }));
            }
            ExtractOutcome::PartialFailure { .. } => {}
        }

        Ok(outcome)
    }

    /// Rename an applied archive to `<name>.old` so the next scan skips it
    ///
    /// A pre-existing `.old` for the same archive is deleted first.
    ///
    /// # Errors
    ///
    /// Returns an error if the rename fails.
    pub async fn mark_applied(&self, archive_path: &Path) -> Result<PathBuf, Error> {
        let mut renamed = archive_path.as_os_str().to_owned();
        renamed.push(OLD_SUFFIX);
        let renamed = PathBuf::from(renamed);

        let _ = tokio::fs::remove_file(&renamed).await;
        tokio::fs::rename(archive_path, &renamed)
            .await
            .map_err(|e| Error::io_with_path(&e, archive_path))?;

        self.emit(AppEvent::Extract(ExtractEvent::Marked {
            archive: archive_path.to_path_buf(),
            renamed_to: renamed.clone(),
        }));

        Ok(renamed)
    }

    fn extract_sync(&self, archive_path: &Path, target_dir: &Path) -> Result<ExtractOutcome, Error> {
        let file = File::open(archive_path).map_err(|e| ArchiveError::OpenFailed {
            path: archive_path.display().to_string(),
            message: e.to_string(),
        })?;

        let mut archive = match zip::ZipArchive::new(file) {
            Ok(archive) => archive,
            Err(e) => {
                return Ok(ExtractOutcome::Suspicious {
                    reason: SuspicionReason::Malformed {
                        message: e.to_string(),
                    },
                })
            }
        };

        if let Some(reason) = self.validate(&mut archive) {
            return Ok(ExtractOutcome::Suspicious { reason });
        }

        self.write_entries(&mut archive, archive_path, target_dir)
    }

    /// Pass one: stream every entry, counting real decompressed bytes
    fn validate<R: Read + Seek>(&self, archive: &mut zip::ZipArchive<R>) -> Option<SuspicionReason> {
        if archive.len() > self.max_entries {
            return Some(SuspicionReason::EntryCount {
                count: archive.len(),
            });
        }

        let mut total: u64 = 0;
        let mut buf = vec![0_u8; VALIDATE_CHUNK];

        for i in 0..archive.len() {
            let mut entry = match archive.by_index(i) {
                Ok(entry) => entry,
                Err(e) => {
                    return Some(SuspicionReason::Malformed {
                        message: e.to_string(),
                    })
                }
            };
            let name = entry.name().to_string();
            let compressed = entry.compressed_size();
            let mut decompressed: u64 = 0;

            loop {
                match entry.read(&mut buf) {
                    Ok(0) => break,
                    Ok(n) => {
                        decompressed += n as u64;
                        total += n as u64;
                        if total > self.max_total_bytes {
                            return Some(SuspicionReason::TotalSize { bytes: total });
                        }
                        if decompressed > self.max_entry_ratio.saturating_mul(compressed.max(1)) {
                            return Some(SuspicionReason::EntryRatio {
                                entry: name,
                                compressed,
                                decompressed,
                            });
                        }
                    }
                    Err(e) => {
                        return Some(SuspicionReason::Malformed {
                            message: e.to_string(),
                        })
                    }
                }
            }
        }

        None
    }

    /// Pass two: write entries, confining each one to the target directory
    fn write_entries(
        &self,
        archive: &mut zip::ZipArchive<File>,
        archive_path: &Path,
        target_dir: &Path,
    ) -> Result<ExtractOutcome, Error> {
        std::fs::create_dir_all(target_dir).map_err(|e| Error::io_with_path(&e, target_dir))?;
        let canonical_target = target_dir
            .canonicalize()
            .map_err(|e| Error::io_with_path(&e, target_dir))?;

        let mut files_written = 0_usize;
        let mut bytes_written = 0_u64;
        let mut failures: Vec<EntryFailure> = Vec::new();

        for i in 0..archive.len() {
            let mut entry = match archive.by_index(i) {
                Ok(entry) => entry,
                Err(e) => {
                    failures.push(self.entry_failure(
                        archive_path,
                        format!("#{i}"),
                        e.to_string(),
                    ));
                    continue;
                }
            };
            let raw_name = entry.name().to_string();

            let Some(relative) = entry.enclosed_name() else {
                failures.push(self.entry_failure(
                    archive_path,
                    raw_name,
                    "path escapes the target directory".to_string(),
                ));
                continue;
            };
            let dest = target_dir.join(&relative);

            if entry.is_dir() {
                if let Err(e) = std::fs::create_dir_all(&dest) {
                    failures.push(self.entry_failure(archive_path, raw_name, e.to_string()));
                }
                continue;
            }

            let parent = dest.parent().unwrap_or(target_dir);
            if let Err(e) = std::fs::create_dir_all(parent) {
                failures.push(self.entry_failure(archive_path, raw_name, e.to_string()));
                continue;
            }

            // Containment is checked on the canonicalized parent so a
            // symlinked subdirectory cannot redirect the write outside.
            let confined = parent
                .canonicalize()
                .is_ok_and(|p| p.starts_with(&canonical_target));
            if !confined {
                failures.push(self.entry_failure(
                    archive_path,
                    raw_name,
                    "resolved outside the target directory".to_string(),
                ));
                continue;
            }

            let mut out = match File::create(&dest) {
                Ok(out) => out,
                Err(e) => {
                    failures.push(self.entry_failure(archive_path, raw_name, e.to_string()));
                    continue;
                }
            };
            match std::io::copy(&mut entry, &mut out) {
                Ok(n) => {
                    files_written += 1;
                    bytes_written += n;
                }
                Err(e) => {
                    failures.push(self.entry_failure(archive_path, raw_name, e.to_string()));
                    continue;
                }
            }

            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                if let Some(mode) = entry.unix_mode() {
                    std::fs::set_permissions(&dest, std::fs::Permissions::from_mode(mode)).ok();
                }
            }
        }

        if failures.is_empty() {
            Ok(ExtractOutcome::Completed {
                files_written,
                bytes_written,
            })
        } else {
            Ok(ExtractOutcome::PartialFailure {
                files_written,
                failures,
            })
        }
    }

    fn entry_failure(&self, archive_path: &Path, entry: String, message: String) -> EntryFailure {
        self.emit(AppEvent::Extract(ExtractEvent::EntryFailed {
            archive: archive_path.to_path_buf(),
            entry: entry.clone(),
            message: message.clone(),
        }));
        EntryFailure { entry, message }
    }
}
