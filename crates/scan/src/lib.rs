#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Update folder scanning
//!
//! Walks the update directory for package archives by extension. A missing
//! or unreadable directory is treated as empty; unreadable entries are
//! skipped so one bad file never hides its siblings. Results are returned
//! sorted by path string so downstream decisions are deterministic.

use ism_errors::{Error, ScanError};
use ism_events::{AppEvent, EventEmitter, EventSender, ScanEvent};
use ism_types::OLD_SUFFIX;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Scanner over the node's update directories
#[derive(Clone)]
pub struct UpdateScanner {
    primary: PathBuf,
    fallback: PathBuf,
    update_extension: String,
    auxiliary_extension: String,
    tx: Option<EventSender>,
}

impl EventEmitter for UpdateScanner {
    fn event_sender(&self) -> Option<&EventSender> {
        self.tx.as_ref()
    }
}

impl UpdateScanner {
    /// Create a scanner for the given roots and extensions
    #[must_use]
    pub fn new(
        primary: PathBuf,
        fallback: PathBuf,
        update_extension: String,
        auxiliary_extension: String,
    ) -> Self {
        Self {
            primary,
            fallback,
            update_extension,
            auxiliary_extension,
            tx: None,
        }
    }

    /// Attach an event channel
    #[must_use]
    pub fn with_events(mut self, tx: EventSender) -> Self {
        self.tx = Some(tx);
        self
    }

    /// Scan for update archives
    ///
    /// Walks the primary root; when it yields nothing and `include_fallback`
    /// is set, walks the fallback root instead. With `include_old`, applied
    /// archives (`.old`) whose base name is not already in the result are
    /// appended, which lets an operator stage a rollback by deleting the
    /// fresh copy.
    ///
    /// # Errors
    ///
    /// Returns an error only if the blocking walk task itself fails;
    /// missing directories and unreadable entries are treated as empty.
    pub async fn scan(
        &self,
        include_fallback: bool,
        include_old: bool,
    ) -> Result<Vec<PathBuf>, Error> {
        self.emit(AppEvent::Scan(ScanEvent::Started {
            root: self.primary.clone(),
        }));

        let scanner = self.clone();
        let result = tokio::task::spawn_blocking(move || {
            let mut root = scanner.primary.clone();
            let mut found = scanner.collect(&root, include_old);

            if found.paths.is_empty() && include_fallback {
                root = scanner.fallback.clone();
                found = scanner.collect(&root, include_old);
                if !found.paths.is_empty() {
                    scanner.emit(AppEvent::Scan(ScanEvent::FallbackUsed { root }));
                }
            }

            found.paths.sort_by(|a, b| a.as_os_str().cmp(b.as_os_str()));
            found
        })
        .await
        .map_err(|e| {
            self.emit(AppEvent::Scan(ScanEvent::Failed {
                message: e.to_string(),
            }));
            Error::from(ScanError::TaskFailed {
                message: e.to_string(),
            })
        })?;

        self.emit(AppEvent::Scan(ScanEvent::Completed {
            candidates: result.paths.len(),
            leftovers: result.leftovers,
        }));

        Ok(result.paths)
    }

    fn collect(&self, root: &Path, include_old: bool) -> ScanResult {
        let mut paths = Vec::new();
        let mut applied = Vec::new();

        for entry in WalkDir::new(root)
            .follow_links(false)
            .into_iter()
            .filter_map(std::result::Result::ok)
        {
            if !entry.file_type().is_file() {
                continue;
            }
            let Some(name) = entry.file_name().to_str() else {
                continue;
            };

            if self.matches_extension(name) {
                paths.push(entry.into_path());
            } else if include_old {
                if let Some(base) = name
                    .strip_suffix(OLD_SUFFIX)
                    .filter(|base| self.matches_extension(base))
                {
                    applied.push((base.to_string(), entry.into_path()));
                }
            }
        }

        let leftovers = applied.len();

        // A stale .old only qualifies when no live archive shares its name.
        let live_names: HashSet<String> = paths
            .iter()
            .filter_map(|p| p.file_name().and_then(|n| n.to_str()))
            .map(str::to_string)
            .collect();
        for (base, path) in applied {
            if !live_names.contains(&base) {
                paths.push(path);
            }
        }

        ScanResult { paths, leftovers }
    }

    fn matches_extension(&self, name: &str) -> bool {
        has_suffix_ignore_case(name, &self.update_extension)
            || has_suffix_ignore_case(name, &self.auxiliary_extension)
    }
}

struct ScanResult {
    paths: Vec<PathBuf>,
    leftovers: usize,
}

fn has_suffix_ignore_case(name: &str, suffix: &str) -> bool {
    let Some(split) = name.len().checked_sub(suffix.len()) else {
        return false;
    };
    name.is_char_boundary(split) && name[split..].eq_ignore_ascii_case(suffix)
}
