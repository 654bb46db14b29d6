//! Backup manager and scheduler

use crate::outcome::{BackupOutcome, RestoreOutcome};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ism_archive::{create_archive, ExtractOutcome, SafeExtractor};
use ism_events::{AppEvent, BackupEvent, EventEmitter, EventSender};
use ism_types::{ActivityGuard, BackupDefinition, NodeState, Phase};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Backup archive extension
pub const BACKUP_EXTENSION: &str = ".CDEB";

/// Shortest period the scheduler will run at
const MIN_PERIOD_MINUTES: u64 = 15;
/// Period substituted for a configured zero
const DAILY_MINUTES: u64 = 24 * 60;

const STATE_FILE: &str = "last_backup.json";

/// Receives finished backup archives, implemented by the provisioning side
#[async_trait]
pub trait UploadSink: Send + Sync {
    /// Stream one archive upstream
    ///
    /// # Errors
    ///
    /// Returns an error when the upload fails; the backup itself still
    /// counts as successful.
    async fn upload(&self, file: &Path) -> Result<(), ism_errors::Error>;
}

/// Backs the cache directory up and restores it
pub struct BackupManager {
    node: Arc<NodeState>,
    guard: ActivityGuard,
    extractor: SafeExtractor,
    cache_dir: PathBuf,
    backup_dir: PathBuf,
    retention: usize,
    retry_delay: Duration,
    upload: Option<Arc<dyn UploadSink>>,
    tx: Option<EventSender>,
}

impl EventEmitter for BackupManager {
    fn event_sender(&self) -> Option<&EventSender> {
        self.tx.as_ref()
    }
}

impl BackupManager {
    /// Create a manager for the given cache and backup directories
    #[must_use]
    pub fn new(
        node: Arc<NodeState>,
        guard: ActivityGuard,
        cache_dir: PathBuf,
        backup_dir: PathBuf,
    ) -> Self {
        Self {
            node,
            guard,
            extractor: SafeExtractor::new(),
            cache_dir,
            backup_dir,
            retention: 7,
            retry_delay: Duration::from_secs(5),
            upload: None,
            tx: None,
        }
    }

    /// Number of newest archives kept by pruning; zero keeps everything
    #[must_use]
    pub fn with_retention(mut self, retention: usize) -> Self {
        self.retention = retention;
        self
    }

    /// Delay between archive attempts
    #[must_use]
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Upload finished archives through the given sink
    #[must_use]
    pub fn with_upload(mut self, sink: Arc<dyn UploadSink>) -> Self {
        self.upload = Some(sink);
        self
    }

    /// Replace the extractor used for restores
    #[must_use]
    pub fn with_extractor(mut self, extractor: SafeExtractor) -> Self {
        self.extractor = extractor;
        self
    }

    /// Attach an event channel
    #[must_use]
    pub fn with_events(mut self, tx: EventSender) -> Self {
        self.tx = Some(tx);
        self
    }

    /// Archive the cache directory under the given title
    ///
    /// Retries up to `max_retries` times over transient failures with a
    /// fixed delay in between, aborting early when the node begins shutting
    /// down. A run either produces a complete archive or leaves none.
    pub async fn backup(&self, title: &str, max_retries: u32) -> BackupOutcome {
        if !validate_title(title) {
            self.emit_warning(format!("invalid backup title: {title}"));
            return BackupOutcome::InvalidTitle;
        }
        let Some(_permit) = self.guard.try_begin(Phase::Backup) else {
            return BackupOutcome::Busy;
        };

        self.emit(AppEvent::Backup(BackupEvent::Started {
            title: title.to_string(),
        }));

        for dir in [&self.cache_dir, &self.backup_dir] {
            if let Err(e) = tokio::fs::create_dir_all(dir).await {
                let message = format!("cannot create {}: {e}", dir.display());
                self.emit(AppEvent::Backup(BackupEvent::Failed {
                    title: title.to_string(),
                    attempts: 0,
                    message: message.clone(),
                }));
                return BackupOutcome::Failed {
                    attempts: 0,
                    message,
                };
            }
        }

        let dest = self.backup_dir.join(format!("{title}{BACKUP_EXTENSION}"));
        let attempts = max_retries.max(1);
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            if !self.node.is_running() {
                return BackupOutcome::Aborted;
            }

            match create_archive(&self.cache_dir, &dest).await {
                Ok(size) => {
                    let definition = BackupDefinition {
                        title: title.to_string(),
                        timestamp_utc: Utc::now(),
                        file_path: dest.clone(),
                        size_bytes: size,
                    };
                    self.save_state(&definition).await;

                    if let Some(sink) = &self.upload {
                        if let Err(e) = sink.upload(&dest).await {
                            self.emit_warning(format!("backup upload failed: {e}"));
                        }
                    }

                    let removed = self.prune().await;
                    if removed > 0 {
                        self.emit(AppEvent::Backup(BackupEvent::Pruned { removed }));
                    }

                    self.emit(AppEvent::Backup(BackupEvent::Completed {
                        title: title.to_string(),
                        file_path: dest,
                        size_bytes: size,
                    }));
                    return BackupOutcome::Completed(definition);
                }
                Err(e) => {
                    last_error = e.to_string();
                    if attempt < attempts {
                        self.emit(AppEvent::Backup(BackupEvent::RetryScheduled {
                            title: title.to_string(),
                            attempt,
                            delay_secs: self.retry_delay.as_secs(),
                        }));
                        tokio::time::sleep(self.retry_delay).await;
                    }
                }
            }
        }

        self.emit(AppEvent::Backup(BackupEvent::Failed {
            title: title.to_string(),
            attempts,
            message: last_error.clone(),
        }));
        BackupOutcome::Failed {
            attempts,
            message: last_error,
        }
    }

    /// Unpack a backup archive into the cache directory
    ///
    /// The resolved archive must be a file directly inside the backups
    /// directory; anything else is refused before a byte is read. The
    /// archive passes through the same validation as update packages.
    pub async fn restore(&self, title: &str) -> RestoreOutcome {
        if !validate_title(title) {
            return RestoreOutcome::InvalidTitle;
        }
        let Some(_permit) = self.guard.try_begin(Phase::Backup) else {
            return RestoreOutcome::Busy;
        };

        self.emit(AppEvent::Backup(BackupEvent::RestoreStarted {
            title: title.to_string(),
        }));

        let archive = self.backup_dir.join(format!("{title}{BACKUP_EXTENSION}"));
        let Ok(canonical_dir) = tokio::fs::canonicalize(&self.backup_dir).await else {
            return RestoreOutcome::NotFound;
        };
        let Ok(canonical) = tokio::fs::canonicalize(&archive).await else {
            return RestoreOutcome::NotFound;
        };
        if canonical.parent() != Some(canonical_dir.as_path()) {
            let message = "archive resolves outside the backups directory".to_string();
            self.emit_warning(format!("restore of {title} refused: {message}"));
            return RestoreOutcome::Refused { message };
        }
        match tokio::fs::metadata(&canonical).await {
            Ok(meta) if meta.is_file() => {}
            _ => return RestoreOutcome::NotFound,
        }

        match self.extractor.extract(&canonical, &self.cache_dir).await {
            Ok(ExtractOutcome::Completed { files_written, .. }) => {
                self.emit(AppEvent::Backup(BackupEvent::RestoreCompleted {
                    title: title.to_string(),
                    files_restored: files_written,
                }));
                RestoreOutcome::Completed {
                    files_restored: files_written,
                }
            }
            Ok(ExtractOutcome::Suspicious { reason }) => RestoreOutcome::Failed {
                message: reason.to_string(),
            },
            Ok(ExtractOutcome::PartialFailure {
                files_written,
                failures,
            }) => RestoreOutcome::Failed {
                message: format!(
                    "{} of {} entries failed",
                    failures.len(),
                    files_written + failures.len()
                ),
            },
            Err(e) => RestoreOutcome::Failed {
                message: e.to_string(),
            },
        }
    }

    /// Every archive in the backups directory, oldest first
    pub async fn list_backups(&self) -> Vec<BackupDefinition> {
        let backup_dir = self.backup_dir.clone();
        tokio::task::spawn_blocking(move || {
            let Ok(entries) = std::fs::read_dir(&backup_dir) else {
                return Vec::new();
            };
            let mut backups: Vec<BackupDefinition> = entries
                .filter_map(std::result::Result::ok)
                .filter_map(|entry| {
                    let path = entry.path();
                    let name = path.file_name()?.to_str()?.to_string();
                    let title = strip_extension(&name)?;
                    let meta = entry.metadata().ok()?;
                    if !meta.is_file() {
                        return None;
                    }
                    let created = meta.created().or_else(|_| meta.modified()).ok()?;
                    Some(BackupDefinition {
                        title: title.to_string(),
                        timestamp_utc: DateTime::<Utc>::from(created),
                        file_path: path,
                        size_bytes: meta.len(),
                    })
                })
                .collect();
            backups.sort_by_key(|b| b.timestamp_utc);
            backups
        })
        .await
        .unwrap_or_default()
    }

    /// When the last successful backup ran, according to the state file
    pub async fn last_backup_time(&self) -> Option<DateTime<Utc>> {
        self.load_state().await.map(|d| d.timestamp_utc)
    }

    /// Drive periodic backups until the node stops running
    ///
    /// The first fire is the configured period minus the time since the
    /// last recorded backup, so restarts do not reset the cadence. Periods
    /// under fifteen minutes are raised to fifteen; zero means daily. A
    /// fire that finds a backup already running skips instead of queueing.
    pub async fn run_scheduler(&self, period_minutes: u64, max_retries: u32) {
        let period = effective_period(period_minutes);
        let first = self.initial_delay(period).await;
        tokio::time::sleep(first).await;

        while self.node.is_running() {
            let title = self.scheduled_title();
            if matches!(self.backup(&title, max_retries).await, BackupOutcome::Busy) {
                self.emit(AppEvent::Backup(BackupEvent::ScheduleSkipped {
                    reason: "a backup is already running".to_string(),
                }));
            }
            tokio::time::sleep(period).await;
        }
    }

    async fn initial_delay(&self, period: Duration) -> Duration {
        match self.last_backup_time().await {
            Some(last) => {
                let elapsed = Utc::now()
                    .signed_duration_since(last)
                    .to_std()
                    .unwrap_or_default();
                period.saturating_sub(elapsed)
            }
            None => Duration::ZERO,
        }
    }

    fn scheduled_title(&self) -> String {
        format!(
            "{}-{}",
            self.node.identity().service_name,
            Utc::now().format("%Y%m%d-%H%M%S")
        )
    }

    async fn save_state(&self, definition: &BackupDefinition) {
        let path = self.backup_dir.join(STATE_FILE);
        match serde_json::to_vec_pretty(definition) {
            Ok(bytes) => {
                if let Err(e) = tokio::fs::write(&path, bytes).await {
                    self.emit_warning(format!("cannot record backup state: {e}"));
                }
            }
            Err(e) => self.emit_warning(format!("cannot record backup state: {e}")),
        }
    }

    async fn load_state(&self) -> Option<BackupDefinition> {
        let bytes = tokio::fs::read(self.backup_dir.join(STATE_FILE)).await.ok()?;
        serde_json::from_slice(&bytes).ok()
    }

    /// Delete everything but the newest `retention` archives
    async fn prune(&self) -> usize {
        if self.retention == 0 {
            return 0;
        }
        let backup_dir = self.backup_dir.clone();
        let retention = self.retention;
        tokio::task::spawn_blocking(move || {
            let Ok(entries) = std::fs::read_dir(&backup_dir) else {
                return 0;
            };
            let mut archives: Vec<(std::time::SystemTime, PathBuf)> = entries
                .filter_map(std::result::Result::ok)
                .filter_map(|entry| {
                    let path = entry.path();
                    let name = path.file_name()?.to_str()?;
                    strip_extension(name)?;
                    let meta = entry.metadata().ok()?;
                    if !meta.is_file() {
                        return None;
                    }
                    let created = meta.created().or_else(|_| meta.modified()).ok()?;
                    Some((created, path))
                })
                .collect();
            if archives.len() <= retention {
                return 0;
            }
            archives.sort_by_key(|(created, _)| *created);
            let doomed = archives.len() - retention;
            let mut removed = 0;
            for (_, path) in archives.into_iter().take(doomed) {
                if std::fs::remove_file(&path).is_ok() {
                    removed += 1;
                }
            }
            removed
        })
        .await
        .unwrap_or(0)
    }
}

fn validate_title(title: &str) -> bool {
    !title.is_empty() && !title.contains('/') && !title.contains('\\') && !title.contains("..")
}

fn strip_extension(name: &str) -> Option<&str> {
    let split = name.len().checked_sub(BACKUP_EXTENSION.len())?;
    if split > 0
        && name.is_char_boundary(split)
        && name[split..].eq_ignore_ascii_case(BACKUP_EXTENSION)
    {
        Some(&name[..split])
    } else {
        None
    }
}

fn effective_period(minutes: u64) -> Duration {
    let minutes = if minutes == 0 {
        DAILY_MINUTES
    } else {
        minutes.max(MIN_PERIOD_MINUTES)
    };
    Duration::from_secs(minutes * 60)
}
