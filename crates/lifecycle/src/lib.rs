#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Update lifecycle facade
//!
//! [`UpdateManager`] wires the scanner, decision engine, installer launcher
//! and backup manager behind the operations the rest of the node consumes.
//! It owns the accepted-update set of the current cycle and the activity
//! guard that keeps scanning, extraction and launching single-flight;
//! backups run under their own guard. Every entry point returns an `Option`
//! or a typed outcome, never a raw error.

use ism_archive::SafeExtractor;
use ism_backup::{BackupManager, BackupOutcome, RestoreOutcome, UploadSink};
use ism_config::Config;
use ism_decide::{DecisionEngine, PluginRegistry};
use ism_events::{AppEvent, EventEmitter, EventSender, UpdateEvent};
use ism_install::{LaunchOutcome, ShutdownHook, UpdateLauncher};
use ism_scan::UpdateScanner;
use ism_types::{
    AcceptedUpdates, ActivityGuard, BackupDefinition, Candidate, NodeState, Phase, TrustVerifier,
    UpdaterInvocation,
};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Facade over the node's update, restart and backup operations
pub struct UpdateManager {
    node: Arc<NodeState>,
    guard: ActivityGuard,
    scanner: UpdateScanner,
    engine: DecisionEngine,
    launcher: UpdateLauncher,
    backup: BackupManager,
    accepted: Mutex<AcceptedUpdates>,
    base_dir: PathBuf,
    update_extension: String,
    auxiliary_extension: String,
    backup_attempts: u32,
    tx: Option<EventSender>,
}

impl EventEmitter for UpdateManager {
    fn event_sender(&self) -> Option<&EventSender> {
        self.tx.as_ref()
    }
}

impl UpdateManager {
    /// Build a manager from configuration and shared node state
    #[must_use]
    pub fn new(config: &Config, node: Arc<NodeState>, registry: Arc<PluginRegistry>) -> Self {
        Self::build(config, node, registry, None)
    }

    /// Like [`UpdateManager::new`], with every component emitting to `tx`
    #[must_use]
    pub fn with_events(
        config: &Config,
        node: Arc<NodeState>,
        registry: Arc<PluginRegistry>,
        tx: EventSender,
    ) -> Self {
        Self::build(config, node, registry, Some(tx))
    }

    fn build(
        config: &Config,
        node: Arc<NodeState>,
        registry: Arc<PluginRegistry>,
        tx: Option<EventSender>,
    ) -> Self {
        let guard = ActivityGuard::new();
        let base_dir = config.paths.base_dir.clone();
        let identity = node.identity();

        let mut scanner = UpdateScanner::new(
            config.scan_root(),
            config.fallback_scan_root(),
            config.updates.update_extension.clone(),
            config.updates.auxiliary_extension.clone(),
        );
        let mut engine = DecisionEngine::new(
            identity.service_name.clone(),
            identity.running_version,
            registry,
        )
        .with_extensions(
            config.updates.update_extension.clone(),
            config.updates.auxiliary_extension.clone(),
        )
        .forced(config.updates.forced)
        .accumulate(config.updates.accumulate);
        let mut extractor = SafeExtractor::new();
        let mut restore_extractor = SafeExtractor::new();
        let mut launcher = UpdateLauncher::new(Arc::clone(&node), guard.clone(), base_dir.clone());
        let mut backup = BackupManager::new(
            Arc::clone(&node),
            ActivityGuard::new(),
            config.cache_dir(),
            config.backup_dir(),
        )
        .with_retention(config.backup.retention)
        .with_retry_delay(Duration::from_secs(config.backup.retry_delay_secs));

        if let Some(tx) = &tx {
            scanner = scanner.with_events(tx.clone());
            engine = engine.with_events(tx.clone());
            extractor = extractor.with_events(tx.clone());
            restore_extractor = restore_extractor.with_events(tx.clone());
            launcher = launcher.with_events(tx.clone());
            backup = backup.with_events(tx.clone());
        }
        launcher = launcher.with_extractor(extractor);
        backup = backup.with_extractor(restore_extractor);

        Self {
            node,
            guard,
            scanner,
            engine,
            launcher,
            backup,
            accepted: Mutex::new(AcceptedUpdates::new()),
            base_dir,
            update_extension: config.updates.update_extension.clone(),
            auxiliary_extension: config.updates.auxiliary_extension.clone(),
            backup_attempts: config.backup.attempts,
            tx,
        }
    }

    /// Stream finished backup archives through the given sink
    #[must_use]
    pub fn with_upload(mut self, sink: Arc<dyn UploadSink>) -> Self {
        self.backup = self.backup.with_upload(sink);
        self
    }

    /// The guard serializing scan, extract and launch activity
    #[must_use]
    pub fn guard(&self) -> &ActivityGuard {
        &self.guard
    }

    /// Run one scan-and-decide cycle
    ///
    /// Clears the previous cycle's result, walks the update directories and
    /// evaluates every candidate. Returns the accepted set, or `None` when
    /// nothing qualified, the scan failed, or another lifecycle activity
    /// holds the guard. With `silent` set no update-found event fires, which
    /// is how availability probes avoid re-announcing the same packages.
    pub async fn scan_for_updates(&self, silent: bool) -> Option<AcceptedUpdates> {
        let Some(_permit) = self.guard.try_begin(Phase::Scanning) else {
            self.emit_debug("scan skipped, another lifecycle activity is running");
            return None;
        };

        self.lock_accepted().clear();

        let Ok(paths) = self.scanner.scan(true, false).await else {
            return None;
        };

        let mut accepted = self.lock_accepted();
        self.engine.evaluate(&paths, &mut accepted, silent);
        if accepted.is_empty() {
            None
        } else {
            Some(accepted.clone())
        }
    }

    /// Silent re-check: scan and report whether anything was accepted
    pub async fn is_update_available(&self) -> bool {
        self.scan_for_updates(true).await.is_some()
    }

    /// The accepted set of the current cycle, if it is non-empty
    #[must_use]
    pub fn get_available_updates(&self) -> Option<AcceptedUpdates> {
        let accepted = self.lock_accepted();
        if accepted.is_empty() {
            None
        } else {
            Some(accepted.clone())
        }
    }

    /// Copy of the accepted set, empty or not, for inventory reporting
    #[must_use]
    pub fn accepted_snapshot(&self) -> AcceptedUpdates {
        self.lock_accepted().clone()
    }

    /// Queue one package file for the next launch, bypassing the decision
    /// engine. Returns false when the filename does not parse.
    pub fn add_package_for_install(&self, path: &Path) -> bool {
        match Candidate::parse(path, &self.update_extension, &self.auxiliary_extension) {
            Some(candidate) => {
                self.emit(AppEvent::Update(UpdateEvent::Accepted {
                    path: candidate.path.clone(),
                    service_name: candidate.service_name.clone(),
                    version: candidate.version,
                }));
                // A manual add never displaces what a scan already accepted.
                self.lock_accepted().accept(candidate, true);
                true
            }
            None => {
                self.emit_warning(format!(
                    "not an update package name: {}",
                    path.display()
                ));
                false
            }
        }
    }

    /// Apply the accepted set, in-process or through the helper binary
    ///
    /// On a successful outcome the accepted set is cleared; the applied
    /// archives carry `.old` names and will not be re-offered.
    pub async fn launch_updater(&self, restart: bool, shutdown: &dyn ShutdownHook) -> LaunchOutcome {
        let invocation = {
            let accepted = self.lock_accepted();
            UpdaterInvocation {
                source_files: accepted.paths(),
                target_dir: self.base_dir.clone(),
                caller: UpdaterInvocation::caller_identity(std::process::id(), &self.host_exe()),
                hosting: self.node.identity().hosting,
            }
        };

        let outcome = self.launcher.launch(&invocation, restart, shutdown).await;
        if outcome.is_success() {
            self.lock_accepted().clear();
        }
        outcome
    }

    /// Relaunch the node with a plain restart verb
    pub async fn restart(&self) -> LaunchOutcome {
        self.launcher.restart_or_wipe(false, None, None).await
    }

    /// Relaunch the node, optionally wiping its cache first
    ///
    /// Wiping needs remote administration enabled plus a trust token whose
    /// claims name this node and scope.
    pub async fn restart_or_wipe(
        &self,
        wipe: bool,
        token: Option<&str>,
        verifier: Option<&dyn TrustVerifier>,
    ) -> LaunchOutcome {
        self.launcher.restart_or_wipe(wipe, token, verifier).await
    }

    /// Archive the cache folder under `title`
    pub async fn backup_cache_folder(&self, title: &str) -> BackupOutcome {
        self.backup.backup(title, self.backup_attempts).await
    }

    /// Restore a backup archive into the cache folder
    pub async fn restore_cache_folder(&self, title: &str) -> RestoreOutcome {
        self.backup.restore(title).await
    }

    /// Every recorded backup, oldest first
    pub async fn list_backups(&self) -> Vec<BackupDefinition> {
        self.backup.list_backups().await
    }

    /// Drive periodic cache backups until the node stops
    pub async fn run_backup_scheduler(&self, period_minutes: u64) {
        self.backup
            .run_scheduler(period_minutes, self.backup_attempts)
            .await;
    }

    fn host_exe(&self) -> String {
        std::env::current_exe().ok().map_or_else(
            || self.node.identity().service_name.clone(),
            |exe| exe.display().to_string(),
        )
    }

    fn lock_accepted(&self) -> MutexGuard<'_, AcceptedUpdates> {
        self.accepted.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
