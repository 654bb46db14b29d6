//! Update launching and restart handling

use crate::helper::{materialize_helper, spawn_detached};
use crate::outcome::{LaunchOutcome, RefusalReason};
use crate::shutdown::ShutdownHook;
use ism_archive::{ExtractOutcome, SafeExtractor};
use ism_events::{AppEvent, EventEmitter, EventSender, InstallEvent};
use ism_types::{
    ActivityGuard, HostingType, NodeState, Phase, RestartVerb, TrustVerifier, UpdaterInvocation,
    SOURCE_LIST_SEPARATOR,
};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Applies accepted updates and drives restarts
pub struct UpdateLauncher {
    node: Arc<NodeState>,
    guard: ActivityGuard,
    extractor: SafeExtractor,
    base_dir: PathBuf,
    tx: Option<EventSender>,
}

impl EventEmitter for UpdateLauncher {
    fn event_sender(&self) -> Option<&EventSender> {
        self.tx.as_ref()
    }
}

impl UpdateLauncher {
    /// Create a launcher bound to the node's shared state and activity guard
    #[must_use]
    pub fn new(node: Arc<NodeState>, guard: ActivityGuard, base_dir: PathBuf) -> Self {
        Self {
            node,
            guard,
            extractor: SafeExtractor::new(),
            base_dir,
            tx: None,
        }
    }

    /// Replace the extractor, typically to share its event channel
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

    /// Apply the invocation's archives, restarting the host when asked
    ///
    /// Missing source files are dropped with a warning. Where applying with
    /// restart would kill the files being swapped, a detached helper is
    /// spawned instead and the host is asked to exit softly; otherwise the
    /// archives are extracted in place and a requested restart becomes a
    /// hard shutdown for the supervisor to act on.
    pub async fn launch(
        &self,
        invocation: &UpdaterInvocation,
        restart: bool,
        shutdown: &dyn ShutdownHook,
    ) -> LaunchOutcome {
        let Some(_permit) = self.guard.try_begin(Phase::Launching) else {
            self.refuse("another launch is already in flight");
            return LaunchOutcome::Busy;
        };

        let target = invocation.hosting.adjust_target_dir(&invocation.target_dir);

        let mut sources = Vec::new();
        for path in &invocation.source_files {
            if tokio::fs::try_exists(path).await.unwrap_or(false) {
                sources.push(path.clone());
            } else {
                self.emit_warning(format!(
                    "update source missing, skipping: {}",
                    path.display()
                ));
            }
        }
        if sources.is_empty() {
            self.emit_warning("no update sources exist, nothing to install");
            return LaunchOutcome::Completed { sources_applied: 0 };
        }

        let platform = self.node.identity().platform;
        if restart && invocation.hosting.restart_needs_helper(platform) {
            self.launch_helper(invocation, &sources, &target, shutdown)
                .await
        } else {
            self.apply_in_process(&sources, &target, restart, shutdown)
                .await
        }
    }

    /// Relaunch the node executable with a restart or wipe verb
    ///
    /// Wiping requires remote administration to be enabled and a trust
    /// token whose claims name this node and its scope; anything less is
    /// refused without side effects. The caller decides when to exit after
    /// a successful spawn.
    pub async fn restart_or_wipe(
        &self,
        wipe: bool,
        token: Option<&str>,
        verifier: Option<&dyn TrustVerifier>,
    ) -> LaunchOutcome {
        let Some(_permit) = self.guard.try_begin(Phase::Launching) else {
            self.refuse("another launch is already in flight");
            return LaunchOutcome::Busy;
        };

        let identity = self.node.identity();

        if wipe {
            if !self.node.remote_admin_enabled() {
                self.refuse("wipe requested but remote administration is disabled");
                return LaunchOutcome::Refused {
                    reason: RefusalReason::RemoteAdminDisabled,
                };
            }
            let (Some(token), Some(verifier)) = (token, verifier) else {
                self.refuse("wipe requested without a trust token");
                return LaunchOutcome::Refused {
                    reason: RefusalReason::TokenRejected,
                };
            };
            let claims = match verifier.unseal(token) {
                Ok(claims) => claims,
                Err(e) => {
                    self.refuse(format!("trust token rejected: {e}"));
                    return LaunchOutcome::Refused {
                        reason: RefusalReason::TokenRejected,
                    };
                }
            };
            if claims.node_id != identity.node_id || claims.scope != identity.scope {
                self.refuse("trust token targets another node or scope");
                return LaunchOutcome::Refused {
                    reason: RefusalReason::TokenRejected,
                };
            }
        }

        let verb = if wipe {
            RestartVerb::WipeNode
        } else {
            match identity.hosting {
                HostingType::Service | HostingType::Iis => RestartVerb::Restart,
                HostingType::Application | HostingType::Device => RestartVerb::Start,
            }
        };

        let exe = match std::env::current_exe() {
            Ok(exe) => exe,
            Err(e) => {
                let message = format!("cannot resolve current executable: {e}");
                self.emit(AppEvent::Install(InstallEvent::SpawnFailed {
                    message: message.clone(),
                }));
                return LaunchOutcome::SpawnFailed { message };
            }
        };

        let args: Vec<OsString> = vec![
            verb.as_str().into(),
            self.base_dir.as_os_str().to_owned(),
            identity.service_name.clone().into(),
            identity.hosting.code().to_string().into(),
        ];

        match spawn_detached(&exe, &args).await {
            Ok(pid) => {
                self.emit(AppEvent::Install(InstallEvent::HelperSpawned {
                    pid,
                    helper: exe,
                }));
                LaunchOutcome::Spawned { pid }
            }
            Err(e) => {
                let message = e.to_string();
                self.emit(AppEvent::Install(InstallEvent::SpawnFailed {
                    message: message.clone(),
                }));
                LaunchOutcome::SpawnFailed { message }
            }
        }
    }

    async fn apply_in_process(
        &self,
        sources: &[PathBuf],
        target: &Path,
        restart: bool,
        shutdown: &dyn ShutdownHook,
    ) -> LaunchOutcome {
        self.emit(AppEvent::Install(InstallEvent::Started {
            sources: sources.len(),
            target: target.to_path_buf(),
            in_process: true,
        }));

        let mut applied = 0_usize;
        for source in sources {
            match self.extractor.extract(source, target).await {
                // Suspicious archives stay in place unmarked; every later
                // scan re-offers and re-rejects them.
                Ok(ExtractOutcome::Suspicious { .. }) => {}
                Ok(_) => {
                    applied += 1;
                    if let Err(e) = self.extractor.mark_applied(source).await {
                        self.emit_warning(format!(
                            "cannot mark {} applied: {e}",
                            source.display()
                        ));
                    }
                }
                Err(e) => {
                    self.emit_error(format!("cannot extract {}: {e}", source.display()));
                }
            }
        }

        self.emit(AppEvent::Install(InstallEvent::Completed { sources: applied }));

        if restart {
            self.emit(AppEvent::Install(InstallEvent::ShutdownRequested {
                hard: true,
            }));
            shutdown.request_shutdown(true);
        }

        LaunchOutcome::Completed {
            sources_applied: applied,
        }
    }

    async fn launch_helper(
        &self,
        invocation: &UpdaterInvocation,
        sources: &[PathBuf],
        target: &Path,
        shutdown: &dyn ShutdownHook,
    ) -> LaunchOutcome {
        self.emit(AppEvent::Install(InstallEvent::Started {
            sources: sources.len(),
            target: target.to_path_buf(),
            in_process: false,
        }));

        let helper = match materialize_helper(target).await {
            Ok(helper) => helper,
            Err(e) => {
                let message = e.to_string();
                self.emit(AppEvent::Install(InstallEvent::SpawnFailed {
                    message: message.clone(),
                }));
                return LaunchOutcome::SpawnFailed { message };
            }
        };

        let source_list: String = sources
            .iter()
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>()
            .join(SOURCE_LIST_SEPARATOR);
        let args: Vec<OsString> = vec![
            source_list.into(),
            target.as_os_str().to_owned(),
            invocation.caller.clone().into(),
            invocation.hosting.code().to_string().into(),
        ];

        match spawn_detached(&helper, &args).await {
            Ok(pid) => {
                self.emit(AppEvent::Install(InstallEvent::HelperSpawned {
                    pid,
                    helper,
                }));
                if matches!(
                    invocation.hosting,
                    HostingType::Application | HostingType::Device
                ) {
                    self.emit(AppEvent::Install(InstallEvent::ShutdownRequested {
                        hard: false,
                    }));
                    shutdown.request_shutdown(false);
                }
                LaunchOutcome::Spawned { pid }
            }
            Err(e) => {
                let message = e.to_string();
                self.emit(AppEvent::Install(InstallEvent::SpawnFailed {
                    message: message.clone(),
                }));
                LaunchOutcome::SpawnFailed { message }
            }
        }
    }

    fn refuse(&self, reason: impl Into<String>) {
        self.emit(AppEvent::Install(InstallEvent::Refused {
            reason: reason.into(),
        }));
    }
}
