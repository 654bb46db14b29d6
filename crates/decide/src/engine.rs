//! Candidate evaluation

use crate::registry::PluginRegistry;
use ism_events::{AppEvent, EventEmitter, EventSender, UpdateEvent};
use ism_types::{AcceptedUpdates, Candidate, CandidateOutcome, PackageVersion};
use std::path::PathBuf;
use std::sync::Arc;

/// One evaluated candidate paired with why it was accepted or rejected
#[derive(Debug, Clone)]
pub struct CandidateDecision {
    pub candidate: Candidate,
    pub outcome: CandidateOutcome,
}

/// Decides which scanned archives actually apply to this node
pub struct DecisionEngine {
    service_name: String,
    running_version: PackageVersion,
    update_extension: String,
    auxiliary_extension: String,
    forced: bool,
    accumulate: bool,
    registry: Arc<PluginRegistry>,
    tx: Option<EventSender>,
}

impl EventEmitter for DecisionEngine {
    fn event_sender(&self) -> Option<&EventSender> {
        self.tx.as_ref()
    }
}

impl DecisionEngine {
    /// Create an engine for the given own-service identity
    #[must_use]
    pub fn new(
        service_name: impl Into<String>,
        running_version: PackageVersion,
        registry: Arc<PluginRegistry>,
    ) -> Self {
        Self {
            service_name: service_name.into(),
            running_version,
            update_extension: ".CDEX".to_string(),
            auxiliary_extension: ".CDEF".to_string(),
            forced: false,
            accumulate: false,
            registry,
            tx: None,
        }
    }

    /// Override the package extensions
    #[must_use]
    pub fn with_extensions(
        mut self,
        update_extension: impl Into<String>,
        auxiliary_extension: impl Into<String>,
    ) -> Self {
        self.update_extension = update_extension.into();
        self.auxiliary_extension = auxiliary_extension.into();
        self
    }

    /// Accept candidates even when they are not newer
    #[must_use]
    pub fn forced(mut self, forced: bool) -> Self {
        self.forced = forced;
        self
    }

    /// Keep every accepted candidate instead of only the last one
    #[must_use]
    pub fn accumulate(mut self, accumulate: bool) -> Self {
        self.accumulate = accumulate;
        self
    }

    /// Attach an event channel
    #[must_use]
    pub fn with_events(mut self, tx: EventSender) -> Self {
        self.tx = Some(tx);
        self
    }

    #[must_use]
    pub fn is_accumulating(&self) -> bool {
        self.accumulate
    }

    /// Evaluate a scanned path list against the running node
    ///
    /// Accepted candidates are recorded into `accepted`; filenames that do
    /// not parse are dropped without a decision. After the full list is
    /// processed an update-found event fires, unless `silent` is set or
    /// nothing was accepted.
    pub fn evaluate(
        &self,
        paths: &[PathBuf],
        accepted: &mut AcceptedUpdates,
        silent: bool,
    ) -> Vec<CandidateDecision> {
        let mut decisions = Vec::new();

        for path in paths {
            let Some(candidate) =
                Candidate::parse(path, &self.update_extension, &self.auxiliary_extension)
            else {
                continue;
            };

            let outcome = self.decide(&candidate);
            if outcome.is_accepted() {
                self.emit(AppEvent::Update(UpdateEvent::Accepted {
                    path: candidate.path.clone(),
                    service_name: candidate.service_name.clone(),
                    version: candidate.version,
                }));
                accepted.accept(candidate.clone(), self.accumulate);
            }
            decisions.push(CandidateDecision { candidate, outcome });
        }

        if !silent && !accepted.is_empty() {
            if let Some(version) = accepted.version() {
                self.emit(AppEvent::Update(UpdateEvent::Available {
                    version,
                    paths: accepted.paths(),
                }));
            }
        }

        decisions
    }

    fn decide(&self, candidate: &Candidate) -> CandidateOutcome {
        if candidate
            .service_name
            .eq_ignore_ascii_case(&self.service_name)
        {
            if self.forced || candidate.version > self.running_version {
                return CandidateOutcome::AcceptedOwnUpdate;
            }
            let outcome = CandidateOutcome::RejectedNotNewer {
                current: self.running_version,
            };
            self.emit_rejection(candidate, self.running_version);
            return outcome;
        }

        if let Some(installed) = self.registry.installed_version(&candidate.service_name) {
            if self.forced || candidate.version > installed {
                self.registry
                    .mark_pending(&candidate.service_name, candidate.version);
                self.emit(AppEvent::Update(UpdateEvent::PendingMarked {
                    service_name: candidate.service_name.clone(),
                    version: candidate.version,
                }));
                return CandidateOutcome::AcceptedPluginUpdate;
            }
            self.emit_rejection(candidate, installed);
            return CandidateOutcome::RejectedNotNewer { current: installed };
        }

        CandidateOutcome::AcceptedNewPlugin
    }

    fn emit_rejection(&self, candidate: &Candidate, current: PackageVersion) {
        self.emit(AppEvent::Update(UpdateEvent::Rejected {
            path: candidate.path.clone(),
            service_name: candidate.service_name.clone(),
            current,
            offered: candidate.version,
        }));
    }
}
