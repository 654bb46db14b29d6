use serde::{Deserialize, Serialize};

// Declare all domain modules
pub mod backup;
pub mod extract;
pub mod general;
pub mod install;
pub mod provision;
pub mod scan;
pub mod update;

// Re-export all domain events
pub use backup::*;
pub use extract::*;
pub use general::*;
pub use install::*;
pub use provision::*;
pub use scan::*;
pub use update::*;

/// Top-level application event enum that aggregates all domain-specific events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "domain", content = "event", rename_all = "snake_case")]
pub enum AppEvent {
    /// General utility events (warnings, errors, debug messages)
    General(GeneralEvent),

    /// Update-folder scan events
    Scan(ScanEvent),

    /// Decision engine events (accepted and rejected candidates)
    Update(UpdateEvent),

    /// Archive validation and extraction events
    Extract(ExtractEvent),

    /// Installer launch and restart events
    Install(InstallEvent),

    /// Backup and restore events
    Backup(BackupEvent),

    /// Provisioning connector events
    Provision(ProvisionEvent),
}

impl AppEvent {
    /// Identify the source domain for this event (used as the log target).
    #[must_use]
    pub fn domain(&self) -> &'static str {
        match self {
            Self::General(_) => "general",
            Self::Scan(_) => "scan",
            Self::Update(_) => "update",
            Self::Extract(_) => "extract",
            Self::Install(_) => "install",
            Self::Backup(_) => "backup",
            Self::Provision(_) => "provision",
        }
    }

    /// Determine the appropriate tracing log level for this event
    #[must_use]
    pub fn log_level(&self) -> tracing::Level {
        use tracing::Level;

        match self {
            // Error-level events
            Self::General(GeneralEvent::Error { .. })
            | Self::Scan(ScanEvent::Failed { .. })
            | Self::Extract(ExtractEvent::Suspicious { .. })
            | Self::Install(InstallEvent::SpawnFailed { .. })
            | Self::Backup(BackupEvent::Failed { .. })
            | Self::Provision(ProvisionEvent::RegistrationTimeout { .. }) => Level::ERROR,

            // Warning-level events
            Self::General(GeneralEvent::Warning { .. })
            | Self::Extract(ExtractEvent::EntryFailed { .. })
            | Self::Install(InstallEvent::Refused { .. })
            | Self::Backup(BackupEvent::RetryScheduled { .. } | BackupEvent::ScheduleSkipped { .. })
            | Self::Provision(ProvisionEvent::Disconnected { .. }) => Level::WARN,

            // Debug-level events
            Self::General(GeneralEvent::DebugLog { .. })
            | Self::Update(UpdateEvent::Rejected { .. }) => Level::DEBUG,

            // Everything else is informational
            _ => Level::INFO,
        }
    }
}
