#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Core type definitions for the ism update lifecycle manager
//!
//! This crate provides the fundamental types used throughout the system:
//! decimal package versions, update candidates and their filename grammar,
//! plugin inventory records, node identity, the activity state machine and
//! the trust-token seam.

pub mod activity;
pub mod backup;
pub mod candidate;
pub mod hosting;
pub mod meta;
pub mod node;
pub mod plugin;
pub mod token;
pub mod version;

// Re-export commonly used types
pub use activity::{ActivityGuard, ActivityPermit, Phase};
pub use backup::BackupDefinition;
pub use candidate::{AcceptedUpdates, Candidate, CandidateOutcome};
pub use hosting::{HostingType, Platform};
pub use meta::{PackageMetadata, ServiceDescriptor};
pub use node::{NodeIdentity, NodeState};
pub use plugin::{normalize_service_name, PluginInfo};
pub use token::{TokenClaims, TrustVerifier};
pub use uuid::Uuid;
pub use version::PackageVersion;

/// Separator between source archive paths in a helper-process argument list.
pub const SOURCE_LIST_SEPARATOR: &str = ";:;";

/// Suffix marking an already-applied update file.
pub const OLD_SUFFIX: &str = ".old";

/// Verb passed to a relaunched instance for restart and wipe handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartVerb {
    Restart,
    WipeNode,
    Start,
}

impl RestartVerb {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Restart => "RESTART",
            Self::WipeNode => "WIPENODE",
            Self::Start => "START",
        }
    }

    #[must_use]
    pub fn parse(arg: &str) -> Option<Self> {
        match arg {
            "RESTART" => Some(Self::Restart),
            "WIPENODE" => Some(Self::WipeNode),
            "START" => Some(Self::Start),
            _ => None,
        }
    }
}

impl std::fmt::Display for RestartVerb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One updater helper invocation: the file set to apply, where to apply it,
/// and who asked for it.
#[derive(Debug, Clone)]
pub struct UpdaterInvocation {
    /// Source archives to apply, in acceptance order.
    pub source_files: Vec<std::path::PathBuf>,
    /// Directory the archives unpack into (before hosting adjustment).
    pub target_dir: std::path::PathBuf,
    /// Caller identity as `<pid>:<hostExe>`.
    pub caller: String,
    /// Hosting mode of the calling node.
    pub hosting: HostingType,
}

impl UpdaterInvocation {
    /// Build the caller identity string for the current process.
    #[must_use]
    pub fn caller_identity(pid: u32, host_exe: &str) -> String {
        format!("{pid}:{host_exe}")
    }

    /// Join the source files into the helper-argument form.
    #[must_use]
    pub fn source_list(&self) -> String {
        let parts: Vec<String> = self
            .source_files
            .iter()
            .map(|p| p.display().to_string())
            .collect();
        parts.join(SOURCE_LIST_SEPARATOR)
    }

    /// Split a helper-argument source list back into paths.
    #[must_use]
    pub fn split_source_list(list: &str) -> Vec<std::path::PathBuf> {
        list.split(SOURCE_LIST_SEPARATOR)
            .filter(|s| !s.is_empty())
            .map(std::path::PathBuf::from)
            .collect()
    }
}
