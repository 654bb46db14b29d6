//! Typed launch outcomes

use std::fmt;

/// Result of one launcher invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LaunchOutcome {
    /// Archives were applied in-process; no helper was needed
    Completed { sources_applied: usize },

    /// The helper (or relaunched instance) is running detached
    Spawned { pid: u32 },

    /// Another launch or restart is already in flight
    Busy,

    /// The request failed a policy or trust check, nothing was done
    Refused { reason: RefusalReason },

    /// The helper could not be materialized or spawned
    SpawnFailed { message: String },
}

impl LaunchOutcome {
    /// Whether the invocation did what was asked
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Completed { .. } | Self::Spawned { .. })
    }
}

/// Why a request was refused before any work started
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefusalReason {
    /// Remote administration is not enabled on this node
    RemoteAdminDisabled,

    /// The trust token failed verification or targets another node
    TokenRejected,
}

impl fmt::Display for RefusalReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RemoteAdminDisabled => f.write_str("remote administration disabled"),
            Self::TokenRejected => f.write_str("trust token rejected"),
        }
    }
}
