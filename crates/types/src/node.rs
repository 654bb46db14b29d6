//! Node identity and liveness

use crate::hosting::{HostingType, Platform};
use crate::version::PackageVersion;
use std::sync::atomic::{AtomicBool, Ordering};
use uuid::Uuid;

/// Immutable identity of the running node.
#[derive(Debug, Clone)]
pub struct NodeIdentity {
    pub node_id: Uuid,
    /// Trust scope shared with provisioning peers.
    pub scope: String,
    /// Product service name, matched against own-update candidates.
    pub service_name: String,
    pub running_version: PackageVersion,
    pub hosting: HostingType,
    pub platform: Platform,
}

/// Shared node state: identity plus the process-wide running flag, polled by
/// long operations to abort early on shutdown.
#[derive(Debug)]
pub struct NodeState {
    identity: NodeIdentity,
    remote_admin_enabled: bool,
    running: AtomicBool,
}

impl NodeState {
    #[must_use]
    pub fn new(identity: NodeIdentity, remote_admin_enabled: bool) -> Self {
        Self {
            identity,
            remote_admin_enabled,
            running: AtomicBool::new(true),
        }
    }

    #[must_use]
    pub fn identity(&self) -> &NodeIdentity {
        &self.identity
    }

    #[must_use]
    pub fn remote_admin_enabled(&self) -> bool {
        self.remote_admin_enabled
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Clear the running flag; in-flight retry loops observe this and stop.
    pub fn begin_shutdown(&self) {
        self.running.store(false, Ordering::SeqCst);
    }
}
