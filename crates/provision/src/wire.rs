//! Shapes exchanged with the provisioning service

use ism_types::{PackageVersion, Platform, PluginInfo};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Registration request, sent once per connect
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub node_id: Uuid,
    pub scope: String,
    pub service_name: String,
    pub version: PackageVersion,
    pub platform: Platform,
}

/// Registration answer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub accepted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Full service inventory, published after registration and after scans
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryReport {
    pub node_id: Uuid,
    pub scope: String,
    pub services: Vec<PluginInfo>,
}

/// Administrative command issued by the provisioning service
///
/// The connector forwards these to the daemon; privileged ones carry the
/// trust token the daemon verifies before acting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "verb", rename_all = "snake_case")]
pub enum AdminCommand {
    /// Restart the node process
    Restart,
    /// Wipe the node's cache and restart
    WipeNode { token: String },
    /// Take a cache backup under the given title
    Backup { title: String },
}

impl AdminCommand {
    #[must_use]
    pub fn verb(&self) -> &'static str {
        match self {
            Self::Restart => "restart",
            Self::WipeNode { .. } => "wipe_node",
            Self::Backup { .. } => "backup",
        }
    }
}
