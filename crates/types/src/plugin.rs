//! Plugin inventory records

use crate::version::PackageVersion;
use serde::{Deserialize, Serialize};

/// One installed plugin as exchanged with the provisioning peer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginInfo {
    pub service_name: String,
    pub version: PackageVersion,
    #[serde(default)]
    pub capabilities: Vec<String>,
    #[serde(default)]
    pub platform: String,
    /// Version accepted for install but not yet applied, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending_version: Option<PackageVersion>,
}

impl PluginInfo {
    #[must_use]
    pub fn new(service_name: impl Into<String>, version: PackageVersion) -> Self {
        Self {
            service_name: service_name.into(),
            version,
            capabilities: Vec::new(),
            platform: String::new(),
            pending_version: None,
        }
    }
}

/// Normalize a service name for registry lookups: ASCII-lowercased with `-`
/// and `.` stripped, so `Foo.Bar`, `foo-bar` and `FOOBAR` all collide.
#[must_use]
pub fn normalize_service_name(name: &str) -> String {
    name.chars()
        .filter(|c| *c != '-' && *c != '.')
        .flat_map(char::to_lowercase)
        .collect()
}
