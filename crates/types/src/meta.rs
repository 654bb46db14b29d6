//! Authored-package metadata contract
//!
//! The package builder ships two optional JSON siblings next to an authored
//! archive: `META.<ext>` describing the package and `<ServiceName>.<ext>`
//! describing the service it installs. Building them is out of scope here;
//! this module only defines the shared shape and reads descriptors to enrich
//! inventory entries.

use crate::version::PackageVersion;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// `META.<ext>` — authored package metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageMetadata {
    pub service_name: String,
    pub version: PackageVersion,
    #[serde(default)]
    pub platform: String,
    #[serde(default)]
    pub capabilities: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// `<ServiceName>.<ext>` — service descriptor shipped beside a package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceDescriptor {
    pub service_name: String,
    pub version: PackageVersion,
    #[serde(default)]
    pub capabilities: Vec<String>,
    #[serde(default)]
    pub platform: String,
}

impl ServiceDescriptor {
    /// Look for a descriptor next to an update archive, trying the auxiliary
    /// extension first, then the update extension. Any missing or malformed
    /// file yields `None`; descriptors are best-effort enrichment.
    #[must_use]
    pub fn load_sibling(
        archive_path: &Path,
        service_name: &str,
        update_ext: &str,
        auxiliary_ext: &str,
    ) -> Option<Self> {
        let dir = archive_path.parent()?;
        for ext in [auxiliary_ext, update_ext] {
            let sibling = dir.join(format!("{service_name}{ext}"));
            if let Ok(raw) = std::fs::read_to_string(&sibling) {
                if let Ok(descriptor) = serde_json::from_str::<Self>(&raw) {
                    return Some(descriptor);
                }
            }
        }
        None
    }
}
