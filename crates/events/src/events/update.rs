use ism_types::PackageVersion;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Decision engine events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum UpdateEvent {
    /// One or more archives were accepted and are ready to install
    Available {
        version: PackageVersion,
        paths: Vec<PathBuf>,
    },

    /// A candidate archive was accepted
    Accepted {
        path: PathBuf,
        service_name: String,
        version: PackageVersion,
    },

    /// A candidate archive was rejected as not newer than what runs
    Rejected {
        path: PathBuf,
        service_name: String,
        current: PackageVersion,
        offered: PackageVersion,
    },

    /// A plugin was flagged as having an update staged for it
    PendingMarked {
        service_name: String,
        version: PackageVersion,
    },
}
