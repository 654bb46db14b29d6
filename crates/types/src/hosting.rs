//! Hosting modes and host platforms

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// How the node process is hosted. The numeric codes are part of the
/// helper-process argument contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum HostingType {
    #[default]
    Application,
    Service,
    Iis,
    Device,
}

impl HostingType {
    /// Numeric code used on the helper-process command line.
    #[must_use]
    pub fn code(self) -> u8 {
        match self {
            Self::Application => 1,
            Self::Service => 2,
            Self::Iis => 3,
            Self::Device => 4,
        }
    }

    /// Decode a helper-process hosting code; unknown codes map to
    /// `Application`.
    #[must_use]
    pub fn from_code(code: u8) -> Self {
        match code {
            2 => Self::Service,
            3 => Self::Iis,
            4 => Self::Device,
            _ => Self::Application,
        }
    }

    /// Adjust the update target directory for this hosting mode. IIS hosts
    /// load from the application's `bin` directory.
    #[must_use]
    pub fn adjust_target_dir(self, target: &Path) -> PathBuf {
        match self {
            Self::Iis => target.join("bin"),
            _ => target.to_path_buf(),
        }
    }

    /// Whether applying an update with restart must outlive the current
    /// process (a spawned helper performs the swap after exit).
    #[must_use]
    pub fn restart_needs_helper(self, platform: Platform) -> bool {
        platform == Platform::Windows
    }
}

impl std::fmt::Display for HostingType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Application => "application",
            Self::Service => "service",
            Self::Iis => "iis",
            Self::Device => "device",
        };
        f.write_str(s)
    }
}

/// Host platform family, as far as the launcher cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Posix,
    Windows,
}

impl Platform {
    /// Platform the current binary was built for.
    #[must_use]
    pub fn current() -> Self {
        if cfg!(windows) {
            Self::Windows
        } else {
            Self::Posix
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Posix => "posix",
            Self::Windows => "windows",
        };
        f.write_str(s)
    }
}
