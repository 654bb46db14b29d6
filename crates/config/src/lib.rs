#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Configuration management for the node daemon
//!
//! Loads `ismd.toml` and merges settings from:
//! - Default values (hard-coded)
//! - Configuration file
//! - Environment variables
//!
//! Every field has a serde default, so an empty file (or no file at all)
//! yields a runnable configuration.

use ism_errors::{ConfigError, Error};
use ism_types::{HostingType, PackageVersion};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub node: NodeConfig,

    #[serde(default)]
    pub paths: PathsConfig,

    #[serde(default)]
    pub updates: UpdatesConfig,

    #[serde(default)]
    pub backup: BackupConfig,

    #[serde(default)]
    pub provisioning: ProvisioningConfig,
}

/// Node identity configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    #[serde(default = "default_service_name")]
    pub service_name: String,
    /// Deployment scope this node belongs to
    #[serde(default)]
    pub scope: String,
    /// Version of the service the node currently runs
    #[serde(default = "default_version")]
    pub version: String,
    /// Hosting type code (1=application, 2=service, 3=iis, 4=device)
    #[serde(default = "default_hosting_code")]
    pub hosting_code: u8,
    #[serde(default)]
    pub remote_admin_enabled: bool,
}

/// Path configuration
///
/// Only `base_dir` is usually set; the per-purpose directories default to
/// well-known locations under it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    #[serde(default = "default_base_dir")]
    pub base_dir: PathBuf,
    pub scan_root: Option<PathBuf>,
    pub cache_dir: Option<PathBuf>,
    pub backup_dir: Option<PathBuf>,
}

/// Update scanning and decision configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdatesConfig {
    /// Primary package extension
    #[serde(default = "default_update_extension")]
    pub update_extension: String,
    /// Legacy auxiliary package extension
    #[serde(default = "default_auxiliary_extension")]
    pub auxiliary_extension: String,
    /// Accept own-service packages even when not newer
    #[serde(default)]
    pub forced: bool,
    /// Collect every accepted package instead of keeping only the last one
    #[serde(default)]
    pub accumulate: bool,
    /// Minutes between scan passes, 0 disables the timer
    #[serde(default = "default_scan_interval")]
    pub scan_interval_minutes: u64,
}

/// Backup configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupConfig {
    /// Minutes between scheduled backups, 0 means daily
    #[serde(default)]
    pub interval_minutes: u64,
    /// Number of newest backup archives to keep
    #[serde(default = "default_backup_retention")]
    pub retention: usize,
    #[serde(default = "default_backup_attempts")]
    pub attempts: u32,
    #[serde(default = "default_backup_retry_delay")]
    pub retry_delay_secs: u64,
    /// Upload finished archives to the provisioning service
    #[serde(default)]
    pub upload: bool,
}

/// Provisioning connector configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvisioningConfig {
    /// Service endpoint; unset disables provisioning entirely
    pub endpoint: Option<String>,
    #[serde(default = "default_registration_timeout")]
    pub registration_timeout_secs: u64,
    #[serde(default = "default_reconnect_delay")]
    pub reconnect_delay_secs: u64,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            service_name: default_service_name(),
            scope: String::new(),
            version: default_version(),
            hosting_code: default_hosting_code(),
            remote_admin_enabled: false,
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            base_dir: default_base_dir(),
            scan_root: None,
            cache_dir: None,
            backup_dir: None,
        }
    }
}

impl Default for UpdatesConfig {
    fn default() -> Self {
        Self {
            update_extension: default_update_extension(),
            auxiliary_extension: default_auxiliary_extension(),
            forced: false,
            accumulate: false,
            scan_interval_minutes: default_scan_interval(),
        }
    }
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            interval_minutes: 0,
            retention: default_backup_retention(),
            attempts: default_backup_attempts(),
            retry_delay_secs: default_backup_retry_delay(),
            upload: false,
        }
    }
}

impl Default for ProvisioningConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            registration_timeout_secs: default_registration_timeout(),
            reconnect_delay_secs: default_reconnect_delay(),
        }
    }
}

// Default value functions for serde
fn default_service_name() -> String {
    "ism-node".to_string()
}

fn default_version() -> String {
    "1.0".to_string()
}

fn default_hosting_code() -> u8 {
    1
}

fn default_base_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_update_extension() -> String {
    ".CDEX".to_string()
}

fn default_auxiliary_extension() -> String {
    ".CDEF".to_string()
}

fn default_scan_interval() -> u64 {
    60
}

fn default_backup_retention() -> usize {
    7
}

fn default_backup_attempts() -> u32 {
    3
}

fn default_backup_retry_delay() -> u64 {
    5
}

fn default_registration_timeout() -> u64 {
    30
}

fn default_reconnect_delay() -> u64 {
    10
}

impl Config {
    /// Load configuration from file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or if the file contents
    /// contain invalid TOML syntax that cannot be parsed.
    pub async fn load_from_file(path: &Path) -> Result<Self, Error> {
        let contents = fs::read_to_string(path)
            .await
            .map_err(|e| ConfigError::ReadFailed {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;

        toml::from_str(&contents)
            .map_err(|e| ConfigError::ParseFailed {
                path: path.display().to_string(),
                message: e.to_string(),
            })
            .map_err(Into::into)
    }

    /// Load configuration from an optional path or fall back to defaults
    ///
    /// If path is provided the file must exist and parse. If path is None,
    /// `ismd.toml` next to the working directory is used when present,
    /// defaults otherwise.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be read or parsed.
    pub async fn load_or_default(path: Option<&Path>) -> Result<Self, Error> {
        match path {
            Some(config_path) => Self::load_from_file(config_path).await,
            None => {
                let default_path = PathBuf::from("ismd.toml");
                if default_path.exists() {
                    Self::load_from_file(&default_path).await
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    /// Merge with environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if environment variables contain invalid values
    /// that cannot be parsed into the expected types.
    pub fn merge_env(&mut self) -> Result<(), Error> {
        if let Ok(base) = std::env::var("ISM_BASE_DIR") {
            self.paths.base_dir = PathBuf::from(base);
        }

        if let Ok(name) = std::env::var("ISM_SERVICE_NAME") {
            self.node.service_name = name;
        }

        if let Ok(scope) = std::env::var("ISM_SCOPE") {
            self.node.scope = scope;
        }

        if let Ok(endpoint) = std::env::var("ISM_PROVISIONING_URL") {
            self.provisioning.endpoint = Some(endpoint);
        }

        if let Ok(hosting) = std::env::var("ISM_HOSTING_CODE") {
            self.node.hosting_code =
                hosting.parse().map_err(|_| ConfigError::InvalidValue {
                    field: "ISM_HOSTING_CODE".to_string(),
                    message: format!("not a hosting type code: {hosting}"),
                })?;
        }

        Ok(())
    }

    /// Primary directory scanned for update packages
    #[must_use]
    pub fn scan_root(&self) -> PathBuf {
        self.paths
            .scan_root
            .clone()
            .unwrap_or_else(|| self.paths.base_dir.join("ClientBin").join("Updates"))
    }

    /// Directory scanned when the primary one does not exist
    #[must_use]
    pub fn fallback_scan_root(&self) -> PathBuf {
        self.paths.base_dir.join("updates")
    }

    /// Cache folder covered by backup and restore
    #[must_use]
    pub fn cache_dir(&self) -> PathBuf {
        self.paths
            .cache_dir
            .clone()
            .unwrap_or_else(|| self.paths.base_dir.join("cache"))
    }

    /// Directory backup archives are written to
    #[must_use]
    pub fn backup_dir(&self) -> PathBuf {
        self.paths
            .backup_dir
            .clone()
            .unwrap_or_else(|| self.paths.base_dir.join("backups"))
    }
}

impl NodeConfig {
    /// Hosting type of this node
    #[must_use]
    pub fn hosting(&self) -> HostingType {
        HostingType::from_code(self.hosting_code)
    }

    /// Parsed running version
    ///
    /// # Errors
    ///
    /// Returns an error if the configured version string is not a valid
    /// decimal version.
    pub fn running_version(&self) -> Result<PackageVersion, Error> {
        PackageVersion::parse(&self.version).map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_is_valid() {
        let config: Config = toml::from_str("").expect("empty config should parse");
        assert_eq!(config.node.service_name, "ism-node");
        assert_eq!(config.updates.update_extension, ".CDEX");
        assert_eq!(config.backup.retention, 7);
        assert!(config.provisioning.endpoint.is_none());
    }

    #[test]
    fn partial_sections_fill_in_defaults() {
        let config: Config = toml::from_str(
            r#"
            [node]
            service_name = "MyApp.Sensor"
            hosting_code = 2

            [backup]
            interval_minutes = 120
            "#,
        )
        .expect("partial config should parse");

        assert_eq!(config.node.service_name, "MyApp.Sensor");
        assert_eq!(config.node.hosting(), HostingType::Service);
        assert_eq!(config.backup.interval_minutes, 120);
        assert_eq!(config.backup.attempts, 3);
        assert_eq!(config.updates.auxiliary_extension, ".CDEF");
    }

    #[test]
    fn derived_paths_follow_base_dir() {
        let config: Config = toml::from_str(
            r#"
            [paths]
            base_dir = "/opt/node"
            "#,
        )
        .expect("config should parse");

        assert_eq!(
            config.scan_root(),
            PathBuf::from("/opt/node/ClientBin/Updates")
        );
        assert_eq!(config.fallback_scan_root(), PathBuf::from("/opt/node/updates"));
        assert_eq!(config.cache_dir(), PathBuf::from("/opt/node/cache"));
        assert_eq!(config.backup_dir(), PathBuf::from("/opt/node/backups"));
    }

    #[test]
    fn explicit_scan_root_wins_over_base_dir() {
        let config: Config = toml::from_str(
            r#"
            [paths]
            base_dir = "/opt/node"
            scan_root = "/srv/updates"
            "#,
        )
        .expect("config should parse");

        assert_eq!(config.scan_root(), PathBuf::from("/srv/updates"));
    }

    #[tokio::test]
    async fn load_from_missing_file_fails() {
        let missing = Path::new("/nonexistent/ismd.toml");
        assert!(Config::load_from_file(missing).await.is_err());
    }

    #[tokio::test]
    async fn load_from_file_round_trip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("ismd.toml");
        tokio::fs::write(&path, "[node]\nversion = \"2.10\"\n")
            .await
            .expect("write config");

        let config = Config::load_from_file(&path).await.expect("load config");
        let version = config.node.running_version().expect("parse version");
        assert_eq!(version, "2.1".parse().expect("parse"));
    }
}
