//! Installed plugin registry
//!
//! Shared between the decision engine (which records pending versions) and
//! the provisioning connector (which publishes the inventory). Keys are
//! normalized service names so `My-App.Sensor` and `myappsensor` address the
//! same entry.

use dashmap::DashMap;
use ism_types::{normalize_service_name, PackageVersion, PluginInfo};

/// Concurrent map of installed plugins keyed by normalized service name
#[derive(Debug, Default)]
pub struct PluginRegistry {
    plugins: DashMap<String, PluginInfo>,
}

impl PluginRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self {
            plugins: DashMap::new(),
        }
    }

    /// Add or replace a plugin entry
    pub fn register(&self, info: PluginInfo) {
        self.plugins
            .insert(normalize_service_name(&info.service_name), info);
    }

    /// Installed version of a plugin, if the registry knows it
    #[must_use]
    pub fn installed_version(&self, service_name: &str) -> Option<PackageVersion> {
        self.plugins
            .get(&normalize_service_name(service_name))
            .map(|entry| entry.version)
    }

    /// Record that an update to `version` is staged for a plugin
    ///
    /// Returns false when the plugin is not registered.
    pub fn mark_pending(&self, service_name: &str, version: PackageVersion) -> bool {
        match self.plugins.get_mut(&normalize_service_name(service_name)) {
            Some(mut entry) => {
                entry.pending_version = Some(version);
                true
            }
            None => false,
        }
    }

    /// Clear a pending marker, typically after the update was applied
    pub fn clear_pending(&self, service_name: &str) {
        if let Some(mut entry) = self.plugins.get_mut(&normalize_service_name(service_name)) {
            entry.pending_version = None;
        }
    }

    /// Copy of every registered plugin, order unspecified
    #[must_use]
    pub fn snapshot(&self) -> Vec<PluginInfo> {
        self.plugins.iter().map(|entry| entry.value().clone()).collect()
    }

    #[must_use]
    pub fn contains(&self, service_name: &str) -> bool {
        self.plugins
            .contains_key(&normalize_service_name(service_name))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plugin(name: &str, version: &str) -> PluginInfo {
        PluginInfo::new(name, version.parse().expect("version"))
    }

    #[test]
    fn lookup_ignores_case_dashes_and_dots() {
        let registry = PluginRegistry::new();
        registry.register(plugin("My-App.Sensor", "1.2"));

        assert!(registry.contains("MyApp.Sensor"));
        assert_eq!(
            registry.installed_version("MYAPP.SENSOR"),
            Some("1.2".parse().expect("version"))
        );
    }

    #[test]
    fn pending_marker_round_trip() {
        let registry = PluginRegistry::new();
        registry.register(plugin("Gateway", "2.0"));

        assert!(registry.mark_pending("gateway", "2.5".parse().expect("version")));
        let snapshot = registry.snapshot();
        assert_eq!(
            snapshot[0].pending_version,
            Some("2.5".parse().expect("version"))
        );

        registry.clear_pending("Gateway");
        assert_eq!(registry.snapshot()[0].pending_version, None);

        assert!(!registry.mark_pending("unknown", "1.0".parse().expect("version")));
    }
}
