//! Integration tests for config

#[cfg(test)]
mod tests {
    use ism_config::Config;
    use ism_types::HostingType;
    use std::path::{Path, PathBuf};
    use std::sync::Mutex;

    // Mutex to ensure env var tests don't run concurrently
    static ENV_TEST_MUTEX: Mutex<()> = Mutex::new(());

    #[tokio::test]
    async fn environment_wins_over_file() {
        let _guard = ENV_TEST_MUTEX.lock().unwrap();

        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("ismd.toml");
        tokio::fs::write(
            &path,
            r#"
            [node]
            service_name = "Plant.Gateway"
            scope = "plant-7"

            [paths]
            base_dir = "/opt/gateway"
            "#,
        )
        .await
        .expect("write config");

        let mut config = Config::load_or_default(Some(&path)).await.expect("load");
        assert_eq!(config.node.service_name, "Plant.Gateway");
        assert_eq!(config.paths.base_dir, PathBuf::from("/opt/gateway"));

        std::env::set_var("ISM_SERVICE_NAME", "Plant.Gateway.Stage");
        std::env::set_var("ISM_BASE_DIR", "/srv/stage");
        std::env::set_var("ISM_HOSTING_CODE", "4");

        let merged = config.merge_env();

        std::env::remove_var("ISM_SERVICE_NAME");
        std::env::remove_var("ISM_BASE_DIR");
        std::env::remove_var("ISM_HOSTING_CODE");

        merged.expect("merge env");
        assert_eq!(config.node.service_name, "Plant.Gateway.Stage");
        assert_eq!(config.paths.base_dir, PathBuf::from("/srv/stage"));
        assert_eq!(config.node.hosting(), HostingType::Device);
        // Values without an override survive the merge.
        assert_eq!(config.node.scope, "plant-7");
    }

    #[test]
    fn invalid_hosting_code_in_environment() {
        let _guard = ENV_TEST_MUTEX.lock().unwrap();

        std::env::set_var("ISM_HOSTING_CODE", "banana");

        let mut config = Config::default();
        let result = config.merge_env();

        std::env::remove_var("ISM_HOSTING_CODE");

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn absent_default_file_yields_defaults() {
        let config = Config::load_or_default(None).await.expect("defaults");
        assert_eq!(config.node.service_name, "ism-node");
        assert_eq!(config.updates.scan_interval_minutes, 60);
    }

    #[tokio::test]
    async fn explicit_path_must_exist() {
        let missing = Path::new("/nonexistent/ismd.toml");
        assert!(Config::load_or_default(Some(missing)).await.is_err());
    }
}
