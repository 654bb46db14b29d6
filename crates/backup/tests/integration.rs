//! Integration tests for backup crate

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use ism_backup::{BackupManager, BackupOutcome, RestoreOutcome, UploadSink, BACKUP_EXTENSION};
    use ism_errors::Error;
    use ism_events::{AppEvent, BackupEvent};
    use ism_types::{
        ActivityGuard, HostingType, NodeIdentity, NodeState, PackageVersion, Phase, Platform, Uuid,
    };
    use std::path::{Path, PathBuf};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tempfile::tempdir;

    fn node() -> Arc<NodeState> {
        Arc::new(NodeState::new(
            NodeIdentity {
                node_id: Uuid::new_v4(),
                scope: "mesh-a".into(),
                service_name: "MyApp.Node".into(),
                running_version: PackageVersion::parse("1.0").unwrap(),
                hosting: HostingType::Application,
                platform: Platform::Posix,
            },
            false,
        ))
    }

    fn manager(cache: &Path, backups: &Path) -> BackupManager {
        BackupManager::new(
            node(),
            ActivityGuard::new(),
            cache.to_path_buf(),
            backups.to_path_buf(),
        )
        .with_retry_delay(Duration::ZERO)
    }

    fn seed_cache(cache: &Path) {
        std::fs::create_dir_all(cache.join("nested")).unwrap();
        std::fs::write(cache.join("settings.json"), b"{\"speed\":7}").unwrap();
        std::fs::write(cache.join("nested/readings.csv"), b"1,2,3\n").unwrap();
    }

    struct RecordingSink {
        uploaded: Mutex<Vec<PathBuf>>,
        fail: bool,
    }

    #[async_trait]
    impl UploadSink for RecordingSink {
        async fn upload(&self, file: &Path) -> Result<(), Error> {
            self.uploaded.lock().unwrap().push(file.to_path_buf());
            if self.fail {
                Err(Error::internal("uplink unreachable"))
            } else {
                Ok(())
            }
        }
    }

    #[tokio::test]
    async fn backup_writes_archive_and_records_state() {
        let dir = tempdir().unwrap();
        let cache = dir.path().join("cache");
        let backups = dir.path().join("backups");
        seed_cache(&cache);

        let (tx, mut rx) = ism_events::channel();
        let manager = manager(&cache, &backups).with_events(tx);

        let outcome = manager.backup("nightly", 3).await;
        let BackupOutcome::Completed(definition) = outcome else {
            panic!("expected completed backup, got {outcome:?}");
        };
        assert_eq!(definition.title, "nightly");
        assert!(definition.size_bytes > 0);
        assert!(backups.join(format!("nightly{BACKUP_EXTENSION}")).is_file());

        assert!(manager.last_backup_time().await.is_some());
        let listed = manager.list_backups().await;
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].title, "nightly");

        let mut started = false;
        let mut completed = false;
        while let Ok(event) = rx.try_recv() {
            match event {
                AppEvent::Backup(BackupEvent::Started { .. }) => started = true,
                AppEvent::Backup(BackupEvent::Completed { size_bytes, .. }) => {
                    assert_eq!(size_bytes, definition.size_bytes);
                    completed = true;
                }
                _ => {}
            }
        }
        assert!(started && completed);
    }

    #[tokio::test]
    async fn failed_attempts_exhaust_retries_and_leave_nothing() {
        let dir = tempdir().unwrap();
        let cache = dir.path().join("cache");
        let backups = dir.path().join("backups");
        seed_cache(&cache);
        // A directory squatting on the archive name makes the final rename
        // fail on every attempt.
        std::fs::create_dir_all(backups.join(format!("blocked{BACKUP_EXTENSION}"))).unwrap();

        let outcome = manager(&cache, &backups).backup("blocked", 2).await;
        assert!(
            matches!(outcome, BackupOutcome::Failed { attempts: 2, .. }),
            "got {outcome:?}"
        );

        let leftovers: Vec<_> = std::fs::read_dir(&backups)
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| e.path().extension().is_some_and(|ext| ext == "partial"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn a_later_attempt_succeeds_once_the_target_frees_up() {
        let dir = tempdir().unwrap();
        let cache = dir.path().join("cache");
        let backups = dir.path().join("backups");
        seed_cache(&cache);

        // An archive from an earlier run, for retention to prune once the
        // retried backup lands.
        std::fs::create_dir_all(&backups).unwrap();
        std::fs::write(backups.join(format!("stale{BACKUP_EXTENSION}")), b"old").unwrap();
        // Distinct file times so pruning has an unambiguous oldest.
        tokio::time::sleep(Duration::from_millis(1100)).await;

        let blocker = backups.join(format!("contended{BACKUP_EXTENSION}"));
        std::fs::create_dir_all(&blocker).unwrap();

        let (tx, mut rx) = ism_events::channel();
        let manager = manager(&cache, &backups)
            .with_retention(1)
            .with_retry_delay(Duration::from_millis(50))
            .with_events(tx);

        // Free the archive name during the second retry delay, so the third
        // attempt is the first one that can land.
        let unblock = tokio::spawn(async move {
            let mut retries = 0;
            while let Some(event) = rx.recv().await {
                if let AppEvent::Backup(BackupEvent::RetryScheduled { attempt, .. }) = event {
                    retries = attempt;
                    if attempt == 2 {
                        std::fs::remove_dir(&blocker).unwrap();
                        break;
                    }
                }
            }
            retries
        });

        let outcome = manager.backup("contended", 3).await;
        assert!(
            matches!(outcome, BackupOutcome::Completed(_)),
            "got {outcome:?}"
        );
        drop(manager);
        assert_eq!(unblock.await.unwrap(), 2);

        assert!(backups.join(format!("contended{BACKUP_EXTENSION}")).is_file());
        assert!(!backups.join(format!("stale{BACKUP_EXTENSION}")).exists());
    }

    #[tokio::test]
    async fn invalid_titles_are_refused_without_touching_the_guard() {
        let dir = tempdir().unwrap();
        let cache = dir.path().join("cache");
        let backups = dir.path().join("backups");
        seed_cache(&cache);
        let manager = manager(&cache, &backups);

        assert!(matches!(
            manager.backup("", 1).await,
            BackupOutcome::InvalidTitle
        ));
        assert!(matches!(
            manager.backup("../escape", 1).await,
            BackupOutcome::InvalidTitle
        ));
        assert!(matches!(
            manager.restore("a/b").await,
            RestoreOutcome::InvalidTitle
        ));

        // The guard was never taken, so a real backup still goes through.
        assert!(matches!(
            manager.backup("valid", 1).await,
            BackupOutcome::Completed(_)
        ));
    }

    #[tokio::test]
    async fn shutdown_aborts_before_the_first_attempt() {
        let dir = tempdir().unwrap();
        let cache = dir.path().join("cache");
        let backups = dir.path().join("backups");
        seed_cache(&cache);

        let stopping = node();
        stopping.begin_shutdown();
        let manager = BackupManager::new(
            stopping,
            ActivityGuard::new(),
            cache.clone(),
            backups.clone(),
        );

        assert!(matches!(
            manager.backup("late", 3).await,
            BackupOutcome::Aborted
        ));
        assert!(!backups.join(format!("late{BACKUP_EXTENSION}")).exists());
    }

    #[tokio::test]
    async fn retention_keeps_only_the_newest_archives() {
        let dir = tempdir().unwrap();
        let cache = dir.path().join("cache");
        let backups = dir.path().join("backups");
        seed_cache(&cache);
        let manager = manager(&cache, &backups).with_retention(1);

        assert!(matches!(
            manager.backup("first", 1).await,
            BackupOutcome::Completed(_)
        ));
        // Distinct file times so pruning has an unambiguous oldest.
        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert!(matches!(
            manager.backup("second", 1).await,
            BackupOutcome::Completed(_)
        ));

        assert!(!backups.join(format!("first{BACKUP_EXTENSION}")).exists());
        assert!(backups.join(format!("second{BACKUP_EXTENSION}")).is_file());
        // The state file is not an archive and survives pruning.
        assert!(backups.join("last_backup.json").is_file());
    }

    #[tokio::test]
    async fn restore_round_trips_the_cache_directory() {
        let dir = tempdir().unwrap();
        let cache = dir.path().join("cache");
        let backups = dir.path().join("backups");
        seed_cache(&cache);
        let manager = manager(&cache, &backups);

        assert!(matches!(
            manager.backup("snap", 1).await,
            BackupOutcome::Completed(_)
        ));

        std::fs::remove_dir_all(&cache).unwrap();
        let outcome = manager.restore("snap").await;
        let RestoreOutcome::Completed { files_restored } = outcome else {
            panic!("expected completed restore, got {outcome:?}");
        };
        assert_eq!(files_restored, 2);
        assert_eq!(
            std::fs::read(cache.join("settings.json")).unwrap(),
            b"{\"speed\":7}"
        );
        assert_eq!(
            std::fs::read(cache.join("nested/readings.csv")).unwrap(),
            b"1,2,3\n"
        );
    }

    #[tokio::test]
    async fn restoring_a_missing_archive_is_not_found() {
        let dir = tempdir().unwrap();
        let cache = dir.path().join("cache");
        let backups = dir.path().join("backups");
        std::fs::create_dir_all(&backups).unwrap();

        assert!(matches!(
            manager(&cache, &backups).restore("ghost").await,
            RestoreOutcome::NotFound
        ));
    }

    #[tokio::test]
    async fn garbage_archives_fail_restore_validation() {
        let dir = tempdir().unwrap();
        let cache = dir.path().join("cache");
        let backups = dir.path().join("backups");
        std::fs::create_dir_all(&backups).unwrap();
        std::fs::write(
            backups.join(format!("junk{BACKUP_EXTENSION}")),
            b"not a zip archive",
        )
        .unwrap();

        let outcome = manager(&cache, &backups).restore("junk").await;
        assert!(
            matches!(outcome, RestoreOutcome::Failed { .. }),
            "got {outcome:?}"
        );
        assert!(!cache.exists());
    }

    #[tokio::test]
    async fn an_active_phase_makes_backup_and_restore_busy() {
        let dir = tempdir().unwrap();
        let cache = dir.path().join("cache");
        let backups = dir.path().join("backups");
        seed_cache(&cache);

        let guard = ActivityGuard::new();
        let manager = BackupManager::new(node(), guard.clone(), cache, backups)
            .with_retry_delay(Duration::ZERO);

        let permit = guard.try_begin(Phase::Scanning).unwrap();
        assert!(matches!(
            manager.backup("while-busy", 1).await,
            BackupOutcome::Busy
        ));
        assert!(matches!(
            manager.restore("while-busy").await,
            RestoreOutcome::Busy
        ));
        drop(permit);
    }

    #[tokio::test]
    async fn upload_failure_does_not_fail_the_backup() {
        let dir = tempdir().unwrap();
        let cache = dir.path().join("cache");
        let backups = dir.path().join("backups");
        seed_cache(&cache);

        let sink = Arc::new(RecordingSink {
            uploaded: Mutex::new(Vec::new()),
            fail: true,
        });
        let upload: Arc<dyn UploadSink> = Arc::clone(&sink) as Arc<dyn UploadSink>;
        let manager = manager(&cache, &backups).with_upload(upload);

        assert!(matches!(
            manager.backup("uplinked", 1).await,
            BackupOutcome::Completed(_)
        ));
        let uploaded = sink.uploaded.lock().unwrap();
        assert_eq!(uploaded.len(), 1);
        assert!(uploaded[0].ends_with(format!("uplinked{BACKUP_EXTENSION}")));
    }

    #[tokio::test]
    async fn scheduler_exits_once_the_node_stops() {
        let dir = tempdir().unwrap();
        let cache = dir.path().join("cache");
        let backups = dir.path().join("backups");
        seed_cache(&cache);

        let stopping = node();
        stopping.begin_shutdown();
        let manager = BackupManager::new(stopping, ActivityGuard::new(), cache, backups);

        tokio::time::timeout(Duration::from_secs(5), manager.run_scheduler(15, 1))
            .await
            .expect("scheduler should return promptly after shutdown");
    }
}
