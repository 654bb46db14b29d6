//! Integration tests for archive crate

#[cfg(test)]
mod tests {
    use ism_archive::{create_archive, ExtractOutcome, SafeExtractor, SuspicionReason};
    use std::io::Write;
    use std::path::Path;
    use tempfile::tempdir;

    fn write_test_zip(path: &Path, entries: &[(&str, &[u8])]) {
        let file = std::fs::File::create(path).unwrap();
        let mut writer = zip::ZipWriter::new(file);
        let options = zip::write::SimpleFileOptions::default();
        for (name, data) in entries {
            writer.start_file(*name, options).unwrap();
            writer.write_all(data).unwrap();
        }
        writer.finish().unwrap();
    }

    #[tokio::test]
    async fn extracts_simple_archive() {
        let temp = tempdir().unwrap();
        let archive = temp.path().join("App V1.0.CDEX");
        let target = temp.path().join("out");
        write_test_zip(
            &archive,
            &[
                ("app.bin", b"binary content".as_slice()),
                ("conf/settings.json", b"{}".as_slice()),
            ],
        );

        let outcome = SafeExtractor::new()
            .extract(&archive, &target)
            .await
            .unwrap();

        assert_eq!(
            outcome,
            ExtractOutcome::Completed {
                files_written: 2,
                bytes_written: 16,
            }
        );
        assert_eq!(
            std::fs::read(target.join("app.bin")).unwrap(),
            b"binary content"
        );
        assert!(target.join("conf/settings.json").exists());
    }

    #[tokio::test]
    async fn empty_archive_completes_with_nothing_written() {
        let temp = tempdir().unwrap();
        let archive = temp.path().join("empty.CDEX");
        let target = temp.path().join("out");
        write_test_zip(&archive, &[]);

        let outcome = SafeExtractor::new()
            .extract(&archive, &target)
            .await
            .unwrap();

        assert_eq!(
            outcome,
            ExtractOutcome::Completed {
                files_written: 0,
                bytes_written: 0,
            }
        );
    }

    #[tokio::test]
    async fn overwrites_existing_files() {
        let temp = tempdir().unwrap();
        let archive = temp.path().join("App V2.0.CDEX");
        let target = temp.path().join("out");
        std::fs::create_dir_all(&target).unwrap();
        std::fs::write(target.join("app.bin"), b"old version").unwrap();
        write_test_zip(&archive, &[("app.bin", b"new version".as_slice())]);

        let outcome = SafeExtractor::new()
            .extract(&archive, &target)
            .await
            .unwrap();

        assert!(outcome.is_complete());
        assert_eq!(std::fs::read(target.join("app.bin")).unwrap(), b"new version");
    }

    #[tokio::test]
    async fn rejects_high_ratio_entry_without_writing() {
        let temp = tempdir().unwrap();
        let archive = temp.path().join("bomb.CDEX");
        let target = temp.path().join("out");
        // A megabyte of zeros deflates to around a kilobyte
        let payload = vec![0_u8; 1024 * 1024];
        write_test_zip(&archive, &[("ok.txt", b"fine".as_slice()), ("big.bin", &payload)]);

        let outcome = SafeExtractor::new()
            .extract(&archive, &target)
            .await
            .unwrap();

        match outcome {
            ExtractOutcome::Suspicious {
                reason: SuspicionReason::EntryRatio { entry, .. },
            } => assert_eq!(entry, "big.bin"),
            other => panic!("expected ratio rejection, got {other:?}"),
        }
        assert!(!target.exists());
    }

    #[tokio::test]
    async fn rejects_cumulative_size_past_limit() {
        let temp = tempdir().unwrap();
        let archive = temp.path().join("big.CDEX");
        let target = temp.path().join("out");
        write_test_zip(
            &archive,
            &[
                ("a.bin", b"0123456789abcdef0123456789abcdef".as_slice()),
                ("b.bin", b"fedcba9876543210fedcba9876543210".as_slice()),
            ],
        );

        let outcome = SafeExtractor::new()
            .with_limits(1000, 48, 100)
            .extract(&archive, &target)
            .await
            .unwrap();

        assert!(matches!(
            outcome,
            ExtractOutcome::Suspicious {
                reason: SuspicionReason::TotalSize { .. }
            }
        ));
        assert!(!target.exists());
    }

    #[tokio::test]
    async fn rejects_too_many_entries() {
        let temp = tempdir().unwrap();
        let archive = temp.path().join("many.CDEX");
        let target = temp.path().join("out");
        write_test_zip(
            &archive,
            &[
                ("a", b"1".as_slice()),
                ("b", b"2".as_slice()),
                ("c", b"3".as_slice()),
            ],
        );

        let outcome = SafeExtractor::new()
            .with_limits(10, 1024, 2)
            .extract(&archive, &target)
            .await
            .unwrap();

        assert_eq!(
            outcome,
            ExtractOutcome::Suspicious {
                reason: SuspicionReason::EntryCount { count: 3 }
            }
        );
    }

    #[tokio::test]
    async fn garbage_file_is_suspicious_not_an_error() {
        let temp = tempdir().unwrap();
        let archive = temp.path().join("junk.CDEX");
        let target = temp.path().join("out");
        std::fs::write(&archive, b"this is not a zip").unwrap();

        let outcome = SafeExtractor::new()
            .extract(&archive, &target)
            .await
            .unwrap();

        assert!(matches!(
            outcome,
            ExtractOutcome::Suspicious {
                reason: SuspicionReason::Malformed { .. }
            }
        ));
    }

    #[tokio::test]
    async fn traversal_entries_are_skipped_siblings_written() {
        let temp = tempdir().unwrap();
        let archive = temp.path().join("sneaky.CDEX");
        let target = temp.path().join("deep").join("out");
        write_test_zip(
            &archive,
            &[
                ("../evil.txt", b"escape".as_slice()),
                ("ok.txt", b"legit".as_slice()),
            ],
        );

        let outcome = SafeExtractor::new()
            .extract(&archive, &target)
            .await
            .unwrap();

        match outcome {
            ExtractOutcome::PartialFailure {
                files_written,
                failures,
            } => {
                assert_eq!(files_written, 1);
                assert_eq!(failures.len(), 1);
                assert_eq!(failures[0].entry, "../evil.txt");
            }
            other => panic!("expected partial failure, got {other:?}"),
        }
        assert!(target.join("ok.txt").exists());
        assert!(!temp.path().join("deep").join("evil.txt").exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn symlinked_subdirectory_cannot_redirect_writes() {
        let temp = tempdir().unwrap();
        let archive = temp.path().join("sneaky.CDEX");
        let target = temp.path().join("out");
        let outside = temp.path().join("outside");
        std::fs::create_dir_all(&outside).unwrap();
        std::fs::create_dir_all(&target).unwrap();
        std::os::unix::fs::symlink(&outside, target.join("sub")).unwrap();
        write_test_zip(
            &archive,
            &[
                ("sub/evil.txt", b"escape".as_slice()),
                ("good.txt", b"legit".as_slice()),
            ],
        );

        let outcome = SafeExtractor::new()
            .extract(&archive, &target)
            .await
            .unwrap();

        assert!(matches!(outcome, ExtractOutcome::PartialFailure { .. }));
        assert!(target.join("good.txt").exists());
        assert!(!outside.join("evil.txt").exists());
    }

    #[tokio::test]
    async fn mark_applied_renames_and_replaces_stale_old() {
        let temp = tempdir().unwrap();
        let archive = temp.path().join("App V1.0.CDEX");
        let stale = temp.path().join("App V1.0.CDEX.old");
        std::fs::write(&archive, b"fresh").unwrap();
        std::fs::write(&stale, b"stale").unwrap();

        let renamed = SafeExtractor::new().mark_applied(&archive).await.unwrap();

        assert_eq!(renamed, stale);
        assert!(!archive.exists());
        assert_eq!(std::fs::read(&stale).unwrap(), b"fresh");
    }

    #[tokio::test]
    async fn backup_archive_restores_the_tree() {
        let temp = tempdir().unwrap();
        let source = temp.path().join("cache");
        std::fs::create_dir_all(source.join("nested")).unwrap();
        std::fs::write(source.join("top.dat"), b"top level").unwrap();
        std::fs::write(source.join("nested").join("deep.dat"), b"below").unwrap();
        let dest = temp.path().join("backups").join("daily.CDEB");

        let size = create_archive(&source, &dest).await.unwrap();
        assert!(size > 0);
        assert!(dest.exists());
        assert!(!temp
            .path()
            .join("backups")
            .join("daily.CDEB.partial")
            .exists());

        let restored = temp.path().join("restored");
        let outcome = SafeExtractor::new().extract(&dest, &restored).await.unwrap();
        assert!(outcome.is_complete());
        assert_eq!(std::fs::read(restored.join("top.dat")).unwrap(), b"top level");
        assert_eq!(
            std::fs::read(restored.join("nested").join("deep.dat")).unwrap(),
            b"below"
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failed_backup_leaves_no_partial_file() {
        use std::os::unix::fs::PermissionsExt;

        let temp = tempdir().unwrap();
        let source = temp.path().join("cache");
        std::fs::create_dir_all(&source).unwrap();
        let locked = source.join("locked.dat");
        std::fs::write(&locked, b"secret").unwrap();
        std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o000)).unwrap();
        let dest = temp.path().join("backups").join("daily.CDEB");

        let result = create_archive(&source, &dest).await;

        // Root ignores permission bits, in which case the archive succeeds
        if result.is_err() {
            assert!(!dest.exists());
        }
        assert!(!temp
            .path()
            .join("backups")
            .join("daily.CDEB.partial")
            .exists());

        std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o644)).unwrap();
    }
}
