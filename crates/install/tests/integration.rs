//! Integration tests for install crate

mod common;

#[cfg(test)]
mod tests {
    use super::common::*;
    use apkinst_errors::InstallError;
    use apkinst_events::{AppEvent, InstallEvent};
    use apkinst_install::*;
    use apkinst_platform::ShellOutput;
    use apkinst_types::{FileEntry, FileSource, InstallOutcome};
    use proptest::prelude::*;
    use std::path::Path;

    fn terminal_events(events: &[AppEvent]) -> Vec<&InstallEvent> {
        events
            .iter()
            .filter_map(|event| match event {
                AppEvent::Install(install) if install.is_terminal() => Some(install),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_direct_listing_keeps_regular_files() {
        let harness = Harness::new();
        let dir = package_dir(&[("base.apk", 1000), ("split_config.en.apk", 500), ("hash.json", 20)]);
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        let (ctx, _rx) = context();

        let entries = FileInventory::new(harness.platform.clone())
            .list(&ctx, dir.path())
            .await
            .unwrap();

        let listed: Vec<(&str, u64, bool)> = entries
            .iter()
            .map(|e| (e.name(), e.size_bytes(), e.is_installable()))
            .collect();
        assert_eq!(
            listed,
            vec![
                ("base.apk", 1000, true),
                ("hash.json", 20, false),
                ("split_config.en.apk", 500, true),
            ]
        );
        assert!(entries.iter().all(|e| !e.source().is_privileged()));
        assert!(harness.shell.scripts().is_empty());
    }

    #[tokio::test]
    async fn test_unreadable_directory_falls_back_to_ls() {
        let harness = Harness::new();
        harness.shell.respond(
            "ls -l /data/local/tmp/apks",
            ShellOutput::ok([
                "total 8",
                "-rw-r--r-- 1 root root 1000 2024-01-05 14:30 base.apk",
                "-rw-r--r-- 1 root root 500 2024-01-05 14:31 split_config.en.apk",
            ]),
        );
        let (ctx, mut rx) = context();

        let entries = FileInventory::new(harness.platform.clone())
            .list(&ctx, Path::new("/data/local/tmp/apks"))
            .await
            .unwrap();

        assert_eq!(entries.len(), 2);
        assert_eq!(
            entries[0].source(),
            &FileSource::Privileged("/data/local/tmp/apks/base.apk".into())
        );
        assert!(drain(&mut rx).iter().any(|event| matches!(
            event,
            AppEvent::Install(InstallEvent::InventoryListed {
                privileged: true,
                entries: 2,
                total_bytes: 1500,
                ..
            })
        )));
    }

    #[tokio::test]
    async fn test_both_listings_failing_is_unavailable() {
        let harness = Harness::new();
        harness
            .shell
            .fail("ls -l", 1, &["ls: /data/local/tmp/apks: No such file or directory"]);
        let (ctx, _rx) = context();

        let err = FileInventory::new(harness.platform.clone())
            .list(&ctx, Path::new("/data/local/tmp/apks"))
            .await
            .unwrap_err();
        assert!(matches!(err, InstallError::InventoryUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_privileged_parse_matches_direct_listing() {
        let dir = package_dir(&[("base.apk", 4096), ("split config.apk", 77), ("dark.apk", 0)]);
        let harness = Harness::new();
        let (ctx, _rx) = context();
        let direct = FileInventory::new(harness.platform.clone())
            .list(&ctx, dir.path())
            .await
            .unwrap();

        let lines: Vec<String> = direct
            .iter()
            .map(|e| format!("-rw-rw---- 1 u0_a12 sdcard_rw {} 2024-06-01 08:15 {}", e.size_bytes(), e.name()))
            .collect();
        let parsed = parse_long_listing(dir.path(), &lines);

        let key = |entries: &[FileEntry]| -> Vec<(String, u64)> {
            entries
                .iter()
                .map(|e| (e.name().to_string(), e.size_bytes()))
                .collect()
        };
        assert_eq!(key(&parsed), key(&direct));
    }

    proptest! {
        #[test]
        fn listing_parse_recovers_name_and_size(
            files in prop::collection::btree_map("[a-z][a-z0-9_. ]{0,20}[a-z0-9]", 0u64..10_000_000_000, 0..8),
            hour in 0u8..24,
            minute in 0u8..60,
        ) {
            let lines: Vec<String> = files
                .iter()
                .map(|(name, size)| format!("-rw-r--r--  1 root  root  {size} Jan 05 {hour:02}:{minute:02} {name}"))
                .collect();
            let parsed: Vec<(String, u64)> = parse_long_listing(Path::new("/x"), &lines)
                .into_iter()
                .map(|e| (e.name().to_string(), e.size_bytes()))
                .collect();
            let expected: Vec<(String, u64)> = files.into_iter().collect();
            prop_assert_eq!(parsed, expected);
        }
    }

    #[tokio::test]
    async fn test_session_scenario_commits_all_entries() {
        let harness = Harness::new();
        let dir = package_dir(&[("base.apk", 1000), ("split1.apk", 500)]);
        let (ctx, _rx) = context();
        let entries = FileInventory::new(harness.platform.clone())
            .list(&ctx, dir.path())
            .await
            .unwrap();

        let pending = SessionInstaller::new(harness.platform.clone(), 64 * 1024)
            .install(&ctx, &entries)
            .await
            .unwrap();
        assert_eq!(pending.session_id(), MockSessionBackend::SESSION);
        assert!(pending.outcome().await.is_success());

        assert_eq!(harness.sessions.created(), vec![1500]);
        let written = harness.sessions.written();
        assert_eq!(written["base.apk"].len(), 1000);
        assert_eq!(written["split1.apk"].len(), 500);
        assert_eq!(harness.sessions.committed(), vec![MockSessionBackend::SESSION]);
        assert!(harness.sessions.abandoned().is_empty());
    }

    #[tokio::test]
    async fn test_short_stream_abandons_without_commit() {
        let harness = Harness::new();
        let dir = package_dir(&[("base.apk", 1000)]);
        // declared larger than the file on disk
        let entries = vec![FileEntry::new(
            "base.apk",
            1200,
            FileSource::Direct(dir.path().join("base.apk")),
        )];
        let (ctx, mut rx) = context();

        let err = SessionInstaller::new(harness.platform.clone(), 256)
            .install(&ctx, &entries)
            .await
            .unwrap_err();

        assert!(matches!(err, InstallError::WriteFailure { ref name, .. } if name == "base.apk"));
        assert!(harness.sessions.committed().is_empty());
        assert_eq!(harness.sessions.abandoned(), vec![MockSessionBackend::SESSION]);
        assert!(drain(&mut rx).iter().any(|event| matches!(
            event,
            AppEvent::Install(InstallEvent::SessionAbandoned { reason, .. }) if reason == "WriteFailure"
        )));
    }

    #[tokio::test]
    async fn test_privileged_entries_stream_through_shell() {
        let harness = Harness::new();
        harness
            .shell
            .add_file("/data/local/tmp/apks/base.apk", vec![1; 64]);
        let entries = vec![FileEntry::new(
            "base.apk",
            64,
            FileSource::Privileged("/data/local/tmp/apks/base.apk".into()),
        )];
        let (ctx, _rx) = context();

        let pending = SessionInstaller::new(harness.platform.clone(), 16)
            .install(&ctx, &entries)
            .await
            .unwrap();
        assert!(pending.outcome().await.is_success());
        assert_eq!(harness.sessions.written()["base.apk"], vec![1u8; 64]);
    }

    #[tokio::test]
    async fn test_install_split_reports_exactly_one_success() {
        let harness = Harness::new();
        let dir = package_dir(&[("base.apk", 1000), ("split1.apk", 500), ("hash.json", 10)]);
        let installer = Installer::new(test_config(), harness.platform.clone());
        let (ctx, mut rx) = context();

        let outcome = installer.install_split(&ctx, dir.path()).await;

        assert!(outcome.is_success());
        assert!(outcome.failure_reasons().is_empty());
        // only apks go into the session
        assert_eq!(harness.sessions.created(), vec![1500]);
        let events = drain(&mut rx);
        let terminal = terminal_events(&events);
        assert_eq!(terminal.len(), 1);
        assert!(matches!(terminal[0], InstallEvent::Succeeded { operation } if operation == "install"));
    }

    #[tokio::test]
    async fn test_rejected_commit_is_reported_once() {
        let harness = Harness::new();
        harness.sessions.set_commit_outcome(InstallOutcome::failure(vec![
            "CommitFailure".to_string(),
            "INSTALL_FAILED_VERSION_DOWNGRADE".to_string(),
        ]));
        let dir = package_dir(&[("base.apk", 10)]);
        let installer = Installer::new(test_config(), harness.platform.clone());
        let (ctx, mut rx) = context();

        let outcome = installer.install_split(&ctx, dir.path()).await;

        assert!(!outcome.is_success());
        assert_eq!(
            outcome.failure_reasons(),
            ["CommitFailure", "INSTALL_FAILED_VERSION_DOWNGRADE"]
        );
        let events = drain(&mut rx);
        let terminal = terminal_events(&events);
        assert_eq!(terminal.len(), 1);
        assert!(matches!(terminal[0], InstallEvent::Failed { reasons, .. } if reasons[0] == "CommitFailure"));
    }

    #[tokio::test]
    async fn test_install_single_uses_install_entry() {
        let harness = Harness::new();
        let dir = package_dir(&[("microg.apk", 321)]);
        let installer = Installer::new(test_config(), harness.platform.clone());
        let (ctx, _rx) = context();

        let outcome = installer
            .install_single(&ctx, &dir.path().join("microg.apk"), "com.mgoogle.android.gms")
            .await;

        assert!(outcome.is_success());
        assert_eq!(harness.sessions.created(), vec![321]);
        assert_eq!(harness.sessions.written()["install"].len(), 321);
    }

    #[tokio::test]
    async fn test_uninstall_failure_outcome() {
        let harness = Harness::new();
        harness
            .packages
            .fail_uninstall(apkinst_errors::PlatformError::PackageNotFound {
                package: PACKAGE.to_string(),
            });
        let installer = Installer::new(test_config(), harness.platform.clone());
        let (ctx, mut rx) = context();

        let outcome = installer.uninstall(&ctx, PACKAGE).await;

        assert!(!outcome.is_success());
        assert_eq!(outcome.failure_reasons()[0], "UninstallFailed");
        assert_eq!(terminal_events(&drain(&mut rx)).len(), 1);
    }
}
