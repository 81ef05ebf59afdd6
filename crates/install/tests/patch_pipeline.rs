//! Bind-mount patch pipeline tests

mod common;

#[cfg(test)]
mod tests {
    use super::common::*;
    use apkinst_errors::{InstallError, PlatformError};
    use apkinst_events::{AppEvent, GeneralEvent, InstallEvent, PatchEvent};
    use apkinst_install::*;
    use apkinst_platform::ShellOutput;
    use apkinst_types::{PatchStage, RecoveryStrategy, VersionCode};
    use std::path::PathBuf;

    const REQUIRED: VersionCode = VersionCode(1540);

    fn youtube_dir() -> tempfile::TempDir {
        package_dir(&[
            ("base.apk", 100),
            ("split_config.arm64_v8a.apk", 50),
            ("dark.apk", 30),
            ("hash.json", 5),
        ])
    }

    fn grant_session(harness: &Harness) {
        harness.shell.respond(
            "pm install-create -r -t",
            ShellOutput::ok(["Success: created install session [77]"]),
        );
    }

    fn patch_events(events: &[AppEvent]) -> Vec<PatchEvent> {
        events
            .iter()
            .filter_map(|event| match event {
                AppEvent::Patch(patch) => Some(patch.clone()),
                _ => None,
            })
            .collect()
    }

    fn started_stages(events: &[AppEvent]) -> Vec<PatchStage> {
        patch_events(events)
            .into_iter()
            .filter_map(|event| match event {
                PatchEvent::StageStarted { stage } => Some(stage),
                _ => None,
            })
            .collect()
    }

    async fn patch(harness: &Harness, config: InstallConfig, dir: &tempfile::TempDir) -> (Result<PatchReport, InstallError>, Vec<AppEvent>) {
        let (ctx, mut rx) = context();
        let inventory = FileInventory::new(harness.platform.clone())
            .list(&ctx, dir.path())
            .await
            .unwrap();
        let result = BindMountPatcher::new(harness.platform.clone(), config)
            .patch(&ctx, &dir.path().join("dark.apk"), &inventory, REQUIRED)
            .await;
        (result, drain(&mut rx))
    }

    #[tokio::test]
    async fn test_matching_version_runs_full_pipeline() {
        let harness = Harness::new();
        harness.packages.install(1540, Some(INSTALLED_BASE));
        let dir = youtube_dir();

        let (result, events) = patch(&harness, test_config(), &dir).await;

        assert_eq!(
            result.unwrap(),
            PatchReport::Patched {
                mounted: PathBuf::from("/data/adb/Vanced/base.apk"),
                target: PathBuf::from(INSTALLED_BASE),
            }
        );

        let source = dir.path().join("dark.apk").display().to_string();
        let order = [
            "mkdir -p /data/adb/Vanced/".to_string(),
            format!("test -e {source}"),
            "am force-stop com.google.android.youtube".to_string(),
            format!("mv {source} /data/adb/Vanced/base.apk"),
            "chown system:system /data/adb/Vanced/base.apk".to_string(),
            "chcon u:object_r:apk_data_file:s0 /data/adb/Vanced/base.apk".to_string(),
            "/data/adb/service.d/vanced.sh".to_string(),
            "umount -l".to_string(),
            format!("su -mm -c 'mount -o bind /data/adb/Vanced/base.apk {INSTALLED_BASE}'"),
        ];
        let positions: Vec<usize> = order
            .iter()
            .map(|needle| harness.shell.position(needle).unwrap_or_else(|| panic!("missing {needle}")))
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]), "{positions:?}");

        let scripts = harness.shell.scripts();
        let persist = scripts.iter().find(|s| s.contains("vanced.sh")).unwrap();
        assert!(persist.contains("'#!/system/bin/sh'"));
        assert!(persist.contains(&format!("'mount -o bind /data/adb/Vanced/base.apk {INSTALLED_BASE}'")));
        assert!(persist.ends_with("chmod 744 /data/adb/service.d/vanced.sh"));
        // the last thing done is stopping the app again
        assert_eq!(scripts.last().unwrap(), "am force-stop com.google.android.youtube");

        assert_eq!(started_stages(&events), PatchStage::ALL.to_vec());
        assert!(!patch_events(&events)
            .iter()
            .any(|event| matches!(event, PatchEvent::StageFailed { .. })));
    }

    #[tokio::test]
    async fn test_unusual_package_name_keeps_unmount_script_well_formed() {
        let package = "com.example.it's";
        let harness = Harness::new();
        harness.packages.install_as(package, 1540, Some(INSTALLED_BASE));
        let dir = youtube_dir();

        let config = test_config().with_target_package(package);
        let (result, _) = patch(&harness, config, &dir).await;
        assert!(result.is_ok());

        let scripts = harness.shell.scripts();
        let unmount = scripts.iter().find(|s| s.contains("umount -l")).unwrap();
        assert!(unmount.contains(r"/data/app/*'com.example.it'\''s'*/base.apk"));
        let syntax = std::process::Command::new("sh")
            .args(["-n", "-c", unmount])
            .status()
            .unwrap();
        assert!(syntax.success(), "{unmount}");
    }

    #[tokio::test]
    async fn test_chmod_failure_only_warns() {
        let harness = Harness::new();
        harness.packages.install(1540, Some(INSTALLED_BASE));
        harness
            .shell
            .fail("chmod 644", 1, &["chmod: Operation not permitted"]);
        let dir = youtube_dir();

        let (result, events) = patch(&harness, test_config(), &dir).await;

        assert!(result.is_ok());
        assert!(events.iter().any(|event| matches!(
            event,
            AppEvent::General(GeneralEvent::Warning { message, context: Some(path) })
                if message == "chmod 644 failed" && path == "/data/adb/Vanced/base.apk"
        )));
    }

    #[tokio::test]
    async fn test_missing_source_stops_before_relabel() {
        let harness = Harness::new();
        harness.packages.install(1540, Some(INSTALLED_BASE));
        harness.shell.fail("test -e", 1, &[]);
        let dir = youtube_dir();
        let installer = Installer::new(test_config(), harness.platform.clone());
        let (ctx, mut rx) = context();

        let outcome = installer.install_root(&ctx, dir.path(), REQUIRED).await;

        assert!(!outcome.is_success());
        assert_eq!(outcome.failure_reasons(), ["SourceMissing"]);
        assert!(!harness.shell.ran("chcon"));
        assert!(!harness.shell.ran("mount -o bind"));

        let events = drain(&mut rx);
        assert_eq!(
            started_stages(&events),
            vec![PatchStage::Reconcile, PatchStage::EnsureStore, PatchStage::Relocate]
        );
        let terminal: Vec<_> = events
            .iter()
            .filter(|event| matches!(event, AppEvent::Install(install) if install.is_terminal()))
            .collect();
        assert_eq!(terminal.len(), 1);
    }

    #[tokio::test]
    async fn test_relabel_failure_carries_output() {
        let harness = Harness::new();
        harness.packages.install(1540, Some(INSTALLED_BASE));
        harness.shell.fail(
            "chcon",
            1,
            &["chcon: /data/adb/Vanced/base.apk: Operation not supported on transport endpoint"],
        );
        let dir = youtube_dir();

        let (result, events) = patch(&harness, test_config(), &dir).await;

        let err = result.unwrap_err();
        assert!(matches!(err, InstallError::RelabelFailed { .. }));
        assert_eq!(
            err.failure_reasons(),
            vec![
                "RelabelFailed".to_string(),
                "chcon: /data/adb/Vanced/base.apk: Operation not supported on transport endpoint"
                    .to_string()
            ]
        );
        assert!(!harness.shell.ran("vanced.sh"));
        assert!(!harness.shell.ran("mount -o bind"));
        assert!(patch_events(&events).iter().any(|event| matches!(
            event,
            PatchEvent::StageFailed { stage: PatchStage::Relabel, .. }
        )));
        assert_eq!(started_stages(&events).last(), Some(&PatchStage::Relabel));
    }

    #[tokio::test]
    async fn test_ensure_store_is_idempotent() {
        let harness = Harness::new();
        harness.packages.install(1540, Some(INSTALLED_BASE));
        let dir = youtube_dir();

        let (first, _) = patch(&harness, test_config(), &dir).await;
        let (second, _) = patch(&harness, test_config(), &dir).await;

        assert!(first.is_ok());
        assert_eq!(first.unwrap(), second.unwrap());
        let mkdirs = harness
            .shell
            .scripts()
            .iter()
            .filter(|s| s.as_str() == "mkdir -p /data/adb/Vanced/")
            .count();
        assert_eq!(mkdirs, 2);
    }

    #[tokio::test]
    async fn test_store_setup_failure() {
        let harness = Harness::new();
        harness.packages.install(1540, Some(INSTALLED_BASE));
        harness.shell.fail("mkdir -p", 1, &["mkdir: '/data/adb/Vanced/': Read-only file system"]);
        let dir = youtube_dir();

        let (result, _) = patch(&harness, test_config(), &dir).await;

        let err = result.unwrap_err();
        assert_eq!(err.reason(), "SetupFailed");
        assert!(!harness.shell.ran("test -e"));
    }

    #[tokio::test]
    async fn test_mount_failure_reports_output() {
        let harness = Harness::new();
        harness.packages.install(1540, Some(INSTALLED_BASE));
        harness.shell.fail("su -mm", 255, &["mount: Permission denied"]);
        let dir = youtube_dir();

        let (result, _) = patch(&harness, test_config(), &dir).await;

        let err = result.unwrap_err();
        assert_eq!(
            err.failure_reasons(),
            vec!["MountFailed".to_string(), "mount: Permission denied".to_string()]
        );
        // the boot script was already written
        assert!(harness.shell.ran("vanced.sh"));
    }

    #[tokio::test]
    async fn test_higher_installed_version_uninstalls_then_installs() {
        let harness = Harness::new();
        harness.packages.install(1600, Some(INSTALLED_BASE));
        grant_session(&harness);
        let dir = youtube_dir();

        let (result, events) = patch(&harness, test_config(), &dir).await;

        assert_eq!(
            result.unwrap(),
            PatchReport::Installed {
                strategy: RecoveryStrategy::UninstallThenInstall
            }
        );
        assert_eq!(harness.packages.uninstalled(), vec![PACKAGE.to_string()]);

        let written: Vec<String> = harness.shell.piped().into_iter().map(|(cmd, _)| cmd).collect();
        assert_eq!(
            written,
            vec![
                "pm install-write -S 100 77 base.apk".to_string(),
                "pm install-write -S 50 77 split_config.arm64_v8a.apk".to_string(),
            ]
        );
        assert!(harness.shell.ran("pm install-commit 77"));
        assert!(!harness.shell.ran("mkdir -p"));

        assert_eq!(started_stages(&events), vec![PatchStage::Reconcile]);
        assert!(events.iter().any(|event| matches!(
            event,
            AppEvent::Install(InstallEvent::UninstallRequested { .. })
        )));
        assert!(patch_events(&events)
            .iter()
            .any(|event| matches!(event, PatchEvent::DelegatedToInstall { .. })));
    }

    #[tokio::test]
    async fn test_lower_installed_version_installs_over_existing() {
        let harness = Harness::new();
        harness.packages.install(1500, Some(INSTALLED_BASE));
        grant_session(&harness);
        let dir = youtube_dir();

        let (result, _) = patch(&harness, test_config(), &dir).await;

        assert_eq!(
            result.unwrap(),
            PatchReport::Installed {
                strategy: RecoveryStrategy::InstallOverExisting
            }
        );
        assert!(harness.packages.uninstalled().is_empty());
        assert!(harness.shell.ran("pm install-commit 77"));
    }

    #[tokio::test]
    async fn test_not_installed_gets_fresh_install() {
        let harness = Harness::new();
        grant_session(&harness);
        let dir = youtube_dir();

        let (result, _) = patch(&harness, test_config(), &dir).await;

        assert_eq!(
            result.unwrap(),
            PatchReport::Installed {
                strategy: RecoveryStrategy::FreshInstall
            }
        );
        assert!(harness.shell.ran("dumpsys package com.google.android.youtube | grep codePath"));
    }

    #[tokio::test]
    async fn test_continue_after_install_goes_on_to_patch() {
        let harness = Harness::new();
        harness.packages.install(1500, Some(INSTALLED_BASE));
        grant_session(&harness);
        let dir = youtube_dir();

        let (result, events) = patch(
            &harness,
            test_config().with_continue_after_install(true),
            &dir,
        )
        .await;

        assert!(matches!(result.unwrap(), PatchReport::Patched { .. }));
        let install = harness.shell.position("pm install-commit 77").unwrap();
        let mkdir = harness.shell.position("mkdir -p").unwrap();
        assert!(install < mkdir);
        assert_eq!(started_stages(&events), PatchStage::ALL.to_vec());
    }

    #[tokio::test]
    async fn test_unknown_version_in_app_storage_is_patched() {
        let harness = Harness::new();
        harness.shell.respond(
            "grep codePath",
            ShellOutput::ok(["    codePath=/data/app/~~Xa1==/com.google.android.youtube-Yb2=="]),
        );
        harness.shell.respond("grep versionCode", ShellOutput::default());
        let dir = youtube_dir();

        let (result, _) = patch(&harness, test_config(), &dir).await;

        assert_eq!(
            result.unwrap(),
            PatchReport::Patched {
                mounted: PathBuf::from("/data/adb/Vanced/base.apk"),
                target: PathBuf::from(INSTALLED_BASE),
            }
        );
        assert!(!harness.shell.ran("pm install-create"));
    }

    #[tokio::test]
    async fn test_uninstall_failure_halts_reconcile() {
        let harness = Harness::new();
        harness.packages.install(1600, Some(INSTALLED_BASE));
        harness.packages.fail_uninstall(PlatformError::ProcessExecutionFailed {
            command: "pm uninstall com.google.android.youtube".to_string(),
            message: "Failure [DELETE_FAILED_INTERNAL_ERROR]".to_string(),
        });
        let dir = youtube_dir();

        let (result, _) = patch(&harness, test_config(), &dir).await;

        assert_eq!(result.unwrap_err().reason(), "UninstallFailed");
        assert!(!harness.shell.ran("pm install-create"));
    }

    #[tokio::test]
    async fn test_rejected_privileged_commit_carries_output() {
        let harness = Harness::new();
        grant_session(&harness);
        harness
            .shell
            .fail("pm install-commit", 1, &["Failure [INSTALL_FAILED_INVALID_APK: Split null was defined multiple times]"]);
        let dir = youtube_dir();

        let (result, _) = patch(&harness, test_config(), &dir).await;

        let err = result.unwrap_err();
        assert_eq!(
            err.failure_reasons(),
            vec![
                "CommitFailure".to_string(),
                "Failure [INSTALL_FAILED_INVALID_APK: Split null was defined multiple times]".to_string()
            ]
        );
    }

    #[tokio::test]
    async fn test_unparseable_session_id() {
        let harness = Harness::new();
        harness.shell.respond(
            "pm install-create -r -t",
            ShellOutput::ok(["Error: java.lang.SecurityException"]),
        );
        let dir = youtube_dir();

        let (result, _) = patch(&harness, test_config(), &dir).await;

        assert_eq!(result.unwrap_err().reason(), "SessionCreateParseFailure");
        assert!(harness.shell.piped().is_empty());
    }

    #[tokio::test]
    async fn test_rejected_session_create_writes_nothing() {
        let harness = Harness::new();
        harness.shell.fail(
            "pm install-create -r -t",
            1,
            &["Error: java.lang.SecurityException: uid 2000 cannot create sessions"],
        );
        let dir = youtube_dir();

        let (result, _) = patch(&harness, test_config(), &dir).await;

        let err = result.unwrap_err();
        assert!(matches!(err, InstallError::WriteFailure { ref name, .. } if name == "session"));
        assert!(err.failure_reasons()[1].contains("uid 2000 cannot create sessions"));
        assert!(harness.shell.piped().is_empty());
        assert!(!harness.shell.ran("pm install-commit"));
    }

    #[tokio::test]
    async fn test_shell_error_on_session_create_is_not_a_parse_failure() {
        let harness = Harness::new();
        harness.shell.error(
            "pm install-create -r -t",
            PlatformError::ShellUnavailable {
                message: "su: permission denied".into(),
            },
        );
        let dir = youtube_dir();

        let (result, _) = patch(&harness, test_config(), &dir).await;

        let err = result.unwrap_err();
        assert_eq!(err.reason(), "WriteFailure");
        assert!(err.failure_reasons()[1].contains("su: permission denied"));
        assert!(harness.shell.piped().is_empty());
    }

    #[tokio::test]
    async fn test_failed_privileged_write_abandons_session() {
        let harness = Harness::new();
        grant_session(&harness);
        harness.shell.fail("install-write -S 50", 1, &["Error: Unable to open file"]);
        let dir = youtube_dir();

        let (result, events) = patch(&harness, test_config(), &dir).await;

        assert!(matches!(
            result.unwrap_err(),
            InstallError::WriteFailure { ref name, .. } if name == "split_config.arm64_v8a.apk"
        ));
        assert!(harness.shell.ran("pm install-abandon 77"));
        assert!(!harness.shell.ran("pm install-commit"));
        assert!(events.iter().any(|event| matches!(
            event,
            AppEvent::Install(InstallEvent::SessionAbandoned { session_id: 77, .. })
        )));
    }

    #[tokio::test]
    async fn test_missing_patch_apk() {
        let harness = Harness::new();
        let dir = package_dir(&[("base.apk", 100)]);
        let installer = Installer::new(test_config(), harness.platform.clone());
        let (ctx, _rx) = context();

        let outcome = installer.install_root(&ctx, dir.path(), REQUIRED).await;

        assert_eq!(outcome.failure_reasons()[0], "ModApkMissing");
        assert!(harness.shell.scripts().is_empty());
    }

    #[tokio::test]
    async fn test_later_theme_name_wins() {
        let harness = Harness::new();
        harness.packages.install(1540, Some(INSTALLED_BASE));
        let dir = package_dir(&[("base.apk", 100), ("dark.apk", 30), ("black.apk", 31)]);
        let installer = Installer::new(test_config(), harness.platform.clone());
        let (ctx, _rx) = context();

        let outcome = installer.install_root(&ctx, dir.path(), REQUIRED).await;

        assert!(outcome.is_success());
        let black = dir.path().join("black.apk").display().to_string();
        assert!(harness.shell.ran(&format!("test -e {black}")));
    }
}
