//! Bind-mount patch pipeline
//!
//! Stages run strictly in order and the first failure halts the pipeline:
//! Reconcile, EnsureStore, Relocate, Relabel, Persist, Mount. Nothing is
//! retried or rolled back; a half-finished run is repaired by running it
//! again, which every stage tolerates.

use apkinst_errors::InstallError;
use apkinst_events::{AppEvent, EventEmitter, InstallEvent, PatchEvent};
use apkinst_platform::{quote, Platform, PlatformContext, ShellOutput};
use apkinst_types::{FileEntry, PatchStage, RecoveryStrategy, VersionCode};
use std::future::Future;
use std::path::{Path, PathBuf};

use crate::api::config::InstallConfig;
use crate::api::result::PatchReport;
use crate::privileged::PrivilegedInstaller;
use crate::reconcile::VersionLookup;

/// Outcome of the reconcile stage
enum ReconcileStep {
    /// Continue patching over this installed base apk
    Patch(PathBuf),
    /// A full install was performed instead
    Installed(RecoveryStrategy),
}

#[derive(Clone, Debug)]
pub struct BindMountPatcher {
    platform: Platform,
    config: InstallConfig,
    lookup: VersionLookup,
    installer: PrivilegedInstaller,
}

impl BindMountPatcher {
    #[must_use]
    pub fn new(platform: Platform, config: InstallConfig) -> Self {
        Self {
            lookup: VersionLookup::new(platform.clone()),
            installer: PrivilegedInstaller::new(platform.clone(), config.clone()),
            platform,
            config,
        }
    }

    /// Replace the target package's base apk with `replacement`
    ///
    /// `inventory` is the full package directory, used when reconcile has
    /// to install the package first.
    ///
    /// # Errors
    ///
    /// Returns the error of the first stage that failed.
    pub async fn patch(
        &self,
        ctx: &PlatformContext,
        replacement: &Path,
        inventory: &[FileEntry],
        required: VersionCode,
    ) -> Result<PatchReport, InstallError> {
        let target = match self
            .stage(ctx, PatchStage::Reconcile, self.reconcile_stage(ctx, inventory, required))
            .await?
        {
            ReconcileStep::Patch(target) => target,
            ReconcileStep::Installed(strategy) => {
                ctx.emit_patch(PatchEvent::DelegatedToInstall {
                    strategy: strategy.to_string(),
                });
                return Ok(PatchReport::Installed { strategy });
            }
        };

        let mounted = self.config.patched_base_path();

        self.stage(ctx, PatchStage::EnsureStore, self.ensure_store(ctx))
            .await?;
        self.stage(ctx, PatchStage::Relocate, self.relocate(ctx, replacement, &mounted))
            .await?;
        self.stage(ctx, PatchStage::Relabel, self.relabel(ctx, &mounted))
            .await?;
        self.stage(ctx, PatchStage::Persist, self.persist(ctx, &mounted, &target))
            .await?;
        self.stage(ctx, PatchStage::Mount, self.mount(ctx, &mounted, &target))
            .await?;

        Ok(PatchReport::Patched { mounted, target })
    }

    async fn stage<T, F>(&self, ctx: &PlatformContext, stage: PatchStage, f: F) -> Result<T, InstallError>
    where
        F: Future<Output = Result<T, InstallError>>,
    {
        tracing::debug!(stage = %stage, "patch stage started");
        ctx.emit_patch(PatchEvent::StageStarted { stage });

        match f.await {
            Ok(value) => {
                ctx.emit_patch(PatchEvent::StageCompleted { stage });
                Ok(value)
            }
            Err(err) => {
                tracing::debug!(stage = %stage, error = %err, "patch stage failed");
                ctx.emit_patch(PatchEvent::StageFailed {
                    stage,
                    reasons: err.failure_reasons(),
                });
                Err(err)
            }
        }
    }

    async fn reconcile_stage(
        &self,
        ctx: &PlatformContext,
        inventory: &[FileEntry],
        required: VersionCode,
    ) -> Result<ReconcileStep, InstallError> {
        let package = self.config.target_package.as_str();
        let (location, reconciliation) = self.lookup.reconcile(ctx, package, required).await;

        if reconciliation.is_patch_target() {
            if let Some(path) = location.path() {
                return Ok(ReconcileStep::Patch(path.to_path_buf()));
            }
        }

        if reconciliation.strategy == RecoveryStrategy::UninstallThenInstall {
            ctx.emit(AppEvent::Install(InstallEvent::UninstallRequested {
                package: package.to_string(),
            }));
            self.platform
                .packages()
                .uninstall(ctx, package)
                .await
                .map_err(|e| InstallError::UninstallFailed {
                    package: package.to_string(),
                    message: e.to_string(),
                })?;
        }
        self.installer.install_split(ctx, inventory).await?;

        if !self.config.continue_after_install {
            return Ok(ReconcileStep::Installed(reconciliation.strategy));
        }

        let location = self.lookup.package_location(ctx, package).await;
        match location.path() {
            Some(path) => Ok(ReconcileStep::Patch(path.to_path_buf())),
            None => Err(InstallError::MountFailed {
                source_path: self.config.patched_base_path().display().to_string(),
                target_path: package.to_string(),
                output: vec![format!("{package} is not installed after install")],
            }),
        }
    }

    async fn ensure_store(&self, ctx: &PlatformContext) -> Result<(), InstallError> {
        let store = self.config.store_dir.display().to_string();
        let script = format!("mkdir -p {}", quote(&store));

        self.run_checked(ctx, &script, |output| InstallError::SetupFailed {
            path: store.clone(),
            output,
        })
        .await
        .map(|_| ())
    }

    async fn relocate(
        &self,
        ctx: &PlatformContext,
        replacement: &Path,
        mounted: &Path,
    ) -> Result<(), InstallError> {
        let source = replacement.display().to_string();
        let target = mounted.display().to_string();
        let copy_failed = |output: Vec<String>| InstallError::CopyFailed {
            source_path: source.clone(),
            target_path: target.clone(),
            output,
        };

        let exists = self
            .shell_run(ctx, &format!("test -e {}", quote(&source)))
            .await
            .map_err(copy_failed)?;
        if !exists.is_success() {
            return Err(InstallError::SourceMissing {
                path: source.clone(),
            });
        }

        self.force_stop(ctx).await;

        self.run_checked(
            ctx,
            &format!("mv {} {}", quote(&source), quote(&target)),
            copy_failed,
        )
        .await?;

        match self.shell_run(ctx, &format!("chmod 644 {}", quote(&target))).await {
            Ok(output) if output.is_success() => {}
            Ok(ShellOutput { lines, .. }) | Err(lines) => {
                tracing::warn!(path = %target, output = ?lines, "chmod 644 failed");
                ctx.emit_warning_with_context("chmod 644 failed", target.clone());
            }
        }

        self.run_checked(
            ctx,
            &format!("chown system:system {}", quote(&target)),
            |output| InstallError::ChownFailed {
                path: target.clone(),
                output,
            },
        )
        .await
        .map(|_| ())
    }

    async fn relabel(&self, ctx: &PlatformContext, mounted: &Path) -> Result<(), InstallError> {
        let path = mounted.display().to_string();
        let script = format!(
            "chcon {} {}",
            quote(&self.config.selinux_context),
            quote(&path)
        );

        self.run_checked(ctx, &script, |output| InstallError::RelabelFailed {
            path: path.clone(),
            output,
        })
        .await
        .map(|_| ())
    }

    async fn persist(
        &self,
        ctx: &PlatformContext,
        mounted: &Path,
        target: &Path,
    ) -> Result<(), InstallError> {
        let script_path = self.config.service_script.display().to_string();
        let script = format!(
            "printf '%s\\n' '#!/system/bin/sh' {} > {path} && chmod 744 {path}",
            quote(&mount_command(mounted, target)),
            path = quote(&script_path),
        );

        self.run_checked(ctx, &script, |output| InstallError::ScriptFailed {
            path: script_path.clone(),
            output,
        })
        .await
        .map(|_| ())
    }

    async fn mount(
        &self,
        ctx: &PlatformContext,
        mounted: &Path,
        target: &Path,
    ) -> Result<(), InstallError> {
        let package = self.config.target_package.as_str();
        self.force_stop(ctx).await;

        // stale mounts from earlier runs would otherwise stack
        let unmount = format!(
            "for apk in /data/app/*{pkg}*/base.apk /data/app/*/*{pkg}*/base.apk; do [ -e \"$apk\" ] && umount -l \"$apk\"; done; true",
            pkg = quote(package)
        );
        if let Err(output) = self.shell_run(ctx, &unmount).await {
            tracing::warn!(package, output = ?output, "lazy unmount of previous mounts failed");
            ctx.emit_warning(format!("could not clear earlier mounts of {package}"));
        }

        let mount_failed = |output: Vec<String>| InstallError::MountFailed {
            source_path: mounted.display().to_string(),
            target_path: target.display().to_string(),
            output,
        };
        let script = format!("su -mm -c {}", quote(&mount_command(mounted, target)));
        let output = self.shell_run(ctx, &script).await.map_err(mount_failed)?;

        if !self.config.mount_settle.is_zero() {
            tokio::time::sleep(self.config.mount_settle).await;
        }
        self.force_stop(ctx).await;

        if output.is_success() {
            Ok(())
        } else {
            Err(mount_failed(output.lines))
        }
    }

    async fn force_stop(&self, ctx: &PlatformContext) {
        let package = self.config.target_package.as_str();
        let script = format!("am force-stop {}", quote(package));
        match self.shell_run(ctx, &script).await {
            Ok(output) if output.is_success() => {}
            Ok(output) => tracing::debug!(package, output = %output.text(), "force-stop failed"),
            Err(output) => tracing::debug!(package, output = ?output, "force-stop failed"),
        }
    }

    /// Run a script, turning shell errors into a single diagnostic line
    async fn shell_run(&self, ctx: &PlatformContext, script: &str) -> Result<ShellOutput, Vec<String>> {
        self.platform
            .shell()
            .run(ctx, script)
            .await
            .map_err(|e| vec![e.to_string()])
    }

    /// Run a script that must exit 0, building the stage error from its output
    async fn run_checked<E>(
        &self,
        ctx: &PlatformContext,
        script: &str,
        on_failure: E,
    ) -> Result<ShellOutput, InstallError>
    where
        E: Fn(Vec<String>) -> InstallError,
    {
        let output = self.shell_run(ctx, script).await.map_err(&on_failure)?;
        if output.is_success() {
            Ok(output)
        } else {
            Err(on_failure(output.lines))
        }
    }
}

/// The bind mount the boot script and the live mount both perform
fn mount_command(mounted: &Path, target: &Path) -> String {
    format!(
        "mount -o bind {} {}",
        quote(&mounted.to_string_lossy()),
        quote(&target.to_string_lossy())
    )
}
