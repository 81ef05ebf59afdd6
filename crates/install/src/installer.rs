//! Main installer implementation

use apkinst_errors::InstallError;
use apkinst_events::EventEmitter;
use apkinst_platform::{Platform, PlatformContext};
use apkinst_types::{FileEntry, InstallOutcome, VersionCode};
use std::path::Path;

use crate::api::config::InstallConfig;
use crate::api::result::PatchReport;
use crate::inventory::FileInventory;
use crate::patch::BindMountPatcher;
use crate::reconcile::VersionLookup;
use crate::session::SessionInstaller;

/// Top-level install orchestration
///
/// Every public operation ends in exactly one `InstallEvent::Succeeded` or
/// `InstallEvent::Failed` on the context's channel and returns the same
/// verdict as an [`InstallOutcome`].
#[derive(Clone)]
pub struct Installer {
    config: InstallConfig,
    platform: Platform,
    inventory: FileInventory,
    sessions: SessionInstaller,
    patcher: BindMountPatcher,
    lookup: VersionLookup,
}

impl std::fmt::Debug for Installer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Installer")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Installer {
    /// Create new installer
    #[must_use]
    pub fn new(config: InstallConfig, platform: Platform) -> Self {
        Self {
            inventory: FileInventory::new(platform.clone()),
            sessions: SessionInstaller::new(platform.clone(), config.chunk_size),
            patcher: BindMountPatcher::new(platform.clone(), config.clone()),
            lookup: VersionLookup::new(platform.clone()),
            config,
            platform,
        }
    }

    #[must_use]
    pub fn config(&self) -> &InstallConfig {
        &self.config
    }

    #[must_use]
    pub fn inventory(&self) -> &FileInventory {
        &self.inventory
    }

    #[must_use]
    pub fn lookup(&self) -> &VersionLookup {
        &self.lookup
    }

    /// Install every apk of `directory` through one installer session
    pub async fn install_split(&self, ctx: &PlatformContext, directory: &Path) -> InstallOutcome {
        const OPERATION: &str = "install";
        ctx.emit_operation_started(OPERATION);

        let result = async {
            let entries: Vec<FileEntry> = self
                .inventory
                .list(ctx, directory)
                .await?
                .into_iter()
                .filter(FileEntry::is_installable)
                .collect();
            if entries.is_empty() {
                return Err(InstallError::InventoryUnavailable {
                    path: directory.display().to_string(),
                    message: "no apk files".to_string(),
                });
            }

            let pending = self.sessions.install(ctx, &entries).await?;
            Ok::<_, InstallError>(pending.outcome().await)
        }
        .await;

        Self::finish(ctx, OPERATION, result)
    }

    /// Install one apk through an installer session
    pub async fn install_single(
        &self,
        ctx: &PlatformContext,
        path: &Path,
        package: &str,
    ) -> InstallOutcome {
        const OPERATION: &str = "install-single";
        ctx.emit_operation_started(OPERATION);

        let result = async {
            let pending = self.sessions.install_single(ctx, path, package).await?;
            Ok::<_, InstallError>(pending.outcome().await)
        }
        .await;

        Self::finish(ctx, OPERATION, result)
    }

    /// Patch the target package with the themed base apk of `directory`
    pub async fn install_root(
        &self,
        ctx: &PlatformContext,
        directory: &Path,
        required: VersionCode,
    ) -> InstallOutcome {
        const OPERATION: &str = "root-install";
        ctx.emit_operation_started(OPERATION);

        let result = self.run_root(ctx, directory, required).await.map(|report| {
            match &report {
                PatchReport::Patched { mounted, target } => tracing::info!(
                    mounted = %mounted.display(),
                    target = %target.display(),
                    "base apk replaced"
                ),
                PatchReport::Installed { strategy } => {
                    tracing::info!(%strategy, "package installed instead of patched");
                }
            }
            InstallOutcome::success()
        });

        Self::finish(ctx, OPERATION, result)
    }

    /// Remove a package
    pub async fn uninstall(&self, ctx: &PlatformContext, package: &str) -> InstallOutcome {
        const OPERATION: &str = "uninstall";
        ctx.emit_operation_started(OPERATION);

        let result = self
            .platform
            .packages()
            .uninstall(ctx, package)
            .await
            .map(|()| InstallOutcome::success())
            .map_err(|e| InstallError::UninstallFailed {
                package: package.to_string(),
                message: e.to_string(),
            });

        Self::finish(ctx, OPERATION, result)
    }

    async fn run_root(
        &self,
        ctx: &PlatformContext,
        directory: &Path,
        required: VersionCode,
    ) -> Result<PatchReport, InstallError> {
        let entries = self.inventory.list(ctx, directory).await?;
        let replacement = select_patch_apk(&entries, &self.config.patch_apk_names).ok_or_else(|| {
            InstallError::ModApkMissing {
                candidates: self.config.patch_apk_names.join(", "),
            }
        })?;
        ctx.emit_debug(format!("patching with {}", replacement.name()));

        self.patcher
            .patch(ctx, replacement.path(), &entries, required)
            .await
    }

    fn finish(
        ctx: &PlatformContext,
        operation: &str,
        result: Result<InstallOutcome, InstallError>,
    ) -> InstallOutcome {
        let outcome = result.unwrap_or_else(|err| InstallOutcome::failure(err.failure_reasons()));

        if outcome.is_success() {
            ctx.emit_install_succeeded(operation);
        } else {
            ctx.emit_install_failed(operation, outcome.failure_reasons().to_vec());
        }
        outcome
    }
}

/// The patched base apk of a package directory
///
/// When several themes are present the one listed last in `names` wins.
#[must_use]
pub fn select_patch_apk<'a>(entries: &'a [FileEntry], names: &[String]) -> Option<&'a FileEntry> {
    names
        .iter()
        .rev()
        .find_map(|name| entries.iter().find(|entry| entry.name() == name))
}
