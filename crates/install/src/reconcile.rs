//! Version reconciliation between the installed package and the payload

use apkinst_events::{AppEvent, EventEmitter, InstallEvent};
use apkinst_platform::{quote, Platform, PlatformContext};
use apkinst_types::{
    PackageLocation, Reconciliation, RecoveryStrategy, VersionCode, VersionRelation,
};
use std::path::PathBuf;

/// Pick the recovery sequence for replacing the base package
///
/// Anything not under app storage is treated as absent: system copies
/// cannot be patched in place and get a fresh install on top. An
/// app-storage package whose version cannot be read is assumed to match.
#[must_use]
pub fn reconcile(
    location: &PackageLocation,
    installed: Option<VersionCode>,
    required: VersionCode,
) -> Reconciliation {
    if !location.is_app_storage() {
        return Reconciliation {
            strategy: RecoveryStrategy::FreshInstall,
            relation: None,
        };
    }

    let relation = installed.map_or(VersionRelation::Equal, |installed| {
        VersionRelation::between(installed, required)
    });
    let strategy = match relation {
        VersionRelation::Higher => RecoveryStrategy::UninstallThenInstall,
        VersionRelation::Equal | VersionRelation::Lower => RecoveryStrategy::InstallOverExisting,
    };

    Reconciliation {
        strategy,
        relation: Some(relation),
    }
}

/// Supplies the inputs of [`reconcile`]
///
/// Structured package manager queries come first; when they fail the
/// privileged `dumpsys` output is grepped instead.
#[derive(Clone, Debug)]
pub struct VersionLookup {
    platform: Platform,
}

impl VersionLookup {
    #[must_use]
    pub fn new(platform: Platform) -> Self {
        Self { platform }
    }

    /// Installed version code, masked to 32 bits
    pub async fn installed_version(&self, ctx: &PlatformContext, package: &str) -> Option<VersionCode> {
        match self.platform.packages().package_info(ctx, package).await {
            Ok(info) => return Some(VersionCode::from_combined(info.version_code)),
            Err(e) => tracing::debug!(package, error = %e, "package info unavailable, falling back to dumpsys"),
        }

        let script = format!("dumpsys package {} | grep versionCode", quote(package));
        match self.platform.shell().run(ctx, &script).await {
            Ok(output) => parse_version_dump(&output.lines),
            Err(e) => {
                tracing::debug!(package, error = %e, "privileged version lookup failed");
                None
            }
        }
    }

    /// Where the installed base apk lives
    pub async fn package_location(&self, ctx: &PlatformContext, package: &str) -> PackageLocation {
        match self.platform.packages().package_info(ctx, package).await {
            Ok(info) => {
                if let Some(source_dir) = info.source_dir {
                    return PackageLocation::from_path(source_dir);
                }
            }
            Err(e) => tracing::debug!(package, error = %e, "package info unavailable, falling back to dumpsys"),
        }

        let script = format!("dumpsys package {} | grep codePath", quote(package));
        match self.platform.shell().run(ctx, &script).await {
            Ok(output) => parse_code_path(&output.lines)
                .map_or(PackageLocation::NotInstalled, PackageLocation::from_path),
            Err(e) => {
                tracing::debug!(package, error = %e, "privileged code path lookup failed");
                PackageLocation::NotInstalled
            }
        }
    }

    pub async fn version_name(&self, ctx: &PlatformContext, package: &str) -> Option<String> {
        self.platform
            .packages()
            .package_info(ctx, package)
            .await
            .ok()
            .and_then(|info| info.version_name)
    }

    pub async fn is_installed(&self, ctx: &PlatformContext, package: &str) -> bool {
        if self.platform.packages().package_info(ctx, package).await.is_ok() {
            return true;
        }
        self.package_location(ctx, package).await != PackageLocation::NotInstalled
    }

    /// Look up location and version, reconcile, and report the decision
    pub async fn reconcile(
        &self,
        ctx: &PlatformContext,
        package: &str,
        required: VersionCode,
    ) -> (PackageLocation, Reconciliation) {
        let location = self.package_location(ctx, package).await;
        let installed = if location.is_app_storage() {
            self.installed_version(ctx, package).await
        } else {
            None
        };
        let reconciliation = reconcile(&location, installed, required);

        tracing::debug!(
            package,
            ?location,
            installed = ?installed,
            required = required.get(),
            strategy = %reconciliation.strategy,
            "reconciled installed package"
        );
        ctx.emit(AppEvent::Install(InstallEvent::Reconciled {
            package: package.to_string(),
            installed: installed.map(VersionCode::get),
            required: required.get(),
            relation: reconciliation.relation,
            strategy: reconciliation.strategy,
        }));

        (location, reconciliation)
    }
}

/// Highest version code in `dumpsys ... | grep versionCode` output
///
/// Lines look like `versionCode=1540087232 minSdk=26 targetSdk=33`; the
/// hidden system copy adds a second one. Lines that do not parse are
/// skipped.
pub fn parse_version_dump<S: AsRef<str>>(lines: &[S]) -> Option<VersionCode> {
    lines
        .iter()
        .filter_map(|line| {
            let (_, rest) = line.as_ref().split_once("versionCode=")?;
            let value = rest.split(' ').next()?;
            value.trim().parse::<i64>().ok()
        })
        .map(VersionCode::from_combined)
        .max()
}

/// Base apk path from `dumpsys ... | grep codePath` output
///
/// The first line pointing into `data/app` wins, even if later lines also do.
pub fn parse_code_path<S: AsRef<str>>(lines: &[S]) -> Option<PathBuf> {
    lines.iter().find_map(|line| {
        let line = line.as_ref();
        if !line.contains("data/app") {
            return None;
        }
        let (_, value) = line.split_once('=')?;
        Some(PathBuf::from(value.trim()).join("base.apk"))
    })
}
