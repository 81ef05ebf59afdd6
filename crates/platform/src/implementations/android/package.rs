//! Package manager backed by unprivileged `dumpsys` and `pm`

use apkinst_errors::PlatformError;
use async_trait::async_trait;
use regex::Regex;
use std::path::PathBuf;
use std::sync::{Arc, LazyLock};

use crate::core::PlatformContext;
use crate::package::{PackageInfo, PackageManager};
use crate::process::ProcessOperations;

pub struct PmPackageManager {
    process: Arc<dyn ProcessOperations>,
}

impl PmPackageManager {
    pub fn new(process: Arc<dyn ProcessOperations>) -> Self {
        Self { process }
    }
}

#[async_trait]
impl PackageManager for PmPackageManager {
    async fn package_info(
        &self,
        ctx: &PlatformContext,
        package: &str,
    ) -> Result<PackageInfo, PlatformError> {
        let mut cmd = self.process.create_command("dumpsys");
        cmd.args(["package", package]);
        let display = cmd.display();
        let output = self.process.execute_command(ctx, cmd).await?;
        if !output.status.success() {
            return Err(PlatformError::ProcessExecutionFailed {
                command: display,
                message: output.lines().join("\n"),
            });
        }

        let mut info = parse_package_dump(package, &output.stdout_text())?;

        let mut cmd = self.process.create_command("pm");
        cmd.args(["path", package]);
        let output = self.process.execute_command(ctx, cmd).await?;
        if output.status.success() {
            info.source_dir = parse_pm_path(&output.stdout_text());
        }

        Ok(info)
    }

    async fn uninstall(&self, ctx: &PlatformContext, package: &str) -> Result<(), PlatformError> {
        let mut cmd = self.process.create_command("pm");
        cmd.args(["uninstall", package]);
        let display = cmd.display();
        let output = self.process.execute_command(ctx, cmd).await?;

        let lines = output.lines();
        if output.status.success() && lines.iter().any(|line| line.contains("Success")) {
            Ok(())
        } else {
            Err(PlatformError::ProcessExecutionFailed {
                command: display,
                message: lines.join("\n"),
            })
        }
    }
}

type Pattern = LazyLock<Result<Regex, regex::Error>>;

static VERSION_CODE: Pattern = LazyLock::new(|| Regex::new(r"versionCode=(-?\d+)"));
static VERSION_NAME: Pattern = LazyLock::new(|| Regex::new(r"versionName=(\S+)"));

fn compiled(pattern: &'static Pattern) -> Result<&'static Regex, PlatformError> {
    LazyLock::force(pattern)
        .as_ref()
        .map_err(|e| PlatformError::UnexpectedOutput {
            command: "dumpsys package".to_string(),
            output: e.to_string(),
        })
}

/// Extract version information from `dumpsys package <pkg>` output
///
/// Only the first `versionCode=`/`versionName=` after the package header
/// count; later matches belong to hidden system copies.
///
/// # Errors
///
/// `PackageNotFound` when the dump has no `Package [<pkg>]` section,
/// `UnexpectedOutput` when the section has no version code.
pub fn parse_package_dump(package: &str, dump: &str) -> Result<PackageInfo, PlatformError> {
    let header = format!("Package [{package}]");
    let Some(start) = dump.find(&header) else {
        return Err(PlatformError::PackageNotFound {
            package: package.to_string(),
        });
    };
    let section = &dump[start..];

    let code_re = compiled(&VERSION_CODE)?;
    let name_re = compiled(&VERSION_NAME)?;

    let version_code = code_re
        .captures(section)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<i64>().ok())
        .ok_or_else(|| PlatformError::UnexpectedOutput {
            command: format!("dumpsys package {package}"),
            output: "no versionCode".to_string(),
        })?;
    let version_name = name_re
        .captures(section)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string());

    Ok(PackageInfo {
        package: package.to_string(),
        version_code,
        version_name,
        source_dir: None,
    })
}

/// Base apk path from `pm path <pkg>` output
///
/// Split installs list one `package:` line per apk; the base one wins,
/// otherwise the first line does.
#[must_use]
pub fn parse_pm_path(output: &str) -> Option<PathBuf> {
    let paths: Vec<&str> = output
        .lines()
        .filter_map(|line| line.trim().strip_prefix("package:"))
        .collect();

    paths
        .iter()
        .find(|path| path.ends_with("/base.apk"))
        .or_else(|| paths.first())
        .map(PathBuf::from)
}
