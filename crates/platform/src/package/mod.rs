//! Structured package manager access

use apkinst_errors::PlatformError;
use async_trait::async_trait;
use std::path::PathBuf;

use crate::core::PlatformContext;

/// What the package manager reports about an installed package
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageInfo {
    pub package: String,
    /// Combined version code (major bits in the upper half)
    pub version_code: i64,
    pub version_name: Option<String>,
    /// Path of the installed base apk
    pub source_dir: Option<PathBuf>,
}

#[async_trait]
pub trait PackageManager: Send + Sync {
    /// Look up an installed package
    ///
    /// Fails with `PackageNotFound` when the package is not installed.
    async fn package_info(
        &self,
        ctx: &PlatformContext,
        package: &str,
    ) -> Result<PackageInfo, PlatformError>;

    /// Remove a package for all users
    async fn uninstall(&self, ctx: &PlatformContext, package: &str) -> Result<(), PlatformError>;
}
