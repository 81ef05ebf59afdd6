//! Version codes and the recovery strategies derived from them

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::path::{Path, PathBuf};

/// Path fragment that identifies the primary app-storage tree
pub const APP_STORAGE_MARKER: &str = "/data/app/";

/// 32-bit package version code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VersionCode(pub u32);

impl VersionCode {
    /// Build from a combined 64-bit code (major in the upper half); only the
    /// lower 32 bits are kept.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn from_combined(code: i64) -> Self {
        Self((code & 0xFFFF_FFFF) as u32)
    }

    #[must_use]
    pub fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for VersionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Installed version relative to the required one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VersionRelation {
    Higher,
    Equal,
    Lower,
}

impl VersionRelation {
    #[must_use]
    pub fn between(installed: VersionCode, required: VersionCode) -> Self {
        match installed.cmp(&required) {
            Ordering::Greater => Self::Higher,
            Ordering::Equal => Self::Equal,
            Ordering::Less => Self::Lower,
        }
    }
}

/// Where the installed base package lives
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "path", rename_all = "snake_case")]
pub enum PackageLocation {
    NotInstalled,
    /// Under the primary app-storage tree
    AppStorage(PathBuf),
    /// Installed somewhere else (typically a system partition)
    Elsewhere(PathBuf),
}

impl PackageLocation {
    /// Classify an installed base package path
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        if path.to_string_lossy().contains(APP_STORAGE_MARKER) {
            Self::AppStorage(path)
        } else {
            Self::Elsewhere(path)
        }
    }

    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::NotInstalled => None,
            Self::AppStorage(path) | Self::Elsewhere(path) => Some(path),
        }
    }

    #[must_use]
    pub fn is_app_storage(&self) -> bool {
        matches!(self, Self::AppStorage(_))
    }
}

/// Recovery sequence selected before the base package can be replaced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryStrategy {
    /// Install the full payload as a new app
    FreshInstall,
    /// Remove the installed package, then install the payload
    UninstallThenInstall,
    /// Install the payload over the installed package
    InstallOverExisting,
}

impl fmt::Display for RecoveryStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FreshInstall => write!(f, "fresh install"),
            Self::UninstallThenInstall => write!(f, "uninstall then install"),
            Self::InstallOverExisting => write!(f, "install over existing"),
        }
    }
}

/// Result of reconciling an installed package with the required version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reconciliation {
    pub strategy: RecoveryStrategy,
    /// `None` when nothing usable is installed
    pub relation: Option<VersionRelation>,
}

impl Reconciliation {
    /// The installed base already matches; only the binary needs replacing.
    #[must_use]
    pub fn is_patch_target(&self) -> bool {
        self.strategy == RecoveryStrategy::InstallOverExisting
            && self.relation == Some(VersionRelation::Equal)
    }
}
