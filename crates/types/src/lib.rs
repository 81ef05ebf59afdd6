#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Core type definitions for apkinst
//!
//! Inventory entries, installer sessions, version relations and the
//! terminal outcome of an install invocation.

pub mod entry;
pub mod outcome;
pub mod patch;
pub mod session;
pub mod version;

pub use entry::{FileEntry, FileSource, PACKAGE_FILE_EXTENSION};
pub use outcome::InstallOutcome;
pub use patch::PatchStage;
pub use session::{InstallSession, SessionId};
pub use version::{
    PackageLocation, Reconciliation, RecoveryStrategy, VersionCode, VersionRelation,
    APP_STORAGE_MARKER,
};

use serde::{Deserialize, Serialize};

/// Output format for CLI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable output
    #[default]
    Tty,
    /// Plain text output without decoration
    Plain,
    /// JSON output
    Json,
}
