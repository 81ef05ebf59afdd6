#![warn(clippy::pedantic)]
#![deny(clippy::all)]

//! Split-apk installation for apkinst
//!
//! This crate installs multi-file packages either through the package
//! installer's session protocol or, with root, by bind-mounting a patched
//! base apk over an installed package.

mod api;
pub mod inventory;
mod installer;
pub mod patch;
pub mod privileged;
pub mod reconcile;
pub mod session;

pub use installer::{select_patch_apk, Installer};
pub use inventory::{parse_long_listing, FileInventory};
pub use patch::BindMountPatcher;
pub use privileged::PrivilegedInstaller;
pub use reconcile::{parse_code_path, parse_version_dump, reconcile, VersionLookup};
pub use session::SessionInstaller;

// Re-export the public API surface from api module
pub use api::config::InstallConfig;
pub use api::result::{PatchReport, PendingCommit};

// Re-export EventSender for callers wiring up contexts
pub use apkinst_events::EventSender;
