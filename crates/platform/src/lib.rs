#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Platform abstraction layer for on-device package operations.
//!
//! This crate provides a unified interface for:
//! - A persistent privileged (`su`) shell with streaming subprocesses
//! - Structured package manager queries and removal
//! - The installer session protocol (create, write, commit, abandon)
//! - Unprivileged process execution with event emission
//!
//! Every operation takes a [`PlatformContext`] so commands surface as
//! platform events on the caller's channel.

pub mod core;
pub mod implementations;
pub mod package;
pub mod process;
pub mod session;
pub mod shell;

pub use core::{Platform, PlatformContext};
pub use implementations::android::AndroidPlatform;

/// Re-export commonly used types
pub use package::{PackageInfo, PackageManager};
pub use process::ProcessOperations;
pub use session::{SessionBackend, SessionStream};
pub use shell::{quote, ByteSource, PrivilegedShell, ShellOutput};
