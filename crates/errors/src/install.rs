//! Installation system error types

use std::borrow::Cow;

use crate::UserFacingError;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum InstallError {
    #[error("package inventory unavailable for {path}: {message}")]
    InventoryUnavailable { path: String, message: String },

    #[error("failed to write {name} into install session: {message}")]
    WriteFailure { name: String, message: String },

    #[error("install session commit failed: {message}")]
    CommitFailure { message: String, output: Vec<String> },

    #[error("failed to uninstall {package}: {message}")]
    UninstallFailed { package: String, message: String },

    #[error("failed to prepare patch store {path}")]
    SetupFailed { path: String, output: Vec<String> },

    #[error("replacement file missing: {path}")]
    SourceMissing { path: String },

    #[error("failed to move {source_path} to {target_path}")]
    CopyFailed {
        source_path: String,
        target_path: String,
        output: Vec<String>,
    },

    #[error("failed to change owner of {path}")]
    ChownFailed { path: String, output: Vec<String> },

    #[error("failed to relabel {path}")]
    RelabelFailed { path: String, output: Vec<String> },

    #[error("failed to install boot script {path}")]
    ScriptFailed { path: String, output: Vec<String> },

    #[error("failed to bind mount {source_path} over {target_path}")]
    MountFailed {
        source_path: String,
        target_path: String,
        output: Vec<String>,
    },

    #[error("could not parse session id from: {output}")]
    SessionCreateParseFailure { output: String },

    #[error("no patch apk found (looked for {candidates})")]
    ModApkMissing { candidates: String },
}

impl InstallError {
    /// Stable reason string reported on the completion channel.
    #[must_use]
    pub fn reason(&self) -> &'static str {
        match self {
            Self::InventoryUnavailable { .. } => "InventoryUnavailable",
            Self::WriteFailure { .. } => "WriteFailure",
            Self::CommitFailure { .. } => "CommitFailure",
            Self::UninstallFailed { .. } => "UninstallFailed",
            Self::SetupFailed { .. } => "SetupFailed",
            Self::SourceMissing { .. } => "SourceMissing",
            Self::CopyFailed { .. } => "CopyFailed",
            Self::ChownFailed { .. } => "ChownFailed",
            Self::RelabelFailed { .. } => "RelabelFailed",
            Self::ScriptFailed { .. } => "ScriptFailed",
            Self::MountFailed { .. } => "MountFailed",
            Self::SessionCreateParseFailure { .. } => "SessionCreateParseFailure",
            Self::ModApkMissing { .. } => "ModApkMissing",
        }
    }

    /// Diagnostic lines captured from the failing step, if any.
    #[must_use]
    pub fn diagnostics(&self) -> Vec<String> {
        let lines: Vec<String> = match self {
            Self::InventoryUnavailable { message, .. }
            | Self::WriteFailure { message, .. }
            | Self::UninstallFailed { message, .. } => vec![message.clone()],
            Self::CommitFailure { message, output } => {
                if output.is_empty() {
                    vec![message.clone()]
                } else {
                    output.clone()
                }
            }
            Self::SetupFailed { output, .. }
            | Self::CopyFailed { output, .. }
            | Self::ChownFailed { output, .. }
            | Self::RelabelFailed { output, .. }
            | Self::ScriptFailed { output, .. }
            | Self::MountFailed { output, .. } => output.clone(),
            Self::SessionCreateParseFailure { output } => vec![output.clone()],
            Self::SourceMissing { .. } | Self::ModApkMissing { .. } => Vec::new(),
        };
        lines
            .into_iter()
            .map(|line| line.trim().to_string())
            .filter(|line| !line.is_empty())
            .collect()
    }

    /// Reason followed by diagnostics; never empty.
    #[must_use]
    pub fn failure_reasons(&self) -> Vec<String> {
        let mut reasons = vec![self.reason().to_string()];
        reasons.extend(self.diagnostics());
        reasons
    }
}

impl UserFacingError for InstallError {
    fn user_message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Self::InventoryUnavailable { .. } => {
                Some("Check that the apk directory exists and that root access was granted.")
            }
            Self::UninstallFailed { .. } => {
                Some("Uninstall the installed update manually and retry.")
            }
            Self::SourceMissing { .. } | Self::ModApkMissing { .. } => {
                Some("Place the patch apk in the apk directory and retry.")
            }
            Self::RelabelFailed { .. } | Self::MountFailed { .. } => {
                Some("The root solution may not allow SELinux relabels or mounts from this context.")
            }
            Self::SessionCreateParseFailure { .. } => {
                Some("The package manager returned unexpected output; check `pm` works from a root shell.")
            }
            _ => None,
        }
    }

    fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::WriteFailure { .. } | Self::CommitFailure { .. } | Self::MountFailed { .. }
        )
    }

    fn user_code(&self) -> Option<&'static str> {
        let code = match self {
            Self::InventoryUnavailable { .. } => "install.inventory_unavailable",
            Self::WriteFailure { .. } => "install.write_failure",
            Self::CommitFailure { .. } => "install.commit_failure",
            Self::UninstallFailed { .. } => "install.uninstall_failed",
            Self::SetupFailed { .. } => "install.setup_failed",
            Self::SourceMissing { .. } => "install.source_missing",
            Self::CopyFailed { .. } => "install.copy_failed",
            Self::ChownFailed { .. } => "install.chown_failed",
            Self::RelabelFailed { .. } => "install.relabel_failed",
            Self::ScriptFailed { .. } => "install.script_failed",
            Self::MountFailed { .. } => "install.mount_failed",
            Self::SessionCreateParseFailure { .. } => "install.session_create_parse_failure",
            Self::ModApkMissing { .. } => "install.mod_apk_missing",
        };
        Some(code)
    }
}
