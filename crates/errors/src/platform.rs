//! Platform operation errors (privileged shell, package manager, processes)

use std::borrow::Cow;

use crate::UserFacingError;
use thiserror::Error;

/// Errors that can occur while talking to the device platform
#[derive(Debug, Clone, Error)]
pub enum PlatformError {
    #[error("privileged shell unavailable: {message}")]
    ShellUnavailable { message: String },

    #[error("privileged shell did not start within {timeout_secs}s")]
    ShellStartTimeout { timeout_secs: u64 },

    #[error("privileged shell closed unexpectedly while running: {command}")]
    ShellClosed { command: String },

    #[error("process execution failed: {command} - {message}")]
    ProcessExecutionFailed { command: String, message: String },

    #[error("stream to {command} failed: {message}")]
    StreamFailed { command: String, message: String },

    #[error("package not found: {package}")]
    PackageNotFound { package: String },

    #[error("unexpected output from {command}: {output}")]
    UnexpectedOutput { command: String, output: String },
}

impl PlatformError {
    /// Stable reason string reported on the completion channel.
    #[must_use]
    pub fn reason(&self) -> &'static str {
        match self {
            Self::ShellUnavailable { .. } | Self::ShellStartTimeout { .. } => "ShellUnavailable",
            Self::ShellClosed { .. } => "ShellClosed",
            Self::ProcessExecutionFailed { .. } => "ProcessExecutionFailed",
            Self::StreamFailed { .. } => "StreamFailed",
            Self::PackageNotFound { .. } => "PackageNotFound",
            Self::UnexpectedOutput { .. } => "UnexpectedOutput",
        }
    }
}

impl UserFacingError for PlatformError {
    fn user_message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Self::ShellUnavailable { .. } | Self::ShellStartTimeout { .. } => {
                Some("Grant root access to the shell (su) and retry.")
            }
            _ => None,
        }
    }

    fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ShellStartTimeout { .. } | Self::ShellClosed { .. }
        )
    }

    fn user_code(&self) -> Option<&'static str> {
        let code = match self {
            Self::ShellUnavailable { .. } => "platform.shell_unavailable",
            Self::ShellStartTimeout { .. } => "platform.shell_start_timeout",
            Self::ShellClosed { .. } => "platform.shell_closed",
            Self::ProcessExecutionFailed { .. } => "platform.process_failed",
            Self::StreamFailed { .. } => "platform.stream_failed",
            Self::PackageNotFound { .. } => "platform.package_not_found",
            Self::UnexpectedOutput { .. } => "platform.unexpected_output",
        };
        Some(code)
    }
}
