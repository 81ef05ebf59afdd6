//! CLI error handling

use std::fmt;

use apkinst_errors::UserFacingError;

/// CLI-specific error type
#[derive(Debug)]
pub enum CliError {
    /// Configuration error
    Config(apkinst_errors::ConfigError),
    /// Library error
    Ops(apkinst_errors::Error),
    /// The operation ran and reported failure
    Failed {
        operation: &'static str,
        reasons: Vec<String>,
    },
    /// Invalid command arguments
    InvalidArguments(String),
    /// I/O error
    Io(std::io::Error),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Config(e) => write!(f, "Configuration error: {e}"),
            CliError::Ops(e) => {
                let message = e.user_message();
                write!(f, "{message}")?;
                if let Some(code) = e.user_code() {
                    write!(f, "\n  Code: {code}")?;
                }
                if let Some(hint) = e.user_hint() {
                    write!(f, "\n  Hint: {hint}")?;
                }
                if e.is_retryable() {
                    write!(f, "\n  Retry: safe to retry this operation.")?;
                }
                Ok(())
            }
            CliError::Failed { operation, reasons } => {
                write!(f, "{operation} failed: {}", reasons.join("; "))
            }
            CliError::InvalidArguments(msg) => write!(f, "Invalid arguments: {msg}"),
            CliError::Io(e) => write!(f, "I/O error: {e}"),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Config(e) => Some(e),
            CliError::Ops(e) => Some(e),
            CliError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<apkinst_errors::ConfigError> for CliError {
    fn from(e: apkinst_errors::ConfigError) -> Self {
        CliError::Config(e)
    }
}

impl From<apkinst_errors::Error> for CliError {
    fn from(e: apkinst_errors::Error) -> Self {
        CliError::Ops(e)
    }
}

impl From<apkinst_errors::InstallError> for CliError {
    fn from(e: apkinst_errors::InstallError) -> Self {
        CliError::Ops(e.into())
    }
}

impl From<std::io::Error> for CliError {
    fn from(e: std::io::Error) -> Self {
        CliError::Io(e)
    }
}
