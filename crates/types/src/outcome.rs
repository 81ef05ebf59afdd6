//! Terminal result of one install invocation

use apkinst_errors::Error;
use serde::{Deserialize, Serialize};

const UNKNOWN_REASON: &str = "Unknown";

/// Either a success with no reasons or a failure with at least one reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallOutcome {
    success: bool,
    failure_reasons: Vec<String>,
}

impl InstallOutcome {
    #[must_use]
    pub fn success() -> Self {
        Self {
            success: true,
            failure_reasons: Vec::new(),
        }
    }

    /// Failure outcome; an empty reason list becomes `["Unknown"]`.
    #[must_use]
    pub fn failure(reasons: Vec<String>) -> Self {
        let failure_reasons = if reasons.is_empty() {
            vec![UNKNOWN_REASON.to_string()]
        } else {
            reasons
        };
        Self {
            success: false,
            failure_reasons,
        }
    }

    #[must_use]
    pub fn from_error(error: &Error) -> Self {
        Self::failure(error.failure_reasons())
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.success
    }

    #[must_use]
    pub fn failure_reasons(&self) -> &[String] {
        &self.failure_reasons
    }
}

impl<E: Into<Error>> From<Result<(), E>> for InstallOutcome {
    fn from(result: Result<(), E>) -> Self {
        match result {
            Ok(()) => Self::success(),
            Err(err) => Self::from_error(&err.into()),
        }
    }
}
