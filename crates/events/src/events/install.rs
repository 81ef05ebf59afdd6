use apkinst_types::{RecoveryStrategy, VersionRelation};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Installation domain events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum InstallEvent {
    /// A package directory was enumerated
    InventoryListed {
        directory: PathBuf,
        entries: usize,
        total_bytes: u64,
        /// Listing came from privileged `ls -l` output
        privileged: bool,
    },

    /// An installer session was opened
    SessionCreated {
        session_id: u32,
        total_bytes: u64,
        privileged: bool,
    },

    /// One entry was streamed into a session
    EntryWritten {
        session_id: u32,
        name: String,
        bytes: u64,
    },

    /// Commit handed to the package installer
    CommitRequested { session_id: u32 },

    /// Session released without commit
    SessionAbandoned { session_id: u32, reason: String },

    /// Installed package compared against the required version
    Reconciled {
        package: String,
        installed: Option<u32>,
        required: u32,
        relation: Option<VersionRelation>,
        strategy: RecoveryStrategy,
    },

    /// Package removal requested
    UninstallRequested { package: String },

    /// Terminal success of one install invocation
    Succeeded { operation: String },

    /// Terminal failure of one install invocation
    Failed {
        operation: String,
        reasons: Vec<String>,
    },
}

impl InstallEvent {
    /// Whether this event ends an install invocation
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded { .. } | Self::Failed { .. })
    }
}
