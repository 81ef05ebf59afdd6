//! Installer session bookkeeping

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Identifier handed out by the package installer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionId(pub u32);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// State of one installer session owned by the installer that created it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallSession {
    id: SessionId,
    total_size_bytes: u64,
    written_entries: BTreeSet<String>,
}

impl InstallSession {
    #[must_use]
    pub fn new(id: SessionId, total_size_bytes: u64) -> Self {
        Self {
            id,
            total_size_bytes,
            written_entries: BTreeSet::new(),
        }
    }

    #[must_use]
    pub fn id(&self) -> SessionId {
        self.id
    }

    #[must_use]
    pub fn total_size_bytes(&self) -> u64 {
        self.total_size_bytes
    }

    /// Record a completed write. Returns `false` if the name was already written.
    pub fn record_write(&mut self, name: impl Into<String>) -> bool {
        self.written_entries.insert(name.into())
    }

    #[must_use]
    pub fn is_written(&self, name: &str) -> bool {
        self.written_entries.contains(name)
    }

    pub fn written_entries(&self) -> impl Iterator<Item = &str> {
        self.written_entries.iter().map(String::as_str)
    }

    #[must_use]
    pub fn written_count(&self) -> usize {
        self.written_entries.len()
    }
}
