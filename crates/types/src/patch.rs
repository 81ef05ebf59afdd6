//! Stages of the privileged base-replacement pipeline

use serde::{Deserialize, Serialize};
use std::fmt;

/// Ordered stages; a failure at one stage never runs a later one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatchStage {
    Reconcile,
    EnsureStore,
    Relocate,
    Relabel,
    Persist,
    Mount,
}

impl PatchStage {
    pub const ALL: [PatchStage; 6] = [
        Self::Reconcile,
        Self::EnsureStore,
        Self::Relocate,
        Self::Relabel,
        Self::Persist,
        Self::Mount,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Reconcile => "reconcile",
            Self::EnsureStore => "ensure_store",
            Self::Relocate => "relocate",
            Self::Relabel => "relabel",
            Self::Persist => "persist",
            Self::Mount => "mount",
        }
    }
}

impl fmt::Display for PatchStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
