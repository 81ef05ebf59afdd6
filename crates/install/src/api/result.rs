use apkinst_types::{InstallOutcome, RecoveryStrategy, SessionId};
use std::path::PathBuf;
use tokio::sync::oneshot;

/// What a completed patch pipeline did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatchReport {
    /// The base apk is now bind-mounted over the installed one
    Patched {
        /// Relocated binary inside the store
        mounted: PathBuf,
        /// Installed base apk it covers
        target: PathBuf,
    },
    /// Reconcile delegated to a full install and the pipeline ended there
    Installed { strategy: RecoveryStrategy },
}

/// A committed session whose verdict has not arrived yet
#[derive(Debug)]
pub struct PendingCommit {
    session_id: SessionId,
    receiver: oneshot::Receiver<InstallOutcome>,
}

impl PendingCommit {
    pub(crate) fn new(session_id: SessionId, receiver: oneshot::Receiver<InstallOutcome>) -> Self {
        Self {
            session_id,
            receiver,
        }
    }

    #[must_use]
    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    /// Wait for the installer's verdict
    ///
    /// A backend that drops the completion sender counts as a failed commit.
    pub async fn outcome(self) -> InstallOutcome {
        self.receiver.await.unwrap_or_else(|_| {
            InstallOutcome::failure(vec![
                "CommitFailure".to_string(),
                format!("session {} closed without a result", self.session_id),
            ])
        })
    }
}
