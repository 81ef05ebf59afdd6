use apkinst_types::PatchStage;
use serde::{Deserialize, Serialize};

/// Bind-mount patch pipeline events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PatchEvent {
    StageStarted { stage: PatchStage },

    StageCompleted { stage: PatchStage },

    /// The stage halted the pipeline
    StageFailed {
        stage: PatchStage,
        reasons: Vec<String>,
    },

    /// Reconcile delegated to a full install and ended the pipeline there
    DelegatedToInstall { strategy: String },
}
