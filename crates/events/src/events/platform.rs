//! Privileged shell and process events

use serde::{Deserialize, Serialize};

/// Platform operation events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum PlatformEvent {
    /// Privileged shell became available
    ShellStarted {
        /// Binary used to elevate (usually `su`)
        program: String,
        duration_ms: u64,
    },

    /// Privileged shell could not be started
    ShellStartFailed { program: String, error_message: String },

    /// Privileged shell torn down
    ShellClosed { program: String },

    /// Command sent to the shell or spawned as a subprocess
    CommandStarted { command: String },

    /// Command finished (successfully or not)
    CommandCompleted {
        command: String,
        exit_code: i32,
        duration_ms: u64,
        output_lines: usize,
    },

    /// Command could not be run at all
    CommandFailed {
        command: String,
        error_message: String,
        duration_ms: u64,
    },
}
