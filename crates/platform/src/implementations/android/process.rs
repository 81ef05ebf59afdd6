//! Android process operations implementation
//!
//! Runs unprivileged tools (`pm`, `dumpsys`) with tokio and reports each
//! invocation as platform events.

use apkinst_errors::PlatformError;
use async_trait::async_trait;
use std::process::Stdio;
use tokio::process::Command;

use crate::core::PlatformContext;
use crate::process::{CommandOutput, PlatformCommand, ProcessOperations};

/// Android implementation of process operations
pub struct AndroidProcessOperations;

impl AndroidProcessOperations {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Default for AndroidProcessOperations {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProcessOperations for AndroidProcessOperations {
    async fn execute_command(
        &self,
        ctx: &PlatformContext,
        cmd: PlatformCommand,
    ) -> Result<CommandOutput, PlatformError> {
        let display = cmd.display();

        ctx.execute_with_events(&display, async {
            let output = Command::new(cmd.program())
                .args(cmd.get_args())
                .stdin(Stdio::null())
                .output()
                .await
                .map_err(|e| PlatformError::ProcessExecutionFailed {
                    command: display.clone(),
                    message: e.to_string(),
                })?;

            Ok(CommandOutput {
                status: output.status,
                stdout: output.stdout,
                stderr: output.stderr,
            })
        })
        .await
    }
}
