//! Installer sessions driven through unprivileged `pm install-*` commands

use apkinst_errors::PlatformError;
use apkinst_events::{EventEmitter, PlatformEvent};
use apkinst_types::{InstallOutcome, SessionId};
use async_trait::async_trait;
use std::io;
use std::pin::Pin;
use std::process::Stdio;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::oneshot;

use crate::core::PlatformContext;
use crate::process::{CommandOutput, PlatformCommand, ProcessOperations};
use crate::session::{parse_session_id, SessionBackend, SessionStream};

pub struct PmSessionBackend {
    process: Arc<dyn ProcessOperations>,
}

impl PmSessionBackend {
    pub fn new(process: Arc<dyn ProcessOperations>) -> Self {
        Self { process }
    }

    async fn run_checked(
        &self,
        ctx: &PlatformContext,
        cmd: PlatformCommand,
    ) -> Result<CommandOutput, PlatformError> {
        let display = cmd.display();
        let output = self.process.execute_command(ctx, cmd).await?;
        if output.status.success() {
            Ok(output)
        } else {
            Err(PlatformError::ProcessExecutionFailed {
                command: display,
                message: output.lines().join("\n"),
            })
        }
    }
}

#[async_trait]
impl SessionBackend for PmSessionBackend {
    async fn create_session(
        &self,
        ctx: &PlatformContext,
        total_size_bytes: u64,
    ) -> Result<SessionId, PlatformError> {
        let mut cmd = self.process.create_command("pm");
        cmd.args(["install-create", "-S", &total_size_bytes.to_string()]);
        let display = cmd.display();
        let output = self.run_checked(ctx, cmd).await?;

        let text = output.stdout_text();
        parse_session_id(&text).ok_or(PlatformError::UnexpectedOutput {
            command: display,
            output: text,
        })
    }

    async fn open_write(
        &self,
        ctx: &PlatformContext,
        session: SessionId,
        name: &str,
        size_bytes: u64,
    ) -> Result<Box<dyn SessionStream>, PlatformError> {
        let mut cmd = PlatformCommand::new("pm");
        cmd.args(["install-write", "-S", &size_bytes.to_string(), &session.to_string(), name]);
        let command = cmd.display();

        ctx.emit_platform(PlatformEvent::CommandStarted {
            command: command.clone(),
        });

        let mut child = Command::new(cmd.program())
            .args(cmd.get_args())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| PlatformError::ProcessExecutionFailed {
                command: command.clone(),
                message: e.to_string(),
            })?;
        let stdin = child.stdin.take().ok_or_else(|| PlatformError::StreamFailed {
            command: command.clone(),
            message: "stdin not captured".to_string(),
        })?;

        Ok(Box::new(PmWriteStream {
            command,
            child,
            stdin,
        }))
    }

    async fn commit(
        &self,
        ctx: &PlatformContext,
        session: SessionId,
        completion: oneshot::Sender<InstallOutcome>,
    ) -> Result<(), PlatformError> {
        let command = format!("pm install-commit {session}");
        ctx.emit_platform(PlatformEvent::CommandStarted {
            command: command.clone(),
        });

        let child = Command::new("pm")
            .arg("install-commit")
            .arg(session.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| PlatformError::ProcessExecutionFailed {
                command: command.clone(),
                message: e.to_string(),
            })?;

        tokio::spawn(async move {
            let outcome = match child.wait_with_output().await {
                Ok(output) => commit_outcome(&CommandOutput {
                    status: output.status,
                    stdout: output.stdout,
                    stderr: output.stderr,
                }),
                Err(e) => InstallOutcome::failure(vec!["CommitFailure".to_string(), e.to_string()]),
            };
            if completion.send(outcome).is_err() {
                tracing::debug!(%command, "commit result dropped, nobody waiting");
            }
        });

        Ok(())
    }

    async fn abandon(&self, ctx: &PlatformContext, session: SessionId) -> Result<(), PlatformError> {
        let mut cmd = self.process.create_command("pm");
        cmd.args(["install-abandon", &session.to_string()]);
        self.run_checked(ctx, cmd).await.map(|_| ())
    }
}

/// `pm` prints `Success` on a committed session and `Failure [...]` otherwise
fn commit_outcome(output: &CommandOutput) -> InstallOutcome {
    let lines = output.lines();
    if output.status.success() && lines.iter().any(|line| line.starts_with("Success")) {
        InstallOutcome::success()
    } else {
        let mut reasons = vec!["CommitFailure".to_string()];
        reasons.extend(lines);
        InstallOutcome::failure(reasons)
    }
}

/// Stdin of one `pm install-write` invocation
struct PmWriteStream {
    command: String,
    child: Child,
    stdin: ChildStdin,
}

impl AsyncWrite for PmWriteStream {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.stdin).poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.stdin).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.stdin).poll_shutdown(cx)
    }
}

#[async_trait]
impl SessionStream for PmWriteStream {
    async fn fsync(&mut self) -> Result<(), PlatformError> {
        self.stdin
            .flush()
            .await
            .map_err(|e| PlatformError::StreamFailed {
                command: self.command.clone(),
                message: e.to_string(),
            })
    }

    async fn close(self: Box<Self>) -> Result<(), PlatformError> {
        let Self {
            command,
            child,
            mut stdin,
        } = *self;

        stdin
            .shutdown()
            .await
            .map_err(|e| PlatformError::StreamFailed {
                command: command.clone(),
                message: e.to_string(),
            })?;
        drop(stdin);

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| PlatformError::ProcessExecutionFailed {
                command: command.clone(),
                message: e.to_string(),
            })?;
        if output.status.success() {
            Ok(())
        } else {
            let output = CommandOutput {
                status: output.status,
                stdout: output.stdout,
                stderr: output.stderr,
            };
            Err(PlatformError::StreamFailed {
                command,
                message: output.lines().join("\n"),
            })
        }
    }
}
