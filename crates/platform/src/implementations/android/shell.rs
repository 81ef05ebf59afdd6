//! Persistent `su` shell
//!
//! One root shell is started lazily and kept for the life of the process.
//! Each script is wrapped so its combined output is followed by a unique
//! sentinel line carrying the exit status, which is how the reader knows
//! where one command's output ends.

use apkinst_errors::PlatformError;
use apkinst_events::{EventEmitter, PlatformEvent};
use async_trait::async_trait;
use std::io;
use std::path::Path;
use std::pin::Pin;
use std::process::Stdio;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWriteExt, BufReader, ReadBuf};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::core::{duration_to_millis, CommandResult, PlatformContext};
use crate::process::CommandOutput;
use crate::shell::{quote, ByteSource, PrivilegedShell, ShellOutput};

/// Root shell driven over stdin/stdout
pub struct SuShell {
    program: String,
    startup_timeout: Duration,
    verbose: bool,
    process: Mutex<Option<ShellProcess>>,
}

struct ShellProcess {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
}

impl SuShell {
    /// `program` is the elevation binary, normally `su`
    pub fn new(program: impl Into<String>, startup_timeout: Duration) -> Self {
        Self {
            program: program.into(),
            startup_timeout,
            verbose: false,
            process: Mutex::new(None),
        }
    }

    /// Log every script and its output at debug level
    #[must_use]
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Whether the shell process is currently running
    pub async fn is_started(&self) -> bool {
        self.process.lock().await.is_some()
    }

    async fn spawn(&self, ctx: &PlatformContext) -> Result<ShellProcess, PlatformError> {
        let start = Instant::now();

        let mut process = match self.spawn_process() {
            Ok(process) => process,
            Err(e) => {
                ctx.emit_platform(PlatformEvent::ShellStartFailed {
                    program: self.program.clone(),
                    error_message: e.to_string(),
                });
                return Err(e);
            }
        };

        // The grant prompt of the root manager blocks the first command
        match tokio::time::timeout(self.startup_timeout, process.exchange("true")).await {
            Ok(Ok(_)) => {
                ctx.emit_platform(PlatformEvent::ShellStarted {
                    program: self.program.clone(),
                    duration_ms: duration_to_millis(start.elapsed()),
                });
                Ok(process)
            }
            Ok(Err(e)) => {
                let _ = process.child.kill().await;
                let err = PlatformError::ShellUnavailable {
                    message: e.to_string(),
                };
                ctx.emit_platform(PlatformEvent::ShellStartFailed {
                    program: self.program.clone(),
                    error_message: err.to_string(),
                });
                Err(err)
            }
            Err(_) => {
                let _ = process.child.kill().await;
                let err = PlatformError::ShellStartTimeout {
                    timeout_secs: self.startup_timeout.as_secs(),
                };
                ctx.emit_platform(PlatformEvent::ShellStartFailed {
                    program: self.program.clone(),
                    error_message: err.to_string(),
                });
                Err(err)
            }
        }
    }

    fn spawn_process(&self) -> Result<ShellProcess, PlatformError> {
        let mut child = Command::new(&self.program)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| PlatformError::ShellUnavailable {
                message: format!("{}: {e}", self.program),
            })?;

        let stdin = child.stdin.take().ok_or_else(|| PlatformError::ShellUnavailable {
            message: "shell stdin not captured".to_string(),
        })?;
        let stdout = child.stdout.take().ok_or_else(|| PlatformError::ShellUnavailable {
            message: "shell stdout not captured".to_string(),
        })?;

        Ok(ShellProcess {
            child,
            stdin,
            stdout: BufReader::new(stdout),
        })
    }

    fn subprocess(&self, command: &str) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.arg("-c").arg(command).kill_on_drop(true);
        cmd
    }
}

impl ShellProcess {
    async fn exchange(&mut self, script: &str) -> Result<ShellOutput, PlatformError> {
        let sentinel = format!("__apkinst_{}__", Uuid::new_v4().simple());
        // stdin of the script is detached so nothing it runs can eat the
        // commands queued behind it
        let framed = format!("{{\n{script}\n}} </dev/null 2>&1\necho \"{sentinel} $?\"\n");

        let stream_err = |e: io::Error| PlatformError::StreamFailed {
            command: script.to_string(),
            message: e.to_string(),
        };

        self.stdin.write_all(framed.as_bytes()).await.map_err(stream_err)?;
        self.stdin.flush().await.map_err(stream_err)?;

        let mut lines = Vec::new();
        let mut buf = Vec::new();
        loop {
            buf.clear();
            let read = self
                .stdout
                .read_until(b'\n', &mut buf)
                .await
                .map_err(stream_err)?;
            if read == 0 {
                return Err(PlatformError::ShellClosed {
                    command: script.to_string(),
                });
            }

            let text = String::from_utf8_lossy(&buf);
            let line = text.trim_end_matches(['\n', '\r']);
            match split_sentinel(line, &sentinel) {
                Some((rest, exit_code)) => {
                    if !rest.is_empty() {
                        lines.push(rest.to_string());
                    }
                    return Ok(ShellOutput::new(exit_code, lines));
                }
                None => lines.push(line.to_string()),
            }
        }
    }
}

/// Split a line at the sentinel, returning output that preceded it (a
/// script whose last line had no newline) and the exit status after it
pub(crate) fn split_sentinel<'a>(line: &'a str, sentinel: &str) -> Option<(&'a str, i32)> {
    let idx = line.find(sentinel)?;
    let exit_code = line[idx + sentinel.len()..].trim().parse().unwrap_or(-1);
    Some((&line[..idx], exit_code))
}

#[async_trait]
impl PrivilegedShell for SuShell {
    async fn run(&self, ctx: &PlatformContext, script: &str) -> Result<ShellOutput, PlatformError> {
        let mut guard = self.process.lock().await;
        if guard.is_none() {
            let process = self.spawn(ctx).await?;
            *guard = Some(process);
        }
        let process = guard.as_mut().ok_or_else(|| PlatformError::ShellUnavailable {
            message: "shell not started".to_string(),
        })?;

        let result = ctx
            .execute_with_events(script, process.exchange(script))
            .await;

        match &result {
            Ok(output) if self.verbose => {
                tracing::debug!(script, exit_code = output.exit_code, lines = ?output.lines, "privileged command");
            }
            Ok(_) => {}
            Err(PlatformError::ShellClosed { .. } | PlatformError::StreamFailed { .. }) => {
                // the next command starts a fresh shell
                *guard = None;
            }
            Err(_) => {}
        }

        result
    }

    async fn pipe_to(
        &self,
        ctx: &PlatformContext,
        command: &str,
        input: ByteSource,
        len: u64,
    ) -> Result<ShellOutput, PlatformError> {
        ctx.execute_with_events(command, async {
            let mut child = self
                .subprocess(command)
                .stdin(Stdio::piped())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .spawn()
                .map_err(|e| PlatformError::ProcessExecutionFailed {
                    command: command.to_string(),
                    message: e.to_string(),
                })?;

            let mut stdin = child.stdin.take().ok_or_else(|| PlatformError::StreamFailed {
                command: command.to_string(),
                message: "stdin not captured".to_string(),
            })?;

            let mut limited = input.take(len);
            let streamed = async {
                let copied = tokio::io::copy(&mut limited, &mut stdin).await?;
                // anything past the declared size must not be silently dropped
                let mut rest = limited.into_inner();
                let mut extra = [0u8; 1];
                let trailing = rest.read(&mut extra).await?;
                if trailing == 0 {
                    stdin.shutdown().await?;
                }
                Ok::<(u64, usize), io::Error>((copied, trailing))
            }
            .await;
            drop(stdin);

            let failure = match streamed {
                Ok((copied, 0)) if copied == len => None,
                Ok((copied, 0)) => Some(format!("source ended after {copied} of {len} bytes")),
                Ok(_) => Some(format!("source is longer than the declared {len} bytes")),
                Err(e) => Some(e.to_string()),
            };
            if let Some(message) = failure {
                let _ = child.kill().await;
                return Err(PlatformError::StreamFailed {
                    command: command.to_string(),
                    message,
                });
            }

            let output = child
                .wait_with_output()
                .await
                .map_err(|e| PlatformError::ProcessExecutionFailed {
                    command: command.to_string(),
                    message: e.to_string(),
                })?;
            let output = CommandOutput {
                status: output.status,
                stdout: output.stdout,
                stderr: output.stderr,
            };

            Ok(ShellOutput::new(output.exit_code(), output.lines()))
        })
        .await
    }

    async fn open_read(&self, ctx: &PlatformContext, path: &Path) -> Result<ByteSource, PlatformError> {
        let command = format!("cat {}", quote(&path.to_string_lossy()));
        ctx.emit_platform(PlatformEvent::CommandStarted {
            command: command.clone(),
        });

        let mut child = self
            .subprocess(&command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| PlatformError::ProcessExecutionFailed {
                command: command.clone(),
                message: e.to_string(),
            })?;

        let stdout = child.stdout.take().ok_or_else(|| PlatformError::StreamFailed {
            command,
            message: "stdout not captured".to_string(),
        })?;

        Ok(Box::new(ChildReader {
            _child: child,
            stdout,
        }))
    }

    async fn close(&self, ctx: &PlatformContext) -> Result<(), PlatformError> {
        let Some(mut process) = self.process.lock().await.take() else {
            return Ok(());
        };

        let _ = process.stdin.write_all(b"exit\n").await;
        let _ = process.stdin.flush().await;

        match tokio::time::timeout(self.startup_timeout, process.child.wait()).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => {
                return Err(PlatformError::ProcessExecutionFailed {
                    command: "exit".to_string(),
                    message: e.to_string(),
                })
            }
            Err(_) => {
                tracing::warn!(program = %self.program, "shell ignored exit, killing it");
                let _ = process.child.kill().await;
            }
        }

        ctx.emit_platform(PlatformEvent::ShellClosed {
            program: self.program.clone(),
        });
        Ok(())
    }
}

/// Stdout of a streaming subprocess; the child lives as long as the reader
struct ChildReader {
    _child: Child,
    stdout: ChildStdout,
}

impl AsyncRead for ChildReader {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.stdout).poll_read(cx, buf)
    }
}
