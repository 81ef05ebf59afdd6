//! Split install through privileged `pm` session commands
//!
//! Used on rooted devices where the apks may not be readable by the
//! installer process. Every entry is streamed into its own
//! `pm install-write` subprocess.

use apkinst_errors::{InstallError, PlatformError};
use apkinst_events::{AppEvent, EventEmitter, InstallEvent};
use apkinst_platform::session::parse_session_id;
use apkinst_platform::{quote, Platform, PlatformContext};
use apkinst_types::{FileEntry, SessionId};

use crate::api::config::InstallConfig;
use crate::inventory::open_entry;

const CREATE_COMMAND: &str = "pm install-create -r -t";

#[derive(Clone, Debug)]
pub struct PrivilegedInstaller {
    platform: Platform,
    config: InstallConfig,
}

impl PrivilegedInstaller {
    #[must_use]
    pub fn new(platform: Platform, config: InstallConfig) -> Self {
        Self { platform, config }
    }

    /// Install every non-marker entry as one split package
    ///
    /// # Errors
    ///
    /// `WriteFailure` if the session cannot be created or on the first
    /// entry that cannot be streamed, `SessionCreateParseFailure` if a
    /// created session reports no id, and
    /// `CommitFailure` with the `pm` output if the commit is rejected.
    pub async fn install_split(
        &self,
        ctx: &PlatformContext,
        entries: &[FileEntry],
    ) -> Result<(), InstallError> {
        let shell = self.platform.shell();

        let output = shell
            .run(ctx, CREATE_COMMAND)
            .await
            .map_err(|e| match e {
                PlatformError::UnexpectedOutput { output, .. } => {
                    InstallError::SessionCreateParseFailure { output }
                }
                other => InstallError::WriteFailure {
                    name: "session".to_string(),
                    message: other.to_string(),
                },
            })?;
        let text = output.text();
        if !output.is_success() {
            return Err(InstallError::WriteFailure {
                name: "session".to_string(),
                message: format!("{CREATE_COMMAND} exited with {}: {text}", output.exit_code),
            });
        }
        let id = parse_session_id(&text)
            .ok_or(InstallError::SessionCreateParseFailure { output: text })?;

        let payload: Vec<&FileEntry> = entries
            .iter()
            .filter(|entry| !self.config.is_marker_file(entry.name()))
            .collect();

        ctx.emit(AppEvent::Install(InstallEvent::SessionCreated {
            session_id: id.0,
            total_bytes: payload.iter().map(|entry| entry.size_bytes()).sum(),
            privileged: true,
        }));

        for entry in payload {
            if let Err(err) = self.write_entry(ctx, id, entry).await {
                self.abandon(ctx, id, &err).await;
                return Err(err);
            }
        }

        ctx.emit(AppEvent::Install(InstallEvent::CommitRequested { session_id: id.0 }));
        let output = shell
            .run(ctx, &format!("pm install-commit {id}"))
            .await
            .map_err(|e| InstallError::CommitFailure {
                message: e.to_string(),
                output: Vec::new(),
            })?;

        if output.is_success() {
            tracing::debug!(session = %id, "privileged split install committed");
            Ok(())
        } else {
            Err(InstallError::CommitFailure {
                message: format!("pm install-commit exited with {}", output.exit_code),
                output: output.lines,
            })
        }
    }

    async fn write_entry(
        &self,
        ctx: &PlatformContext,
        id: SessionId,
        entry: &FileEntry,
    ) -> Result<(), InstallError> {
        let write_failure = |message: String| InstallError::WriteFailure {
            name: entry.name().to_string(),
            message,
        };

        let command = format!(
            "pm install-write -S {} {id} {}",
            entry.size_bytes(),
            quote(entry.name())
        );
        let source = open_entry(&self.platform, ctx, entry)
            .await
            .map_err(write_failure)?;

        let output = self
            .platform
            .shell()
            .pipe_to(ctx, &command, source, entry.size_bytes())
            .await
            .map_err(|e| write_failure(e.to_string()))?;
        if !output.is_success() {
            return Err(write_failure(output.text()));
        }

        ctx.emit(AppEvent::Install(InstallEvent::EntryWritten {
            session_id: id.0,
            name: entry.name().to_string(),
            bytes: entry.size_bytes(),
        }));
        Ok(())
    }

    async fn abandon(&self, ctx: &PlatformContext, id: SessionId, err: &InstallError) {
        match self
            .platform
            .shell()
            .run(ctx, &format!("pm install-abandon {id}"))
            .await
        {
            Ok(output) if output.is_success() => {}
            Ok(output) => {
                tracing::warn!(session = %id, output = %output.text(), "failed to abandon privileged session");
                ctx.emit_warning_with_context(format!("session {id} was not abandoned"), output.text());
            }
            Err(e) => {
                tracing::warn!(session = %id, error = %e, "failed to abandon privileged session");
                ctx.emit_warning_with_context(format!("session {id} was not abandoned"), e.to_string());
            }
        }
        ctx.emit(AppEvent::Install(InstallEvent::SessionAbandoned {
            session_id: id.0,
            reason: err.reason().to_string(),
        }));
    }
}
