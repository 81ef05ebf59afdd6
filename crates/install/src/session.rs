//! Installer session protocol driver
//!
//! create -> write every entry -> commit, with the session abandoned on any
//! failure before commit. Commit only dispatches; the verdict arrives later
//! through [`PendingCommit`].

use apkinst_errors::{InstallError, PlatformError};
use apkinst_events::{AppEvent, EventEmitter, InstallEvent};
use apkinst_platform::{Platform, PlatformContext};
use apkinst_types::{FileEntry, FileSource, InstallSession, SessionId};
use std::path::Path;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::oneshot;

use crate::api::result::PendingCommit;
use crate::inventory::open_entry;

/// Entry name used when a lone apk is installed
const SINGLE_ENTRY_NAME: &str = apkinst_config::constants::SINGLE_APK_ENTRY_NAME;

#[derive(Clone, Debug)]
pub struct SessionInstaller {
    platform: Platform,
    chunk_size: usize,
}

impl SessionInstaller {
    #[must_use]
    pub fn new(platform: Platform, chunk_size: usize) -> Self {
        Self {
            platform,
            chunk_size: chunk_size.max(1),
        }
    }

    /// Stream `entries` into one new session and commit it
    ///
    /// # Errors
    ///
    /// `WriteFailure` if any entry cannot be delivered in full (the session
    /// is abandoned and never committed), `CommitFailure` if the commit
    /// cannot be dispatched.
    pub async fn install(
        &self,
        ctx: &PlatformContext,
        entries: &[FileEntry],
    ) -> Result<PendingCommit, InstallError> {
        let total_size_bytes: u64 = entries.iter().map(FileEntry::size_bytes).sum();

        let id = self
            .platform
            .sessions()
            .create_session(ctx, total_size_bytes)
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

        let mut session = InstallSession::new(id, total_size_bytes);
        ctx.emit(AppEvent::Install(InstallEvent::SessionCreated {
            session_id: id.0,
            total_bytes: total_size_bytes,
            privileged: false,
        }));
        tracing::debug!(session = %id, total_size_bytes, entries = entries.len(), "install session created");

        for entry in entries {
            if let Err(err) = self.write_entry(ctx, &mut session, entry).await {
                self.abandon(ctx, id, &err).await;
                return Err(err);
            }
        }

        let (completion, receiver) = oneshot::channel();
        ctx.emit(AppEvent::Install(InstallEvent::CommitRequested { session_id: id.0 }));
        if let Err(e) = self.platform.sessions().commit(ctx, id, completion).await {
            let err = InstallError::CommitFailure {
                message: e.to_string(),
                output: Vec::new(),
            };
            self.abandon(ctx, id, &err).await;
            return Err(err);
        }

        Ok(PendingCommit::new(id, receiver))
    }

    /// Install a single apk as a one-entry session
    ///
    /// # Errors
    ///
    /// `WriteFailure` when the file cannot be read, otherwise as [`install`](Self::install).
    pub async fn install_single(
        &self,
        ctx: &PlatformContext,
        path: &Path,
        package: &str,
    ) -> Result<PendingCommit, InstallError> {
        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|e| InstallError::WriteFailure {
                name: path.display().to_string(),
                message: e.to_string(),
            })?;

        tracing::debug!(package, path = %path.display(), size = metadata.len(), "single apk install");
        let entry = FileEntry::new(
            SINGLE_ENTRY_NAME,
            metadata.len(),
            FileSource::Direct(path.to_path_buf()),
        );
        self.install(ctx, std::slice::from_ref(&entry)).await
    }

    async fn write_entry(
        &self,
        ctx: &PlatformContext,
        session: &mut InstallSession,
        entry: &FileEntry,
    ) -> Result<(), InstallError> {
        let write_failure = |message: String| InstallError::WriteFailure {
            name: entry.name().to_string(),
            message,
        };

        let mut source = open_entry(&self.platform, ctx, entry)
            .await
            .map_err(write_failure)?;

        let mut stream = self
            .platform
            .sessions()
            .open_write(ctx, session.id(), entry.name(), entry.size_bytes())
            .await
            .map_err(|e| write_failure(e.to_string()))?;

        let copied = copy_exact(&mut source, &mut *stream, self.chunk_size, entry.size_bytes())
            .await
            .map_err(write_failure)?;

        stream.fsync().await.map_err(|e| write_failure(e.to_string()))?;
        stream.close().await.map_err(|e| write_failure(e.to_string()))?;

        session.record_write(entry.name());
        ctx.emit(AppEvent::Install(InstallEvent::EntryWritten {
            session_id: session.id().0,
            name: entry.name().to_string(),
            bytes: copied,
        }));
        Ok(())
    }

    async fn abandon(&self, ctx: &PlatformContext, id: SessionId, err: &InstallError) {
        if let Err(e) = self.platform.sessions().abandon(ctx, id).await {
            tracing::warn!(session = %id, error = %e, "failed to abandon install session");
            ctx.emit_warning_with_context(format!("session {id} was not abandoned"), e.to_string());
        }
        ctx.emit(AppEvent::Install(InstallEvent::SessionAbandoned {
            session_id: id.0,
            reason: err.reason().to_string(),
        }));
    }
}

/// Copy exactly `declared` bytes in `chunk_size` pieces
///
/// A source that ends early or keeps going past `declared` is an error; the
/// installer would reject the entry anyway.
pub(crate) async fn copy_exact<R, W>(
    reader: &mut R,
    writer: &mut W,
    chunk_size: usize,
    declared: u64,
) -> Result<u64, String>
where
    R: AsyncRead + Unpin + ?Sized,
    W: AsyncWrite + Unpin + ?Sized,
{
    let mut buf = vec![0u8; chunk_size.max(1)];
    let mut copied = 0u64;

    loop {
        let read = reader.read(&mut buf).await.map_err(|e| e.to_string())?;
        if read == 0 {
            break;
        }
        copied += read as u64;
        if copied > declared {
            return Err(format!("source is larger than the declared {declared} bytes"));
        }
        writer
            .write_all(&buf[..read])
            .await
            .map_err(|e| e.to_string())?;
    }

    if copied < declared {
        return Err(format!("source ended after {copied} of {declared} bytes"));
    }
    Ok(copied)
}
