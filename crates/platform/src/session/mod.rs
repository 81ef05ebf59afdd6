//! Installer session protocol

use apkinst_errors::PlatformError;
use apkinst_types::{InstallOutcome, SessionId};
use async_trait::async_trait;
use tokio::io::AsyncWrite;
use tokio::sync::oneshot;

use crate::core::PlatformContext;

/// Write stream for one named entry of an open session
#[async_trait]
pub trait SessionStream: AsyncWrite + Send + Unpin {
    /// Flush everything written so far to the installer
    async fn fsync(&mut self) -> Result<(), PlatformError>;

    /// Finish the entry; the installer rejects it if the byte count is off
    async fn close(self: Box<Self>) -> Result<(), PlatformError>;
}

/// The OS package-installer session API
///
/// A session is created with its total size, receives one write stream per
/// entry, and ends in exactly one of `commit` or `abandon`.
#[async_trait]
pub trait SessionBackend: Send + Sync {
    async fn create_session(
        &self,
        ctx: &PlatformContext,
        total_size_bytes: u64,
    ) -> Result<SessionId, PlatformError>;

    /// Open a write stream for `name`, starting at offset 0, of `size_bytes` bytes
    async fn open_write(
        &self,
        ctx: &PlatformContext,
        session: SessionId,
        name: &str,
        size_bytes: u64,
    ) -> Result<Box<dyn SessionStream>, PlatformError>;

    /// Hand the session to the installer
    ///
    /// Returns once the commit is dispatched. The installer's verdict is
    /// delivered later on `completion`.
    async fn commit(
        &self,
        ctx: &PlatformContext,
        session: SessionId,
        completion: oneshot::Sender<InstallOutcome>,
    ) -> Result<(), PlatformError>;

    async fn abandon(&self, ctx: &PlatformContext, session: SessionId) -> Result<(), PlatformError>;
}

/// Session id from `pm install-create` output: the first run of digits
///
/// `pm` answers `Success: created install session [1234567]`.
#[must_use]
pub fn parse_session_id(output: &str) -> Option<SessionId> {
    let start = output.find(|c: char| c.is_ascii_digit())?;
    let digits: String = output[start..]
        .chars()
        .take_while(char::is_ascii_digit)
        .collect();
    digits.parse().ok().map(SessionId)
}
