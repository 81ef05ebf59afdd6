//! Core platform abstractions and context management

use apkinst_errors::PlatformError;
use apkinst_events::{EventEmitter, EventSender, PlatformEvent};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::package::PackageManager;
use crate::session::SessionBackend;
use crate::shell::PrivilegedShell;

/// Context for platform operations, carrying the event channel
#[derive(Clone, Default)]
pub struct PlatformContext {
    event_sender: Option<EventSender>,
}

impl PlatformContext {
    /// Create a new platform context with event emission capabilities
    #[must_use]
    pub fn new(event_sender: Option<EventSender>) -> Self {
        Self { event_sender }
    }

    /// Run a command future, emitting started and completed/failed events
    ///
    /// The future yields the exit code and captured lines; the lines are
    /// only counted here, the caller keeps them.
    ///
    /// # Errors
    ///
    /// Propagates the error produced by `f`.
    pub async fn execute_with_events<T, F>(
        &self,
        command: &str,
        f: F,
    ) -> Result<T, PlatformError>
    where
        F: Future<Output = Result<T, PlatformError>>,
        T: CommandResult,
    {
        let start = Instant::now();
        self.emit_platform(PlatformEvent::CommandStarted {
            command: command.to_string(),
        });

        let result = f.await;
        let duration_ms = duration_to_millis(start.elapsed());

        match &result {
            Ok(output) => self.emit_platform(PlatformEvent::CommandCompleted {
                command: command.to_string(),
                exit_code: output.exit_code(),
                duration_ms,
                output_lines: output.line_count(),
            }),
            Err(e) => self.emit_platform(PlatformEvent::CommandFailed {
                command: command.to_string(),
                error_message: e.to_string(),
                duration_ms,
            }),
        }

        result
    }
}

impl EventEmitter for PlatformContext {
    fn event_sender(&self) -> Option<&EventSender> {
        self.event_sender.as_ref()
    }
}

impl std::fmt::Debug for PlatformContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlatformContext")
            .field("has_event_sender", &self.event_sender.is_some())
            .finish()
    }
}

/// Anything `execute_with_events` can summarise in a completion event
pub trait CommandResult {
    fn exit_code(&self) -> i32;
    fn line_count(&self) -> usize;
}

pub(crate) fn duration_to_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Main platform abstraction providing access to all platform operations
#[derive(Clone)]
pub struct Platform {
    shell: Arc<dyn PrivilegedShell>,
    packages: Arc<dyn PackageManager>,
    sessions: Arc<dyn SessionBackend>,
}

impl Platform {
    /// Create a new platform instance with the specified implementations
    pub fn new(
        shell: Arc<dyn PrivilegedShell>,
        packages: Arc<dyn PackageManager>,
        sessions: Arc<dyn SessionBackend>,
    ) -> Self {
        Self {
            shell,
            packages,
            sessions,
        }
    }

    /// Access the privileged shell
    #[must_use]
    pub fn shell(&self) -> &dyn PrivilegedShell {
        &*self.shell
    }

    /// Access structured package manager operations
    #[must_use]
    pub fn packages(&self) -> &dyn PackageManager {
        &*self.packages
    }

    /// Access installer session operations
    #[must_use]
    pub fn sessions(&self) -> &dyn SessionBackend {
        &*self.sessions
    }

    /// Create a platform context with event emission
    #[must_use]
    pub fn create_context(&self, event_sender: Option<EventSender>) -> PlatformContext {
        PlatformContext::new(event_sender)
    }

    /// Tear down the privileged shell if it was started
    ///
    /// # Errors
    ///
    /// Returns an error if the shell could not be shut down cleanly.
    pub async fn close(&self, ctx: &PlatformContext) -> Result<(), PlatformError> {
        self.shell.close(ctx).await
    }
}

impl std::fmt::Debug for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Platform").finish_non_exhaustive()
    }
}
