use serde::{Deserialize, Serialize};

use crate::EventSource;

pub mod general;
pub mod install;
pub mod patch;
pub mod platform;

pub use general::*;
pub use install::*;
pub use patch::*;
pub use platform::*;

/// Top-level application event enum that aggregates all domain-specific events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "domain", content = "event", rename_all = "snake_case")]
pub enum AppEvent {
    /// Warnings, debug notes and operation starts
    General(GeneralEvent),

    /// Inventory, sessions, reconciliation and terminal outcomes
    Install(InstallEvent),

    /// Bind-mount patch pipeline stages
    Patch(PatchEvent),

    /// Privileged shell and subprocess activity
    Platform(PlatformEvent),
}

impl AppEvent {
    /// Identify the source domain for this event.
    #[must_use]
    pub fn event_source(&self) -> EventSource {
        match self {
            Self::General(_) => EventSource::GENERAL,
            Self::Install(_) => EventSource::INSTALL,
            Self::Patch(_) => EventSource::PATCH,
            Self::Platform(_) => EventSource::PLATFORM,
        }
    }

    /// Determine the appropriate tracing log level for this event
    #[must_use]
    pub fn log_level(&self) -> tracing::Level {
        use tracing::Level;

        match self {
            Self::Install(InstallEvent::Failed { .. })
            | Self::Patch(PatchEvent::StageFailed { .. })
            | Self::Platform(
                PlatformEvent::ShellStartFailed { .. } | PlatformEvent::CommandFailed { .. },
            ) => Level::ERROR,

            Self::General(GeneralEvent::Warning { .. })
            | Self::Install(InstallEvent::SessionAbandoned { .. }) => Level::WARN,

            Self::General(GeneralEvent::DebugLog { .. })
            | Self::Install(InstallEvent::EntryWritten { .. })
            | Self::Platform(
                PlatformEvent::CommandStarted { .. } | PlatformEvent::CommandCompleted { .. },
            ) => Level::DEBUG,

            _ => Level::INFO,
        }
    }
}
