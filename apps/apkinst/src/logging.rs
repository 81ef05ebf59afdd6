//! Structured logging integration for events
//!
//! Converts every [`AppEvent`] into a tracing record with structured fields
//! so `--debug` JSON logs carry the full install history.

use apkinst_events::{AppEvent, EventMessage, GeneralEvent, InstallEvent, PatchEvent, PlatformEvent};
use tracing::{debug, error, info, warn};

/// Log an event at its own level with structured fields
pub fn log_event_with_tracing(message: &EventMessage) {
    let event = &message.event;
    let meta = &message.meta;

    match event {
        AppEvent::General(general) => match general {
            GeneralEvent::Warning { message, context } => {
                warn!(
                    source = meta.source.as_str(),
                    event_id = %meta.event_id,
                    context = ?context,
                    "{message}"
                );
            }
            GeneralEvent::DebugLog { message } => {
                debug!(
                    source = meta.source.as_str(),
                    event_id = %meta.event_id,
                    "{message}"
                );
            }
            GeneralEvent::OperationStarted { operation } => {
                info!(
                    source = meta.source.as_str(),
                    event_id = %meta.event_id,
                    operation = %operation,
                    "Operation started"
                );
            }
        },

        AppEvent::Install(install) => match install {
            InstallEvent::InventoryListed {
                directory,
                entries,
                total_bytes,
                privileged,
            } => {
                info!(
                    source = meta.source.as_str(),
                    event_id = %meta.event_id,
                    directory = %directory.display(),
                    entries,
                    total_bytes,
                    privileged,
                    "Inventory listed"
                );
            }
            InstallEvent::SessionCreated {
                session_id,
                total_bytes,
                privileged,
            } => {
                info!(
                    source = meta.source.as_str(),
                    event_id = %meta.event_id,
                    session_id,
                    total_bytes,
                    privileged,
                    "Install session created"
                );
            }
            InstallEvent::EntryWritten {
                session_id,
                name,
                bytes,
            } => {
                debug!(
                    source = meta.source.as_str(),
                    event_id = %meta.event_id,
                    session_id,
                    name = %name,
                    bytes,
                    "Session entry written"
                );
            }
            InstallEvent::CommitRequested { session_id } => {
                info!(
                    source = meta.source.as_str(),
                    event_id = %meta.event_id,
                    session_id,
                    "Session commit requested"
                );
            }
            InstallEvent::SessionAbandoned { session_id, reason } => {
                warn!(
                    source = meta.source.as_str(),
                    event_id = %meta.event_id,
                    session_id,
                    reason = %reason,
                    "Session abandoned"
                );
            }
            InstallEvent::Reconciled {
                package,
                installed,
                required,
                relation,
                strategy,
            } => {
                info!(
                    source = meta.source.as_str(),
                    event_id = %meta.event_id,
                    package = %package,
                    installed = ?installed,
                    required,
                    relation = ?relation,
                    strategy = %strategy,
                    "Installed package reconciled"
                );
            }
            InstallEvent::UninstallRequested { package } => {
                info!(
                    source = meta.source.as_str(),
                    event_id = %meta.event_id,
                    package = %package,
                    "Uninstall requested"
                );
            }
            InstallEvent::Succeeded { operation } => {
                info!(
                    source = meta.source.as_str(),
                    event_id = %meta.event_id,
                    operation = %operation,
                    "Install succeeded"
                );
            }
            InstallEvent::Failed { operation, reasons } => {
                error!(
                    source = meta.source.as_str(),
                    event_id = %meta.event_id,
                    operation = %operation,
                    reasons = ?reasons,
                    "Install failed"
                );
            }
        },

        AppEvent::Patch(patch) => match patch {
            PatchEvent::StageStarted { stage } => {
                info!(
                    source = meta.source.as_str(),
                    event_id = %meta.event_id,
                    stage = %stage,
                    "Patch stage started"
                );
            }
            PatchEvent::StageCompleted { stage } => {
                debug!(
                    source = meta.source.as_str(),
                    event_id = %meta.event_id,
                    stage = %stage,
                    "Patch stage completed"
                );
            }
            PatchEvent::StageFailed { stage, reasons } => {
                error!(
                    source = meta.source.as_str(),
                    event_id = %meta.event_id,
                    stage = %stage,
                    reasons = ?reasons,
                    "Patch stage failed"
                );
            }
            PatchEvent::DelegatedToInstall { strategy } => {
                info!(
                    source = meta.source.as_str(),
                    event_id = %meta.event_id,
                    strategy = %strategy,
                    "Patch delegated to a full install"
                );
            }
        },

        AppEvent::Platform(platform) => match platform {
            PlatformEvent::ShellStarted {
                program,
                duration_ms,
            } => {
                debug!(
                    source = meta.source.as_str(),
                    event_id = %meta.event_id,
                    program = %program,
                    duration_ms,
                    "Root shell started"
                );
            }
            PlatformEvent::ShellStartFailed {
                program,
                error_message,
            } => {
                error!(
                    source = meta.source.as_str(),
                    event_id = %meta.event_id,
                    program = %program,
                    error = %error_message,
                    "Root shell failed to start"
                );
            }
            PlatformEvent::ShellClosed { program } => {
                debug!(
                    source = meta.source.as_str(),
                    event_id = %meta.event_id,
                    program = %program,
                    "Root shell closed"
                );
            }
            PlatformEvent::CommandStarted { command } => {
                debug!(
                    source = meta.source.as_str(),
                    event_id = %meta.event_id,
                    command = %command,
                    "Command started"
                );
            }
            PlatformEvent::CommandCompleted {
                command,
                exit_code,
                duration_ms,
                output_lines,
            } => {
                debug!(
                    source = meta.source.as_str(),
                    event_id = %meta.event_id,
                    command = %command,
                    exit_code,
                    duration_ms,
                    output_lines,
                    "Command completed"
                );
            }
            PlatformEvent::CommandFailed {
                command,
                error_message,
                duration_ms,
            } => {
                error!(
                    source = meta.source.as_str(),
                    event_id = %meta.event_id,
                    command = %command,
                    error = %error_message,
                    duration_ms,
                    "Command failed"
                );
            }
        },
    }
}
