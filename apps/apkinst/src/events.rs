//! Event handling and progress display

use apkinst_events::{AppEvent, EventMessage, GeneralEvent, InstallEvent, PatchEvent, PlatformEvent};
use console::{style, Term};

/// Turns install events into status lines on stderr
pub struct EventHandler {
    term: Term,
    /// Status lines are suppressed entirely (JSON output)
    quiet: bool,
    colors: bool,
    debug: bool,
}

impl EventHandler {
    /// Create new event handler
    pub fn new(quiet: bool, colors: bool, debug: bool) -> Self {
        Self {
            term: Term::stderr(),
            quiet,
            colors,
            debug,
        }
    }

    /// Handle incoming event
    pub fn handle_event(&mut self, message: EventMessage) {
        crate::logging::log_event_with_tracing(&message);

        if self.quiet {
            return;
        }

        match message.event {
            AppEvent::General(GeneralEvent::Warning { message, context }) => match context {
                Some(context) => self.show_warning(&format!("{message} ({context})")),
                None => self.show_warning(&message),
            },
            AppEvent::General(GeneralEvent::DebugLog { message }) => {
                if self.debug {
                    self.show_status(&message);
                }
            }
            AppEvent::General(GeneralEvent::OperationStarted { .. }) => {}

            AppEvent::Install(install) => self.handle_install(install),
            AppEvent::Patch(patch) => self.handle_patch(patch),
            AppEvent::Platform(platform) => self.handle_platform(platform),
        }
    }

    fn handle_install(&self, event: InstallEvent) {
        match event {
            InstallEvent::InventoryListed {
                directory,
                entries,
                total_bytes,
                privileged,
            } => {
                let via = if privileged { " via root shell" } else { "" };
                self.show_status(&format!(
                    "Found {entries} files ({total_bytes} bytes) in {}{via}",
                    directory.display()
                ));
            }
            InstallEvent::SessionCreated {
                session_id,
                total_bytes,
                ..
            } => {
                self.show_status(&format!(
                    "Created install session {session_id} for {total_bytes} bytes"
                ));
            }
            InstallEvent::EntryWritten { name, bytes, .. } => {
                self.show_status(&format!("  wrote {name} ({bytes} bytes)"));
            }
            InstallEvent::CommitRequested { session_id } => {
                self.show_status(&format!("Committing session {session_id}"));
            }
            InstallEvent::SessionAbandoned { session_id, reason } => {
                self.show_warning(&format!("Abandoned session {session_id}: {reason}"));
            }
            InstallEvent::Reconciled {
                package,
                installed,
                required,
                strategy,
                ..
            } => {
                let installed = installed.map_or_else(|| "unknown".to_string(), |v| v.to_string());
                self.show_status(&format!(
                    "{package}: installed {installed}, required {required} ({strategy})"
                ));
            }
            InstallEvent::UninstallRequested { package } => {
                self.show_status(&format!("Uninstalling {package}"));
            }
            InstallEvent::Succeeded { operation } => {
                self.show_success(&format!("{operation} succeeded"));
            }
            InstallEvent::Failed { operation, reasons } => {
                self.show_error(&format!("{operation} failed: {}", reasons.join("; ")));
            }
        }
    }

    fn handle_patch(&self, event: PatchEvent) {
        match event {
            PatchEvent::StageStarted { stage } => self.show_status(&format!("[{stage}]")),
            PatchEvent::StageCompleted { .. } => {}
            PatchEvent::StageFailed { stage, reasons } => {
                self.show_error(&format!("[{stage}] failed: {}", reasons.join("; ")));
            }
            PatchEvent::DelegatedToInstall { strategy } => {
                self.show_status(&format!("Performed {strategy}; nothing to mount"));
            }
        }
    }

    fn handle_platform(&self, event: PlatformEvent) {
        match event {
            PlatformEvent::ShellStartFailed {
                program,
                error_message,
            } => self.show_error(&format!("Could not start {program}: {error_message}")),
            PlatformEvent::CommandStarted { command } if self.debug => {
                self.show_status(&format!("$ {command}"));
            }
            _ => {}
        }
    }

    fn show_status(&self, message: &str) {
        let _ = self.term.write_line(message);
    }

    fn show_success(&self, message: &str) {
        let line = if self.colors {
            style(message).green().to_string()
        } else {
            message.to_string()
        };
        let _ = self.term.write_line(&line);
    }

    fn show_warning(&self, message: &str) {
        let line = if self.colors {
            style(format!("warning: {message}")).yellow().to_string()
        } else {
            format!("warning: {message}")
        };
        let _ = self.term.write_line(&line);
    }

    fn show_error(&self, message: &str) {
        let line = if self.colors {
            style(format!("error: {message}")).red().to_string()
        } else {
            format!("error: {message}")
        };
        let _ = self.term.write_line(&line);
    }
}
