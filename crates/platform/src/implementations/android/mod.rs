//! Android implementation backed by `su`, `pm` and `dumpsys`

pub mod package;
pub mod process;
pub mod session;
pub mod shell;

use std::sync::Arc;
use std::time::Duration;

use package::PmPackageManager;
use process::AndroidProcessOperations;
use session::PmSessionBackend;
use shell::SuShell;

/// Android platform implementation
pub struct AndroidPlatform;

impl AndroidPlatform {
    /// Create the device platform
    ///
    /// `su_program` is only started on the first privileged command.
    #[allow(clippy::new_ret_no_self)]
    #[must_use]
    pub fn new(su_program: &str, startup_timeout: Duration, verbose: bool) -> crate::core::Platform {
        let process_ops: Arc<AndroidProcessOperations> = Arc::new(AndroidProcessOperations::new());

        crate::core::Platform::new(
            Arc::new(SuShell::new(su_program, startup_timeout).with_verbose(verbose)),
            Arc::new(PmPackageManager::new(process_ops.clone())),
            Arc::new(PmSessionBackend::new(process_ops)),
        )
    }
}
