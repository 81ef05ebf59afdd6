//! Component wiring from the merged configuration

use apkinst_config::Config;
use apkinst_install::{InstallConfig, Installer};
use apkinst_platform::{AndroidPlatform, Platform, PlatformContext};
use tracing::{debug, warn};

/// Device platform and installer built once per invocation
pub struct AppSetup {
    platform: Platform,
    installer: Installer,
}

impl AppSetup {
    /// Build the Android platform and installer
    ///
    /// Nothing is spawned here; the root shell starts on first use.
    pub fn new(config: &Config) -> Self {
        debug!(
            su = %config.shell.program,
            timeout_secs = config.shell.startup_timeout_secs,
            "initializing platform"
        );
        let platform = AndroidPlatform::new(
            &config.shell.program,
            config.shell_startup_timeout(),
            config.shell.verbose,
        );
        let installer = Installer::new(InstallConfig::from_config(config), platform.clone());

        Self {
            platform,
            installer,
        }
    }

    pub fn platform(&self) -> &Platform {
        &self.platform
    }

    pub fn installer(&self) -> &Installer {
        &self.installer
    }

    /// Tear down the root shell if one was started
    pub async fn shutdown(&self, ctx: &PlatformContext) {
        if let Err(e) = self.platform.close(ctx).await {
            warn!(error = %e, "failed to close root shell");
        }
    }
}
