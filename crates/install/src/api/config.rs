use apkinst_config::{constants, Config};
use std::path::PathBuf;
use std::time::Duration;

/// Installer configuration
#[derive(Clone, Debug)]
pub struct InstallConfig {
    /// Package whose base apk is replaced on rooted installs
    pub target_package: String,
    /// Protected directory holding the relocated base apk
    pub store_dir: PathBuf,
    /// Boot script that re-applies the bind mount
    pub service_script: PathBuf,
    pub selinux_context: String,
    /// Candidate names of the patched base apk, later names win
    pub patch_apk_names: Vec<String>,
    /// Files never streamed into a privileged split install
    pub marker_files: Vec<String>,
    /// Delay between mounting and the final force-stop
    pub mount_settle: Duration,
    /// Copy buffer size for session writes
    pub chunk_size: usize,
    /// Keep patching after a delegated install
    pub continue_after_install: bool,
}

impl Default for InstallConfig {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl InstallConfig {
    /// Build from the loaded application configuration
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            target_package: config.general.target_package.clone(),
            store_dir: config.paths.store_dir.clone(),
            service_script: config.paths.service_script.clone(),
            selinux_context: config.root.selinux_context.clone(),
            patch_apk_names: config.root.patch_apk_names.clone(),
            marker_files: config.root.marker_files.clone(),
            mount_settle: config.mount_settle_delay(),
            chunk_size: config.session.chunk_size,
            continue_after_install: config.root.continue_after_install,
        }
    }

    /// Set the package to patch
    #[must_use]
    pub fn with_target_package(mut self, package: impl Into<String>) -> Self {
        self.target_package = package.into();
        self
    }

    /// Set the patch store directory
    #[must_use]
    pub fn with_store_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.store_dir = dir.into();
        self
    }

    #[must_use]
    pub fn with_service_script(mut self, path: impl Into<PathBuf>) -> Self {
        self.service_script = path.into();
        self
    }

    /// Set the delay after mounting
    #[must_use]
    pub fn with_mount_settle(mut self, settle: Duration) -> Self {
        self.mount_settle = settle;
        self
    }

    #[must_use]
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Continue into the patch stages after a delegated install
    #[must_use]
    pub fn with_continue_after_install(mut self, enable: bool) -> Self {
        self.continue_after_install = enable;
        self
    }

    /// Where the relocated base apk ends up
    #[must_use]
    pub fn patched_base_path(&self) -> PathBuf {
        self.store_dir.join(constants::PATCHED_BASE_NAME)
    }

    /// Whether `name` is a marker file excluded from split installs
    #[must_use]
    pub fn is_marker_file(&self, name: &str) -> bool {
        self.marker_files.iter().any(|marker| marker == name)
    }
}
