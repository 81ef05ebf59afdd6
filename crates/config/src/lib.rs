#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Configuration management for apkinst
//!
//! This crate handles loading and merging configuration from:
//! - Default values (hard-coded)
//! - Configuration file (~/.config/apkinst/config.toml)
//! - Environment variables
//! - CLI flags

pub mod constants;

use apkinst_errors::{ConfigError, Error};
use apkinst_types::OutputFormat;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,

    #[serde(default)]
    pub paths: PathConfig,

    #[serde(default)]
    pub shell: ShellConfig,

    #[serde(default)]
    pub root: RootConfig,

    #[serde(default)]
    pub session: SessionConfig,
}

/// General configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    #[serde(default)]
    pub default_output: OutputFormat,
    /// Package whose base apk is replaced on rooted installs
    #[serde(default = "default_target_package")]
    pub target_package: String,
    /// Directory holding the downloaded apks
    #[serde(default)]
    pub apk_dir: Option<PathBuf>,
}

/// Persistent patch artifact locations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathConfig {
    #[serde(default = "default_store_dir")]
    pub store_dir: PathBuf,
    #[serde(default = "default_service_script")]
    pub service_script: PathBuf,
}

/// Privileged shell configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShellConfig {
    #[serde(default = "default_su_program")]
    pub program: String,
    #[serde(default = "default_startup_timeout")]
    pub startup_timeout_secs: u64,
    /// Log every command and its output at debug level
    #[serde(default)]
    pub verbose: bool,
}

/// Rooted install configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RootConfig {
    /// Candidate names of the patched base apk, later names win
    #[serde(default = "default_patch_apk_names")]
    pub patch_apk_names: Vec<String>,
    /// Files never streamed into a privileged split install
    #[serde(default = "default_marker_files")]
    pub marker_files: Vec<String>,
    #[serde(default = "default_selinux_context")]
    pub selinux_context: String,
    #[serde(default = "default_mount_settle_ms")]
    pub mount_settle_ms: u64,
    /// Keep patching after a delegated install instead of stopping there
    #[serde(default)]
    pub continue_after_install: bool,
    #[serde(default)]
    pub required_version_code: Option<u32>,
}

/// Installer session configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
}

// Default implementations

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            default_output: OutputFormat::Tty,
            target_package: default_target_package(),
            apk_dir: None,
        }
    }
}

impl Default for PathConfig {
    fn default() -> Self {
        Self {
            store_dir: default_store_dir(),
            service_script: default_service_script(),
        }
    }
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            program: default_su_program(),
            startup_timeout_secs: default_startup_timeout(),
            verbose: false,
        }
    }
}

impl Default for RootConfig {
    fn default() -> Self {
        Self {
            patch_apk_names: default_patch_apk_names(),
            marker_files: default_marker_files(),
            selinux_context: default_selinux_context(),
            mount_settle_ms: default_mount_settle_ms(),
            continue_after_install: false,
            required_version_code: None,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
        }
    }
}

// Default value functions for serde
fn default_target_package() -> String {
    constants::DEFAULT_TARGET_PACKAGE.to_string()
}

fn default_store_dir() -> PathBuf {
    PathBuf::from(constants::PATCH_STORE_DIR)
}

fn default_service_script() -> PathBuf {
    PathBuf::from(constants::SERVICE_SCRIPT_PATH)
}

fn default_su_program() -> String {
    "su".to_string()
}

fn default_startup_timeout() -> u64 {
    10
}

fn default_patch_apk_names() -> Vec<String> {
    vec!["dark.apk".to_string(), "black.apk".to_string()]
}

fn default_marker_files() -> Vec<String> {
    vec![
        "black.apk".to_string(),
        "dark.apk".to_string(),
        "hash.json".to_string(),
    ]
}

fn default_selinux_context() -> String {
    constants::APK_DATA_FILE_CONTEXT.to_string()
}

fn default_mount_settle_ms() -> u64 {
    500
}

fn default_chunk_size() -> usize {
    constants::SESSION_CHUNK_SIZE
}

impl Config {
    /// Get the default config file path
    ///
    /// # Errors
    ///
    /// Returns an error if the system config directory cannot be determined.
    pub fn default_path() -> Result<PathBuf, Error> {
        let config_dir = dirs::config_dir().ok_or_else(|| ConfigError::NotFound {
            path: "config directory".to_string(),
        })?;
        Ok(config_dir.join("apkinst").join("config.toml"))
    }

    /// Directory for debug log files
    ///
    /// Falls back to the temp directory, which on a device is the shell's
    /// writable `/data/local/tmp`.
    #[must_use]
    pub fn log_dir() -> PathBuf {
        dirs::cache_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("apkinst")
            .join("logs")
    }

    /// Load configuration from file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or contains invalid TOML.
    pub async fn load_from_file(path: &Path) -> Result<Self, Error> {
        let contents = fs::read_to_string(path)
            .await
            .map_err(|_| ConfigError::NotFound {
                path: path.display().to_string(),
            })?;

        Ok(toml::from_str(&contents)?)
    }

    /// Load configuration with fallback to defaults
    ///
    /// On a device without a home config directory this quietly falls back
    /// to defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file exists but cannot be read
    /// or parsed.
    pub async fn load() -> Result<Self, Error> {
        let Ok(config_path) = Self::default_path() else {
            tracing::debug!("no config directory, using defaults");
            return Ok(Self::default());
        };

        if config_path.exists() {
            Self::load_from_file(&config_path).await
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from an optional path or use default
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be read or parsed
    pub async fn load_or_default(path: Option<&Path>) -> Result<Self, Error> {
        match path {
            Some(config_path) => Self::load_from_file(config_path).await,
            None => Self::load().await,
        }
    }

    /// Merge with environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if environment variables contain invalid values.
    pub fn merge_env(&mut self) -> Result<(), Error> {
        if let Ok(output) = std::env::var("APKINST_OUTPUT") {
            self.general.default_output = match output.as_str() {
                "plain" => OutputFormat::Plain,
                "tty" => OutputFormat::Tty,
                "json" => OutputFormat::Json,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        field: "APKINST_OUTPUT".to_string(),
                        value: output,
                    }
                    .into())
                }
            };
        }

        if let Ok(package) = std::env::var("APKINST_TARGET_PACKAGE") {
            if package.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: "APKINST_TARGET_PACKAGE".to_string(),
                    value: package,
                }
                .into());
            }
            self.general.target_package = package;
        }

        if let Ok(dir) = std::env::var("APKINST_APK_DIR") {
            self.general.apk_dir = Some(PathBuf::from(dir));
        }

        if let Ok(program) = std::env::var("APKINST_SU") {
            self.shell.program = program;
        }

        if let Ok(timeout) = std::env::var("APKINST_SHELL_TIMEOUT") {
            self.shell.startup_timeout_secs =
                timeout.parse().map_err(|_| ConfigError::InvalidValue {
                    field: "APKINST_SHELL_TIMEOUT".to_string(),
                    value: timeout,
                })?;
        }

        if let Ok(settle) = std::env::var("APKINST_SETTLE_MS") {
            self.root.mount_settle_ms = settle.parse().map_err(|_| ConfigError::InvalidValue {
                field: "APKINST_SETTLE_MS".to_string(),
                value: settle,
            })?;
        }

        if let Ok(value) = std::env::var("APKINST_CONTINUE_AFTER_INSTALL") {
            self.root.continue_after_install = match value.as_str() {
                "true" | "1" | "yes" => true,
                "false" | "0" | "no" => false,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        field: "APKINST_CONTINUE_AFTER_INSTALL".to_string(),
                        value,
                    }
                    .into())
                }
            };
        }

        Ok(())
    }

    /// Full path of the relocated base apk inside the store
    #[must_use]
    pub fn patched_base_path(&self) -> PathBuf {
        self.paths.store_dir.join(constants::PATCHED_BASE_NAME)
    }

    #[must_use]
    pub fn shell_startup_timeout(&self) -> Duration {
        Duration::from_secs(self.shell.startup_timeout_secs)
    }

    #[must_use]
    pub fn mount_settle_delay(&self) -> Duration {
        Duration::from_millis(self.root.mount_settle_ms)
    }
}
