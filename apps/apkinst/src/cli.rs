//! Command line interface definition

use apkinst_types::OutputFormat;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// apkinst - split-apk installer and root base-apk patcher
#[derive(Parser)]
#[command(name = "apkinst")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Split-apk installer and root base-apk patcher for Android")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[command(flatten)]
    pub global: GlobalArgs,
}

/// Global arguments available for all commands
#[derive(Parser)]
pub struct GlobalArgs {
    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Enable debug logging to the apkinst log directory
    #[arg(long, global = true)]
    pub debug: bool,

    /// Output format (overrides the config file)
    #[arg(long, global = true, value_enum, conflicts_with = "json")]
    pub output: Option<OutputFormat>,

    /// Use alternate config file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Program used to obtain the root shell
    #[arg(long, global = true, value_name = "PROGRAM")]
    pub su: Option<String>,
}

/// Available commands
#[derive(Subcommand)]
pub enum Commands {
    /// Install every apk of a directory as one split package
    #[command(alias = "i")]
    Install {
        /// Directory holding the base and split apks (default: general.apk_dir)
        dir: Option<PathBuf>,
    },

    /// Install a single apk
    InstallSingle {
        /// Path to the apk
        apk: PathBuf,

        /// Package name the apk installs
        #[arg(long, short)]
        package: String,
    },

    /// Replace the installed base apk with a patched one (requires root)
    RootInstall {
        /// Directory holding the base, splits and patched apks (default: general.apk_dir)
        dir: Option<PathBuf>,

        /// Version code the patched apk was built against (default: root.required_version_code)
        #[arg(long, value_name = "CODE")]
        version_code: Option<u32>,

        /// Package to patch (default: general.target_package)
        #[arg(long, short)]
        package: Option<String>,

        /// Continue to the mount after a reinstall instead of stopping
        #[arg(long)]
        continue_after_install: bool,

        /// Delay after the bind mount in milliseconds
        #[arg(long, value_name = "MS")]
        settle_ms: Option<u64>,
    },

    /// Uninstall a package
    #[command(alias = "rm")]
    Uninstall {
        /// Package name
        package: String,
    },

    /// List the package files of a directory
    #[command(alias = "ls")]
    Inventory {
        /// Directory to list (default: general.apk_dir)
        dir: Option<PathBuf>,
    },

    /// Show where a package is installed and how a patch would proceed
    Status {
        /// Package name (default: general.target_package)
        package: Option<String>,

        /// Required version code to reconcile against
        #[arg(long, value_name = "CODE")]
        version_code: Option<u32>,
    },
}

impl Commands {
    /// Operation name used in logs and terminal events
    pub fn name(&self) -> &'static str {
        match self {
            Self::Install { .. } => "install",
            Self::InstallSingle { .. } => "install-single",
            Self::RootInstall { .. } => "root-install",
            Self::Uninstall { .. } => "uninstall",
            Self::Inventory { .. } => "inventory",
            Self::Status { .. } => "status",
        }
    }
}
