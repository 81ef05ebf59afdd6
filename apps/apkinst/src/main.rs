//! apkinst - split-apk installer and root base-apk patcher
//!
//! This is the CLI front end. It merges configuration, wires the Android
//! platform into the installer and turns the event stream into logs and
//! status lines.

mod cli;
mod display;
mod error;
mod events;
mod logging;
mod setup;

use crate::cli::{Cli, Commands};
use crate::display::{OperationResult, OutputRenderer, StatusReport};
use crate::error::CliError;
use crate::events::EventHandler;
use crate::setup::AppSetup;
use apkinst_config::Config;
use apkinst_events::EventReceiver;
use apkinst_platform::PlatformContext;
use apkinst_types::{OutputFormat, VersionCode};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::process;
use tokio::select;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    // Parse command line arguments first to check for JSON mode
    let cli = Cli::parse();
    let json_mode = cli.global.json || cli.global.output == Some(OutputFormat::Json);

    init_tracing(json_mode, cli.global.debug);

    if let Err(e) = run(cli).await {
        error!("Application error: {}", e);
        if !json_mode {
            eprintln!("Error: {e}");
        }
        process::exit(1);
    }
}

/// Main application logic
async fn run(cli: Cli) -> Result<(), CliError> {
    info!("Starting apkinst v{}", env!("CARGO_PKG_VERSION"));

    // file (or defaults), then environment, then CLI flags
    let mut config = Config::load_or_default(cli.global.config.as_deref()).await?;
    config.merge_env()?;
    apply_cli_config(&mut config, &cli.global, &cli.command);

    let format = config.general.default_output;
    let setup = AppSetup::new(&config);

    let (event_sender, event_receiver) = apkinst_events::channel();
    let ctx = setup.platform().create_context(Some(event_sender));

    let colors = format == OutputFormat::Tty && console::Term::stderr().features().colors_supported();
    let mut event_handler = EventHandler::new(format == OutputFormat::Json, colors, cli.global.debug);

    let operation = cli.command.name();
    let result = execute_command_with_events(
        execute_command(cli.command, &config, &setup, &ctx),
        event_receiver,
        &mut event_handler,
    )
    .await;

    setup.shutdown(&ctx).await;
    let result = result?;

    OutputRenderer::new(format).render_result(&result)?;

    if let Some(reasons) = result.failure() {
        return Err(CliError::Failed {
            operation,
            reasons: reasons.to_vec(),
        });
    }

    info!("Command completed successfully");
    Ok(())
}

/// Execute command with concurrent event handling
async fn execute_command_with_events<F>(
    command_future: F,
    mut event_receiver: EventReceiver,
    event_handler: &mut EventHandler,
) -> Result<OperationResult, CliError>
where
    F: std::future::Future<Output = Result<OperationResult, CliError>>,
{
    let mut command_future = Box::pin(command_future);

    loop {
        select! {
            result = &mut command_future => {
                // Drain any remaining events
                while let Ok(message) = event_receiver.try_recv() {
                    event_handler.handle_event(message);
                }
                return result;
            }

            message = event_receiver.recv() => {
                match message {
                    Some(message) => event_handler.handle_event(message),
                    None => { /* Channel closed: keep waiting for command to finish */ }
                }
            }
        }
    }
}

/// Execute the specified command
async fn execute_command(
    command: Commands,
    config: &Config,
    setup: &AppSetup,
    ctx: &PlatformContext,
) -> Result<OperationResult, CliError> {
    let installer = setup.installer();
    let operation = command.name().to_string();

    match command {
        Commands::Install { dir } => {
            let dir = apk_dir(dir, config)?;
            let outcome = installer.install_split(ctx, &dir).await;
            Ok(OperationResult::Outcome { operation, outcome })
        }

        Commands::InstallSingle { apk, package } => {
            let outcome = installer.install_single(ctx, &apk, &package).await;
            Ok(OperationResult::Outcome { operation, outcome })
        }

        Commands::RootInstall {
            dir, version_code, ..
        } => {
            let dir = apk_dir(dir, config)?;
            let required = version_code
                .or(config.root.required_version_code)
                .ok_or_else(|| {
                    CliError::InvalidArguments(
                        "--version-code is required (or set root.required_version_code)".to_string(),
                    )
                })?;
            let outcome = installer
                .install_root(ctx, &dir, VersionCode(required))
                .await;
            Ok(OperationResult::Outcome { operation, outcome })
        }

        Commands::Uninstall { package } => {
            let outcome = installer.uninstall(ctx, &package).await;
            Ok(OperationResult::Outcome { operation, outcome })
        }

        Commands::Inventory { dir } => {
            let dir = apk_dir(dir, config)?;
            let entries = installer.inventory().list(ctx, &dir).await?;
            Ok(OperationResult::Inventory { entries })
        }

        Commands::Status {
            package,
            version_code,
        } => {
            let package = package.unwrap_or_else(|| config.general.target_package.clone());
            let report = status(setup, ctx, &package, version_code).await;
            Ok(OperationResult::Status(report))
        }
    }
}

async fn status(
    setup: &AppSetup,
    ctx: &PlatformContext,
    package: &str,
    required: Option<u32>,
) -> StatusReport {
    let lookup = setup.installer().lookup();

    let (location, installed_version, reconciliation) = match required {
        Some(required) => {
            let (location, decision) = lookup.reconcile(ctx, package, VersionCode(required)).await;
            let installed = lookup.installed_version(ctx, package).await;
            (location, installed, Some(decision))
        }
        None => {
            let location = lookup.package_location(ctx, package).await;
            let installed = lookup.installed_version(ctx, package).await;
            (location, installed, None)
        }
    };

    StatusReport {
        package: package.to_string(),
        location,
        installed_version: installed_version.map(VersionCode::get),
        version_name: lookup.version_name(ctx, package).await,
        required_version: required,
        reconciliation,
    }
}

fn apk_dir(dir: Option<PathBuf>, config: &Config) -> Result<PathBuf, CliError> {
    dir.or_else(|| config.general.apk_dir.clone()).ok_or_else(|| {
        CliError::InvalidArguments(
            "no apk directory given and general.apk_dir is not set".to_string(),
        )
    })
}

/// Apply CLI configuration overrides (highest precedence)
fn apply_cli_config(config: &mut Config, global: &cli::GlobalArgs, command: &Commands) {
    if global.json {
        config.general.default_output = OutputFormat::Json;
    } else if let Some(format) = global.output {
        config.general.default_output = format;
    }

    if let Some(program) = &global.su {
        config.shell.program.clone_from(program);
    }
    if global.debug {
        config.shell.verbose = true;
    }

    if let Commands::RootInstall {
        package,
        continue_after_install,
        settle_ms,
        ..
    } = command
    {
        if let Some(package) = package {
            config.general.target_package.clone_from(package);
        }
        if *continue_after_install {
            config.root.continue_after_install = true;
        }
        if let Some(settle_ms) = settle_ms {
            config.root.mount_settle_ms = *settle_ms;
        }
    }
}

/// Initialize tracing/logging
fn init_tracing(json_mode: bool, debug_enabled_flag: bool) {
    let debug_enabled = std::env::var("RUST_LOG").is_ok() || debug_enabled_flag;
    let debug_filter = || {
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            tracing_subscriber::EnvFilter::new(
                "info,apkinst=debug,apkinst_install=debug,apkinst_platform=debug",
            )
        })
    };

    if debug_enabled {
        // structured JSON logs to a file; stdout stays clean for results
        if let Some(file) = create_log_file(&Config::log_dir()) {
            tracing_subscriber::fmt()
                .json()
                .with_writer(file.0)
                .with_env_filter(debug_filter())
                .init();
            if !json_mode {
                eprintln!("Debug logging enabled: {}", file.1.display());
            }
            return;
        }
    }

    if json_mode {
        // nothing on the console may interleave with the JSON result
        tracing_subscriber::fmt()
            .with_writer(std::io::sink)
            .with_env_filter("off")
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .init();
    }
}

fn create_log_file(log_dir: &Path) -> Option<(std::fs::File, PathBuf)> {
    if let Err(e) = std::fs::create_dir_all(log_dir) {
        eprintln!("Warning: Failed to create log directory: {e}");
        return None;
    }

    let log_file = log_dir.join(format!(
        "apkinst-{}.log",
        chrono::Utc::now().format("%Y%m%d-%H%M%S")
    ));
    match std::fs::File::create(&log_file) {
        Ok(file) => Some((file, log_file)),
        Err(e) => {
            eprintln!("Warning: Failed to create log file: {e}");
            None
        }
    }
}
