//! Output rendering and formatting

use apkinst_types::{FileEntry, InstallOutcome, OutputFormat, PackageLocation, Reconciliation};
use comfy_table::{presets, Cell, ContentArrangement, Table};
use serde::Serialize;
use std::io;

/// Where a package lives and what a patch run would do with it
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub package: String,
    pub location: PackageLocation,
    pub installed_version: Option<u32>,
    pub version_name: Option<String>,
    pub required_version: Option<u32>,
    pub reconciliation: Option<Reconciliation>,
}

/// Result of one CLI command
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OperationResult {
    Outcome {
        operation: String,
        #[serde(flatten)]
        outcome: InstallOutcome,
    },
    Inventory { entries: Vec<FileEntry> },
    Status(StatusReport),
}

impl OperationResult {
    /// Failure reasons if this is a failed outcome
    pub fn failure(&self) -> Option<&[String]> {
        match self {
            Self::Outcome { outcome, .. } if !outcome.is_success() => {
                Some(outcome.failure_reasons())
            }
            _ => None,
        }
    }
}

/// Output renderer for CLI results
#[derive(Clone)]
pub struct OutputRenderer {
    format: OutputFormat,
}

impl OutputRenderer {
    /// Create new output renderer
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Render operation result
    pub fn render_result(&self, result: &OperationResult) -> io::Result<()> {
        match self.format {
            OutputFormat::Json => Self::render_json(result),
            OutputFormat::Tty | OutputFormat::Plain => self.render_text(result),
        }
    }

    fn render_json(result: &OperationResult) -> io::Result<()> {
        let json = serde_json::to_string_pretty(result).map_err(io::Error::other)?;
        println!("{json}");
        Ok(())
    }

    fn render_text(&self, result: &OperationResult) -> io::Result<()> {
        match result {
            OperationResult::Outcome { operation, outcome } => {
                if outcome.is_success() {
                    println!("{operation}: success");
                } else {
                    println!("{operation}: failure");
                    for reason in outcome.failure_reasons() {
                        println!("  {reason}");
                    }
                }
            }
            OperationResult::Inventory { entries } => self.render_inventory(entries),
            OperationResult::Status(report) => Self::render_status(report),
        }
        Ok(())
    }

    fn render_inventory(&self, entries: &[FileEntry]) {
        if entries.is_empty() {
            println!("No files found.");
            return;
        }

        let mut table = Table::new();
        table
            .load_preset(self.table_preset())
            .set_content_arrangement(ContentArrangement::Dynamic)
            .set_header(vec!["Name", "Size", "Apk", "Read via"]);

        for entry in entries {
            let via = if entry.source().is_privileged() {
                "root shell"
            } else {
                "direct"
            };
            table.add_row(vec![
                Cell::new(entry.name()),
                Cell::new(entry.size_bytes()),
                Cell::new(if entry.is_installable() { "yes" } else { "no" }),
                Cell::new(via),
            ]);
        }

        println!("{table}");
        let total: u64 = entries.iter().map(FileEntry::size_bytes).sum();
        println!("{} files, {total} bytes", entries.len());
    }

    fn render_status(report: &StatusReport) {
        println!("Package:   {}", report.package);
        match &report.location {
            PackageLocation::NotInstalled => println!("Location:  not installed"),
            PackageLocation::AppStorage(path) => println!("Location:  {}", path.display()),
            PackageLocation::Elsewhere(path) => {
                println!("Location:  {} (outside app storage)", path.display());
            }
        }
        if let Some(code) = report.installed_version {
            match &report.version_name {
                Some(name) => println!("Installed: {code} ({name})"),
                None => println!("Installed: {code}"),
            }
        }
        if let (Some(required), Some(decision)) = (report.required_version, &report.reconciliation) {
            println!("Required:  {required}");
            if decision.is_patch_target() {
                println!("Action:    patch in place");
            } else {
                println!("Action:    {} before patching", decision.strategy);
            }
        }
    }

    fn table_preset(&self) -> &'static str {
        match self.format {
            OutputFormat::Plain => presets::ASCII_MARKDOWN,
            _ => presets::UTF8_FULL,
        }
    }
}
