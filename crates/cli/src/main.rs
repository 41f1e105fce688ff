use anyhow::Result;
use clap::{Parser, Subcommand};
use crash_symbolicator::commands::{
    build_ids_command, init_config_command, inspect_command, normalize_command,
    save_path_command,
};
use tracing_subscriber::EnvFilter;

/// Crash report loader and pre-symbolication toolkit.
///
/// This CLI is a thin wrapper around `crashlog-core` (exposed in code as
/// `crashlog_core`). All substantive logic lives in the library.
#[derive(Parser, Debug)]
#[command(
    name = "crash-symbolicator",
    version,
    about = "Load crash reports and list what a symbolicator needs",
    long_about = None
)]
struct Cli {
    /// Enable debug logging on stderr (overridden by RUST_LOG).
    #[arg(long, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Summarize a crash report: format, processes, images and build identifiers.
    Inspect {
        /// Path to the crash report (.crash, .ips, .json, ...).
        #[arg(long)]
        report: String,

        /// Emit JSON instead of human-readable text.
        #[arg(long, default_value_t = false)]
        json: bool,

        /// Optional config file (.json, .yaml or .yml).
        #[arg(long)]
        config: Option<String>,
    },

    /// Print the build identifiers to symbolicate, one per line.
    BuildIds {
        #[arg(long)]
        report: String,

        #[arg(long)]
        config: Option<String>,
    },

    /// Print (or write) the canonical crash-log text of a report.
    Normalize {
        #[arg(long)]
        report: String,

        /// Write to this file instead of stdout.
        #[arg(long)]
        output: Option<String>,

        #[arg(long)]
        config: Option<String>,
    },

    /// Print the suggested output path for the symbolicated report.
    SavePath {
        #[arg(long)]
        report: String,

        #[arg(long)]
        config: Option<String>,
    },

    /// Write a default config file.
    InitConfig {
        /// Destination; the extension selects JSON or YAML.
        #[arg(long)]
        path: String,

        /// Overwrite an existing file.
        #[arg(long, default_value_t = false)]
        force: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_env("RUST_LOG").unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    match cli.command {
        Command::Inspect { report, json, config } => {
            inspect_command(&report, json, config.as_deref())?
        }
        Command::BuildIds { report, config } => build_ids_command(&report, config.as_deref())?,
        Command::Normalize { report, output, config } => {
            normalize_command(&report, output.as_deref(), config.as_deref())?
        }
        Command::SavePath { report, config } => save_path_command(&report, config.as_deref())?,
        Command::InitConfig { path, force } => init_config_command(&path, force)?,
    }

    Ok(())
}
