//! FleetSync CLI - Command-line interface for FleetSync
//!
//! Provides commands for:
//! - Running a one-shot sync pass
//! - Viewing replica and remote status
//! - Editing vehicle records with post-mutation sync
//! - Viewing and validating configuration

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod app;
mod commands;
mod output;

use commands::{
    completions::CompletionsCommand, config::ConfigCommand, records::RecordsCommand,
    status::StatusCommand, sync::SyncCommand,
};
use output::OutputFormat;

#[derive(Debug, Parser)]
#[command(name = "fleetsync", version, about = "Offline-first fleet record synchronization")]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    json: bool,

    /// Verbose output (can be repeated: -v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Use alternate config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run one synchronization pass now
    Sync(SyncCommand),
    /// Show local replica and remote status
    Status(StatusCommand),
    /// Create, delete, restore and toggle vehicle records
    Records(RecordsCommand),
    /// View and manage configuration
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Generate shell completions
    Completions(CompletionsCommand),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Human
    };
    let config = cli.config.as_deref();

    match cli.command {
        Commands::Sync(cmd) => cmd.execute(config, format).await,
        Commands::Status(cmd) => cmd.execute(config, format).await,
        Commands::Records(cmd) => cmd.execute(config, format).await,
        Commands::Config(cmd) => cmd.execute(config, format).await,
        Commands::Completions(cmd) => cmd.execute(format).await,
    }
}
