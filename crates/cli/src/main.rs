//! Quietwatch CLI - qw command

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod cmd;
mod util;

/// Quietwatch - report files once they stop changing
#[derive(Parser)]
#[command(name = "qw")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Also write logs to a daily-rolling file in this directory
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Watch a directory tree and report each file once it stops changing
    Watch(cmd::watch::WatchArgs),
    /// Inspect and create configuration
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show the effective configuration
    List {
        /// Config file (default: ./quietwatch.toml, then the user config)
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Show the user config file path
    Path {
        /// Create the file from the example if it does not exist
        #[arg(long)]
        create: bool,
    },
    /// Print an annotated example configuration
    Example,
    /// Check that a watch could start with the configuration
    Check {
        /// Config file (default: ./quietwatch.toml, then the user config)
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Keeps the file writer flushing until exit
    let _log_guard = util::init_logging(cli.log_dir.as_deref())?;

    match cli.command {
        Commands::Watch(args) => cmd::watch::run(args).await,
        Commands::Config(config_cmd) => match config_cmd {
            ConfigCommands::List { config } => cmd::config::run_list(config.as_deref()).await,
            ConfigCommands::Path { create } => cmd::config::run_path(create).await,
            ConfigCommands::Example => cmd::config::run_example().await,
            ConfigCommands::Check { config } => cmd::config::run_check(config.as_deref()).await,
        },
    }
}
