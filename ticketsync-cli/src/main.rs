//! Main entry point for the TicketSync CLI.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use clap_complete::Shell;
use directories::BaseDirs;
use dotenv::dotenv;
use shared::config::SyncConfig;

mod commands;
mod logging;

use commands::{config::ConfigFormat, follow::FollowArgs, history::HistoryArgs};

/// TicketSync CLI
#[derive(Parser)]
#[command(name = "ticketsync")]
#[command(
    about = "Reads and follows support-ticket conversations from the live or platform backend",
    long_about = None
)]
struct Cli {
    /// Path to the configuration file (optional)
    #[arg(
        long,
        short,
        global = true,
        help = "Path to the configuration file (e.g., ticketsync.yaml or ticketsync.json). Defaults to ticketsync.yaml in the user config directory when present."
    )]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Subcommands for the TicketSync CLI
#[derive(Subcommand)]
enum Commands {
    /// Print the history of a conversation, oldest first
    History(HistoryArgs),

    /// Print a conversation and then every live change to it
    Follow(FollowArgs),

    /// Print a default configuration file
    Config {
        /// Format of the configuration file to generate. Defaults to yaml.
        #[arg(long, short, value_enum, default_value_t = ConfigFormat::Yaml)]
        format: ConfigFormat,
    },

    /// Generate shell completion scripts for the CLI
    Completion {
        /// The shell type for which to generate the completion script (e.g., bash, zsh, fish, powershell)
        #[arg(long, short, value_enum)]
        shell: Shell,
    },
}

/// Config file used when `--config` is not given, if one exists.
fn default_config_path() -> Option<PathBuf> {
    BaseDirs::new()
        .map(|dirs| dirs.config_dir().join("ticketsync").join("ticketsync.yaml"))
        .filter(|path| path.is_file())
}

fn load_config(path: Option<PathBuf>) -> Result<SyncConfig> {
    let path = path.or_else(default_config_path);
    let description = path
        .as_ref()
        .map_or_else(|| "defaults".to_string(), |path| path.display().to_string());
    SyncConfig::load_config(path)
        .with_context(|| format!("failed to load configuration from {description}"))
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let cli = Cli::parse();

    match cli.command {
        Commands::History(args) => {
            let config = load_config(cli.config)?;
            logging::init(&config)?;
            commands::history::run(&config, args).await?;
        }
        Commands::Follow(args) => {
            let config = load_config(cli.config)?;
            logging::init(&config)?;
            commands::follow::run(&config, args).await?;
        }
        Commands::Config { format } => {
            commands::config::print_config(format)?;
        }
        Commands::Completion { shell } => {
            commands::completion::generate_completion(shell);
        }
    }

    Ok(())
}
