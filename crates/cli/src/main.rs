//! runwatch CLI - Main Entry Point
//!
//! Follows remote test-suite executions until they finish and decodes
//! captured console output.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::debug;

use runwatch_cli::commands::{decode, watch};
use runwatch_cli::config::{default_config_path, WatchConfig};
use runwatch_cli::output::{self, OutputFormat};

/// runwatch - follow remote test-suite executions
#[derive(Parser)]
#[command(name = "runwatch")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Config file (defaults to ~/.runwatch/config.toml)
    #[arg(long, global = true, env = "RUNWATCH_CONFIG")]
    config: Option<PathBuf>,

    /// Base URL of the execution service, overrides the config file
    #[arg(long, global = true, env = "RUNWATCH_BASE_URL")]
    base_url: Option<String>,

    /// Output format
    #[arg(long, default_value = "table", global = true)]
    format: OutputFormat,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Poll executions until they reach a terminal state
    Watch(watch::WatchArgs),

    /// Decode console output containing ANSI colour codes
    Decode(decode::DecodeArgs),

    /// Show the effective configuration
    Config {
        /// Write the effective configuration to the config file
        #[arg(long)]
        write: bool,
    },

    /// Show version information
    Version,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(true) => std::process::exit(0),
        Ok(false) => std::process::exit(1),
        Err(e) => {
            output::print_error(&format!("{:#}", e));
            std::process::exit(2);
        }
    }
}

/// Returns whether the command succeeded
async fn run(cli: Cli) -> anyhow::Result<bool> {
    let config_path = cli.config.unwrap_or_else(default_config_path);
    let load_config = || -> anyhow::Result<WatchConfig> {
        let mut config = WatchConfig::load(&config_path)?;
        if let Some(base_url) = cli.base_url.clone() {
            config.base_url = base_url;
        }
        debug!(path = %config_path.display(), base_url = %config.base_url, "Configuration loaded");
        Ok(config)
    };

    match cli.command {
        Commands::Watch(args) => watch::execute(args, load_config()?, cli.format).await,
        Commands::Decode(args) => {
            decode::execute(args, cli.format)?;
            Ok(true)
        }
        Commands::Config { write } => {
            let config = load_config()?;
            config.validate()?;
            print!("{}", toml::to_string_pretty(&config)?);
            if write {
                config.save(&config_path)?;
                output::print_success(&format!("Configuration written to {}", config_path.display()));
            }
            Ok(true)
        }
        Commands::Version => {
            println!("runwatch v{}", env!("CARGO_PKG_VERSION"));
            Ok(true)
        }
    }
}
