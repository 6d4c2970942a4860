// CLI tool for the token escrow program
//
// Opens and takes trades using the accounts named in the config file.

mod commands;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use escrow_sdk::{config::AppConfig, prelude::*};
use std::str::FromStr;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "escrow")]
#[command(about = "Token escrow CLI", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "escrow.toml")]
    config: String,

    /// Override the RPC URL from the config
    #[arg(long)]
    rpc_url: Option<String>,

    /// Override the program ID from the config
    #[arg(long)]
    program_id: Option<String>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,

    /// Fail instead of generating a throwaway keypair when a keypair file is unreadable
    #[arg(long)]
    strict_keys: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check the program is deployed and report payer balances
    Check,

    /// Open a trade from the initializer's accounts
    Init(commands::escrow::InitCmd),

    /// Take an open trade with the taker's accounts
    Take(commands::escrow::TakeCmd),

    /// Print a decoded escrow record
    Show(commands::escrow::ShowCmd),

    /// Print the escrow authority address
    Authority,

    /// Check, open and take a trade in one go
    Run(commands::run::RunCmd),
}

fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("escrow_sdk={},escrow={}", level, level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn load_config(cli: &Cli) -> Result<AppConfig> {
    let mut config = AppConfig::load(&cli.config)
        .with_context(|| format!("Failed to load config from {}", cli.config))?;

    if let Some(rpc_url) = &cli.rpc_url {
        config.rpc_url = rpc_url.clone();
    }
    if let Some(program_id) = &cli.program_id {
        config.program_id = Pubkey::from_str(program_id).context("Invalid program ID")?;
    }

    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    // The authority only depends on the program ID, so it works without a config file
    if let (Commands::Authority, Some(program_id)) = (&cli.command, &cli.program_id) {
        return commands::escrow::authority(commands::utils::parse_pubkey(program_id)?);
    }

    let config = load_config(&cli)?;

    match cli.command {
        Commands::Check => commands::check::execute(&config, cli.strict_keys).await,
        Commands::Init(cmd) => commands::escrow::init(cmd, &config, cli.strict_keys).await,
        Commands::Take(cmd) => commands::escrow::take(cmd, &config, cli.strict_keys).await,
        Commands::Show(cmd) => commands::escrow::show(cmd, &config).await,
        Commands::Authority => commands::escrow::authority(config.program_id),
        Commands::Run(cmd) => commands::run::execute(cmd, &config, cli.strict_keys).await,
    }
}
