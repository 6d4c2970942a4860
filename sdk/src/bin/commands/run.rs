// Complete trade round trip: check, open, take

use anyhow::{Context, Result};
use clap::Args;
use escrow_sdk::{config::AppConfig, EscrowClient};

use super::{
    escrow::{initiate, print_trade, settle},
    utils::{info, load_payer, success},
};

#[derive(Args)]
pub struct RunCmd {
    /// Amount of the offered asset to lock
    #[arg(long, default_value = "10")]
    amount: u64,

    /// Amount of the counter-asset expected in return
    #[arg(long, default_value = "20")]
    expected: u64,
}

pub async fn execute(cmd: RunCmd, config: &AppConfig, strict_keys: bool) -> Result<()> {
    info("Starting escrow round trip...");

    let client = EscrowClient::from_config(config)?;
    let initializer = load_payer("initializer", &config.initializer_keypair_path, strict_keys)?;
    let taker = load_payer("taker", &config.taker_keypair_path, strict_keys)?;

    client
        .escrow
        .check_program()
        .await
        .context("Escrow program check failed")?;

    let trade = initiate(&client, config, &initializer, cmd.amount, cmd.expected).await?;
    print_trade(&trade);

    settle(&client, config, &taker, trade.escrow_address, cmd.amount).await?;

    success("Round trip complete");
    Ok(())
}
