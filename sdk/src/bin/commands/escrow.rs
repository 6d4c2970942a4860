// Trade commands

use anyhow::{Context, Result};
use clap::Args;
use escrow_sdk::{
    config::AppConfig, protocol::PdaBuilder, EscrowClient, EscrowRecord, InitiateTradeRequest,
    InitiatedTrade, TakeTradeRequest,
};
use solana_sdk::{pubkey::Pubkey, signature::Keypair};

use super::utils::{info, load_payer, parse_pubkey, success};

#[derive(Args)]
pub struct InitCmd {
    /// Amount of the offered asset to lock
    #[arg(long, default_value = "10")]
    amount: u64,

    /// Amount of the counter-asset expected in return
    #[arg(long, default_value = "20")]
    expected: u64,
}

#[derive(Args)]
pub struct TakeCmd {
    /// Escrow account address
    #[arg(long)]
    escrow: String,

    /// Amount of the offered asset the taker expects to receive
    #[arg(long)]
    amount: u64,
}

#[derive(Args)]
pub struct ShowCmd {
    /// Escrow account address
    #[arg(long)]
    escrow: String,
}

pub async fn init(cmd: InitCmd, config: &AppConfig, strict_keys: bool) -> Result<()> {
    let client = EscrowClient::from_config(config)?;
    let initializer = load_payer("initializer", &config.initializer_keypair_path, strict_keys)?;
    let trade = initiate(&client, config, &initializer, cmd.amount, cmd.expected).await?;
    print_trade(&trade);
    Ok(())
}

pub async fn take(cmd: TakeCmd, config: &AppConfig, strict_keys: bool) -> Result<()> {
    let client = EscrowClient::from_config(config)?;
    let taker = load_payer("taker", &config.taker_keypair_path, strict_keys)?;
    let escrow_address = parse_pubkey(&cmd.escrow)?;
    settle(&client, config, &taker, escrow_address, cmd.amount).await?;
    Ok(())
}

pub async fn show(cmd: ShowCmd, config: &AppConfig) -> Result<()> {
    let client = EscrowClient::from_config(config)?;
    let escrow_address = parse_pubkey(&cmd.escrow)?;
    let record = client
        .escrow
        .fetch_record(&escrow_address)
        .await
        .context("Failed to fetch escrow record")?;

    info(&format!("Escrow: {}", escrow_address));
    print_record(&record);
    Ok(())
}

pub fn authority(program_id: Pubkey) -> Result<()> {
    let authority = PdaBuilder::new(program_id).escrow_authority();
    info(&format!("Program: {}", program_id));
    info(&format!(
        "Escrow authority: {} (bump {})",
        authority.address, authority.bump
    ));
    Ok(())
}

/// Open a trade from the configured initializer accounts
pub(super) async fn initiate(
    client: &EscrowClient,
    config: &AppConfig,
    initializer: &Keypair,
    offered: u64,
    expected: u64,
) -> Result<InitiatedTrade> {
    info(&format!("Offering {} for {}...", offered, expected));

    let request = InitiateTradeRequest {
        initializer_asset_account: config.initializer_x_token_account,
        offered_amount: offered,
        initializer_receiving_account: config.initializer_y_token_account,
        expected_amount: expected,
    };
    let trade = client
        .escrow
        .initiate_trade(initializer, &request)
        .await
        .context("Failed to initiate trade")?;

    success(&format!("Trade initiated! Signature: {}", trade.signature));
    Ok(trade)
}

/// Take a trade with the configured taker accounts
pub(super) async fn settle(
    client: &EscrowClient,
    config: &AppConfig,
    taker: &Keypair,
    escrow_address: Pubkey,
    amount: u64,
) -> Result<()> {
    info(&format!("Taking trade {}...", escrow_address));

    let request = TakeTradeRequest {
        taker_receiving_account: config.taker_x_token_account,
        taker_asset_account: config.taker_y_token_account,
        escrow_address,
        taker_offered_amount: amount,
    };
    let signature = client
        .escrow
        .take_trade(taker, &request)
        .await
        .context("Failed to take trade")?;

    success(&format!("Trade taken! Signature: {}", signature));
    Ok(())
}

pub(super) fn print_trade(trade: &InitiatedTrade) {
    info(&format!("Escrow: {}", trade.escrow_address));
    print_record(&trade.record);
}

fn print_record(record: &EscrowRecord) {
    info(&format!("  initialized:       {}", record.is_initialized));
    info(&format!("  initializer:       {}", record.initializer));
    info(&format!("  holding account:   {}", record.temp_token_account));
    info(&format!(
        "  receiving account: {}",
        record.initializer_receiving_account
    ));
    info(&format!("  expected amount:   {}", record.expected_amount));
}
