// Deployment and payer checks

use anyhow::{Context, Result};
use escrow_sdk::{client::FundingGateway, config::AppConfig, EscrowClient};
use solana_sdk::signature::Signer;

use super::utils::{info, load_payer, sol, success};

pub async fn execute(config: &AppConfig, strict_keys: bool) -> Result<()> {
    let client = EscrowClient::from_config(config)?;
    info(&format!("Checking escrow program at {}...", client.rpc_url()));

    client
        .escrow
        .check_program()
        .await
        .context("Escrow program check failed")?;
    success(&format!(
        "Program {} is deployed and executable",
        client.program_id()
    ));

    let authority = client.escrow.authority();
    info(&format!(
        "Escrow authority: {} (bump {})",
        authority.address, authority.bump
    ));

    for (role, path) in [
        ("initializer", &config.initializer_keypair_path),
        ("taker", &config.taker_keypair_path),
    ] {
        let payer = load_payer(role, path, strict_keys)?;
        let balance = client.gateway.get_balance(&payer.pubkey()).await?;
        info(&format!("{} {}: {}", role, payer.pubkey(), sol(balance)));
    }

    Ok(())
}
