// Utility functions for CLI commands

use anyhow::{Context, Result};
use solana_sdk::{
    native_token::lamports_to_sol,
    pubkey::Pubkey,
    signature::{read_keypair_file, Keypair, Signer},
};
use std::str::FromStr;

/// Load a keypair from a file path, expanding ~ if needed
pub fn load_keypair(path: &str) -> Result<Keypair> {
    let expanded_path = if path.starts_with('~') {
        let home = std::env::var("HOME").context("HOME environment variable not set")?;
        path.replacen('~', &home, 1)
    } else {
        path.to_string()
    };

    read_keypair_file(&expanded_path)
        .map_err(|e| anyhow::anyhow!("Failed to load keypair from {}: {}", expanded_path, e))
}

/// Load a keypair, falling back to a fresh one unless `strict` is set.
/// A fresh keypair owns nothing, so it is only useful with airdrops enabled.
pub fn load_payer(role: &str, path: &str, strict: bool) -> Result<Keypair> {
    match load_keypair(path) {
        Ok(keypair) => Ok(keypair),
        Err(e) if strict => Err(e.context(format!("Failed to load {} keypair", role))),
        Err(e) => {
            let keypair = Keypair::new();
            warn(&format!(
                "{}; using generated {} keypair {}",
                e,
                role,
                keypair.pubkey()
            ));
            Ok(keypair)
        }
    }
}

/// Parse a pubkey from string
pub fn parse_pubkey(s: &str) -> Result<Pubkey> {
    Pubkey::from_str(s).context("Invalid public key")
}

/// Format lamports as SOL
pub fn sol(lamports: u64) -> String {
    format!("{} SOL", lamports_to_sol(lamports))
}

/// Print success message with checkmark
pub fn success(msg: &str) {
    println!("[OK] {}", msg);
}

/// Print info message
pub fn info(msg: &str) {
    println!("[INFO] {}", msg);
}

/// Print warning message
pub fn warn(msg: &str) {
    eprintln!("[WARN] {}", msg);
}
