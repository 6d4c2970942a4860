//! Prelude module for common imports

pub use solana_sdk::{pubkey::Pubkey, sysvar};
