use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{
    core::{SdkError, SdkResult},
    prelude::*,
    state::EscrowRecord,
};
use solana_sdk::signature::Signature;

/// Ledger commitment levels, ordered from weakest to strongest
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfirmationStatus {
    Processed,
    Confirmed,
    Finalized,
}

impl ConfirmationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfirmationStatus::Processed => "processed",
            ConfirmationStatus::Confirmed => "confirmed",
            ConfirmationStatus::Finalized => "finalized",
        }
    }
}

impl fmt::Display for ConfirmationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConfirmationStatus {
    type Err = SdkError;

    fn from_str(s: &str) -> SdkResult<Self> {
        match s {
            "processed" => Ok(ConfirmationStatus::Processed),
            "confirmed" => Ok(ConfirmationStatus::Confirmed),
            "finalized" => Ok(ConfirmationStatus::Finalized),
            other => Err(SdkError::InvalidParameters(format!(
                "unknown commitment level: {}",
                other
            ))),
        }
    }
}

/// Status of a submitted transaction as reported by the ledger
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignatureStatus {
    pub confirmation: ConfirmationStatus,
    /// Execution error, if the ledger applied and failed the transaction
    pub err: Option<String>,
}

/// Parameters for opening a trade
#[derive(Clone, Copy, Debug)]
pub struct InitiateTradeRequest {
    /// Token account the offered amount is taken from
    pub initializer_asset_account: Pubkey,
    pub offered_amount: u64,
    /// Token account that receives the counter-asset when the trade is taken
    pub initializer_receiving_account: Pubkey,
    pub expected_amount: u64,
}

/// Parameters for taking an open trade
#[derive(Clone, Copy, Debug)]
pub struct TakeTradeRequest {
    /// Token account that receives the initializer's offered asset
    pub taker_receiving_account: Pubkey,
    /// Token account the counter-asset is paid from
    pub taker_asset_account: Pubkey,
    pub escrow_address: Pubkey,
    pub taker_offered_amount: u64,
}

/// Result of a confirmed initiate transaction
#[derive(Clone, Debug)]
pub struct InitiatedTrade {
    pub escrow_address: Pubkey,
    pub record: EscrowRecord,
    pub signature: Signature,
}
