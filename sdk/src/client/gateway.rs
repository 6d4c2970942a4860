//! Capabilities the core needs from the ledger, independent of transport.

use std::time::Duration;

use async_trait::async_trait;
use solana_sdk::{account::Account, hash::Hash, signature::Signature, transaction::Transaction};
use tokio::time::{sleep, Instant};
use tracing::{debug, warn};

use crate::{
    core::{ConfirmationStatus, SdkError, SdkResult, SignatureStatus},
    prelude::*,
};

/// How long and how hard to wait for a submitted transaction to settle
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ConfirmationPolicy {
    pub commitment: ConfirmationStatus,
    pub timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for ConfirmationPolicy {
    fn default() -> Self {
        Self {
            commitment: ConfirmationStatus::Confirmed,
            timeout: Duration::from_secs(60),
            poll_interval: Duration::from_millis(500),
        }
    }
}

/// Ledger RPC gateway
#[async_trait]
pub trait LedgerGateway: Send + Sync {
    async fn latest_blockhash(&self) -> SdkResult<Hash>;

    /// Submit a signed transaction. Rejections found during simulation surface
    /// as [`SdkError::SubmissionRejected`].
    async fn submit_transaction(&self, transaction: &Transaction) -> SdkResult<Signature>;

    /// `Ok(None)` when the account does not exist
    async fn get_account(&self, address: &Pubkey) -> SdkResult<Option<Account>>;

    async fn minimum_balance_for_rent_exemption(&self, space: usize) -> SdkResult<u64>;

    /// `Ok(None)` when the ledger has not seen the signature yet
    async fn signature_status(&self, signature: &Signature) -> SdkResult<Option<SignatureStatus>>;

    /// Poll until the signature reaches `policy.commitment`.
    ///
    /// An execution error reported by the ledger becomes `SubmissionRejected`.
    /// A failed status query is retried on the next poll, since the
    /// transaction was already accepted. Reaching the deadline yields
    /// `ConfirmationTimeout`, which does not mean the transaction failed.
    async fn wait_for_confirmation(
        &self,
        signature: &Signature,
        policy: &ConfirmationPolicy,
    ) -> SdkResult<()> {
        let started = Instant::now();
        let mut polls = 0u32;

        loop {
            polls += 1;
            match self.signature_status(signature).await {
                Ok(Some(status)) => {
                    if let Some(err) = status.err {
                        return Err(SdkError::SubmissionRejected(format!(
                            "transaction {} failed: {}",
                            signature, err
                        )));
                    }
                    if status.confirmation >= policy.commitment {
                        debug!(%signature, polls, status = %status.confirmation, "transaction settled");
                        return Ok(());
                    }
                }
                Ok(None) => {}
                Err(e) => warn!(%signature, polls, error = %e, "status query failed"),
            }

            let waited = started.elapsed();
            if waited >= policy.timeout {
                return Err(SdkError::ConfirmationTimeout {
                    signature: *signature,
                    waited,
                });
            }
            sleep(policy.poll_interval.min(policy.timeout - waited)).await;
        }
    }
}

/// Native currency operations used by the funding guard
#[async_trait]
pub trait FundingGateway: LedgerGateway {
    async fn get_balance(&self, address: &Pubkey) -> SdkResult<u64>;

    async fn request_airdrop(&self, address: &Pubkey, lamports: u64) -> SdkResult<Signature>;
}
