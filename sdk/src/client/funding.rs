use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::{
    client::{ConfirmationPolicy, FundingGateway},
    core::{SdkError, SdkResult, DEFAULT_LAMPORTS_PER_SIGNATURE},
    prelude::*,
};

/// How much native currency a payer must hold before submitting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct FundingPolicy {
    /// Fee charged per transaction signature (lamports)
    pub lamports_per_signature: u64,

    /// Number of signatures' worth of fees to keep on hand
    pub signature_headroom: u64,

    /// Request the shortfall from the cluster faucet instead of failing.
    /// Only useful on localnet and devnet.
    pub airdrop: bool,
}

impl Default for FundingPolicy {
    fn default() -> Self {
        Self {
            lamports_per_signature: DEFAULT_LAMPORTS_PER_SIGNATURE,
            signature_headroom: 100,
            airdrop: false,
        }
    }
}

/// Checks a payer can cover rent for new accounts plus signature fees
pub struct FundingGuard<G> {
    gateway: Arc<G>,
    policy: FundingPolicy,
    confirmation: ConfirmationPolicy,
}

impl<G: FundingGateway> FundingGuard<G> {
    pub fn new(gateway: Arc<G>, policy: FundingPolicy, confirmation: ConfirmationPolicy) -> Self {
        Self {
            gateway,
            policy,
            confirmation,
        }
    }

    /// Lamports needed to create accounts of `spaces` bytes and pay fees
    pub async fn required_lamports(&self, spaces: &[usize]) -> SdkResult<u64> {
        let mut required = self
            .policy
            .lamports_per_signature
            .checked_mul(self.policy.signature_headroom)
            .ok_or_else(|| SdkError::InvalidParameters("fee headroom overflows u64".to_string()))?;

        for &space in spaces {
            let rent = self.gateway.minimum_balance_for_rent_exemption(space).await?;
            required = required.checked_add(rent).ok_or_else(|| {
                SdkError::InvalidParameters("required balance overflows u64".to_string())
            })?;
        }
        Ok(required)
    }

    /// Ensure `payer` holds enough lamports, airdropping the shortfall when
    /// the policy allows. Returns the balance observed last.
    pub async fn ensure_funded(&self, payer: &Pubkey, spaces: &[usize]) -> SdkResult<u64> {
        let required = self.required_lamports(spaces).await?;
        let mut available = self.gateway.get_balance(payer).await?;

        if available < required && self.policy.airdrop {
            let shortfall = required - available;
            warn!(%payer, shortfall, "payer underfunded, requesting airdrop");
            let signature = self.gateway.request_airdrop(payer, shortfall).await?;
            self.gateway
                .wait_for_confirmation(&signature, &self.confirmation)
                .await?;
            available = self.gateway.get_balance(payer).await?;
        }

        if available < required {
            return Err(SdkError::InsufficientFunds {
                required,
                available,
            });
        }

        debug!(%payer, required, available, "payer funded");
        info!(
            "Using account {} containing {} SOL to pay for fees",
            payer,
            available as f64 / solana_sdk::native_token::LAMPORTS_PER_SOL as f64
        );
        Ok(available)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::InMemoryLedger;
    use solana_sdk::rent::Rent;

    fn guard(policy: FundingPolicy) -> (Arc<InMemoryLedger>, FundingGuard<InMemoryLedger>) {
        let ledger = Arc::new(InMemoryLedger::new(Pubkey::new_unique()));
        let guard = FundingGuard::new(ledger.clone(), policy, ConfirmationPolicy::default());
        (ledger, guard)
    }

    #[tokio::test]
    async fn test_required_lamports_adds_rent_to_fee_headroom() {
        let (_, guard) = guard(FundingPolicy::default());
        let rent = Rent::default();

        assert_eq!(guard.required_lamports(&[]).await.unwrap(), 500_000);
        assert_eq!(
            guard.required_lamports(&[165, 105]).await.unwrap(),
            500_000 + rent.minimum_balance(165) + rent.minimum_balance(105)
        );
    }

    #[tokio::test]
    async fn test_headroom_overflow_is_an_error() {
        let (_, guard) = guard(FundingPolicy {
            lamports_per_signature: u64::MAX,
            signature_headroom: 2,
            airdrop: false,
        });
        assert!(matches!(
            guard.required_lamports(&[]).await,
            Err(SdkError::InvalidParameters(_))
        ));
    }

    #[tokio::test]
    async fn test_funded_payer_passes_without_airdrop() {
        let (ledger, guard) = guard(FundingPolicy::default());
        let payer = Pubkey::new_unique();
        ledger.fund(&payer, 1_000_000);

        assert_eq!(guard.ensure_funded(&payer, &[]).await.unwrap(), 1_000_000);
    }

    #[tokio::test]
    async fn test_shortfall_without_airdrop() {
        let (ledger, guard) = guard(FundingPolicy::default());
        let payer = Pubkey::new_unique();
        ledger.fund(&payer, 100);

        match guard.ensure_funded(&payer, &[]).await {
            Err(SdkError::InsufficientFunds {
                required,
                available,
            }) => {
                assert_eq!(required, 500_000);
                assert_eq!(available, 100);
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_airdrop_tops_up_to_requirement() {
        let (ledger, guard) = guard(FundingPolicy {
            airdrop: true,
            ..FundingPolicy::default()
        });
        let payer = Pubkey::new_unique();
        ledger.fund(&payer, 100);

        assert_eq!(guard.ensure_funded(&payer, &[]).await.unwrap(), 500_000);
        assert_eq!(ledger.balance(&payer), 500_000);
    }
}
