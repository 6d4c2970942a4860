use std::sync::Arc;

use solana_sdk::{
    account::Account,
    instruction::Instruction,
    signature::{Keypair, Signature},
    signer::Signer,
    transaction::Transaction,
};
use tracing::info;

use crate::{
    client::{ConfirmationPolicy, LedgerGateway},
    core::{SdkError, SdkResult},
    prelude::*,
};

/// Signing, submission and confirmation shared by the services
pub struct BaseClient<G> {
    gateway: Arc<G>,
    program_id: Pubkey,
    confirmation: ConfirmationPolicy,
}

impl<G: LedgerGateway> BaseClient<G> {
    pub fn new(gateway: Arc<G>, program_id: Pubkey, confirmation: ConfirmationPolicy) -> Self {
        Self {
            gateway,
            program_id,
            confirmation,
        }
    }

    /// Get the gateway
    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    /// Get the program ID
    pub fn program_id(&self) -> Pubkey {
        self.program_id
    }

    /// Fetch an account
    pub async fn get_account(&self, address: &Pubkey) -> SdkResult<Option<Account>> {
        self.gateway.get_account(address).await
    }

    /// Sign with every signer, submit once and wait for confirmation.
    /// The first signer pays fees. Nothing here retries.
    pub async fn send_transaction(
        &self,
        instructions: &[Instruction],
        signers: &[&Keypair],
    ) -> SdkResult<Signature> {
        let payer = signers
            .first()
            .ok_or_else(|| SdkError::InvalidParameters("no signers supplied".to_string()))?;

        let recent_blockhash = self.gateway.latest_blockhash().await?;
        let mut tx = Transaction::new_with_payer(instructions, Some(&payer.pubkey()));
        tx.try_sign(signers, recent_blockhash)
            .map_err(|e| SdkError::InvalidParameters(format!("signing failed: {}", e)))?;

        let signature = self.gateway.submit_transaction(&tx).await?;
        info!(
            %signature,
            instructions = instructions.len(),
            signers = signers.len(),
            "transaction submitted"
        );

        self.gateway
            .wait_for_confirmation(&signature, &self.confirmation)
            .await?;
        Ok(signature)
    }
}
