use std::sync::Arc;

use solana_program::program_pack::Pack;
use solana_sdk::{
    signature::{Keypair, Signature},
    signer::Signer,
};
use tracing::{debug, info};

use crate::{
    client::{BaseClient, ConfirmationPolicy, FundingGateway, FundingGuard, FundingPolicy},
    core::{
        InitiateTradeRequest, InitiatedTrade, SdkError, SdkResult, TakeTradeRequest,
        ESCROW_ACCOUNT_LEN, TOKEN_ACCOUNT_LEN,
    },
    instructions::{InitiateTradeAccounts, TradeInstructionBuilder},
    prelude::*,
    protocol::{DerivedAuthority, PdaBuilder},
    state::EscrowRecord,
};

/// Drives the two escrow transactions and reads records back.
///
/// Holds no mutable state, so independent trades can run concurrently
/// through one service.
pub struct EscrowService<G> {
    base: BaseClient<G>,
    funding: FundingGuard<G>,
    builder: TradeInstructionBuilder,
    pda: PdaBuilder,
}

impl<G: FundingGateway> EscrowService<G> {
    pub fn new(
        gateway: Arc<G>,
        program_id: Pubkey,
        confirmation: ConfirmationPolicy,
        funding: FundingPolicy,
    ) -> Self {
        Self {
            base: BaseClient::new(gateway.clone(), program_id, confirmation),
            funding: FundingGuard::new(gateway, funding, confirmation),
            builder: TradeInstructionBuilder::new(program_id),
            pda: PdaBuilder::new(program_id),
        }
    }

    /// Get the program ID
    pub fn program_id(&self) -> Pubkey {
        self.base.program_id()
    }

    /// Authority the program assigns holding accounts to
    pub fn authority(&self) -> DerivedAuthority {
        self.pda.escrow_authority()
    }

    /// Check the escrow program is deployed and executable
    pub async fn check_program(&self) -> SdkResult<()> {
        let program_id = self.program_id();
        match self.base.get_account(&program_id).await? {
            None => Err(SdkError::ProgramNotDeployed(program_id)),
            Some(account) if !account.executable => Err(SdkError::ProgramNotExecutable(program_id)),
            Some(_) => {
                info!(%program_id, "using program");
                Ok(())
            }
        }
    }

    /// Fetch and decode the record at `address`
    pub async fn fetch_record(&self, address: &Pubkey) -> SdkResult<EscrowRecord> {
        let account = self
            .base
            .get_account(address)
            .await?
            .ok_or(SdkError::RecordNotFound(*address))?;
        EscrowRecord::decode(&account.data)
    }

    /// Open a trade: move `offered_amount` into a fresh holding account and
    /// create the record expecting `expected_amount` in return. One atomic
    /// transaction; the record is read back once it is confirmed.
    pub async fn initiate_trade(
        &self,
        initializer: &Keypair,
        request: &InitiateTradeRequest,
    ) -> SdkResult<InitiatedTrade> {
        let initializer_key = initializer.pubkey();
        self.funding
            .ensure_funded(&initializer_key, &[TOKEN_ACCOUNT_LEN, ESCROW_ACCOUNT_LEN])
            .await?;

        let mint = self.resolve_mint(&request.initializer_asset_account).await?;

        // Single-use identities; never reuse them across trades
        let temp_token_account = Keypair::new();
        let escrow_account = Keypair::new();

        let gateway = self.base.gateway();
        let temp_token_rent = gateway
            .minimum_balance_for_rent_exemption(TOKEN_ACCOUNT_LEN)
            .await?;
        let escrow_rent = gateway
            .minimum_balance_for_rent_exemption(ESCROW_ACCOUNT_LEN)
            .await?;

        let accounts = InitiateTradeAccounts {
            initializer: initializer_key,
            initializer_asset_account: request.initializer_asset_account,
            initializer_receiving_account: request.initializer_receiving_account,
            temp_token_account: temp_token_account.pubkey(),
            escrow_account: escrow_account.pubkey(),
            mint,
            temp_token_rent,
            escrow_rent,
        };
        let instructions = self.builder.initiate_trade(
            &accounts,
            request.offered_amount,
            request.expected_amount,
        )?;

        debug!(
            escrow = %accounts.escrow_account,
            temp = %accounts.temp_token_account,
            %mint,
            "initiating trade"
        );

        let signature = self
            .base
            .send_transaction(
                &instructions,
                &[initializer, &temp_token_account, &escrow_account],
            )
            .await?;

        let escrow_address = escrow_account.pubkey();
        let record = self.fetch_record(&escrow_address).await?;
        if !record.is_initialized {
            return Err(SdkError::UninitializedRecord(escrow_address));
        }

        info!(
            escrow = %escrow_address,
            %signature,
            expected_amount = record.expected_amount,
            "trade initiated"
        );

        Ok(InitiatedTrade {
            escrow_address,
            record,
            signature,
        })
    }

    /// Take an open trade. Returns the signature once confirmed; the record
    /// is not read back since the program closes it.
    pub async fn take_trade(
        &self,
        taker: &Keypair,
        request: &TakeTradeRequest,
    ) -> SdkResult<Signature> {
        let record = self.fetch_record(&request.escrow_address).await?;
        if !record.is_initialized {
            return Err(SdkError::UninitializedRecord(request.escrow_address));
        }

        let taker_key = taker.pubkey();
        self.funding.ensure_funded(&taker_key, &[]).await?;

        let ix = self.builder.exchange(
            taker_key,
            request.taker_receiving_account,
            request.taker_asset_account,
            request.escrow_address,
            &record,
            request.taker_offered_amount,
        )?;

        let signature = self.base.send_transaction(&[ix], &[taker]).await?;
        info!(escrow = %request.escrow_address, %signature, "trade taken");
        Ok(signature)
    }

    /// Mint of an SPL token account
    async fn resolve_mint(&self, token_account: &Pubkey) -> SdkResult<Pubkey> {
        let account = self
            .base
            .get_account(token_account)
            .await?
            .ok_or(SdkError::AccountNotFound(*token_account))?;

        if account.owner != spl_token::id() {
            return Err(SdkError::InvalidParameters(format!(
                "{} is not owned by the token program",
                token_account
            )));
        }

        let state = spl_token::state::Account::unpack(&account.data).map_err(|e| {
            SdkError::InvalidParameters(format!("{} is not a token account: {}", token_account, e))
        })?;
        Ok(state.mint)
    }
}
