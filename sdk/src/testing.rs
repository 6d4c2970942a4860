//! Testing utilities for the escrow client
//!
//! [`InMemoryLedger`] implements both gateway traits over an in-memory
//! account map. It verifies signatures, charges fees and executes system,
//! SPL token and escrow instructions atomically, so services can be driven end
//! to end without a validator. Escrow instructions follow the program's
//! observable behavior: `Initialize` hands the holding account to the escrow
//! authority and writes the record; `Exchange` settles both legs and closes
//! the holding and escrow accounts.

use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard},
};

use async_trait::async_trait;
use solana_program::{
    program_option::COption,
    program_pack::Pack,
    system_instruction::SystemInstruction,
};
use solana_sdk::{
    account::Account,
    hash::Hash,
    message::Message,
    rent::Rent,
    signature::Signature,
    system_program,
    transaction::Transaction,
};
use spl_token::{
    instruction::TokenInstruction,
    state::{Account as TokenAccount, AccountState, Mint},
};

use crate::{
    client::{FundingGateway, LedgerGateway},
    core::{
        constants::seeds, ConfirmationStatus, SdkError, SdkResult, SignatureStatus,
        DEFAULT_LAMPORTS_PER_SIGNATURE, TOKEN_ACCOUNT_LEN,
    },
    instructions::EscrowInstruction,
    prelude::*,
    protocol::derive,
    state::EscrowRecord,
};

type Accounts = HashMap<Pubkey, Account>;

/// In-memory ledger that plays the escrow program in tests
pub struct InMemoryLedger {
    program_id: Pubkey,
    rent: Rent,
    lamports_per_signature: u64,
    state: Mutex<LedgerState>,
}

#[derive(Default)]
struct LedgerState {
    accounts: Accounts,
    statuses: HashMap<Signature, TrackedStatus>,
    submissions: usize,
    confirmation_delay: u32,
    stall_confirmations: bool,
    reject_next: Option<String>,
    fail_next_execution: Option<String>,
    failing_status_queries: u32,
    status_query_error: String,
}

struct TrackedStatus {
    err: Option<String>,
    polls_remaining: u32,
}

/// Decompiled view of one instruction in a message
struct InstructionContext<'a> {
    keys: Vec<Pubkey>,
    signers: Vec<bool>,
    data: &'a [u8],
}

impl InstructionContext<'_> {
    fn account_keys<const N: usize>(&self) -> Result<[Pubkey; N], String> {
        if self.keys.len() < N {
            return Err("insufficient account keys for instruction".to_string());
        }
        let mut out = [Pubkey::default(); N];
        out.copy_from_slice(&self.keys[..N]);
        Ok(out)
    }

    fn exact_keys<const N: usize>(&self) -> Result<[Pubkey; N], String> {
        if self.keys.len() != N {
            return Err(format!(
                "expected {} account keys, got {}",
                N,
                self.keys.len()
            ));
        }
        self.account_keys()
    }

    fn require_signer(&self, index: usize) -> Result<(), String> {
        if self.signers.get(index).copied().unwrap_or(false) {
            Ok(())
        } else {
            Err("missing required signature for instruction".to_string())
        }
    }
}

impl InMemoryLedger {
    /// Create a ledger; the escrow program at `program_id` is not deployed yet
    pub fn new(program_id: Pubkey) -> Self {
        Self {
            program_id,
            rent: Rent::default(),
            lamports_per_signature: DEFAULT_LAMPORTS_PER_SIGNATURE,
            state: Mutex::new(LedgerState::default()),
        }
    }

    fn state(&self) -> MutexGuard<'_, LedgerState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Mark the escrow program as deployed
    pub fn deploy_program(&self) {
        self.set_account(
            self.program_id,
            Account {
                lamports: 1_141_440,
                data: vec![0; 36],
                owner: solana_sdk::bpf_loader_upgradeable::id(),
                executable: true,
                rent_epoch: 0,
            },
        );
    }

    pub fn set_account(&self, address: Pubkey, account: Account) {
        self.state().accounts.insert(address, account);
    }

    pub fn account(&self, address: &Pubkey) -> Option<Account> {
        self.state().accounts.get(address).cloned()
    }

    /// Credit lamports to a system account, creating it if needed
    pub fn fund(&self, address: &Pubkey, lamports: u64) {
        let mut state = self.state();
        let account = state
            .accounts
            .entry(*address)
            .or_insert_with(|| Account::new(0, 0, &system_program::id()));
        account.lamports += lamports;
    }

    /// Create an initialized mint with zero decimals
    pub fn create_mint(&self, authority: &Pubkey) -> Pubkey {
        let address = Pubkey::new_unique();
        let mint = Mint {
            mint_authority: COption::Some(*authority),
            supply: 0,
            decimals: 0,
            is_initialized: true,
            freeze_authority: COption::None,
        };
        let mut data = vec![0; Mint::LEN];
        mint.pack_into_slice(&mut data);
        self.set_account(
            address,
            Account {
                lamports: self.rent.minimum_balance(Mint::LEN),
                data,
                owner: spl_token::id(),
                executable: false,
                rent_epoch: 0,
            },
        );
        address
    }

    /// Create an initialized token account holding `amount`
    pub fn create_token_account(&self, owner: &Pubkey, mint: &Pubkey, amount: u64) -> Pubkey {
        let address = Pubkey::new_unique();
        let token = TokenAccount {
            mint: *mint,
            owner: *owner,
            amount,
            state: AccountState::Initialized,
            ..TokenAccount::default()
        };
        let mut data = vec![0; TOKEN_ACCOUNT_LEN];
        token.pack_into_slice(&mut data);
        self.set_account(
            address,
            Account {
                lamports: self.rent.minimum_balance(TOKEN_ACCOUNT_LEN),
                data,
                owner: spl_token::id(),
                executable: false,
                rent_epoch: 0,
            },
        );
        address
    }

    pub fn token_account(&self, address: &Pubkey) -> Option<TokenAccount> {
        self.account(address)
            .and_then(|account| TokenAccount::unpack(&account.data).ok())
    }

    pub fn balance(&self, address: &Pubkey) -> u64 {
        self.account(address).map_or(0, |account| account.lamports)
    }

    /// Number of polls that report `processed` before a signature confirms
    pub fn set_confirmation_delay(&self, polls: u32) {
        self.state().confirmation_delay = polls;
    }

    /// Keep every signature at `processed` indefinitely
    pub fn stall_confirmations(&self, stall: bool) {
        self.state().stall_confirmations = stall;
    }

    /// Reject the next submission during preflight with `reason`
    pub fn reject_next_submission(&self, reason: &str) {
        self.state().reject_next = Some(reason.to_string());
    }

    /// Accept the next submission but fail it on execution with `reason`
    pub fn fail_next_execution(&self, reason: &str) {
        self.state().fail_next_execution = Some(reason.to_string());
    }

    /// Fail the next `count` status queries with a transport error
    pub fn fail_status_queries(&self, count: u32, reason: &str) {
        let mut state = self.state();
        state.failing_status_queries = count;
        state.status_query_error = reason.to_string();
    }

    /// Transactions submitted so far, accepted or not
    pub fn submissions(&self) -> usize {
        self.state().submissions
    }

    fn execute(&self, accounts: &mut Accounts, message: &Message) -> Result<(), String> {
        let payer = message
            .account_keys
            .first()
            .ok_or_else(|| "transaction has no fee payer".to_string())?;
        let fee = self.lamports_per_signature * message.header.num_required_signatures as u64;
        debit(accounts, payer, fee).map_err(|_| {
            "Attempt to debit an account but found no record of a prior credit.".to_string()
        })?;

        for (index, ix) in message.instructions.iter().enumerate() {
            let program_id = message.account_keys[ix.program_id_index as usize];
            let ctx = InstructionContext {
                keys: ix
                    .accounts
                    .iter()
                    .map(|&i| message.account_keys[i as usize])
                    .collect(),
                signers: ix
                    .accounts
                    .iter()
                    .map(|&i| message.is_signer(i as usize))
                    .collect(),
                data: &ix.data,
            };

            let result = if program_id == system_program::id() {
                self.process_system(accounts, &ctx)
            } else if program_id == spl_token::id() {
                self.process_token(accounts, &ctx)
            } else if program_id == self.program_id {
                self.process_escrow(accounts, &ctx)
            } else {
                Err(format!("unsupported program id {}", program_id))
            };
            result.map_err(|e| format!("Error processing Instruction {}: {}", index, e))?;
        }
        Ok(())
    }

    fn process_system(&self, accounts: &mut Accounts, ctx: &InstructionContext) -> Result<(), String> {
        let instruction: SystemInstruction =
            bincode::deserialize(ctx.data).map_err(|_| "invalid instruction data".to_string())?;

        match instruction {
            SystemInstruction::CreateAccount {
                lamports,
                space,
                owner,
            } => {
                let [from, to] = ctx.account_keys::<2>()?;
                ctx.require_signer(0)?;
                ctx.require_signer(1)?;
                if accounts
                    .get(&to)
                    .is_some_and(|a| a.lamports > 0 || !a.data.is_empty())
                {
                    return Err(format!("account {} already in use", to));
                }
                debit(accounts, &from, lamports)?;
                accounts.insert(to, Account::new(lamports, space as usize, &owner));
                Ok(())
            }
            SystemInstruction::Transfer { lamports } => {
                let [from, to] = ctx.account_keys::<2>()?;
                ctx.require_signer(0)?;
                debit(accounts, &from, lamports)?;
                credit(accounts, &to, lamports);
                Ok(())
            }
            other => Err(format!("unsupported system instruction {:?}", other)),
        }
    }

    #[allow(deprecated)]
    fn process_token(&self, accounts: &mut Accounts, ctx: &InstructionContext) -> Result<(), String> {
        match TokenInstruction::unpack(ctx.data).map_err(|e| e.to_string())? {
            TokenInstruction::InitializeAccount => {
                let [address, mint, owner, _rent] = ctx.account_keys::<4>()?;
                let mint_account = accounts
                    .get(&mint)
                    .filter(|a| a.owner == spl_token::id())
                    .ok_or_else(|| "invalid mint".to_string())?;
                Mint::unpack(&mint_account.data).map_err(|e| e.to_string())?;

                let account = accounts
                    .get_mut(&address)
                    .ok_or_else(|| format!("account {} not found", address))?;
                if account.owner != spl_token::id() || account.data.len() != TOKEN_ACCOUNT_LEN {
                    return Err("invalid account owner or size".to_string());
                }
                let existing =
                    TokenAccount::unpack_unchecked(&account.data).map_err(|e| e.to_string())?;
                if existing.state != AccountState::Uninitialized {
                    return Err("custom program error: 0x6 (already in use)".to_string());
                }
                TokenAccount {
                    mint,
                    owner,
                    state: AccountState::Initialized,
                    ..TokenAccount::default()
                }
                .pack_into_slice(&mut account.data);
                Ok(())
            }
            TokenInstruction::Transfer { amount } => {
                let [source, destination, authority] = ctx.account_keys::<3>()?;
                ctx.require_signer(2)?;
                transfer_tokens(accounts, &source, &destination, &authority, amount)
            }
            other => Err(format!("unsupported token instruction {:?}", other)),
        }
    }

    fn process_escrow(&self, accounts: &mut Accounts, ctx: &InstructionContext) -> Result<(), String> {
        let instruction =
            EscrowInstruction::unpack(ctx.data).map_err(|_| "invalid instruction data".to_string())?;
        let authority = derive(seeds::ESCROW, &self.program_id);

        match instruction {
            EscrowInstruction::Initialize { amount } => {
                let [initializer, temp, receiving, escrow, rent, token_program] =
                    ctx.exact_keys::<6>()?;
                ctx.require_signer(0)?;
                if rent != sysvar::rent::id() {
                    return Err("invalid rent sysvar".to_string());
                }
                if token_program != spl_token::id() {
                    return Err("incorrect program id for instruction".to_string());
                }

                let escrow_account = self.owned_escrow_account(accounts, &escrow)?;
                if EscrowRecord::decode(&escrow_account.data)
                    .map_err(|e| e.to_string())?
                    .is_initialized
                {
                    return Err("account already initialized".to_string());
                }
                if escrow_account.lamports < self.rent.minimum_balance(EscrowRecord::LEN) {
                    return Err("custom program error: 0x1 (not rent exempt)".to_string());
                }

                let mut holding = load_token(accounts, &temp)?;
                if holding.owner != initializer {
                    return Err("custom program error: 0x4 (owner does not match)".to_string());
                }
                holding.owner = authority.address;
                store_token(accounts, &temp, &holding)?;

                let record = EscrowRecord {
                    is_initialized: true,
                    initializer,
                    temp_token_account: temp,
                    initializer_receiving_account: receiving,
                    expected_amount: amount,
                };
                let escrow_account = accounts
                    .get_mut(&escrow)
                    .ok_or_else(|| format!("account {} not found", escrow))?;
                record
                    .pack_into_slice(&mut escrow_account.data)
                    .map_err(|e| e.to_string())
            }
            EscrowInstruction::Exchange { amount } => {
                let [taker, taker_receiving, taker_asset, temp, initializer, initializer_receiving, escrow, token_program, pda] =
                    ctx.exact_keys::<9>()?;
                ctx.require_signer(0)?;
                if token_program != spl_token::id() {
                    return Err("incorrect program id for instruction".to_string());
                }
                if pda != authority.address {
                    return Err("invalid seeds for program address".to_string());
                }

                let escrow_account = self.owned_escrow_account(accounts, &escrow)?;
                let record = EscrowRecord::decode(&escrow_account.data).map_err(|e| e.to_string())?;
                if !record.is_initialized {
                    return Err("uninitialized account".to_string());
                }
                if record.temp_token_account != temp
                    || record.initializer != initializer
                    || record.initializer_receiving_account != initializer_receiving
                {
                    return Err("invalid account data for instruction".to_string());
                }

                let holding = load_token(accounts, &temp)?;
                if holding.amount != amount {
                    return Err("custom program error: 0x0 (expected amount mismatch)".to_string());
                }

                transfer_tokens(
                    accounts,
                    &taker_asset,
                    &initializer_receiving,
                    &taker,
                    record.expected_amount,
                )?;
                transfer_tokens(accounts, &temp, &taker_receiving, &pda, holding.amount)?;

                close_account(accounts, &temp, &initializer)?;
                close_account(accounts, &escrow, &initializer)
            }
        }
    }

    fn owned_escrow_account<'a>(
        &self,
        accounts: &'a Accounts,
        address: &Pubkey,
    ) -> Result<&'a Account, String> {
        let account = accounts
            .get(address)
            .ok_or_else(|| format!("account {} not found", address))?;
        if account.owner != self.program_id {
            return Err("incorrect program id for instruction".to_string());
        }
        Ok(account)
    }
}

fn debit(accounts: &mut Accounts, address: &Pubkey, lamports: u64) -> Result<(), String> {
    let account = accounts
        .get_mut(address)
        .ok_or_else(|| format!("account {} not found", address))?;
    account.lamports = account
        .lamports
        .checked_sub(lamports)
        .ok_or_else(|| "custom program error: 0x1 (insufficient lamports)".to_string())?;
    Ok(())
}

fn credit(accounts: &mut Accounts, address: &Pubkey, lamports: u64) {
    accounts
        .entry(*address)
        .or_insert_with(|| Account::new(0, 0, &system_program::id()))
        .lamports += lamports;
}

fn load_token(accounts: &Accounts, address: &Pubkey) -> Result<TokenAccount, String> {
    let account = accounts
        .get(address)
        .filter(|a| a.owner == spl_token::id())
        .ok_or_else(|| format!("token account {} not found", address))?;
    TokenAccount::unpack(&account.data).map_err(|e| e.to_string())
}

fn store_token(accounts: &mut Accounts, address: &Pubkey, token: &TokenAccount) -> Result<(), String> {
    let account = accounts
        .get_mut(address)
        .ok_or_else(|| format!("token account {} not found", address))?;
    token.pack_into_slice(&mut account.data);
    Ok(())
}

fn transfer_tokens(
    accounts: &mut Accounts,
    source: &Pubkey,
    destination: &Pubkey,
    authority: &Pubkey,
    amount: u64,
) -> Result<(), String> {
    let mut from = load_token(accounts, source)?;
    let mut to = load_token(accounts, destination)?;
    if from.owner != *authority {
        return Err("custom program error: 0x4 (owner does not match)".to_string());
    }
    if from.mint != to.mint {
        return Err("custom program error: 0x3 (mint mismatch)".to_string());
    }
    from.amount = from
        .amount
        .checked_sub(amount)
        .ok_or_else(|| "custom program error: 0x1 (insufficient funds)".to_string())?;
    if source == destination {
        return Ok(());
    }
    to.amount = to
        .amount
        .checked_add(amount)
        .ok_or_else(|| "custom program error: 0xe (overflow)".to_string())?;
    store_token(accounts, source, &from)?;
    store_token(accounts, destination, &to)
}

fn close_account(accounts: &mut Accounts, address: &Pubkey, recipient: &Pubkey) -> Result<(), String> {
    let closed = accounts
        .remove(address)
        .ok_or_else(|| format!("account {} not found", address))?;
    credit(accounts, recipient, closed.lamports);
    Ok(())
}

#[async_trait]
impl LedgerGateway for InMemoryLedger {
    async fn latest_blockhash(&self) -> SdkResult<Hash> {
        Ok(Hash::new_unique())
    }

    async fn submit_transaction(&self, transaction: &Transaction) -> SdkResult<Signature> {
        let mut state = self.state();
        state.submissions += 1;

        if let Some(reason) = state.reject_next.take() {
            return Err(SdkError::SubmissionRejected(reason));
        }

        transaction.verify().map_err(|e| {
            SdkError::SubmissionRejected(format!("Transaction signature verification failure: {}", e))
        })?;

        let signature = transaction.signatures[0];
        if state.statuses.contains_key(&signature) {
            return Err(SdkError::SubmissionRejected(
                "This transaction has already been processed".to_string(),
            ));
        }

        let polls_remaining = state.confirmation_delay;
        if let Some(reason) = state.fail_next_execution.take() {
            state.statuses.insert(
                signature,
                TrackedStatus {
                    err: Some(reason),
                    polls_remaining,
                },
            );
            return Ok(signature);
        }

        // Work on a copy so a failing instruction leaves no partial state
        let mut accounts = state.accounts.clone();
        self.execute(&mut accounts, &transaction.message)
            .map_err(|e| SdkError::SubmissionRejected(format!("Transaction simulation failed: {}", e)))?;
        state.accounts = accounts;
        state.statuses.insert(
            signature,
            TrackedStatus {
                err: None,
                polls_remaining,
            },
        );
        Ok(signature)
    }

    async fn get_account(&self, address: &Pubkey) -> SdkResult<Option<Account>> {
        Ok(self.account(address))
    }

    async fn minimum_balance_for_rent_exemption(&self, space: usize) -> SdkResult<u64> {
        Ok(self.rent.minimum_balance(space))
    }

    async fn signature_status(&self, signature: &Signature) -> SdkResult<Option<SignatureStatus>> {
        let mut state = self.state();
        if state.failing_status_queries > 0 {
            state.failing_status_queries -= 1;
            return Err(SdkError::RpcError(state.status_query_error.clone()));
        }
        let stalled = state.stall_confirmations;
        let Some(tracked) = state.statuses.get_mut(signature) else {
            return Ok(None);
        };

        let confirmation = if stalled {
            ConfirmationStatus::Processed
        } else if tracked.polls_remaining > 0 {
            tracked.polls_remaining -= 1;
            ConfirmationStatus::Processed
        } else {
            ConfirmationStatus::Confirmed
        };

        Ok(Some(SignatureStatus {
            confirmation,
            err: tracked.err.clone(),
        }))
    }
}

#[async_trait]
impl FundingGateway for InMemoryLedger {
    async fn get_balance(&self, address: &Pubkey) -> SdkResult<u64> {
        Ok(self.balance(address))
    }

    async fn request_airdrop(&self, address: &Pubkey, lamports: u64) -> SdkResult<Signature> {
        self.fund(address, lamports);
        let signature = Signature::new_unique();
        let polls_remaining = self.state().confirmation_delay;
        self.state().statuses.insert(
            signature,
            TrackedStatus {
                err: None,
                polls_remaining,
            },
        );
        Ok(signature)
    }
}
