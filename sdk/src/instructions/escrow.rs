use borsh::{BorshDeserialize, BorshSerialize};
use solana_sdk::{instruction::Instruction, system_instruction};

use crate::{
    core::{SdkError, SdkResult, ESCROW_ACCOUNT_LEN, TOKEN_ACCOUNT_LEN},
    instructions::EscrowInstructionBuilder,
    prelude::*,
    protocol::PdaBuilder,
    state::EscrowRecord,
};

/// Instructions understood by the escrow program.
///
/// Both variants share one wire shape: a one-byte opcode (the variant index)
/// followed by a little-endian `u64`.
#[derive(BorshSerialize, BorshDeserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum EscrowInstruction {
    /// Open a trade.
    ///
    /// Accounts expected:
    /// 0. `[signer]` Initializer
    /// 1. `[writable]` Holding account, owned by the initializer until this runs
    /// 2. `[]` Initializer's receiving account for the counter-asset
    /// 3. `[writable]` Escrow account, sized to the record and rent-exempt
    /// 4. `[]` Rent sysvar
    /// 5. `[]` Token program
    Initialize {
        /// Counter-asset amount the initializer expects to receive
        amount: u64,
    },

    /// Settle a trade.
    ///
    /// Accounts expected:
    /// 0. `[signer]` Taker
    /// 1. `[writable]` Taker's receiving account for the offered asset
    /// 2. `[writable]` Taker's account the counter-asset is paid from
    /// 3. `[writable]` Holding account
    /// 4. `[writable]` Initializer
    /// 5. `[writable]` Initializer's receiving account
    /// 6. `[writable]` Escrow account
    /// 7. `[]` Token program
    /// 8. `[]` Escrow authority (PDA)
    Exchange {
        /// Amount the taker offers against the holding account
        amount: u64,
    },
}

impl EscrowInstruction {
    /// Opcode + u64 payload
    pub const LEN: usize = 1 + 8;

    /// Serialize to instruction data
    pub fn pack(&self) -> SdkResult<Vec<u8>> {
        self.try_to_vec()
            .map_err(|e| SdkError::SerializationError(e.to_string()))
    }

    /// Parse instruction data; unknown opcodes and short or trailing payloads fail
    pub fn unpack(data: &[u8]) -> SdkResult<Self> {
        if data.len() != Self::LEN {
            return Err(SdkError::SerializationError(format!(
                "escrow instruction must be {} bytes, got {}",
                Self::LEN,
                data.len()
            )));
        }
        Self::try_from_slice(data).map_err(|e| SdkError::SerializationError(e.to_string()))
    }
}

/// Accounts and balances needed to open a trade
#[derive(Clone, Copy, Debug)]
pub struct InitiateTradeAccounts {
    pub initializer: Pubkey,
    pub initializer_asset_account: Pubkey,
    pub initializer_receiving_account: Pubkey,
    /// Fresh holding account; must sign the transaction
    pub temp_token_account: Pubkey,
    /// Fresh escrow account; must sign the transaction
    pub escrow_account: Pubkey,
    /// Mint of the offered asset
    pub mint: Pubkey,
    pub temp_token_rent: u64,
    pub escrow_rent: u64,
}

/// Trade instruction builder
pub struct TradeInstructionBuilder {
    pda: PdaBuilder,
}

impl TradeInstructionBuilder {
    pub fn new(program_id: Pubkey) -> Self {
        Self {
            pda: PdaBuilder::new(program_id),
        }
    }

    pub fn program_id(&self) -> Pubkey {
        self.pda.program_id
    }

    /// Build the five instructions of the initiate transaction, in order:
    /// create holding account, initialize it for the mint, move the offered
    /// amount into it, create the escrow account, then `Initialize`.
    pub fn initiate_trade(
        &self,
        accounts: &InitiateTradeAccounts,
        offered_amount: u64,
        expected_amount: u64,
    ) -> SdkResult<Vec<Instruction>> {
        let token_program = spl_token::id();

        let create_temp_ix = system_instruction::create_account(
            &accounts.initializer,
            &accounts.temp_token_account,
            accounts.temp_token_rent,
            TOKEN_ACCOUNT_LEN as u64,
            &token_program,
        );

        let init_temp_ix = spl_token::instruction::initialize_account(
            &token_program,
            &accounts.temp_token_account,
            &accounts.mint,
            &accounts.initializer,
        )
        .map_err(|e| SdkError::InvalidParameters(e.to_string()))?;

        let transfer_ix = spl_token::instruction::transfer(
            &token_program,
            &accounts.initializer_asset_account,
            &accounts.temp_token_account,
            &accounts.initializer,
            &[],
            offered_amount,
        )
        .map_err(|e| SdkError::InvalidParameters(e.to_string()))?;

        let create_escrow_ix = system_instruction::create_account(
            &accounts.initializer,
            &accounts.escrow_account,
            accounts.escrow_rent,
            ESCROW_ACCOUNT_LEN as u64,
            &self.pda.program_id,
        );

        let init_escrow_ix = self.initialize(
            accounts.initializer,
            accounts.temp_token_account,
            accounts.initializer_receiving_account,
            accounts.escrow_account,
            expected_amount,
        )?;

        Ok(vec![
            create_temp_ix,
            init_temp_ix,
            transfer_ix,
            create_escrow_ix,
            init_escrow_ix,
        ])
    }

    /// Build the `Initialize` instruction
    pub fn initialize(
        &self,
        initializer: Pubkey,
        temp_token_account: Pubkey,
        initializer_receiving_account: Pubkey,
        escrow_account: Pubkey,
        expected_amount: u64,
    ) -> SdkResult<Instruction> {
        let data = EscrowInstruction::Initialize {
            amount: expected_amount,
        }
        .pack()?;

        Ok(EscrowInstructionBuilder::with_program_id(self.pda.program_id)
            .add_readonly_signer(initializer)
            .add_writable(temp_token_account)
            .add_readonly(initializer_receiving_account)
            .add_writable(escrow_account)
            .add_readonly(sysvar::rent::id())
            .add_readonly(spl_token::id())
            .with_data(data)
            .build())
    }

    /// Build the `Exchange` instruction against a decoded record
    pub fn exchange(
        &self,
        taker: Pubkey,
        taker_receiving_account: Pubkey,
        taker_asset_account: Pubkey,
        escrow_address: Pubkey,
        record: &EscrowRecord,
        amount: u64,
    ) -> SdkResult<Instruction> {
        let authority = self.pda.escrow_authority();
        let data = EscrowInstruction::Exchange { amount }.pack()?;

        Ok(EscrowInstructionBuilder::with_program_id(self.pda.program_id)
            .add_readonly_signer(taker)
            .add_writable(taker_receiving_account)
            .add_writable(taker_asset_account)
            .add_writable(record.temp_token_account)
            .add_writable(record.initializer)
            .add_writable(record.initializer_receiving_account)
            .add_writable(escrow_address)
            .add_readonly(spl_token::id())
            .add_readonly(authority.address)
            .with_data(data)
            .build())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use solana_sdk::system_program;

    #[test]
    fn test_exchange_encoding() {
        assert_eq!(
            EscrowInstruction::Exchange { amount: 0 }.pack().unwrap(),
            vec![1, 0, 0, 0, 0, 0, 0, 0, 0]
        );
        assert_eq!(
            EscrowInstruction::Exchange { amount: 1 }.pack().unwrap(),
            vec![1, 1, 0, 0, 0, 0, 0, 0, 0]
        );
    }

    #[test]
    fn test_initialize_carries_payload() {
        assert_eq!(
            EscrowInstruction::Initialize { amount: 20 }.pack().unwrap(),
            vec![0, 20, 0, 0, 0, 0, 0, 0, 0]
        );
    }

    #[test]
    fn test_amount_is_little_endian() {
        let data = EscrowInstruction::Exchange {
            amount: 0x0102_0304_0506_0708,
        }
        .pack()
        .unwrap();
        assert_eq!(data, vec![1, 8, 7, 6, 5, 4, 3, 2, 1]);

        let max = EscrowInstruction::Initialize { amount: u64::MAX }
            .pack()
            .unwrap();
        assert_eq!(max, vec![0, 255, 255, 255, 255, 255, 255, 255, 255]);
    }

    #[test]
    fn test_unpack() {
        assert_eq!(
            EscrowInstruction::unpack(&[0, 20, 0, 0, 0, 0, 0, 0, 0]).unwrap(),
            EscrowInstruction::Initialize { amount: 20 }
        );
        assert_eq!(
            EscrowInstruction::unpack(&[1, 10, 0, 0, 0, 0, 0, 0, 0]).unwrap(),
            EscrowInstruction::Exchange { amount: 10 }
        );
        // Unknown opcode
        assert!(EscrowInstruction::unpack(&[2, 0, 0, 0, 0, 0, 0, 0, 0]).is_err());
        // Initialize without payload
        assert!(EscrowInstruction::unpack(&[0]).is_err());
        // Trailing byte
        assert!(EscrowInstruction::unpack(&[1, 0, 0, 0, 0, 0, 0, 0, 0, 0]).is_err());
    }

    #[test]
    fn test_initiate_trade_instruction_order() {
        let program_id = Pubkey::new_unique();
        let accounts = InitiateTradeAccounts {
            initializer: Pubkey::new_unique(),
            initializer_asset_account: Pubkey::new_unique(),
            initializer_receiving_account: Pubkey::new_unique(),
            temp_token_account: Pubkey::new_unique(),
            escrow_account: Pubkey::new_unique(),
            mint: Pubkey::new_unique(),
            temp_token_rent: 2_039_280,
            escrow_rent: 1_621_680,
        };

        let ixs = TradeInstructionBuilder::new(program_id)
            .initiate_trade(&accounts, 10, 20)
            .unwrap();

        assert_eq!(ixs.len(), 5);
        let programs: Vec<_> = ixs.iter().map(|ix| ix.program_id).collect();
        assert_eq!(
            programs,
            vec![
                system_program::id(),
                spl_token::id(),
                spl_token::id(),
                system_program::id(),
                program_id,
            ]
        );

        // Holding account is created for the token program, escrow for the escrow program
        assert_eq!(ixs[0].accounts[1].pubkey, accounts.temp_token_account);
        assert_eq!(ixs[3].accounts[1].pubkey, accounts.escrow_account);

        let init = &ixs[4];
        assert_eq!(init.data, vec![0, 20, 0, 0, 0, 0, 0, 0, 0]);
        let keys: Vec<_> = init.accounts.iter().map(|m| m.pubkey).collect();
        assert_eq!(
            keys,
            vec![
                accounts.initializer,
                accounts.temp_token_account,
                accounts.initializer_receiving_account,
                accounts.escrow_account,
                sysvar::rent::id(),
                spl_token::id(),
            ]
        );
        assert!(init.accounts[0].is_signer);
        assert!(init.accounts[1].is_writable);
        assert!(!init.accounts[2].is_writable);
        assert!(init.accounts[3].is_writable);
    }

    #[test]
    fn test_exchange_account_order() {
        let program_id = Pubkey::new_unique();
        let record = EscrowRecord {
            is_initialized: true,
            initializer: Pubkey::new_unique(),
            temp_token_account: Pubkey::new_unique(),
            initializer_receiving_account: Pubkey::new_unique(),
            expected_amount: 20,
        };
        let taker = Pubkey::new_unique();
        let taker_receiving = Pubkey::new_unique();
        let taker_asset = Pubkey::new_unique();
        let escrow = Pubkey::new_unique();

        let ix = TradeInstructionBuilder::new(program_id)
            .exchange(taker, taker_receiving, taker_asset, escrow, &record, 10)
            .unwrap();

        let (authority, _) = Pubkey::find_program_address(&[b"escrow"], &program_id);
        let keys: Vec<_> = ix.accounts.iter().map(|m| m.pubkey).collect();
        assert_eq!(
            keys,
            vec![
                taker,
                taker_receiving,
                taker_asset,
                record.temp_token_account,
                record.initializer,
                record.initializer_receiving_account,
                escrow,
                spl_token::id(),
                authority,
            ]
        );
        assert!(ix.accounts[0].is_signer);
        assert_eq!(ix.accounts.iter().filter(|m| m.is_signer).count(), 1);
        assert_eq!(ix.data, vec![1, 10, 0, 0, 0, 0, 0, 0, 0]);
    }
}
