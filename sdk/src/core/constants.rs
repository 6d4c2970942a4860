use solana_program::program_pack::Pack;

/// Seeds for program-derived addresses
pub mod seeds {
    /// Authority that takes ownership of every holding account
    pub const ESCROW: &[u8] = b"escrow";
}

/// Serialized size of an escrow record: flag + three addresses + amount
pub const ESCROW_ACCOUNT_LEN: usize = 1 + 32 + 32 + 32 + 8;

/// Size of an SPL token account
pub const TOKEN_ACCOUNT_LEN: usize = spl_token::state::Account::LEN;

/// Default RPC endpoint when none is configured
pub const DEFAULT_RPC_URL: &str = "http://localhost:8899";

/// Base fee per signature on the default cluster configuration
pub const DEFAULT_LAMPORTS_PER_SIGNATURE: u64 = 5_000;
