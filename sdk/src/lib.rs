//! Escrow client SDK
//!
//! Client for a token escrow program on Solana. Provides:
//! - The escrow record codec and instruction encoding
//! - Escrow authority derivation
//! - Trade initiation and settlement over a pluggable ledger gateway
//! - Payer funding checks and confirmation waits
//! - A JSON-RPC gateway and an in-memory ledger for tests
pub mod client;
pub mod config;
pub mod core;
pub mod instructions;
pub mod prelude;
pub mod protocol;
pub mod state;
pub mod testing;

pub use client::{
    BaseClient, ConfirmationPolicy, EscrowClient, EscrowService, FundingGateway, FundingGuard,
    FundingPolicy, LedgerGateway, RpcGateway,
};
pub use config::AppConfig;
pub use core::{
    ConfirmationStatus, InitiateTradeRequest, InitiatedTrade, SdkError, SdkResult,
    TakeTradeRequest,
};
pub use instructions::{EscrowInstruction, TradeInstructionBuilder};
pub use protocol::{derive, DerivedAuthority, PdaBuilder};
pub use state::EscrowRecord;
