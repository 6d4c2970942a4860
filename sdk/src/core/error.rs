use std::time::Duration;

use solana_sdk::{pubkey::Pubkey, signature::Signature};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SdkError {
    #[error("Malformed escrow layout: expected {expected} bytes, got {actual}")]
    MalformedLayout { expected: usize, actual: usize },

    #[error("Escrow record not found: {0}")]
    RecordNotFound(Pubkey),

    #[error("Escrow record {0} is not initialized")]
    UninitializedRecord(Pubkey),

    #[error("Account not found: {0}")]
    AccountNotFound(Pubkey),

    #[error("Insufficient funds: required {required} lamports, available {available}")]
    InsufficientFunds { required: u64, available: u64 },

    /// Carries the ledger's diagnostic (error and program logs) verbatim
    #[error("Submission rejected: {0}")]
    SubmissionRejected(String),

    /// The transaction may still have applied; re-query state before resubmitting
    #[error("Confirmation of {signature} timed out after {waited:?}")]
    ConfirmationTimeout {
        signature: Signature,
        waited: Duration,
    },

    #[error("Program {0} is not deployed")]
    ProgramNotDeployed(Pubkey),

    #[error("Program {0} is not executable")]
    ProgramNotExecutable(Pubkey),

    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("RPC error: {0}")]
    RpcError(String),

    #[error("Config error: {0}")]
    ConfigError(String),
}

pub type SdkResult<T> = Result<T, SdkError>;
