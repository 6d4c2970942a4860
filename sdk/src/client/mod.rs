pub mod base;
pub mod escrow;
pub mod funding;
pub mod gateway;
pub mod rpc;

use std::sync::Arc;

use crate::{
    config::AppConfig,
    core::SdkResult,
    prelude::*,
};

pub use base::BaseClient;
pub use escrow::EscrowService;
pub use funding::{FundingGuard, FundingPolicy};
pub use gateway::{ConfirmationPolicy, FundingGateway, LedgerGateway};
pub use rpc::RpcGateway;

/// Escrow client over JSON-RPC
pub struct EscrowClient {
    /// Shared gateway
    pub gateway: Arc<RpcGateway>,
    /// Trade operations service
    pub escrow: EscrowService<RpcGateway>,
}

impl EscrowClient {
    /// Create a client from a loaded configuration
    pub fn from_config(config: &AppConfig) -> SdkResult<Self> {
        config.validate()?;
        let confirmation = config.confirmation.policy();
        let gateway = Arc::new(RpcGateway::new(&config.rpc_url, confirmation.commitment));
        Ok(Self {
            escrow: EscrowService::new(
                gateway.clone(),
                config.program_id,
                confirmation,
                config.funding,
            ),
            gateway,
        })
    }

    /// Get the program ID
    pub fn program_id(&self) -> Pubkey {
        self.escrow.program_id()
    }

    /// Get the RPC endpoint
    pub fn rpc_url(&self) -> &str {
        self.gateway.url()
    }
}
