//! Lightweight JSON-RPC gateway
//!
//! Implements only the methods the escrow client needs over `ureq`, avoiding
//! the dependency chain of solana-client.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use serde::Deserialize;
use serde_json::{json, Value};
use solana_sdk::{
    account::Account, hash::Hash, signature::Signature, transaction::Transaction,
};
use tracing::{debug, error};

use crate::{
    client::{FundingGateway, LedgerGateway},
    core::{ConfirmationStatus, SdkError, SdkResult, SignatureStatus},
    prelude::*,
};

/// RPC response wrapper
#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcErrorObject>,
}

/// RPC error structure
#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
    data: Option<Value>,
}

/// Value wrapped in an RPC context
#[derive(Debug, Deserialize)]
struct WithContext<T> {
    value: T,
}

#[derive(Debug, Deserialize)]
struct BlockhashValue {
    blockhash: String,
}

/// Account data response from RPC
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UiAccount {
    lamports: u64,
    data: (String, String), // (data, encoding)
    owner: String,
    executable: bool,
    rent_epoch: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UiSignatureStatus {
    confirmation_status: Option<ConfirmationStatus>,
    err: Option<Value>,
}

/// Why a JSON-RPC call failed
#[derive(Debug)]
enum CallError {
    /// Request never produced a well-formed response
    Transport(String),
    /// The node answered with an error object
    Rpc(RpcErrorObject),
}

impl From<CallError> for SdkError {
    fn from(err: CallError) -> Self {
        match err {
            CallError::Transport(msg) => SdkError::RpcError(msg),
            CallError::Rpc(e) => SdkError::RpcError(format!("{}: {}", e.code, e.message)),
        }
    }
}

/// JSON-RPC implementation of the ledger gateway
pub struct RpcGateway {
    url: String,
    agent: ureq::Agent,
    commitment: ConfirmationStatus,
}

impl RpcGateway {
    pub fn new(url: &str, commitment: ConfirmationStatus) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(Duration::from_secs(10))
            .timeout_read(Duration::from_secs(30))
            .build();

        Self {
            url: url.to_string(),
            agent,
            commitment,
        }
    }

    /// Get the RPC endpoint URL
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Make a JSON-RPC call
    async fn call<T>(&self, method: &str, params: Value) -> Result<T, CallError>
    where
        T: for<'de> Deserialize<'de>,
    {
        let request_body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params
        });

        debug!(method, "rpc call");

        // ureq is blocking
        let response_body = tokio::task::spawn_blocking({
            let agent = self.agent.clone();
            let url = self.url.clone();
            let body = request_body.to_string();

            move || {
                let response = agent
                    .post(&url)
                    .set("Content-Type", "application/json")
                    .send_string(&body)?;
                response.into_string().map_err(ureq::Error::from)
            }
        })
        .await
        .map_err(|e| CallError::Transport(e.to_string()))?
        .map_err(|e| CallError::Transport(format!("{}: {}", method, e)))?;

        let rpc_response: RpcResponse<T> = serde_json::from_str(&response_body)
            .map_err(|e| CallError::Transport(format!("{}: invalid response: {}", method, e)))?;

        if let Some(error) = rpc_response.error {
            return Err(CallError::Rpc(error));
        }

        rpc_response
            .result
            .ok_or_else(|| CallError::Transport(format!("{}: no result in response", method)))
    }

    fn commitment_config(&self) -> Value {
        json!({ "commitment": self.commitment.as_str() })
    }
}

/// Render a preflight failure with its program logs, unmodified
fn rejection_message(error: &RpcErrorObject) -> String {
    let mut message = format!("{} (code {})", error.message, error.code);
    if let Some(data) = &error.data {
        if let Some(err) = data.get("err").filter(|e| !e.is_null()) {
            message.push_str(&format!("\nerror: {}", err));
        }
        if let Some(logs) = data.get("logs").and_then(Value::as_array) {
            for line in logs.iter().filter_map(Value::as_str) {
                message.push('\n');
                message.push_str(line);
            }
        }
    }
    message
}

#[async_trait]
impl LedgerGateway for RpcGateway {
    async fn latest_blockhash(&self) -> SdkResult<Hash> {
        let response: WithContext<BlockhashValue> = self
            .call("getLatestBlockhash", json!([self.commitment_config()]))
            .await?;

        response
            .value
            .blockhash
            .parse()
            .map_err(|e| SdkError::RpcError(format!("failed to parse blockhash: {}", e)))
    }

    async fn submit_transaction(&self, transaction: &Transaction) -> SdkResult<Signature> {
        let serialized_tx = bincode::serialize(transaction)
            .map_err(|e| SdkError::SerializationError(e.to_string()))?;
        let encoded_tx = base64::engine::general_purpose::STANDARD.encode(serialized_tx);

        let params = json!([
            encoded_tx,
            {
                "encoding": "base64",
                "preflightCommitment": self.commitment.as_str()
            }
        ]);

        let sig_str: String = match self.call("sendTransaction", params).await {
            Ok(sig) => sig,
            Err(CallError::Rpc(e)) => {
                let message = rejection_message(&e);
                error!(%message, "transaction rejected");
                return Err(SdkError::SubmissionRejected(message));
            }
            Err(e) => return Err(e.into()),
        };

        sig_str
            .parse()
            .map_err(|e| SdkError::RpcError(format!("failed to parse signature: {}", e)))
    }

    async fn get_account(&self, address: &Pubkey) -> SdkResult<Option<Account>> {
        let params = json!([
            address.to_string(),
            {
                "encoding": "base64",
                "commitment": self.commitment.as_str()
            }
        ]);

        let response: WithContext<Option<UiAccount>> =
            self.call("getAccountInfo", params).await?;
        let Some(account) = response.value else {
            return Ok(None);
        };

        if account.data.1 != "base64" {
            return Err(SdkError::RpcError(format!(
                "unsupported data encoding: {}",
                account.data.1
            )));
        }
        let data = base64::engine::general_purpose::STANDARD
            .decode(&account.data.0)
            .map_err(|e| SdkError::RpcError(format!("failed to decode account data: {}", e)))?;

        let owner = account
            .owner
            .parse()
            .map_err(|e| SdkError::RpcError(format!("failed to parse owner: {}", e)))?;

        Ok(Some(Account {
            lamports: account.lamports,
            data,
            owner,
            executable: account.executable,
            rent_epoch: account.rent_epoch,
        }))
    }

    async fn minimum_balance_for_rent_exemption(&self, space: usize) -> SdkResult<u64> {
        Ok(self
            .call("getMinimumBalanceForRentExemption", json!([space]))
            .await?)
    }

    async fn signature_status(&self, signature: &Signature) -> SdkResult<Option<SignatureStatus>> {
        let params = json!([
            [signature.to_string()],
            { "searchTransactionHistory": true }
        ]);

        let response: WithContext<Vec<Option<UiSignatureStatus>>> =
            self.call("getSignatureStatuses", params).await?;

        Ok(response
            .value
            .into_iter()
            .next()
            .flatten()
            .map(|status| SignatureStatus {
                // Nodes omit the level only for very old entries, which are rooted
                confirmation: status
                    .confirmation_status
                    .unwrap_or(ConfirmationStatus::Finalized),
                err: status.err.filter(|e| !e.is_null()).map(|e| e.to_string()),
            }))
    }
}

#[async_trait]
impl FundingGateway for RpcGateway {
    async fn get_balance(&self, address: &Pubkey) -> SdkResult<u64> {
        let response: WithContext<u64> = self
            .call(
                "getBalance",
                json!([address.to_string(), self.commitment_config()]),
            )
            .await?;
        Ok(response.value)
    }

    async fn request_airdrop(&self, address: &Pubkey, lamports: u64) -> SdkResult<Signature> {
        let sig_str: String = self
            .call("requestAirdrop", json!([address.to_string(), lamports]))
            .await?;
        sig_str
            .parse()
            .map_err(|e| SdkError::RpcError(format!("failed to parse signature: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejection_message_keeps_logs() {
        let error: RpcErrorObject = serde_json::from_value(json!({
            "code": -32002,
            "message": "Transaction simulation failed: Error processing Instruction 0: custom program error: 0x0",
            "data": {
                "err": { "InstructionError": [0, { "Custom": 0 }] },
                "logs": [
                    "Program log: Instruction: Exchange",
                    "Program failed: custom program error: 0x0"
                ]
            }
        }))
        .unwrap();

        let message = rejection_message(&error);
        assert!(message.starts_with("Transaction simulation failed"));
        assert!(message.contains("(code -32002)"));
        assert!(message.contains("InstructionError"));
        assert!(message.contains("Program log: Instruction: Exchange"));
        assert!(message.ends_with("Program failed: custom program error: 0x0"));
    }

    #[test]
    fn test_signature_status_parsing() {
        let parsed: WithContext<Vec<Option<UiSignatureStatus>>> = serde_json::from_value(json!({
            "context": { "slot": 82 },
            "value": [
                { "slot": 72, "confirmations": 10, "err": null, "status": { "Ok": null }, "confirmationStatus": "confirmed" },
                null
            ]
        }))
        .unwrap();

        let first = parsed.value[0].as_ref().unwrap();
        assert_eq!(first.confirmation_status, Some(ConfirmationStatus::Confirmed));
        assert!(first.err.is_none());
        assert!(parsed.value[1].is_none());
    }

    #[test]
    fn test_account_parsing() {
        let parsed: WithContext<Option<UiAccount>> = serde_json::from_value(json!({
            "context": { "slot": 1 },
            "value": {
                "data": ["AQID", "base64"],
                "executable": false,
                "lamports": 1_000_000_000u64,
                "owner": "11111111111111111111111111111111",
                "rentEpoch": 18446744073709551615u64,
                "space": 3
            }
        }))
        .unwrap();

        let account = parsed.value.unwrap();
        assert_eq!(account.lamports, 1_000_000_000);
        assert_eq!(account.data.1, "base64");
        assert_eq!(account.rent_epoch, u64::MAX);
    }
}
