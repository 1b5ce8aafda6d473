//! Ledger RPC Client
//!
//! A thin JSON-RPC 2.0 client over HTTP for one ledger endpoint. Each
//! bid agent owns its own client; there is no shared connection state.

use anyhow::{anyhow, Context, Result};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Value};
use std::{
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};
use tracing::debug;

use crate::keys::Address;

/// Timeout for RPC requests
const RPC_TIMEOUT: Duration = Duration::from_secs(30);

/// Interval between receipt polls
const CONFIRM_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Receipt polls before a confirmation wait gives up (ten minutes)
const CONFIRM_POLL_LIMIT: u32 = 1200;

/// JSON-RPC request ID counter
static REQUEST_ID: AtomicU64 = AtomicU64::new(1);

/// JSON-RPC 2.0 request
#[derive(Debug, Serialize)]
struct JsonRpcRequest {
    jsonrpc: &'static str,
    method: String,
    params: Value,
    id: u64,
}

/// JSON-RPC 2.0 response
#[derive(Debug, Deserialize)]
struct JsonRpcResponse<T> {
    #[allow(dead_code)]
    jsonrpc: String,
    result: Option<T>,
    error: Option<JsonRpcError>,
    #[allow(dead_code)]
    id: u64,
}

/// JSON-RPC error
#[derive(Debug, Deserialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    pub data: Option<Value>,
}

/// Bare JSON-RPC endpoint shared by the ledger and relay clients
#[derive(Debug, Clone)]
pub(crate) struct JsonRpcClient {
    client: reqwest::Client,
    url: String,
}

impl JsonRpcClient {
    pub(crate) fn new(url: &str) -> Self {
        let client = reqwest::Client::builder()
            .timeout(RPC_TIMEOUT)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            url: url.to_string(),
        }
    }

    pub(crate) async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T> {
        let id = REQUEST_ID.fetch_add(1, Ordering::SeqCst);
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            method: method.to_string(),
            params,
            id,
        };

        let response = self.client.post(&self.url).json(&request).send().await?;

        if !response.status().is_success() {
            return Err(anyhow!("HTTP error: {}", response.status()));
        }

        let json_response: JsonRpcResponse<T> = response.json().await?;

        if let Some(error) = json_response.error {
            return Err(anyhow!("RPC error {}: {}", error.code, error.message));
        }

        json_response
            .result
            .ok_or_else(|| anyhow!("Missing result in RPC response"))
    }
}

/// Ledger client with typed methods for the calls the bidders make
#[derive(Debug, Clone)]
pub struct LedgerClient {
    rpc: JsonRpcClient,
}

impl LedgerClient {
    /// Create a client for one ledger endpoint
    pub fn new(url: &str) -> Self {
        Self {
            rpc: JsonRpcClient::new(url),
        }
    }

    /// Get the ledger's chain id
    pub async fn chain_id(&self) -> Result<u64> {
        let result: ChainIdResult = self.rpc.call("chain_getId", json!({})).await?;
        Ok(result.chain_id)
    }

    /// Get the current block height
    pub async fn block_height(&self) -> Result<u64> {
        let result: HeightResult = self.rpc.call("chain_getHeight", json!({})).await?;
        Ok(result.height)
    }

    /// Get an account's balance in base units
    pub async fn balance_of(&self, address: &Address) -> Result<u128> {
        let result: BalanceResult = self
            .rpc
            .call("account_getBalance", json!({ "address": address.to_string() }))
            .await?;
        result
            .balance
            .parse()
            .context("ledger returned an unparsable balance")
    }

    /// Get the next expected sequence number for an account
    pub async fn next_sequence(&self, address: &Address) -> Result<u64> {
        let result: SequenceResult = self
            .rpc
            .call("account_getSequence", json!({ "address": address.to_string() }))
            .await?;
        Ok(result.sequence)
    }

    /// Get the suggested gas price in base units
    pub async fn suggested_fee(&self) -> Result<u128> {
        let result: FeeResult = self.rpc.call("fee_suggestGasPrice", json!({})).await?;
        result
            .fee
            .parse()
            .context("ledger returned an unparsable fee")
    }

    /// Get the suggested priority fee in base units
    pub async fn suggested_priority_fee(&self) -> Result<u128> {
        let result: FeeResult = self.rpc.call("fee_suggestPriorityFee", json!({})).await?;
        result
            .fee
            .parse()
            .context("ledger returned an unparsable fee")
    }

    /// Estimate the gas needed for a call or contract creation
    pub async fn estimate_gas(&self, call: &GasEstimateCall) -> Result<u64> {
        let result: GasResult = self
            .rpc
            .call("tx_estimateGas", serde_json::to_value(call)?)
            .await?;
        Ok(result.gas)
    }

    /// Submit a signed transaction, returning its hash
    pub async fn submit(&self, tx_hex: &str) -> Result<String> {
        let result: SubmitTxResult = self.rpc.call("tx_submit", json!({ "tx_hex": tx_hex })).await?;
        Ok(result.tx_hash)
    }

    /// Fetch the receipt for a transaction
    pub async fn get_receipt(&self, tx_hash: &str) -> Result<TxReceipt> {
        self.rpc
            .call("tx_getReceipt", json!({ "tx_hash": tx_hash }))
            .await
    }

    /// Wait for a transaction to leave the pending state.
    ///
    /// Poll failures are tolerated (a node may not know the hash yet);
    /// the wait only fails once the poll budget is exhausted.
    pub async fn await_confirmation(&self, tx_hash: &str) -> Result<TxReceipt> {
        for _ in 0..CONFIRM_POLL_LIMIT {
            match self.get_receipt(tx_hash).await {
                Ok(receipt) if receipt.status != ReceiptStatus::Pending => return Ok(receipt),
                Ok(_) => {}
                Err(e) => debug!("receipt poll for {} failed: {:#}", tx_hash, e),
            }
            tokio::time::sleep(CONFIRM_POLL_INTERVAL).await;
        }
        Err(anyhow!("transaction {} was not confirmed in time", tx_hash))
    }

    /// Execute a read-only contract call, returning the raw return bytes
    pub async fn contract_call(&self, contract: &Address, call_data: &[u8]) -> Result<Vec<u8>> {
        let result: CallResult = self
            .rpc
            .call(
                "contract_call",
                json!({
                    "contract": contract.to_string(),
                    "call_hex": hex::encode(call_data),
                }),
            )
            .await?;
        hex::decode(&result.return_hex).context("ledger returned invalid call result hex")
    }
}

// Response types for RPC calls

#[derive(Debug, Deserialize)]
struct ChainIdResult {
    chain_id: u64,
}

#[derive(Debug, Deserialize)]
struct HeightResult {
    height: u64,
}

#[derive(Debug, Deserialize)]
struct BalanceResult {
    balance: String,
}

#[derive(Debug, Deserialize)]
struct SequenceResult {
    sequence: u64,
}

#[derive(Debug, Deserialize)]
struct FeeResult {
    fee: String,
}

#[derive(Debug, Deserialize)]
struct GasResult {
    gas: u64,
}

#[derive(Debug, Deserialize)]
struct SubmitTxResult {
    tx_hash: String,
}

#[derive(Debug, Deserialize)]
struct CallResult {
    return_hex: String,
}

/// Parameters for a gas estimate
#[derive(Debug, Clone, Serialize)]
pub struct GasEstimateCall {
    pub from: String,
    pub to: Option<String>,
    pub value: String,
    pub data_hex: String,
}

/// Terminal state of a submitted transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReceiptStatus {
    Pending,
    Confirmed,
    Failed,
}

/// Transaction receipt returned by `tx_getReceipt`
#[derive(Debug, Clone, Deserialize)]
pub struct TxReceipt {
    pub status: ReceiptStatus,
    #[serde(default)]
    pub contract_address: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_receipt_status_decoding() {
        let receipt: TxReceipt = serde_json::from_str(
            r#"{"status": "confirmed", "contract_address": "00ab"}"#,
        )
        .unwrap();
        assert_eq!(receipt.status, ReceiptStatus::Confirmed);
        assert_eq!(receipt.contract_address.as_deref(), Some("00ab"));

        let pending: TxReceipt = serde_json::from_str(r#"{"status": "pending"}"#).unwrap();
        assert_eq!(pending.status, ReceiptStatus::Pending);
        assert!(pending.contract_address.is_none());
    }

    #[test]
    fn test_gas_estimate_serialization() {
        let call = GasEstimateCall {
            from: "aa".repeat(32),
            to: None,
            value: "0".to_string(),
            data_hex: "6080".to_string(),
        };
        let value = serde_json::to_value(&call).unwrap();
        assert!(value["to"].is_null());
        assert_eq!(value["data_hex"], "6080");
    }
}
