//! Private Bundle Relay Client
//!
//! Submits signed-transaction bundles to a relay endpoint, outside the
//! public transaction pool. Submission is fire-and-forget: the relay's
//! response is opaque and a bundle is never resubmitted.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::rpc::JsonRpcClient;

/// An ordered set of signed transactions targeted at one round.
///
/// Always a single transaction here; the relay accepts larger bundles
/// but the bidders never need them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bundle {
    /// Hex-encoded signed transactions, in execution order
    pub txs: Vec<String>,
    /// The round the bundle must land in
    pub target_round: u64,
}

impl Bundle {
    /// Wrap one signed transaction into a bundle
    pub fn single(tx_hex: String, target_round: u64) -> Self {
        Self {
            txs: vec![tx_hex],
            target_round,
        }
    }
}

/// Client for one relay endpoint
#[derive(Debug, Clone)]
pub struct RelayClient {
    rpc: JsonRpcClient,
}

impl RelayClient {
    /// Create a client for one relay endpoint
    pub fn new(url: &str) -> Self {
        Self {
            rpc: JsonRpcClient::new(url),
        }
    }

    /// Submit a bundle for its target round.
    ///
    /// The relay's result is returned opaquely; callers only care
    /// whether submission itself failed.
    pub async fn submit_bundle(&self, bundle: &Bundle) -> Result<Value> {
        self.rpc
            .call(
                "relay_submitBundle",
                json!({
                    "txs": bundle.txs,
                    "target_round": bundle.target_round,
                }),
            )
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_bundle() {
        let bundle = Bundle::single("deadbeef".to_string(), 17);
        assert_eq!(bundle.txs, vec!["deadbeef".to_string()]);
        assert_eq!(bundle.target_round, 17);
    }
}
