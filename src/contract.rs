//! Auction Contract Interface
//!
//! Call encoding for the on-chain auction plus deployment of its
//! bytecode. The contract keeps one committed value per slot; a commit
//! of `(slot, value, target_round)` reverts on-chain when the round or
//! value no longer match. Bidders never validate either locally; they
//! only observe whether submission succeeded.

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::keys::{Address, Identity};
use crate::rpc::{GasEstimateCall, LedgerClient, ReceiptStatus};
use crate::transaction::{format_coins, format_giga, TxBody};

/// Compiled auction contract
const AUCTION_BYTECODE_HEX: &str = "6080806040523461001657610116908161001c8239f35b600080fdfe608080604052600480361015601357600080fd5b600091823560e01c9081637eba7ba61460c0575063b73e739914603557600080fd5b606036600319011260bc57803560243591604435430360ad5782825403609e5760018301809311608b57505580808080478181156083575b4190f11560775780f35b604051903d90823e3d90fd5b506108fc606d565b634e487b7160e01b845260119052602483fd5b6040516301b6e1e760e21b8152fd5b6040516341f833ab60e11b8152fd5b5080fd5b9190503460dc57602036600319011260dc576020925035548152f35b8280fdfea264697066735822122011f3931e3e239632427a61782e9a5c917855da6845ce582d20ce37ce417a948e64736f6c63430008110033";

/// Errors raised while deploying the auction contract
#[derive(Debug, Error)]
pub enum DeployError {
    /// The deployer cannot cover the creation fee
    #[error("deployer balance {available} is below the {required} needed for deployment")]
    InsufficientBalance { available: u128, required: u128 },

    /// The creation transaction was mined but did not succeed
    #[error("deployment transaction failed on-chain")]
    Failed,

    /// The receipt carried no contract address
    #[error("deployment receipt is missing a contract address")]
    MissingAddress,
}

/// Calls understood by the auction contract
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuctionCall {
    /// Read the committed value for a slot
    GetSlot { slot: u64 },
    /// Commit a value for a slot, gated to one target round
    Commit {
        slot: u64,
        value: u128,
        target_round: u64,
    },
}

/// Encode the payable commit call for a bid transaction
pub fn commit_calldata(slot: u64, value: u128, target_round: u64) -> Result<Vec<u8>> {
    bincode::serialize(&AuctionCall::Commit {
        slot,
        value,
        target_round,
    })
    .context("encoding commit call")
}

/// Encode the read-only slot query
pub fn get_slot_calldata(slot: u64) -> Result<Vec<u8>> {
    bincode::serialize(&AuctionCall::GetSlot { slot }).context("encoding slot query")
}

/// Handle to one deployed auction contract
#[derive(Debug, Clone, Copy)]
pub struct Auction {
    address: Address,
}

impl Auction {
    /// Bind to a deployed contract address
    pub fn new(address: Address) -> Self {
        Self { address }
    }

    /// The contract's address
    pub fn address(&self) -> &Address {
        &self.address
    }

    /// Read the current committed value for a slot
    pub async fn read_slot_value(&self, ledger: &LedgerClient, slot: u64) -> Result<u128> {
        let ret = ledger
            .contract_call(&self.address, &get_slot_calldata(slot)?)
            .await?;
        bincode::deserialize(&ret).context("decoding slot value")
    }
}

/// Deploy the auction contract from the given identity.
///
/// The deployer's balance is checked against the worst-case creation fee
/// before anything is sent; a mined-but-failed creation is reported
/// after the fact.
pub async fn deploy(ledger: &LedgerClient, deployer: &Identity) -> Result<Address> {
    let chain_id = ledger.chain_id().await?;
    let fee = ledger.suggested_fee().await?;
    let priority_fee = ledger.suggested_priority_fee().await?;

    let bytecode = hex::decode(AUCTION_BYTECODE_HEX).context("decoding auction bytecode")?;

    let gas_limit = ledger
        .estimate_gas(&GasEstimateCall {
            from: deployer.address().to_string(),
            to: None,
            value: "0".to_string(),
            data_hex: hex::encode(&bytecode),
        })
        .await?;

    let balance = ledger.balance_of(deployer.address()).await?;
    let required = fee * gas_limit as u128;

    info!(
        "deployer balance {} coins, creation fee {} coins, gas limit {}, gas price {} giga, priority fee {} giga",
        format_coins(balance),
        format_coins(required),
        gas_limit,
        format_giga(fee),
        format_giga(priority_fee),
    );

    if balance < required {
        return Err(DeployError::InsufficientBalance {
            available: balance,
            required,
        }
        .into());
    }

    let sequence = ledger.next_sequence(deployer.address()).await?;

    let tx = deployer.sign_tx(TxBody {
        chain_id,
        sequence,
        fee_cap: fee,
        priority_fee,
        gas_limit,
        to: None,
        value: 0,
        data: bytecode,
    })?;

    let tx_hash = ledger.submit(&tx.to_hex()?).await?;
    info!("deployment transaction {}", tx_hash);

    let receipt = ledger.await_confirmation(&tx_hash).await?;
    if receipt.status != ReceiptStatus::Confirmed {
        return Err(DeployError::Failed.into());
    }

    let address = receipt
        .contract_address
        .ok_or(DeployError::MissingAddress)?;
    address
        .parse()
        .map_err(|_| anyhow!("ledger returned an invalid contract address: {}", address))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bytecode_decodes() {
        let bytecode = hex::decode(AUCTION_BYTECODE_HEX).unwrap();
        assert!(!bytecode.is_empty());
    }

    #[test]
    fn test_commit_calldata_roundtrip() {
        let data = commit_calldata(3, 1_000, 42).unwrap();
        let call: AuctionCall = bincode::deserialize(&data).unwrap();
        assert_eq!(
            call,
            AuctionCall::Commit {
                slot: 3,
                value: 1_000,
                target_round: 42,
            }
        );
    }

    #[test]
    fn test_call_encodings_are_distinct() {
        let read = get_slot_calldata(3).unwrap();
        let commit = commit_calldata(3, 0, 0).unwrap();
        assert_ne!(read, commit);
    }
}
