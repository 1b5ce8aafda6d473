//! Balance Equalization
//!
//! Tops agent identities up to a target balance from the master
//! identity. All funding transfers share the master's sequence number
//! space, so they are sent strictly sequentially and must never be
//! parallelized.
//!
//! Only the last transfer's confirmation is awaited: the ledger is
//! assumed to confirm one sender's transactions in sequence order, so
//! earlier transfers settle no later than the final one. That ordering
//! assumption is not verified per transfer.

use anyhow::Result;
use thiserror::Error;
use tracing::info;

use crate::keys::{Address, Identity};
use crate::rpc::{LedgerClient, ReceiptStatus};
use crate::transaction::{format_coins, TxBody};

/// Gas limit for a plain value transfer
const TRANSFER_GAS_LIMIT: u64 = 21_000;

/// Errors raised while funding the fleet
#[derive(Debug, Error)]
pub enum FundingError {
    /// The master cannot cover the summed deficits; nothing was sent
    #[error("master balance {available} is below the {required} needed to fund all agents")]
    InsufficientMasterBalance { available: u128, required: u128 },

    /// The awaited funding transfer did not confirm
    #[error("funding transfer {tx_hash} failed on-chain")]
    TransferFailed { tx_hash: String },
}

/// Shortfall between a balance and the target, floored at zero
pub fn deficit(balance: u128, target: u128) -> u128 {
    target.saturating_sub(balance)
}

/// Balance snapshot for one agent identity
#[derive(Debug, Clone)]
pub struct AccountStatus {
    pub index: u32,
    pub address: Address,
    pub balance: u128,
    pub deficit: u128,
}

/// Sum of outstanding deficits across a survey
pub fn total_deficit(statuses: &[AccountStatus]) -> u128 {
    statuses.iter().map(|s| s.deficit).sum()
}

/// Look up every agent's balance and deficit against the target.
///
/// Read-only; fails only if a lookup fails.
pub async fn survey(
    ledger: &LedgerClient,
    agents: &[Identity],
    target: u128,
) -> Result<Vec<AccountStatus>> {
    let mut statuses = Vec::with_capacity(agents.len());
    for agent in agents {
        let balance = ledger.balance_of(agent.address()).await?;
        statuses.push(AccountStatus {
            index: agent.index(),
            address: *agent.address(),
            balance,
            deficit: deficit(balance, target),
        });
    }
    Ok(statuses)
}

/// Send one funding transfer per agent with a nonzero deficit.
///
/// The master balance is checked against the summed deficits before any
/// transfer goes out; on shortfall the whole funding run aborts with
/// zero transfers sent. Returns the total amount disbursed.
pub async fn fund(
    ledger: &LedgerClient,
    master: &Identity,
    statuses: &[AccountStatus],
) -> Result<u128> {
    let required = total_deficit(statuses);
    if required == 0 {
        info!("all agents already at target balance");
        return Ok(0);
    }

    let available = ledger.balance_of(master.address()).await?;
    if available < required {
        return Err(FundingError::InsufficientMasterBalance {
            available,
            required,
        }
        .into());
    }

    let chain_id = ledger.chain_id().await?;
    let fee_cap = ledger.suggested_fee().await?;
    let priority_fee = ledger.suggested_priority_fee().await?;
    let mut sequence = ledger.next_sequence(master.address()).await?;

    let mut last_hash = None;
    for status in statuses.iter().filter(|s| s.deficit > 0) {
        let tx = master.sign_tx(TxBody {
            chain_id,
            sequence,
            fee_cap,
            priority_fee,
            gas_limit: TRANSFER_GAS_LIMIT,
            to: Some(status.address),
            value: status.deficit,
            data: Vec::new(),
        })?;

        let tx_hash = ledger.submit(&tx.to_hex()?).await?;
        info!(
            "funding agent {} with {} coins ({})",
            status.index,
            format_coins(status.deficit),
            tx_hash
        );
        sequence += 1;
        last_hash = Some(tx_hash);
    }

    if let Some(tx_hash) = last_hash {
        let receipt = ledger.await_confirmation(&tx_hash).await?;
        if receipt.status != ReceiptStatus::Confirmed {
            return Err(FundingError::TransferFailed { tx_hash }.into());
        }
    }

    Ok(required)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deficit_floors_at_zero() {
        assert_eq!(deficit(5, 10), 5);
        assert_eq!(deficit(10, 5), 0);
        assert_eq!(deficit(10, 10), 0);
        assert_eq!(deficit(0, 0), 0);
    }

    #[test]
    fn test_deficit_never_exceeds_shortfall() {
        for balance in [0u128, 1, 999, 1_000, 5_000] {
            let target = 1_000u128;
            let d = deficit(balance, target);
            assert!(d <= target);
            assert_eq!(d, target.saturating_sub(balance));
        }
    }

    fn status(index: u32, balance: u128, target: u128) -> AccountStatus {
        AccountStatus {
            index,
            address: Address([index as u8; 32]),
            balance,
            deficit: deficit(balance, target),
        }
    }

    #[test]
    fn test_total_deficit() {
        let target = 1_000;
        let statuses = vec![
            status(1, 0, target),
            status(2, 400, target),
            status(3, 2_000, target),
        ];
        assert_eq!(total_deficit(&statuses), 1_000 + 600);
    }

    #[test]
    fn test_insufficient_master_balance_message() {
        let err = FundingError::InsufficientMasterBalance {
            available: 100,
            required: 250,
        };
        let message = err.to_string();
        assert!(message.contains("100"));
        assert!(message.contains("250"));
    }
}
