//! Bid Agent
//!
//! One independent bidding loop per (slot, replica). The agent watches
//! the chain height for round transitions, escalates its offer on every
//! tick inside a round, and submits each bid as a single-transaction
//! bundle targeted at the next round.
//!
//! Every bid inside a round reuses the round's captured sequence number:
//! the bids are mutually exclusive alternatives for one account slot,
//! not a burst of distinct transactions.

use std::time::Duration;

use anyhow::{Context, Result};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::contract::{commit_calldata, Auction};
use crate::keys::{Address, Identity};
use crate::relay::{Bundle, RelayClient};
use crate::rpc::LedgerClient;
use crate::transaction::{format_giga, SignedTx, TxBody};

/// Gas limit for a bid commit
const BID_GAS_LIMIT: u64 = 100_000;

/// Static bidding parameters for one agent
#[derive(Debug, Clone)]
pub struct BidAgentConfig {
    /// Auction slot this agent bids on
    pub slot: u64,
    /// Replica number within the slot (labels logs only)
    pub replica: usize,
    /// Offer at the first tick of every round, in base units
    pub starting_price: u128,
    /// Offer increase per same-round tick, in base units
    pub price_increment: u128,
    /// Ticks per second
    pub bid_rate: u64,
}

/// Per-round bidding state, owned exclusively by one agent.
///
/// Reset whenever a new round is observed; the price never decreases
/// within one window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundWindow {
    /// Round this window was opened for
    pub round: u64,
    /// The auction's committed value at the start of the round
    pub baseline_value: u128,
    /// Current offer
    pub price: u128,
    /// Sequence number captured when the round was observed
    pub sequence: u64,
}

impl RoundWindow {
    /// Open a window for a newly observed round
    pub fn open(round: u64, baseline_value: u128, sequence: u64, starting_price: u128) -> Self {
        Self {
            round,
            baseline_value,
            price: starting_price,
            sequence,
        }
    }

    /// Raise the offer for another tick in the same round
    pub fn escalate(&mut self, increment: u128) {
        self.price += increment;
    }
}

/// Whether an observed round requires opening a fresh window
pub fn needs_new_round(window: Option<&RoundWindow>, observed: u64) -> bool {
    match window {
        Some(w) => w.round != observed,
        None => true,
    }
}

/// One bidding loop bound to a single identity
pub struct BidAgent {
    config: BidAgentConfig,
    identity: Identity,
    chain_id: u64,
    ledger: LedgerClient,
    relay: RelayClient,
    auction: Auction,
    window: Option<RoundWindow>,
}

impl BidAgent {
    /// Connect an agent to its ledger and relay endpoints.
    ///
    /// The chain id is fetched once here; a failure is fatal for this
    /// agent (there is nothing to bid against without a chain).
    pub async fn connect(
        config: BidAgentConfig,
        identity: Identity,
        ledger_url: &str,
        relay_url: &str,
        auction_address: Address,
    ) -> Result<Self> {
        let ledger = LedgerClient::new(ledger_url);
        let relay = RelayClient::new(relay_url);
        let chain_id = ledger
            .chain_id()
            .await
            .context("querying chain id at agent startup")?;

        Ok(Self {
            config,
            identity,
            chain_id,
            ledger,
            relay,
            auction: Auction::new(auction_address),
            window: None,
        })
    }

    /// Run the bidding loop forever.
    ///
    /// Ticks are strictly sequential and rate-limited to `bid_rate` per
    /// second with burst 1. Per-tick failures are logged and skipped;
    /// the loop has no other exit, so termination is whole-process.
    pub async fn run(mut self) -> Result<()> {
        let period = Duration::from_secs_f64(1.0 / self.config.bid_rate as f64);
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            slot = self.config.slot,
            replica = self.config.replica,
            "bid agent started as {}",
            self.identity.address()
        );

        loop {
            ticker.tick().await;
            if let Err(e) = self.tick().await {
                warn!(
                    slot = self.config.slot,
                    replica = self.config.replica,
                    "tick skipped: {:#}",
                    e
                );
            }
        }
    }

    /// One bidding tick: observe the round, adjust the offer, submit a
    /// bundle.
    ///
    /// State is only committed after every query for a new round has
    /// succeeded, so a failed tick leaves the window untouched and the
    /// next tick retries the same round detection.
    async fn tick(&mut self) -> Result<()> {
        let round = self
            .ledger
            .block_height()
            .await
            .context("querying round number")?;

        let window = if needs_new_round(self.window.as_ref(), round) {
            let baseline_value = self
                .auction
                .read_slot_value(&self.ledger, self.config.slot)
                .await
                .context("querying slot value")?;
            let sequence = self
                .ledger
                .next_sequence(self.identity.address())
                .await
                .context("querying sequence number")?;

            info!(
                slot = self.config.slot,
                replica = self.config.replica,
                "switching to new round {}",
                round
            );
            let window = RoundWindow::open(round, baseline_value, sequence, self.config.starting_price);
            self.window = Some(window.clone());
            window
        } else {
            // Checked by needs_new_round above
            let window = self.window.as_mut().expect("window exists for same round");
            window.escalate(self.config.price_increment);
            window.clone()
        };

        let target_round = round + 1;
        let tx = self.build_bid(&window, target_round)?;
        let tx_hex = tx.to_hex().context("encoding bid")?;

        debug!(
            slot = self.config.slot,
            replica = self.config.replica,
            round,
            "bidding {} giga for round {}",
            format_giga(window.price),
            target_round
        );

        self.relay
            .submit_bundle(&Bundle::single(tx_hex, target_round))
            .await
            .context("submitting bundle")?;

        Ok(())
    }

    /// Build and sign a bid for the current window
    fn build_bid(&self, window: &RoundWindow, target_round: u64) -> Result<SignedTx> {
        let data = commit_calldata(self.config.slot, window.baseline_value, target_round)?;
        let tx = self.identity.sign_tx(TxBody {
            chain_id: self.chain_id,
            sequence: window.sequence,
            fee_cap: window.price,
            priority_fee: window.price,
            gas_limit: BID_GAS_LIMIT,
            to: Some(*self.auction.address()),
            value: 0,
            data,
        })?;
        Ok(tx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const START: u128 = 5_000_000_000;
    const INCREMENT: u128 = 1_000_000_000;

    #[test]
    fn test_price_escalates_by_increment_within_round() {
        let mut window = RoundWindow::open(7, 1_000, 3, START);

        let mut prices = vec![window.price];
        for _ in 0..2 {
            window.escalate(INCREMENT);
            prices.push(window.price);
        }

        assert_eq!(prices, vec![5_000_000_000, 6_000_000_000, 7_000_000_000]);
    }

    #[test]
    fn test_price_sequence_is_arithmetic() {
        let mut window = RoundWindow::open(1, 0, 0, START);
        for k in 0..10u128 {
            assert_eq!(window.price, START + k * INCREMENT);
            window.escalate(INCREMENT);
        }
    }

    #[test]
    fn test_new_round_resets_price_exactly() {
        let mut window = RoundWindow::open(7, 1_000, 3, START);
        for _ in 0..100 {
            window.escalate(INCREMENT);
        }
        assert!(window.price > START);

        let next = RoundWindow::open(8, 2_000, 4, START);
        assert_eq!(next.price, START);
        assert_eq!(next.round, 8);
    }

    #[test]
    fn test_sequence_unchanged_within_round() {
        let mut window = RoundWindow::open(7, 1_000, 3, START);
        for _ in 0..5 {
            window.escalate(INCREMENT);
            assert_eq!(window.sequence, 3);
        }
    }

    #[test]
    fn test_needs_new_round() {
        assert!(needs_new_round(None, 7));

        let window = RoundWindow::open(7, 0, 0, START);
        assert!(!needs_new_round(Some(&window), 7));
        assert!(needs_new_round(Some(&window), 8));
        assert!(needs_new_round(Some(&window), 6));
    }
}
