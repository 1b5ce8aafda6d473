//! Run the bidding fleet

use anyhow::{anyhow, Result};

use crate::fleet::{self, FleetOptions};
use crate::keys::{derive_fleet, Address};
use crate::transaction::UNITS_PER_GIGA;

/// Options for the run command, mirroring its CLI flags
#[derive(Debug, Clone)]
pub struct RunArgs {
    pub ledger_url: String,
    pub relay_url: String,
    pub seed: String,
    pub contract: String,
    pub slots: Vec<u64>,
    pub replicas: Vec<usize>,
    pub starting_prices: Vec<u64>,
    pub increments: Vec<u64>,
    pub bid_rate: u64,
}

/// Run the fleet command
pub async fn run(args: RunArgs) -> Result<()> {
    // Prices arrive in giga-units
    let starting_prices: Vec<u128> = args
        .starting_prices
        .iter()
        .map(|p| *p as u128 * UNITS_PER_GIGA)
        .collect();
    let increments: Vec<u128> = args
        .increments
        .iter()
        .map(|i| *i as u128 * UNITS_PER_GIGA)
        .collect();

    let configs =
        fleet::build_slot_configs(&args.slots, &args.replicas, &starting_prices, &increments)?;

    let auction_address: Address = args
        .contract
        .parse()
        .map_err(|_| anyhow!("invalid auction contract address: {}", args.contract))?;

    let total = fleet::total_replicas(&configs);
    let (_master, agents) = derive_fleet(&args.seed, total as u32)?;

    let options = FleetOptions {
        ledger_url: args.ledger_url,
        relay_url: args.relay_url,
        auction_address,
        bid_rate: args.bid_rate,
    };

    fleet::run_fleet(&options, configs, agents).await
}
