//! Fleet Orchestration
//!
//! Validates the per-slot configuration lists, derives one identity per
//! replica, and runs one bid agent task per (slot, replica) pair until
//! every task has terminated. There is no mechanism to stop a single
//! agent early; termination is whole-process.

use anyhow::Result;
use futures::future::join_all;
use thiserror::Error;
use tracing::{error, info};

use crate::agent::{BidAgent, BidAgentConfig};
use crate::keys::{Address, Identity};

/// Configuration for one auction target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotConfig {
    /// Slot id on the auction contract
    pub slot: u64,
    /// Number of independent bidders for this slot
    pub replicas: usize,
    /// First offer of each round, in base units
    pub starting_price: u128,
    /// Offer increase per tick, in base units
    pub price_increment: u128,
}

/// Configuration errors, raised before any network activity
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The parallel option lists have different lengths
    #[error(
        "per-slot option lists differ in length: {slots} slots, {replicas} replica counts, \
         {starting_prices} starting prices, {increments} increments"
    )]
    ListLengthMismatch {
        slots: usize,
        replicas: usize,
        starting_prices: usize,
        increments: usize,
    },

    /// No slots were configured
    #[error("at least one slot is required")]
    Empty,

    /// The bid rate must admit at least one tick per second
    #[error("bid rate must be at least 1 bid per second")]
    ZeroBidRate,
}

/// Zip the parallel per-slot option lists into slot configurations.
///
/// Lists must be of equal, nonzero length; this runs before anything
/// touches the network.
pub fn build_slot_configs(
    slots: &[u64],
    replicas: &[usize],
    starting_prices: &[u128],
    increments: &[u128],
) -> Result<Vec<SlotConfig>, ConfigError> {
    if slots.len() != replicas.len()
        || slots.len() != starting_prices.len()
        || slots.len() != increments.len()
    {
        return Err(ConfigError::ListLengthMismatch {
            slots: slots.len(),
            replicas: replicas.len(),
            starting_prices: starting_prices.len(),
            increments: increments.len(),
        });
    }
    if slots.is_empty() {
        return Err(ConfigError::Empty);
    }

    Ok(slots
        .iter()
        .zip(replicas)
        .zip(starting_prices)
        .zip(increments)
        .map(|(((&slot, &replicas), &starting_price), &price_increment)| SlotConfig {
            slot,
            replicas,
            starting_price,
            price_increment,
        })
        .collect())
}

/// Total number of agent identities a configuration needs
pub fn total_replicas(configs: &[SlotConfig]) -> usize {
    configs.iter().map(|c| c.replicas).sum()
}

/// One (slot, replica) pairing with its assigned identity
#[derive(Debug)]
pub struct AgentAssignment {
    pub replica: usize,
    pub identity: Identity,
    pub config: SlotConfig,
}

/// Partition identities into per-slot groups, in derivation order.
///
/// The first slot takes the first `replicas` identities, the next slot
/// the following group, and so on; the assignment for a given seed and
/// configuration is therefore stable across runs.
pub fn assign_agents(configs: &[SlotConfig], agents: Vec<Identity>) -> Vec<AgentAssignment> {
    debug_assert_eq!(agents.len(), total_replicas(configs));

    let mut agents = agents.into_iter();
    let mut assignments = Vec::with_capacity(agents.len());
    for config in configs {
        for replica in 0..config.replicas {
            if let Some(identity) = agents.next() {
                assignments.push(AgentAssignment {
                    replica,
                    identity,
                    config: config.clone(),
                });
            }
        }
    }
    assignments
}

/// Endpoints and shared parameters for a fleet run
#[derive(Debug, Clone)]
pub struct FleetOptions {
    pub ledger_url: String,
    pub relay_url: String,
    pub auction_address: Address,
    pub bid_rate: u64,
}

/// Launch one bid agent task per (slot, replica) pair and wait for all
/// of them.
///
/// Each task gets its own ledger and relay clients; agents share no
/// mutable state. A task's terminal failure is logged with its (slot,
/// replica) label and never aborts its siblings.
pub async fn run_fleet(
    options: &FleetOptions,
    configs: Vec<SlotConfig>,
    agents: Vec<Identity>,
) -> Result<()> {
    if options.bid_rate == 0 {
        return Err(ConfigError::ZeroBidRate.into());
    }

    let assignments = assign_agents(&configs, agents);
    info!(
        "launching {} bid agents across {} slots",
        assignments.len(),
        configs.len()
    );

    let mut labels = Vec::with_capacity(assignments.len());
    let mut handles = Vec::with_capacity(assignments.len());
    for assignment in assignments {
        let config = BidAgentConfig {
            slot: assignment.config.slot,
            replica: assignment.replica,
            starting_price: assignment.config.starting_price,
            price_increment: assignment.config.price_increment,
            bid_rate: options.bid_rate,
        };
        let identity = assignment.identity;
        let ledger_url = options.ledger_url.clone();
        let relay_url = options.relay_url.clone();
        let auction_address = options.auction_address;

        labels.push((config.slot, config.replica));
        handles.push(tokio::spawn(async move {
            let agent =
                BidAgent::connect(config, identity, &ledger_url, &relay_url, auction_address)
                    .await?;
            agent.run().await
        }));
    }

    let results = join_all(handles).await;
    for ((slot, replica), result) in labels.into_iter().zip(results) {
        match result {
            Ok(Ok(())) => info!(slot, replica, "bid agent finished"),
            Ok(Err(e)) => error!(slot, replica, "bid agent failed: {:#}", e),
            Err(e) => error!(slot, replica, "bid agent task aborted: {}", e),
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::derive_fleet;

    #[test]
    fn test_list_length_mismatch_rejected() {
        let result = build_slot_configs(&[1, 2], &[1, 1, 1], &[5, 5], &[1, 1]);
        assert!(matches!(
            result,
            Err(ConfigError::ListLengthMismatch {
                slots: 2,
                replicas: 3,
                ..
            })
        ));
    }

    #[test]
    fn test_empty_configuration_rejected() {
        assert!(matches!(
            build_slot_configs(&[], &[], &[], &[]),
            Err(ConfigError::Empty)
        ));
    }

    #[test]
    fn test_build_slot_configs() {
        let configs = build_slot_configs(&[3, 9], &[2, 1], &[5_000, 7_000], &[100, 200]).unwrap();

        assert_eq!(configs.len(), 2);
        assert_eq!(
            configs[0],
            SlotConfig {
                slot: 3,
                replicas: 2,
                starting_price: 5_000,
                price_increment: 100,
            }
        );
        assert_eq!(configs[1].slot, 9);
        assert_eq!(total_replicas(&configs), 3);
    }

    #[test]
    fn test_agents_partition_in_derivation_order() {
        let configs = build_slot_configs(&[3, 9], &[2, 1], &[5, 5], &[1, 1]).unwrap();
        let (_, agents) = derive_fleet("test-seed", total_replicas(&configs) as u32).unwrap();
        let expected: Vec<_> = agents.iter().map(|a| *a.address()).collect();

        let assignments = assign_agents(&configs, agents);

        assert_eq!(assignments.len(), 3);
        assert_eq!(assignments[0].config.slot, 3);
        assert_eq!(assignments[0].replica, 0);
        assert_eq!(assignments[1].config.slot, 3);
        assert_eq!(assignments[1].replica, 1);
        assert_eq!(assignments[2].config.slot, 9);
        assert_eq!(assignments[2].replica, 0);

        let assigned: Vec<_> = assignments.iter().map(|a| *a.identity.address()).collect();
        assert_eq!(assigned, expected);
    }
}
