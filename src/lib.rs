//! Bidswarm
//!
//! A load generator that simulates fleets of searcher-style bidders
//! competing in a blind, repeated first-price auction hosted by an
//! on-chain contract. Bids are delivered as single-transaction bundles
//! through a private relay rather than the public transaction pool.
//!
//! ## Model
//!
//! - Every bidder identity is derived deterministically from one seed
//!   phrase; keys never leave the process and are never persisted
//! - Each bid agent owns its round state and its own ledger connection;
//!   agents share nothing but the auction contract and the relay
//! - Within a round an agent raises its offer by a fixed increment per
//!   tick; a new round resets the offer to the configured start

pub mod agent;
pub mod contract;
pub mod fleet;
pub mod funding;
pub mod keys;
pub mod relay;
pub mod rpc;
pub mod transaction;

pub mod commands;

pub use agent::{BidAgent, BidAgentConfig, RoundWindow};
pub use fleet::SlotConfig;
pub use keys::{derive_fleet, Address, Identity};
pub use relay::{Bundle, RelayClient};
pub use rpc::LedgerClient;
