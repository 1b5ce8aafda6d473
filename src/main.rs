//! Bidswarm CLI
//!
//! Simulates fleets of searcher-style bidders competing in an on-chain
//! auction via privately-relayed transaction bundles.

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use bidswarm::commands;

#[derive(Parser)]
#[command(name = "bidswarm")]
#[command(about = "Simulate fleets of bundle bidders against an on-chain auction")]
#[command(version)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Deploy the auction contract from the master identity
    Deploy {
        /// Ledger RPC endpoint
        #[arg(long, default_value = "http://localhost:8545")]
        ledger: String,

        /// Seed phrase the fleet is derived from
        #[arg(long)]
        seed: String,
    },

    /// Report or top up agent balances from the master identity
    Fund {
        /// Ledger RPC endpoint
        #[arg(long, default_value = "http://localhost:8545")]
        ledger: String,

        /// Seed phrase the fleet is derived from
        #[arg(long)]
        seed: String,

        /// Number of agent identities to fund
        #[arg(long)]
        accounts: u32,

        /// Target balance per agent, in coins
        #[arg(long)]
        target: String,

        /// Report balances and deficits without sending anything
        #[arg(long)]
        check_only: bool,
    },

    /// Run the bidding fleet
    Run {
        /// Ledger RPC endpoint
        #[arg(long, default_value = "http://localhost:8545")]
        ledger: String,

        /// Bundle relay endpoint
        #[arg(long, default_value = "http://localhost:8545")]
        relay: String,

        /// Seed phrase the fleet is derived from
        #[arg(long)]
        seed: String,

        /// Auction contract address
        #[arg(long)]
        contract: String,

        /// Slot ids to bid on
        #[arg(long, value_delimiter = ',', required = true)]
        slots: Vec<u64>,

        /// Bidders per slot, parallel to --slots
        #[arg(long, value_delimiter = ',', required = true)]
        replicas: Vec<usize>,

        /// Starting price per slot in giga-units, parallel to --slots
        #[arg(long, value_delimiter = ',', required = true)]
        starting_prices: Vec<u64>,

        /// Price increment per slot in giga-units, parallel to --slots
        #[arg(long, value_delimiter = ',', required = true)]
        increments: Vec<u64>,

        /// Bids per second per agent
        #[arg(long, default_value_t = 10)]
        bid_rate: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    match cli.command {
        Commands::Deploy { ledger, seed } => commands::deploy::run(&ledger, &seed).await,
        Commands::Fund {
            ledger,
            seed,
            accounts,
            target,
            check_only,
        } => commands::fund::run(&ledger, &seed, accounts, &target, check_only).await,
        Commands::Run {
            ledger,
            relay,
            seed,
            contract,
            slots,
            replicas,
            starting_prices,
            increments,
            bid_rate,
        } => {
            commands::run::run(commands::run::RunArgs {
                ledger_url: ledger,
                relay_url: relay,
                seed,
                contract,
                slots,
                replicas,
                starting_prices,
                increments,
                bid_rate,
            })
            .await
        }
    }
}
