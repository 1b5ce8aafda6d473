//! Deploy the auction contract

use anyhow::Result;

use crate::contract;
use crate::keys::derive_fleet;
use crate::rpc::LedgerClient;

use super::print_success;

/// Run the deploy command
pub async fn run(ledger_url: &str, seed: &str) -> Result<()> {
    let (master, _) = derive_fleet(seed, 0)?;
    let ledger = LedgerClient::new(ledger_url);

    println!("Deploying auction contract from {}", master.address());

    let address = contract::deploy(&ledger, &master).await?;

    print_success(&format!("Auction contract deployed at {}", address));
    Ok(())
}
