//! Report or equalize agent balances

use anyhow::Result;

use crate::funding::{self, total_deficit};
use crate::keys::derive_fleet;
use crate::rpc::LedgerClient;
use crate::transaction::{format_coins, parse_coins};

use super::{print_error, print_success, print_warning};

/// Run the fund command
pub async fn run(
    ledger_url: &str,
    seed: &str,
    accounts: u32,
    target: &str,
    check_only: bool,
) -> Result<()> {
    if accounts == 0 {
        print_error("Nothing to fund: --accounts is zero.");
        return Ok(());
    }

    let target = parse_coins(target)?;
    let (master, agents) = derive_fleet(seed, accounts)?;
    let ledger = LedgerClient::new(ledger_url);

    println!("Surveying {} agent balances...", agents.len());
    let statuses = funding::survey(&ledger, &agents, target).await?;

    println!();
    println!(
        "{:>5}  {:<64} {:>16} {:>16}",
        "idx", "address", "balance", "deficit"
    );
    for status in &statuses {
        println!(
            "{:>5}  {:<64} {:>16} {:>16}",
            status.index,
            status.address.to_string(),
            format_coins(status.balance),
            format_coins(status.deficit),
        );
    }
    println!();
    println!(
        "Total deficit: {} coins across {} agents",
        format_coins(total_deficit(&statuses)),
        statuses.iter().filter(|s| s.deficit > 0).count(),
    );

    if check_only {
        if total_deficit(&statuses) > 0 {
            print_warning("Agents are below target. Run again without --check-only to fund them.");
        }
        return Ok(());
    }

    let disbursed = funding::fund(&ledger, &master, &statuses).await?;

    println!();
    print_success(&format!("Disbursed {} coins", format_coins(disbursed)));
    Ok(())
}
