//! CLI commands for the blockchain
//!
//! Implements the command handlers for the front-end. Each command opens
//! the node's chain, does its work, and prints a human-readable result;
//! typed ledger errors surface here as messages.

use chrono::DateTime;
use std::path::Path;

use crate::core::{Blockchain, ProofOfWork, UtxoSet};
use crate::crypto::address::validate_address;
use crate::wallet::Wallets;

/// Result type for CLI operations
pub type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

/// Create the blockchain and send the genesis reward to an address
pub fn cmd_create_blockchain(data_dir: &Path, node_id: &str, address: &str) -> CliResult<()> {
    check_address(address)?;

    let chain = Blockchain::create(data_dir, node_id, address)?;
    println!("⛓️  Blockchain ready for node {node_id}");
    println!("   Genesis reward sent to {address}");
    println!("   Tip: {}", chain.tip()?);
    Ok(())
}

/// Generate a new key pair and store it in the node's wallet file
pub fn cmd_create_wallet(data_dir: &Path, node_id: &str) -> CliResult<()> {
    let mut wallets = Wallets::open(data_dir, node_id)?;
    let address = wallets.create_wallet()?;

    println!("🔐 New wallet created");
    println!("   Address: {address}");
    Ok(())
}

/// List every address in the node's wallet file
pub fn cmd_list_addresses(data_dir: &Path, node_id: &str) -> CliResult<()> {
    let wallets = Wallets::open(data_dir, node_id)?;
    let addresses = wallets.addresses();

    if addresses.is_empty() {
        println!("📭 No wallets yet. Create one with: mini-coin create-wallet");
        return Ok(());
    }

    for address in addresses {
        println!("{address}");
    }
    Ok(())
}

/// Show the balance of an address
pub fn cmd_get_balance(data_dir: &Path, node_id: &str, address: &str) -> CliResult<()> {
    check_address(address)?;

    let chain = Blockchain::open(data_dir, node_id)?;
    let balance = chain.balance(address)?;

    println!("💰 Balance of {address}: {balance}");
    Ok(())
}

/// Send coins and mine the containing block locally
pub fn cmd_send(
    data_dir: &Path,
    node_id: &str,
    from: &str,
    to: &str,
    amount: u64,
    miner: Option<&str>,
) -> CliResult<()> {
    check_address(from)?;
    check_address(to)?;
    if let Some(miner) = miner {
        check_address(miner)?;
    }

    let chain = Blockchain::open(data_dir, node_id)?;
    let txid = chain.send(from, to, amount, miner)?;

    println!("📤 Sent {amount} from {from} to {to}");
    println!("   Transaction: {txid}");
    println!("   New height: {}", chain.best_height()?);
    Ok(())
}

/// Print every block from the tip back to genesis
pub fn cmd_print_chain(data_dir: &Path, node_id: &str) -> CliResult<()> {
    let chain = Blockchain::open(data_dir, node_id)?;

    for block in chain.iter()? {
        let block = block?;

        println!("============ Block {} ============", block.hash);
        println!("Height:    {}", block.header.height);
        match &block.header.prev_hash {
            Some(prev) => println!("Prev:      {prev}"),
            None => println!("Prev:      (genesis)"),
        }
        println!("Time:      {}", format_timestamp(block.header.timestamp));
        let pow = ProofOfWork::new(&block.header);
        println!("PoW valid: {}", pow.validate());
        for tx in &block.transactions {
            print!("{tx}");
        }
        println!();
    }
    Ok(())
}

/// Rebuild the UTXO index from the block log
pub fn cmd_reindex_utxo(data_dir: &Path, node_id: &str) -> CliResult<()> {
    let chain = Blockchain::open(data_dir, node_id)?;
    let utxo_set = UtxoSet::new(&chain);
    utxo_set.reindex()?;

    let count = utxo_set.count_transactions()?;
    println!("🔁 Reindex done: {count} transactions in the chainstate");
    Ok(())
}

fn check_address(address: &str) -> CliResult<()> {
    if !validate_address(address) {
        return Err(format!("address is not valid: {address}").into());
    }
    Ok(())
}

fn format_timestamp(timestamp: i64) -> String {
    DateTime::from_timestamp(timestamp, 0)
        .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| timestamp.to_string())
}
