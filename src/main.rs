//! Mini-Coin CLI Application
//!
//! A command-line interface for running a single-currency UTXO ledger node.

use clap::{Parser, Subcommand};
use mini_coin::cli;
use std::path::PathBuf;
use std::process;

#[derive(Parser)]
#[command(name = "mini-coin")]
#[command(version = "0.1.0")]
#[command(about = "A didactic UTXO blockchain with proof-of-work mining", long_about = None)]
struct Cli {
    /// Data directory for the chain database and wallet file
    #[arg(short, long, default_value = ".minicoin_data")]
    data_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a blockchain and send the genesis reward to an address
    CreateBlockchain {
        /// Address receiving the genesis block reward
        #[arg(short, long)]
        address: String,
    },

    /// Generate a new key pair and save it into the wallet file
    CreateWallet,

    /// List all addresses from the wallet file
    ListAddresses,

    /// Get the balance of an address
    GetBalance {
        /// Address to query
        #[arg(short, long)]
        address: String,
    },

    /// Send coins from one address to another, mining the block locally
    Send {
        /// Source wallet address
        #[arg(short, long)]
        from: String,

        /// Destination address
        #[arg(short, long)]
        to: String,

        /// Amount to send
        #[arg(short, long, value_parser = clap::value_parser!(u64).range(1..))]
        amount: u64,

        /// Mine with a reward credited to this address
        #[arg(short, long)]
        miner: Option<String>,
    },

    /// Print all the blocks of the blockchain
    PrintChain,

    /// Rebuild the UTXO index from the block log
    ReindexUtxo,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let Ok(node_id) = std::env::var("NODE_ID") else {
        eprintln!("NODE_ID env. var is not set!");
        process::exit(1);
    };

    let result = match &cli.command {
        Commands::CreateBlockchain { address } => {
            cli::cmd_create_blockchain(&cli.data_dir, &node_id, address)
        }
        Commands::CreateWallet => cli::cmd_create_wallet(&cli.data_dir, &node_id),
        Commands::ListAddresses => cli::cmd_list_addresses(&cli.data_dir, &node_id),
        Commands::GetBalance { address } => {
            cli::cmd_get_balance(&cli.data_dir, &node_id, address)
        }
        Commands::Send {
            from,
            to,
            amount,
            miner,
        } => cli::cmd_send(
            &cli.data_dir,
            &node_id,
            from,
            to,
            *amount,
            miner.as_deref(),
        ),
        Commands::PrintChain => cli::cmd_print_chain(&cli.data_dir, &node_id),
        Commands::ReindexUtxo => cli::cmd_reindex_utxo(&cli.data_dir, &node_id),
    };

    if let Err(e) = result {
        eprintln!("❌ {e}");
        process::exit(1);
    }
}
