//! Command-line front-end for the ledger engine

pub mod commands;

pub use commands::{
    cmd_create_blockchain, cmd_create_wallet, cmd_get_balance, cmd_list_addresses,
    cmd_print_chain, cmd_reindex_utxo, cmd_send, CliResult,
};
