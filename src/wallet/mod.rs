//! Wallet module for key and address management

pub mod wallet;

pub use wallet::{Wallet, WalletError, Wallets};
