//! Persistence layer: the embedded chain store

pub mod store;

pub use store::{ChainIterator, ChainStore, StoreError};
