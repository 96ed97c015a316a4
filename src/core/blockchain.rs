//! Blockchain implementation
//!
//! The ledger engine: it owns the chain store handle, assembles and mines
//! blocks, spends unspent outputs into new transactions, and keeps the
//! chainstate index in step with the block log.

use log::{debug, info};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::core::block::{Block, BlockHash};
use crate::core::codec::CodecError;
use crate::core::pow::TARGET_BITS;
use crate::core::transaction::{Transaction, TxId, TxInput, TxOutput, TxOutputs};
use crate::core::utxo_set::UtxoSet;
use crate::crypto::address::{address_to_pubkey_hash, AddressError};
use crate::storage::store::{ChainIterator, ChainStore, StoreError};

/// Ledger errors
#[derive(Error, Debug)]
pub enum ChainError {
    #[error("invalid block: {0}")]
    InvalidBlock(String),
    #[error("refusing to mine a block with no transactions")]
    EmptyMiningBatch,
    #[error("insufficient funds: have {have}, need {need}")]
    InsufficientFunds { have: u64, need: u64 },
    #[error(transparent)]
    Address(#[from] AddressError),
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// The persistent chain of blocks for one node
pub struct Blockchain {
    store: ChainStore,
    target_bits: u32,
}

impl Blockchain {
    /// The database file for a node, `blockchain_<node_id>.db`
    pub fn db_path(data_dir: &Path, node_id: &str) -> PathBuf {
        data_dir.join(format!("blockchain_{node_id}.db"))
    }

    /// Open the chain for a node, creating it with a genesis block paying
    /// the reward to `address` if it does not exist yet
    pub fn create(data_dir: &Path, node_id: &str, address: &str) -> Result<Self, ChainError> {
        Self::create_with_bits(data_dir, node_id, address, TARGET_BITS)
    }

    /// [`create`](Self::create) with a custom difficulty, used by tests to
    /// keep mining fast
    pub fn create_with_bits(
        data_dir: &Path,
        node_id: &str,
        address: &str,
        target_bits: u32,
    ) -> Result<Self, ChainError> {
        let pubkey_hash = address_to_pubkey_hash(address)?;
        let store = ChainStore::open(&Self::db_path(data_dir, node_id))?;
        let chain = Self { store, target_bits };

        if !chain.store.is_initialized()? {
            let coinbase = Transaction::new_coinbase(&pubkey_hash, "", 0)?;
            let genesis = Block::genesis(coinbase, target_bits);
            chain.store.put_block(&genesis)?;
            info!("created genesis block {}", genesis.hash);
        }

        UtxoSet::new(&chain).reindex()?;
        Ok(chain)
    }

    /// Open an existing chain for a node
    pub fn open(data_dir: &Path, node_id: &str) -> Result<Self, ChainError> {
        Self::open_with_bits(data_dir, node_id, TARGET_BITS)
    }

    /// [`open`](Self::open) with a custom difficulty
    pub fn open_with_bits(
        data_dir: &Path,
        node_id: &str,
        target_bits: u32,
    ) -> Result<Self, ChainError> {
        let store = ChainStore::open(&Self::db_path(data_dir, node_id))?;
        if !store.is_initialized()? {
            return Err(StoreError::NotInitialized.into());
        }
        let chain = Self { store, target_bits };

        // The chainstate may trail the block log after a crash between a
        // block commit and its index update; rebuilding on open closes the
        // gap
        UtxoSet::new(&chain).reindex()?;
        Ok(chain)
    }

    pub fn store(&self) -> &ChainStore {
        &self.store
    }

    pub fn target_bits(&self) -> u32 {
        self.target_bits
    }

    /// ID of the current best block
    pub fn tip(&self) -> Result<BlockHash, ChainError> {
        Ok(self.store.tip()?)
    }

    /// Height of the current best block
    pub fn best_height(&self) -> Result<u64, ChainError> {
        Ok(self.store.best_height()?)
    }

    /// Load a block by ID
    pub fn get_block(&self, hash: &BlockHash) -> Result<Block, ChainError> {
        Ok(self.store.get_block(hash)?)
    }

    /// Every block ID from the tip back to genesis
    pub fn block_hashes(&self) -> Result<Vec<BlockHash>, ChainError> {
        Ok(self.store.block_hashes()?)
    }

    /// Cursor over the chain from the tip back to genesis
    pub fn iter(&self) -> Result<ChainIterator<'_>, ChainError> {
        Ok(self.store.iter()?)
    }

    /// Mine a block containing `transactions` on top of the current tip.
    ///
    /// When a miner address is given, a coinbase paying it the block reward
    /// is prepended. A batch that ends up empty is rejected before any
    /// mining happens. The block is committed to the store and then applied
    /// to the chainstate index.
    pub fn mine_block(
        &self,
        transactions: Vec<Transaction>,
        miner_address: Option<&str>,
    ) -> Result<Block, ChainError> {
        let tip = self.store.tip()?;
        let height = self.store.best_height()? + 1;

        let mut batch = Vec::with_capacity(transactions.len() + 1);
        if let Some(miner) = miner_address {
            let miner_pkh = address_to_pubkey_hash(miner)?;
            batch.push(Transaction::new_coinbase(&miner_pkh, "", height)?);
        }
        batch.extend(transactions);

        if batch.is_empty() {
            return Err(ChainError::EmptyMiningBatch);
        }
        for tx in &batch {
            self.check_transaction(tx)?;
        }

        info!("mining block at height {height}");
        let block = Block::new(batch, Some(tip), height, self.target_bits);
        self.store.put_block(&block)?;
        UtxoSet::new(self).update(&block)?;
        info!("mined block {} at height {height}", block.hash);

        Ok(block)
    }

    /// Build, mine and commit a payment of `amount` from one address to
    /// another, optionally crediting the block reward to `miner_address`.
    /// Returns the ID of the payment transaction.
    pub fn send(
        &self,
        from: &str,
        to: &str,
        amount: u64,
        miner_address: Option<&str>,
    ) -> Result<TxId, ChainError> {
        let tx = self.new_utxo_transaction(from, to, amount)?;
        let txid = tx.id;
        self.mine_block(vec![tx], miner_address)?;
        Ok(txid)
    }

    /// Assemble a transaction spending `from`'s unspent outputs.
    ///
    /// Outputs are gathered until they cover `amount`; any overshoot comes
    /// back to the sender as change.
    pub fn new_utxo_transaction(
        &self,
        from: &str,
        to: &str,
        amount: u64,
    ) -> Result<Transaction, ChainError> {
        let from_pkh = address_to_pubkey_hash(from)?;
        let to_pkh = address_to_pubkey_hash(to)?;

        let utxo_set = UtxoSet::new(self);
        let (accumulated, selection) = utxo_set.find_spendable_outputs(&from_pkh, amount)?;
        if accumulated < amount {
            return Err(ChainError::InsufficientFunds {
                have: accumulated,
                need: amount,
            });
        }

        let mut inputs = Vec::new();
        for (txid, indexes) in selection {
            for vout in indexes {
                inputs.push(TxInput {
                    prev_txid: Some(txid),
                    vout,
                    script_sig: from_pkh.to_vec(),
                });
            }
        }

        let mut outputs = vec![TxOutput::locked_to(amount, &to_pkh)];
        let change = accumulated - amount;
        if change > 0 {
            outputs.push(TxOutput::locked_to(change, &from_pkh));
        }

        Ok(Transaction::new(inputs, outputs)?)
    }

    /// Sum of all unspent outputs locked to an address
    pub fn balance(&self, address: &str) -> Result<u64, ChainError> {
        let pubkey_hash = address_to_pubkey_hash(address)?;
        let outputs = UtxoSet::new(self).find_utxo(&pubkey_hash)?;
        Ok(outputs.iter().map(|output| output.value).sum())
    }

    /// Scan the whole block log for unspent outputs, newest block first.
    ///
    /// Two passes over the chain are required: spends of an output appear
    /// in the traversal before the output itself, so the full spent map has
    /// to exist before any output can be classified.
    pub fn find_utxo(&self) -> Result<HashMap<TxId, TxOutputs>, ChainError> {
        let mut spent: HashMap<TxId, Vec<i64>> = HashMap::new();
        for block in self.iter()? {
            let block = block?;
            for tx in &block.transactions {
                if tx.is_coinbase() {
                    continue;
                }
                for input in &tx.inputs {
                    if let Some(prev_txid) = input.prev_txid {
                        spent.entry(prev_txid).or_default().push(input.vout);
                    }
                }
            }
        }

        let mut utxo: HashMap<TxId, TxOutputs> = HashMap::new();
        for block in self.iter()? {
            let block = block?;
            for tx in &block.transactions {
                let spent_indexes = spent.get(&tx.id);
                let unspent: Vec<(u32, TxOutput)> = tx
                    .outputs
                    .iter()
                    .enumerate()
                    .filter(|(index, _)| {
                        spent_indexes.map_or(true, |idx| !idx.contains(&(*index as i64)))
                    })
                    .map(|(index, output)| (index as u32, output.clone()))
                    .collect();

                if !unspent.is_empty() {
                    utxo.insert(tx.id, TxOutputs { outputs: unspent });
                }
            }
        }

        Ok(utxo)
    }

    /// Ingest a block produced elsewhere: proof of work and linkage are
    /// checked, the block is committed, and the chainstate is brought up to
    /// date. Re-submitting a known block is a no-op.
    pub fn add_block(&self, block: Block) -> Result<(), ChainError> {
        if self.store.has_block(&block.hash)? {
            debug!("ignoring already-known block {}", block.hash);
            return Ok(());
        }

        if !block.verify() {
            return Err(ChainError::InvalidBlock(
                "proof-of-work check failed".into(),
            ));
        }
        if block.header.bits != self.target_bits {
            return Err(ChainError::InvalidBlock(format!(
                "difficulty {} does not match the chain's {}",
                block.header.bits, self.target_bits
            )));
        }
        if block.transactions.is_empty() {
            return Err(ChainError::InvalidBlock("block has no transactions".into()));
        }
        for tx in &block.transactions {
            self.check_transaction(tx)?;
        }

        let Some(prev_hash) = block.header.prev_hash else {
            return Err(ChainError::InvalidBlock(
                "block has no parent and the chain already has a genesis".into(),
            ));
        };
        if !self.store.has_block(&prev_hash)? {
            return Err(ChainError::InvalidBlock(format!(
                "parent {prev_hash} is not known"
            )));
        }
        let parent = self.store.get_block(&prev_hash)?;
        if block.header.height != parent.header.height + 1 {
            return Err(ChainError::InvalidBlock(format!(
                "height {} does not follow parent height {}",
                block.header.height, parent.header.height
            )));
        }

        let old_tip = self.store.tip()?;
        let advanced = self.store.insert_block(&block)?;
        info!(
            "accepted block {} at height {}{}",
            block.hash,
            block.header.height,
            if advanced { ", new tip" } else { "" }
        );

        if advanced {
            let utxo_set = UtxoSet::new(self);
            if block.header.prev_hash == Some(old_tip) {
                utxo_set.update(&block)?;
            } else {
                // The new tip is not a child of the old one; the delta
                // update does not apply
                utxo_set.reindex()?;
            }
        }

        Ok(())
    }

    /// Verify a transaction against its spent outputs.
    ///
    /// Signature checking is not wired in yet; the interface exists so a
    /// real regime can be slotted in without touching callers.
    pub fn verify_transaction(&self, tx: &Transaction) -> bool {
        if tx.is_coinbase() {
            return true;
        }
        true
    }

    // Structural checks shared by mining and ingest
    fn check_transaction(&self, tx: &Transaction) -> Result<(), ChainError> {
        if tx.outputs.is_empty() {
            return Err(ChainError::InvalidBlock(format!(
                "transaction {} has no outputs",
                tx.id
            )));
        }
        if !self.verify_transaction(tx) {
            return Err(ChainError::InvalidBlock(format!(
                "transaction {} failed verification",
                tx.id
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::pow::target_bytes;
    use crate::core::transaction::REWARD;
    use crate::crypto::keys::KeyPair;

    const TEST_BITS: u32 = 8;

    fn new_address() -> String {
        KeyPair::generate().address()
    }

    fn test_chain(dir: &Path, owner: &str) -> Blockchain {
        Blockchain::create_with_bits(dir, "test", owner, TEST_BITS).unwrap()
    }

    #[test]
    fn test_create_writes_genesis() {
        let dir = tempfile::tempdir().unwrap();
        let owner = new_address();
        let chain = test_chain(dir.path(), &owner);

        assert_eq!(chain.best_height().unwrap(), 0);
        let genesis = chain.get_block(&chain.tip().unwrap()).unwrap();
        assert!(genesis.is_genesis());
        assert_eq!(genesis.transactions.len(), 1);
        assert!(genesis.transactions[0].is_coinbase());
        assert_eq!(chain.balance(&owner).unwrap(), REWARD);
    }

    #[test]
    fn test_create_twice_keeps_the_chain() {
        let dir = tempfile::tempdir().unwrap();
        let owner = new_address();

        let tip = {
            let chain = test_chain(dir.path(), &owner);
            chain.send(&owner, &new_address(), 5, None).unwrap();
            chain.tip().unwrap()
        };

        let chain = Blockchain::create_with_bits(dir.path(), "test", &owner, TEST_BITS).unwrap();
        assert_eq!(chain.tip().unwrap(), tip);
        assert_eq!(chain.best_height().unwrap(), 1);
    }

    #[test]
    fn test_open_requires_genesis() {
        let dir = tempfile::tempdir().unwrap();
        let result = Blockchain::open_with_bits(dir.path(), "test", TEST_BITS);
        assert!(matches!(
            result,
            Err(ChainError::Store(StoreError::NotInitialized))
        ));
    }

    #[test]
    fn test_mine_block_rejects_empty_batch() {
        let dir = tempfile::tempdir().unwrap();
        let chain = test_chain(dir.path(), &new_address());
        assert!(matches!(
            chain.mine_block(vec![], None),
            Err(ChainError::EmptyMiningBatch)
        ));
    }

    #[test]
    fn test_mine_block_with_miner_reward_only() {
        let dir = tempfile::tempdir().unwrap();
        let owner = new_address();
        let miner = new_address();
        let chain = test_chain(dir.path(), &owner);

        let block = chain.mine_block(vec![], Some(&miner)).unwrap();
        assert_eq!(block.header.height, 1);
        assert_eq!(block.transactions.len(), 1);
        assert!(block.transactions[0].is_coinbase());
        assert_eq!(chain.balance(&miner).unwrap(), REWARD);
    }

    #[test]
    fn test_mine_block_rejects_transaction_without_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let owner = new_address();
        let chain = test_chain(dir.path(), &owner);

        let empty_tx = Transaction::new(
            vec![TxInput {
                prev_txid: Some(TxId([9u8; 32])),
                vout: 0,
                script_sig: vec![],
            }],
            vec![],
        )
        .unwrap();

        assert!(matches!(
            chain.mine_block(vec![empty_tx], None),
            Err(ChainError::InvalidBlock(_))
        ));
    }

    #[test]
    fn test_insufficient_funds_leaves_chain_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let owner = new_address();
        let broke = new_address();
        let chain = test_chain(dir.path(), &owner);

        let result = chain.send(&broke, &owner, 1, None);
        assert!(matches!(
            result,
            Err(ChainError::InsufficientFunds { have: 0, need: 1 })
        ));
        assert_eq!(chain.best_height().unwrap(), 0);
    }

    #[test]
    fn test_find_utxo_sees_through_intra_chain_spends() {
        let dir = tempfile::tempdir().unwrap();
        let owner = new_address();
        let other = new_address();
        let chain = test_chain(dir.path(), &owner);

        chain.send(&owner, &other, 25, None).unwrap();

        let utxo = chain.find_utxo().unwrap();
        // The genesis coinbase is fully spent, only the send remains
        assert_eq!(utxo.len(), 1);
        let record = utxo.values().next().unwrap();
        let total: u64 = record.outputs.iter().map(|(_, o)| o.value).sum();
        assert_eq!(total, REWARD);
    }

    #[test]
    fn test_add_block_accepts_a_valid_successor() {
        let dir = tempfile::tempdir().unwrap();
        let owner = new_address();
        let chain = test_chain(dir.path(), &owner);

        let coinbase = Transaction::new_coinbase(
            &address_to_pubkey_hash(&owner).unwrap(),
            "",
            1,
        )
        .unwrap();
        let block = Block::new(vec![coinbase], Some(chain.tip().unwrap()), 1, TEST_BITS);

        chain.add_block(block.clone()).unwrap();
        assert_eq!(chain.tip().unwrap(), block.hash);
        assert_eq!(chain.balance(&owner).unwrap(), 2 * REWARD);

        // Re-submitting the same block changes nothing
        chain.add_block(block.clone()).unwrap();
        assert_eq!(chain.best_height().unwrap(), 1);
    }

    #[test]
    fn test_add_block_rejects_unknown_parent() {
        let dir = tempfile::tempdir().unwrap();
        let owner = new_address();
        let chain = test_chain(dir.path(), &owner);

        let coinbase = Transaction::new_coinbase(
            &address_to_pubkey_hash(&owner).unwrap(),
            "",
            1,
        )
        .unwrap();
        let orphan = Block::new(vec![coinbase], Some(BlockHash([3u8; 32])), 1, TEST_BITS);

        assert!(matches!(
            chain.add_block(orphan),
            Err(ChainError::InvalidBlock(_))
        ));
    }

    #[test]
    fn test_add_block_rejects_bad_pow() {
        let dir = tempfile::tempdir().unwrap();
        let owner = new_address();
        let chain = test_chain(dir.path(), &owner);

        let coinbase = Transaction::new_coinbase(
            &address_to_pubkey_hash(&owner).unwrap(),
            "",
            1,
        )
        .unwrap();
        let mut block = Block::new(vec![coinbase], Some(chain.tip().unwrap()), 1, TEST_BITS);
        block.header.nonce = block.header.nonce.wrapping_add(1);

        assert!(matches!(
            chain.add_block(block),
            Err(ChainError::InvalidBlock(_))
        ));
    }

    #[test]
    fn test_chain_linkage_invariant() {
        let dir = tempfile::tempdir().unwrap();
        let owner = new_address();
        let chain = test_chain(dir.path(), &owner);
        chain.send(&owner, &new_address(), 10, None).unwrap();
        chain.send(&owner, &new_address(), 10, None).unwrap();

        let blocks: Vec<Block> = chain.iter().unwrap().map(|b| b.unwrap()).collect();
        assert_eq!(blocks.len() as u64, chain.best_height().unwrap() + 1);
        for pair in blocks.windows(2) {
            assert_eq!(pair[0].header.prev_hash, Some(pair[1].hash));
        }
        assert!(blocks.last().unwrap().is_genesis());
    }

    #[test]
    fn test_every_stored_block_satisfies_pow() {
        let dir = tempfile::tempdir().unwrap();
        let owner = new_address();
        let chain = test_chain(dir.path(), &owner);
        chain.send(&owner, &new_address(), 10, Some(&owner)).unwrap();

        let target = target_bytes(TEST_BITS);
        for block in chain.iter().unwrap() {
            let block = block.unwrap();
            assert!(block.verify());
            assert!(block.hash.as_bytes() < &target[..]);
        }
    }
}
