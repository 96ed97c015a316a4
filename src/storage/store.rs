//! Embedded chain store
//!
//! One redb database file per node holding two tables: `blocks` (serialized
//! blocks keyed by block ID, plus the distinguished `"l"` key naming the
//! tip) and `chainstate` (unspent-output records keyed by raw transaction
//! ID). Write transactions are atomic and durable on commit; readers see a
//! consistent snapshot.

use redb::{Database, ReadableTable, TableDefinition};
use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::core::block::{Block, BlockHash};
use crate::core::codec::CodecError;

/// Blocks keyed by 32-byte block ID; the tip ID lives under [`TIP_KEY`]
pub(crate) const BLOCKS: TableDefinition<&[u8], &[u8]> = TableDefinition::new("blocks");

/// Unspent-output records keyed by raw 32-byte transaction ID
pub(crate) const CHAINSTATE: TableDefinition<&[u8], &[u8]> = TableDefinition::new("chainstate");

const TIP_KEY: &[u8] = b"l";

/// Chain store errors
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("failed to open chain database: {0}")]
    Open(#[from] redb::DatabaseError),
    #[error("store transaction failed: {0}")]
    Transaction(#[from] redb::TransactionError),
    #[error("store table access failed: {0}")]
    Table(#[from] redb::TableError),
    #[error("store access failed: {0}")]
    Storage(#[from] redb::StorageError),
    #[error("store commit failed: {0}")]
    Commit(#[from] redb::CommitError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("unknown block {0}")]
    UnknownBlock(BlockHash),
    #[error("chain store has no genesis block yet")]
    NotInitialized,
    #[error("malformed store key")]
    MalformedKey,
    #[error(transparent)]
    Codec(#[from] CodecError),
}

/// Handle to one node's chain database.
///
/// Opened once per process; all operations on the same store share the
/// single writer of the underlying database.
pub struct ChainStore {
    db: Database,
}

impl ChainStore {
    /// Open the database file, creating it (and its directory) if absent
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        Ok(Self {
            db: Database::create(path)?,
        })
    }

    /// Whether a genesis block has been committed yet
    pub fn is_initialized(&self) -> Result<bool, StoreError> {
        let rtx = self.db.begin_read()?;
        match rtx.open_table(BLOCKS) {
            Ok(table) => Ok(table.get(TIP_KEY)?.is_some()),
            Err(redb::TableError::TableDoesNotExist(_)) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// ID of the current best block
    pub fn tip(&self) -> Result<BlockHash, StoreError> {
        let rtx = self.db.begin_read()?;
        let table = match rtx.open_table(BLOCKS) {
            Ok(table) => table,
            Err(redb::TableError::TableDoesNotExist(_)) => return Err(StoreError::NotInitialized),
            Err(e) => return Err(e.into()),
        };
        let guard = table.get(TIP_KEY)?.ok_or(StoreError::NotInitialized)?;
        BlockHash::from_slice(guard.value()).ok_or(StoreError::MalformedKey)
    }

    /// Height of the current best block
    pub fn best_height(&self) -> Result<u64, StoreError> {
        let tip = self.tip()?;
        Ok(self.get_block(&tip)?.header.height)
    }

    /// Load and decode a block by ID
    pub fn get_block(&self, hash: &BlockHash) -> Result<Block, StoreError> {
        let rtx = self.db.begin_read()?;
        let table = rtx.open_table(BLOCKS)?;
        match table.get(hash.as_bytes())? {
            Some(guard) => Ok(Block::deserialize(guard.value())?),
            None => Err(StoreError::UnknownBlock(*hash)),
        }
    }

    pub fn has_block(&self, hash: &BlockHash) -> Result<bool, StoreError> {
        let rtx = self.db.begin_read()?;
        match rtx.open_table(BLOCKS) {
            Ok(table) => Ok(table.get(hash.as_bytes())?.is_some()),
            Err(redb::TableError::TableDoesNotExist(_)) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Commit a block and move the tip to it, atomically
    pub fn put_block(&self, block: &Block) -> Result<(), StoreError> {
        let bytes = block.serialize()?;
        let wtx = self.db.begin_write()?;
        {
            let mut table = wtx.open_table(BLOCKS)?;
            table.insert(block.hash.as_bytes(), bytes.as_slice())?;
            table.insert(TIP_KEY, block.hash.as_bytes())?;
        }
        wtx.commit()?;
        Ok(())
    }

    /// Commit a block received from elsewhere; the tip moves only when the
    /// block's height beats the current best. Returns whether it did.
    pub fn insert_block(&self, block: &Block) -> Result<bool, StoreError> {
        let bytes = block.serialize()?;
        let wtx = self.db.begin_write()?;
        let advanced;
        {
            let mut table = wtx.open_table(BLOCKS)?;

            let current_best = {
                let tip = table.get(TIP_KEY)?.map(|guard| guard.value().to_vec());
                match tip {
                    Some(tip_bytes) => {
                        let block_bytes = table
                            .get(tip_bytes.as_slice())?
                            .map(|guard| guard.value().to_vec())
                            .ok_or(StoreError::NotInitialized)?;
                        Some(Block::deserialize(&block_bytes)?.header.height)
                    }
                    None => None,
                }
            };

            table.insert(block.hash.as_bytes(), bytes.as_slice())?;
            advanced = current_best.map_or(true, |best| block.header.height > best);
            if advanced {
                table.insert(TIP_KEY, block.hash.as_bytes())?;
            }
        }
        wtx.commit()?;
        Ok(advanced)
    }

    /// Lazy cursor over the chain from the tip back to genesis.
    ///
    /// The cursor is finite and not restartable; call `iter` again for a
    /// fresh traversal.
    pub fn iter(&self) -> Result<ChainIterator<'_>, StoreError> {
        Ok(ChainIterator {
            store: self,
            next: Some(self.tip()?),
        })
    }

    /// Every block ID from the tip back to genesis
    pub fn block_hashes(&self) -> Result<Vec<BlockHash>, StoreError> {
        let mut hashes = Vec::new();
        for block in self.iter()? {
            hashes.push(block?.hash);
        }
        Ok(hashes)
    }

    pub(crate) fn db(&self) -> &Database {
        &self.db
    }
}

/// Read-only cursor from the tip to genesis
pub struct ChainIterator<'a> {
    store: &'a ChainStore,
    next: Option<BlockHash>,
}

impl Iterator for ChainIterator<'_> {
    type Item = Result<Block, StoreError>;

    fn next(&mut self) -> Option<Self::Item> {
        let hash = self.next.take()?;
        match self.store.get_block(&hash) {
            Ok(block) => {
                self.next = block.header.prev_hash;
                Some(Ok(block))
            }
            // A missing or undecodable block ends the walk after the error
            Err(e) => Some(Err(e)),
        }
    }
}
