//! The persistent UTXO index over the chainstate table
//!
//! Maps raw transaction IDs to the subset of their outputs that has not
//! been spent yet. The only legal mutators are [`UtxoSet::reindex`] and
//! [`UtxoSet::update`], each of which runs in a single write transaction
//! of the chain store.

use log::info;
use redb::ReadableTable;
use std::collections::HashMap;

use crate::core::block::Block;
use crate::core::blockchain::{Blockchain, ChainError};
use crate::core::codec;
use crate::core::transaction::{TxId, TxOutput, TxOutputs};
use crate::storage::store::{StoreError, CHAINSTATE};

/// View of the chainstate index of one blockchain
pub struct UtxoSet<'a> {
    chain: &'a Blockchain,
}

impl<'a> UtxoSet<'a> {
    pub fn new(chain: &'a Blockchain) -> Self {
        Self { chain }
    }

    /// Rebuild the chainstate from a full scan of the block log.
    ///
    /// The old table is dropped and rewritten inside one write transaction,
    /// so readers never observe a half-built index.
    pub fn reindex(&self) -> Result<(), ChainError> {
        let utxo = self.chain.find_utxo()?;

        let wtx = self.chain.store().db().begin_write().map_err(StoreError::from)?;
        wtx.delete_table(CHAINSTATE).map_err(StoreError::from)?;
        {
            let mut table = wtx.open_table(CHAINSTATE).map_err(StoreError::from)?;
            for (txid, outputs) in &utxo {
                table
                    .insert(txid.as_bytes(), codec::encode(outputs)?.as_slice())
                    .map_err(StoreError::from)?;
            }
        }
        wtx.commit().map_err(StoreError::from)?;

        info!("reindexed chainstate: {} transactions carry unspent outputs", utxo.len());
        Ok(())
    }

    /// Apply one committed block to the chainstate.
    ///
    /// Transactions are processed in block order so an output created and
    /// spent within the same block comes and goes correctly. Records that
    /// lose their last output are deleted rather than stored empty.
    pub fn update(&self, block: &Block) -> Result<(), ChainError> {
        let wtx = self.chain.store().db().begin_write().map_err(StoreError::from)?;
        {
            let mut table = wtx.open_table(CHAINSTATE).map_err(StoreError::from)?;

            for tx in &block.transactions {
                if !tx.is_coinbase() {
                    for input in &tx.inputs {
                        let Some(prev_txid) = input.prev_txid else {
                            return Err(ChainError::InvalidBlock(
                                "non-coinbase input has no source transaction".into(),
                            ));
                        };

                        let record_bytes = {
                            let guard = table.get(prev_txid.as_bytes()).map_err(StoreError::from)?;
                            guard.map(|g| g.value().to_vec())
                        };
                        let Some(record_bytes) = record_bytes else {
                            return Err(ChainError::InvalidBlock(format!(
                                "input spends unknown output {}:{}",
                                prev_txid, input.vout
                            )));
                        };

                        let record: TxOutputs = codec::decode(&record_bytes)?;
                        let remaining = TxOutputs {
                            outputs: record
                                .outputs
                                .into_iter()
                                .filter(|(index, _)| i64::from(*index) != input.vout)
                                .collect(),
                        };

                        if remaining.is_empty() {
                            table.remove(prev_txid.as_bytes()).map_err(StoreError::from)?;
                        } else {
                            table
                                .insert(prev_txid.as_bytes(), codec::encode(&remaining)?.as_slice())
                                .map_err(StoreError::from)?;
                        }
                    }
                }

                let fresh = TxOutputs::from_transaction(tx);
                table
                    .insert(tx.id.as_bytes(), codec::encode(&fresh)?.as_slice())
                    .map_err(StoreError::from)?;
            }
        }
        wtx.commit().map_err(StoreError::from)?;
        Ok(())
    }

    /// Gather outputs locked to `pubkey_hash` until they cover `amount`.
    ///
    /// Returns the accumulated value (which may overshoot; the caller
    /// computes change) and the chosen output indices per transaction.
    pub fn find_spendable_outputs(
        &self,
        pubkey_hash: &[u8; 20],
        amount: u64,
    ) -> Result<(u64, HashMap<TxId, Vec<i64>>), ChainError> {
        let mut accumulated = 0u64;
        let mut selection: HashMap<TxId, Vec<i64>> = HashMap::new();

        let rtx = self.chain.store().db().begin_read().map_err(StoreError::from)?;
        let table = rtx.open_table(CHAINSTATE).map_err(StoreError::from)?;

        for entry in table.iter().map_err(StoreError::from)? {
            if accumulated >= amount {
                break;
            }
            let (key, value) = entry.map_err(StoreError::from)?;
            let txid = TxId::from_slice(key.value()).ok_or(StoreError::MalformedKey)?;
            let record: TxOutputs = codec::decode(value.value())?;

            for (index, output) in &record.outputs {
                if output.is_locked_with(pubkey_hash) && accumulated < amount {
                    accumulated += output.value;
                    selection.entry(txid).or_default().push(i64::from(*index));
                }
            }
        }

        Ok((accumulated, selection))
    }

    /// Every unspent output locked to `pubkey_hash`
    pub fn find_utxo(&self, pubkey_hash: &[u8; 20]) -> Result<Vec<TxOutput>, ChainError> {
        let mut outputs = Vec::new();

        let rtx = self.chain.store().db().begin_read().map_err(StoreError::from)?;
        let table = rtx.open_table(CHAINSTATE).map_err(StoreError::from)?;

        for entry in table.iter().map_err(StoreError::from)? {
            let (_, value) = entry.map_err(StoreError::from)?;
            let record: TxOutputs = codec::decode(value.value())?;
            for (_, output) in record.outputs {
                if output.is_locked_with(pubkey_hash) {
                    outputs.push(output);
                }
            }
        }

        Ok(outputs)
    }

    /// Every chainstate record in key order
    pub fn entries(&self) -> Result<Vec<(TxId, TxOutputs)>, ChainError> {
        let rtx = self.chain.store().db().begin_read().map_err(StoreError::from)?;
        let table = rtx.open_table(CHAINSTATE).map_err(StoreError::from)?;

        let mut entries = Vec::new();
        for entry in table.iter().map_err(StoreError::from)? {
            let (key, value) = entry.map_err(StoreError::from)?;
            let txid = TxId::from_slice(key.value()).ok_or(StoreError::MalformedKey)?;
            entries.push((txid, codec::decode(value.value())?));
        }
        Ok(entries)
    }

    /// Number of transactions with at least one unspent output
    pub fn count_transactions(&self) -> Result<usize, ChainError> {
        let rtx = self.chain.store().db().begin_read().map_err(StoreError::from)?;
        let table = rtx.open_table(CHAINSTATE).map_err(StoreError::from)?;

        let mut count = 0;
        for entry in table.iter().map_err(StoreError::from)? {
            entry.map_err(StoreError::from)?;
            count += 1;
        }
        Ok(count)
    }
}
