//! Transaction and block index store.
//!
//! | Key | Value |
//! |-----|-------|
//! | `T t <txid>` | `TxIndex` |
//! | `T i <block hash>` | `BlockIndex` |
//! | `T b` | best chain tip hash |

use crate::domain::errors::UtxoError;
use crate::domain::tx_index::TxIndex;
use pc_01_chain_index::BlockIndex;
use pc_02_block_storage::{KVStoreError, StoreTxn};
use shared_types::Hash;

pub const TXDB: u8 = b'T';

const TX_INDEX: u8 = b't';
const BLOCK_INDEX: u8 = b'i';
const BEST: u8 = b'b';

fn key(tag: u8, hash: &Hash) -> Vec<u8> {
    let mut out = Vec::with_capacity(34);
    out.push(TXDB);
    out.push(tag);
    out.extend_from_slice(hash);
    out
}

/// View of the `T` namespace through a storage transaction.
pub struct TxDb<'a> {
    txn: &'a StoreTxn<'a>,
}

impl<'a> TxDb<'a> {
    pub fn new(txn: &'a StoreTxn<'a>) -> Self {
        Self { txn }
    }

    pub fn read_tx_index(&self, txid: &Hash) -> Result<Option<TxIndex>, UtxoError> {
        Ok(self.txn.get_typed(&key(TX_INDEX, txid))?)
    }

    pub fn write_tx_index(&self, txid: &Hash, index: &TxIndex) -> Result<(), UtxoError> {
        Ok(self.txn.put_typed(key(TX_INDEX, txid), index)?)
    }

    pub fn erase_tx_index(&self, txid: &Hash) {
        self.txn.delete(key(TX_INDEX, txid));
    }

    pub fn contains_tx(&self, txid: &Hash) -> Result<bool, UtxoError> {
        Ok(self.txn.exists(&key(TX_INDEX, txid))?)
    }

    pub fn write_block_index(&self, record: &BlockIndex) -> Result<(), UtxoError> {
        Ok(self.txn.put_typed(key(BLOCK_INDEX, &record.hash), record)?)
    }

    pub fn read_block_index(&self, hash: &Hash) -> Result<Option<BlockIndex>, UtxoError> {
        Ok(self.txn.get_typed(&key(BLOCK_INDEX, hash))?)
    }

    /// Every persisted block index record, in key order.
    pub fn read_block_indices(&self) -> Result<Vec<BlockIndex>, UtxoError> {
        let prefix = [TXDB, BLOCK_INDEX];
        let mut records = Vec::new();
        for (k, bytes) in self.txn.prefix_scan(&prefix)? {
            let record = bincode::deserialize(&bytes).map_err(|e| KVStoreError::Serialization {
                key: k,
                message: e.to_string(),
            })?;
            records.push(record);
        }
        Ok(records)
    }

    pub fn write_best(&self, hash: &Hash) {
        self.txn.put(vec![TXDB, BEST], hash.to_vec());
    }

    pub fn read_best(&self) -> Result<Option<Hash>, UtxoError> {
        Ok(self
            .txn
            .get(&[TXDB, BEST])?
            .and_then(|bytes| <Hash>::try_from(bytes.as_slice()).ok()))
    }
}
