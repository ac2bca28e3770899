//! # Block Store Service
//!
//! Encodes blocks into the block files and decodes them back, keeping
//! recently read blocks in an LRU cache. Input resolution reads one
//! previous transaction per spent outpoint, so a block spending many
//! outputs of one earlier block hits the cache instead of the disk.

use crate::domain::errors::BlockFileError;
use crate::domain::value_objects::BlockPos;
use crate::ports::outbound::BlockFileStore;
use lru::LruCache;
use parking_lot::Mutex;
use shared_types::{Block, Decodable, Encodable, Transaction};
use std::num::NonZeroUsize;
use std::sync::Arc;

const DEFAULT_CACHE_BLOCKS: usize = 64;

pub struct BlockStore {
    files: Arc<dyn BlockFileStore>,
    cache: Mutex<LruCache<BlockPos, Arc<Block>>>,
}

impl BlockStore {
    pub fn new(files: Arc<dyn BlockFileStore>) -> Self {
        Self::with_cache_size(files, DEFAULT_CACHE_BLOCKS)
    }

    pub fn with_cache_size(files: Arc<dyn BlockFileStore>, blocks: usize) -> Self {
        let capacity = NonZeroUsize::new(blocks).unwrap_or(NonZeroUsize::MIN);
        Self {
            files,
            cache: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn write_block(&self, block: &Block) -> Result<BlockPos, BlockFileError> {
        self.files.append(&block.encode())
    }

    pub fn read_block(&self, pos: &BlockPos) -> Result<Arc<Block>, BlockFileError> {
        if let Some(block) = self.cache.lock().get(pos) {
            return Ok(Arc::clone(block));
        }
        let bytes = self.files.read(pos)?;
        let block = Arc::new(
            Block::decode(&bytes).map_err(|error| BlockFileError::Decode { pos: *pos, error })?,
        );
        self.cache.lock().put(*pos, Arc::clone(&block));
        Ok(block)
    }

    /// Transaction `index` of the block stored at `pos`.
    pub fn read_tx(&self, pos: &BlockPos, index: u32) -> Result<Transaction, BlockFileError> {
        let block = self.read_block(pos)?;
        block
            .transactions
            .get(index as usize)
            .cloned()
            .ok_or(BlockFileError::TxOutOfRange { pos: *pos, index })
    }

    pub fn flush(&self) -> Result<(), BlockFileError> {
        self.files.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryBlockFiles;
    use shared_types::{BlockHeader, OutPoint, Script, TxIn, TxOut};

    fn block_with(n: usize) -> Block {
        let transactions = (0..n)
            .map(|i| Transaction {
                version: 1,
                time: i as u32,
                inputs: vec![TxIn::new(OutPoint::null())],
                outputs: vec![TxOut::new(i as i64, Script::new())],
                lock_time: 0,
            })
            .collect();
        Block {
            header: BlockHeader::default(),
            transactions,
            signature: Vec::new(),
        }
    }

    #[test]
    fn test_write_then_read_block() {
        let store = BlockStore::new(Arc::new(InMemoryBlockFiles::new()));
        let block = block_with(3);
        let pos = store.write_block(&block).unwrap();
        assert_eq!(*store.read_block(&pos).unwrap(), block);
        assert_eq!(store.read_tx(&pos, 2).unwrap(), block.transactions[2]);
    }

    #[test]
    fn test_tx_index_out_of_range() {
        let store = BlockStore::new(Arc::new(InMemoryBlockFiles::new()));
        let pos = store.write_block(&block_with(1)).unwrap();
        assert!(matches!(
            store.read_tx(&pos, 1),
            Err(BlockFileError::TxOutOfRange { index: 1, .. })
        ));
    }

    #[test]
    fn test_garbage_record_fails_decode() {
        let files = Arc::new(InMemoryBlockFiles::new());
        let pos = files.append(&[0xff, 0x00]).unwrap();
        let store = BlockStore::new(files);
        assert!(matches!(
            store.read_block(&pos),
            Err(BlockFileError::Decode { .. })
        ));
    }
}
