//! Spent markers of committed transactions.

use pc_02_block_storage::BlockPos;
use serde::{Deserialize, Serialize};
use shared_types::Hash;
use std::collections::HashMap;

/// Where a transaction lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TxPos {
    /// Transaction `index` of the block record at `block`.
    Disk { block: BlockPos, index: u32 },
    /// Not yet in a block. Never persisted.
    Mempool,
}

impl TxPos {
    pub fn disk(block: BlockPos, index: u32) -> Self {
        TxPos::Disk { block, index }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxIndex {
    pub pos: TxPos,
    /// Height of the containing block, or the next height for pool entries.
    pub height: u32,
    /// One slot per output: the spender's position once consumed.
    pub spent: Vec<Option<TxPos>>,
}

impl TxIndex {
    pub fn new(pos: TxPos, height: u32, outputs: usize) -> Self {
        Self {
            pos,
            height,
            spent: vec![None; outputs],
        }
    }

    pub fn is_spent(&self, n: u32) -> bool {
        matches!(self.spent.get(n as usize), Some(Some(_)))
    }

    pub fn unspent_count(&self) -> usize {
        self.spent.iter().filter(|s| s.is_none()).count()
    }
}

/// Indices touched by a block or a pool batch that are not written yet.
pub type QueuedChanges = HashMap<Hash, TxIndex>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spent_slots() {
        let mut index = TxIndex::new(TxPos::disk(BlockPos::new(0, 8, 100), 1), 5, 3);
        assert_eq!(index.unspent_count(), 3);
        index.spent[1] = Some(TxPos::Mempool);
        assert!(index.is_spent(1));
        assert!(!index.is_spent(0));
        assert!(!index.is_spent(7));
        assert_eq!(index.unspent_count(), 2);
    }
}
