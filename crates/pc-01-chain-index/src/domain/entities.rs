//! Block index records.
//!
//! A `BlockIndex` is also the persisted record: the arena links (`prev`,
//! `next`) and the lazily derived supply index are skipped on
//! serialization and rebuilt when the index is loaded.

use pc_02_block_storage::BlockPos;
use primitive_types::U256;
use serde::{Deserialize, Serialize};
use shared_types::{Address, BlockHeader, Hash, OutPoint};

/// Arena handle of a `BlockIndex`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(pub(crate) u32);

impl BlockId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

bitflags::bitflags! {
    /// Bit set of block properties.
    #[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
    #[serde(transparent)]
    pub struct BlockFlags: u32 {
        const PROOF_OF_STAKE = 1 << 0;
        const STAKE_ENTROPY = 1 << 1;
        const PEG_ENABLED = 1 << 2;
        /// The block failed to connect; it and its descendants are never chosen.
        const FAILED_VALID = 1 << 3;
    }
}

/// Supply-index vote carried by a coinstake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PegVote {
    #[default]
    NoChange,
    /// Release reserve: move the supply index down.
    Inflate,
    /// Lock liquidity: move the supply index up.
    Deflate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockIndex {
    pub hash: Hash,
    pub height: u32,
    pub header: BlockHeader,
    pub chain_trust: U256,
    pub stake_modifier: Hash,
    pub peg_vote: PegVote,
    pub flags: BlockFlags,
    /// Kernel prevout of a PoS block.
    pub prevout_stake: Option<OutPoint>,
    pub stake_time: u32,
    /// Address paid by the coinstake (PoS) or coinbase (PoW).
    pub staker: Option<Address>,
    pub pos: BlockPos,

    #[serde(skip)]
    pub prev: Option<BlockId>,
    #[serde(skip)]
    pub next: Option<BlockId>,
    /// `None` until first requested.
    #[serde(skip)]
    pub peg_supply_index: Option<u32>,
}

impl BlockIndex {
    pub fn new(hash: Hash, header: BlockHeader, height: u32) -> Self {
        Self {
            hash,
            height,
            header,
            chain_trust: U256::zero(),
            stake_modifier: [0u8; 32],
            peg_vote: PegVote::NoChange,
            flags: BlockFlags::default(),
            prevout_stake: None,
            stake_time: 0,
            staker: None,
            pos: BlockPos::default(),
            prev: None,
            next: None,
            peg_supply_index: None,
        }
    }

    pub fn time(&self) -> u32 {
        self.header.time
    }

    pub fn is_proof_of_stake(&self) -> bool {
        self.flags.contains(BlockFlags::PROOF_OF_STAKE)
    }

    pub fn is_failed(&self) -> bool {
        self.flags.contains(BlockFlags::FAILED_VALID)
    }

    pub fn stake_entropy_bit(&self) -> bool {
        self.flags.contains(BlockFlags::STAKE_ENTROPY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_set_and_clear() {
        let mut flags = BlockFlags::default();
        flags.insert(BlockFlags::PROOF_OF_STAKE);
        flags.insert(BlockFlags::FAILED_VALID);
        assert!(flags.contains(BlockFlags::PROOF_OF_STAKE));
        flags.remove(BlockFlags::FAILED_VALID);
        assert!(!flags.contains(BlockFlags::FAILED_VALID));
        assert_eq!(flags, BlockFlags::PROOF_OF_STAKE);
    }

    #[test]
    fn test_persisted_record_drops_links() {
        let mut index = BlockIndex::new([1u8; 32], BlockHeader::default(), 7);
        index.prev = Some(BlockId(3));
        index.peg_supply_index = Some(12);
        index.chain_trust = U256::from(99u64);
        index.flags = BlockFlags::PROOF_OF_STAKE | BlockFlags::FAILED_VALID;

        let bytes = bincode::serialize(&index).unwrap();
        let back: BlockIndex = bincode::deserialize(&bytes).unwrap();
        assert_eq!(back.prev, None);
        assert_eq!(back.peg_supply_index, None);
        assert_eq!(back.chain_trust, U256::from(99u64));
        assert_eq!(back.height, 7);
        assert_eq!(back.flags, BlockFlags::PROOF_OF_STAKE | BlockFlags::FAILED_VALID);
    }
}
