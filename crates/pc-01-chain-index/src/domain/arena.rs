//! Arena of block index records.

use super::entities::{BlockFlags, BlockId, BlockIndex, PegVote};
use super::errors::IndexError;
use shared_types::{ChainParams, Hash, OutPoint, PEG_SIZE};
use std::collections::{HashMap, HashSet};

/// Number of blocks in the median-time-past window.
pub const MEDIAN_TIME_SPAN: usize = 11;

#[derive(Default)]
pub struct ChainIndex {
    nodes: Vec<BlockIndex>,
    by_hash: HashMap<Hash, BlockId>,
    genesis: Option<BlockId>,
    best: Option<BlockId>,
    /// `(kernel prevout, stake time)` pairs of indexed PoS blocks.
    stake_seen: HashSet<(OutPoint, u32)>,
}

impl ChainIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild the arena from persisted records and the stored best hash.
    pub fn load(mut records: Vec<BlockIndex>, best: Hash) -> Result<Self, IndexError> {
        records.sort_by_key(|r| r.height);
        let mut index = Self::new();
        for record in records {
            let parent = if record.height == 0 {
                None
            } else {
                Some(index.lookup(&record.header.prev_hash).ok_or(
                    IndexError::UnknownParent {
                        block: record.hash,
                        parent: record.header.prev_hash,
                    },
                )?)
            };
            index.insert(record, parent)?;
        }

        let best_id = index.lookup(&best).ok_or(IndexError::MissingBest(best))?;
        index.relink_best_chain(best_id);
        tracing::info!(
            "[pc-01] Loaded {} block index records, best height {}",
            index.len(),
            index.get(best_id).height
        );
        Ok(index)
    }

    /// Add a record whose parent is `prev`. The caller fills trust and
    /// stake fields; links are managed here.
    pub fn insert(&mut self, mut record: BlockIndex, prev: Option<BlockId>) -> Result<BlockId, IndexError> {
        if self.by_hash.contains_key(&record.hash) {
            return Err(IndexError::Duplicate(record.hash));
        }
        let id = BlockId(self.nodes.len() as u32);
        record.prev = prev;
        record.next = None;
        record.peg_supply_index = None;

        if let Some(stake) = record.prevout_stake {
            self.stake_seen.insert((stake, record.stake_time));
        }
        if prev.is_none() && self.genesis.is_none() {
            self.genesis = Some(id);
        }
        self.by_hash.insert(record.hash, id);
        self.nodes.push(record);
        Ok(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Every record, in insertion order.
    pub fn records(&self) -> impl Iterator<Item = &BlockIndex> {
        self.nodes.iter()
    }

    pub fn get(&self, id: BlockId) -> &BlockIndex {
        &self.nodes[id.index()]
    }

    pub fn get_mut(&mut self, id: BlockId) -> &mut BlockIndex {
        &mut self.nodes[id.index()]
    }

    pub fn lookup(&self, hash: &Hash) -> Option<BlockId> {
        self.by_hash.get(hash).copied()
    }

    pub fn contains(&self, hash: &Hash) -> bool {
        self.by_hash.contains_key(hash)
    }

    pub fn genesis(&self) -> Option<BlockId> {
        self.genesis
    }

    pub fn best(&self) -> Option<BlockId> {
        self.best
    }

    pub fn best_height(&self) -> u32 {
        self.best.map_or(0, |id| self.get(id).height)
    }

    pub fn set_best(&mut self, id: BlockId) {
        self.best = Some(id);
    }

    pub fn prev(&self, id: BlockId) -> Option<BlockId> {
        self.get(id).prev
    }

    pub fn next(&self, id: BlockId) -> Option<BlockId> {
        self.get(id).next
    }

    pub fn set_next(&mut self, id: BlockId, next: Option<BlockId>) {
        self.get_mut(id).next = next;
    }

    /// On the best chain: the best block itself or any block with a `next`.
    pub fn is_in_main_chain(&self, id: BlockId) -> bool {
        self.best == Some(id) || self.get(id).next.is_some()
    }

    pub fn is_stake_seen(&self, stake: &OutPoint, time: u32) -> bool {
        self.stake_seen.contains(&(*stake, time))
    }

    pub fn mark_failed(&mut self, id: BlockId) {
        self.get_mut(id).flags.insert(BlockFlags::FAILED_VALID);
    }

    /// Iterate `id` and its ancestors back to genesis.
    pub fn ancestors(&self, id: BlockId) -> Ancestors<'_> {
        Ancestors {
            index: self,
            cursor: Some(id),
        }
    }

    /// Ancestor of `id` at `height`, if `height` is not above it.
    pub fn ancestor(&self, id: BlockId, height: u32) -> Option<BlockId> {
        if height > self.get(id).height {
            return None;
        }
        self.ancestors(id).find(|a| self.get(*a).height == height)
    }

    /// Best-chain block at `height`.
    pub fn main_chain_at(&self, height: u32) -> Option<BlockId> {
        self.best.and_then(|best| self.ancestor(best, height))
    }

    /// Last common ancestor of two blocks, by the two-pointer walk.
    pub fn find_fork(&self, a: BlockId, b: BlockId) -> Option<BlockId> {
        let mut a = Some(a);
        let mut b = Some(b);
        while let (Some(x), Some(y)) = (a, b) {
            if x == y {
                return Some(x);
            }
            let (hx, hy) = (self.get(x).height, self.get(y).height);
            if hx >= hy {
                a = self.prev(x);
            }
            if hy >= hx {
                b = self.prev(y);
            }
        }
        None
    }

    pub fn median_time_past(&self, id: BlockId) -> u32 {
        let mut times: Vec<u32> = self
            .ancestors(id)
            .take(MEDIAN_TIME_SPAN)
            .map(|a| self.get(a).time())
            .collect();
        times.sort_unstable();
        times[times.len() / 2]
    }

    /// Nearest block at or before `id` of the requested kind; genesis if
    /// none.
    pub fn last_of_kind(&self, id: BlockId, proof_of_stake: bool) -> BlockId {
        let mut cursor = id;
        while let Some(prev) = self.prev(cursor) {
            if self.get(cursor).is_proof_of_stake() == proof_of_stake {
                break;
            }
            cursor = prev;
        }
        cursor
    }

    /// Point `next` links along the path genesis → `best`, clearing any
    /// stale links off that path.
    pub fn relink_best_chain(&mut self, best: BlockId) {
        for node in &mut self.nodes {
            node.next = None;
        }
        let path: Vec<BlockId> = self.ancestors(best).collect();
        for pair in path.windows(2) {
            let (child, parent) = (pair[0], pair[1]);
            self.get_mut(parent).next = Some(child);
        }
        self.best = Some(best);
    }

    /// Peg supply index in effect for the transactions of block `id`.
    ///
    /// Before activation it is 0. At every `peg_interval` boundary after
    /// activation the votes of the preceding interval move it:
    ///
    /// | Votes in window | Step |
    /// |-----------------|------|
    /// | inflate >= 3/4 | -2 |
    /// | inflate > 1/2 | -1 |
    /// | deflate >= 3/4 | +2 |
    /// | deflate > 1/2 | +1 |
    /// | otherwise | 0 |
    ///
    /// The result is cached on each record as it is computed.
    pub fn peg_supply_index(&mut self, id: BlockId, params: &ChainParams) -> u32 {
        let mut pending = Vec::new();
        let mut cursor = Some(id);
        while let Some(c) = cursor {
            if self.get(c).peg_supply_index.is_some() {
                break;
            }
            pending.push(c);
            cursor = self.prev(c);
        }

        for c in pending.into_iter().rev() {
            let value = self.compute_supply_index(c, params);
            self.get_mut(c).peg_supply_index = Some(value);
        }
        self.get(id).peg_supply_index.unwrap_or(0)
    }

    fn compute_supply_index(&self, id: BlockId, params: &ChainParams) -> u32 {
        let node = self.get(id);
        if !params.is_peg_active(node.height) {
            return 0;
        }
        let prev_supply = node
            .prev
            .and_then(|p| self.get(p).peg_supply_index)
            .unwrap_or(0);
        let interval = params.peg_interval.max(1);
        if node.height == params.peg_start_height || node.height % interval != 0 {
            return prev_supply;
        }

        let (mut inflate, mut deflate, mut total) = (0u32, 0u32, 0u32);
        let window = node.prev.map(|p| self.ancestors(p).take(interval as usize));
        for voter in window.into_iter().flatten() {
            total += 1;
            match self.get(voter).peg_vote {
                PegVote::Inflate => inflate += 1,
                PegVote::Deflate => deflate += 1,
                PegVote::NoChange => {}
            }
        }

        let step = |votes: u32| -> i64 {
            if votes * 4 >= total * 3 {
                2
            } else if votes * 2 > total {
                1
            } else {
                0
            }
        };
        let delta = if total == 0 {
            0
        } else {
            step(deflate) - step(inflate)
        };
        let max = (PEG_SIZE - 1) as i64;
        (i64::from(prev_supply) + delta).clamp(0, max) as u32
    }
}

pub struct Ancestors<'a> {
    index: &'a ChainIndex,
    cursor: Option<BlockId>,
}

impl Iterator for Ancestors<'_> {
    type Item = BlockId;

    fn next(&mut self) -> Option<BlockId> {
        let current = self.cursor?;
        self.cursor = self.index.prev(current);
        Some(current)
    }
}
