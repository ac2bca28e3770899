//! Blocks whose parent is not indexed yet.

use rand::seq::IteratorRandom;
use rand::Rng;
use shared_types::{Block, Hash};
use std::collections::{HashMap, HashSet, VecDeque};

#[derive(Debug, Default)]
pub struct OrphanBlocks {
    by_hash: HashMap<Hash, Block>,
    /// Missing parent hash to the orphans built on it.
    by_prev: HashMap<Hash, HashSet<Hash>>,
}

impl OrphanBlocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.by_hash.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_hash.is_empty()
    }

    pub fn contains(&self, hash: &Hash) -> bool {
        self.by_hash.contains_key(hash)
    }

    pub fn add(&mut self, block: Block) -> bool {
        let hash = block.hash();
        if self.by_hash.contains_key(&hash) {
            return false;
        }
        self.by_prev
            .entry(block.header.prev_hash)
            .or_default()
            .insert(hash);
        self.by_hash.insert(hash, block);
        true
    }

    pub fn remove(&mut self, hash: &Hash) -> Option<Block> {
        let block = self.by_hash.remove(hash)?;
        let prev = block.header.prev_hash;
        if let Some(children) = self.by_prev.get_mut(&prev) {
            children.remove(hash);
            if children.is_empty() {
                self.by_prev.remove(&prev);
            }
        }
        Some(block)
    }

    /// Orphans whose parent is `parent`.
    pub fn children_of(&self, parent: &Hash) -> Vec<Hash> {
        self.by_prev
            .get(parent)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Removes every cached orphan built on `parent`, at any depth.
    pub fn remove_descendants(&mut self, parent: &Hash) -> Vec<Hash> {
        let mut removed = Vec::new();
        let mut work = VecDeque::from([*parent]);
        while let Some(hash) = work.pop_front() {
            for child in self.children_of(&hash) {
                if self.remove(&child).is_some() {
                    removed.push(child);
                    work.push_back(child);
                }
            }
        }
        removed
    }

    /// Walks back through cached orphans from `hash` to the first block
    /// whose parent is not cached; returns that missing parent.
    pub fn missing_root(&self, hash: &Hash) -> Hash {
        let mut cursor = *hash;
        while let Some(block) = self.by_hash.get(&cursor) {
            cursor = block.header.prev_hash;
        }
        cursor
    }

    /// Evicts random childless orphans until at most `max` remain.
    pub fn limit(&mut self, max: usize) -> usize {
        self.limit_with_rng(max, &mut rand::thread_rng())
    }

    pub fn limit_with_rng<R: Rng + ?Sized>(&mut self, max: usize, rng: &mut R) -> usize {
        let mut evicted = 0;
        while self.by_hash.len() > max {
            let victim = self
                .by_hash
                .keys()
                .filter(|hash| !self.by_prev.contains_key(*hash))
                .copied()
                .choose(rng);
            let Some(victim) = victim else {
                break;
            };
            self.remove(&victim);
            evicted += 1;
        }
        evicted
    }
}
