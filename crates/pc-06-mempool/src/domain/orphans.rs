//! Transactions waiting for unknown parents.

use super::entities::MAX_ORPHAN_TX_SIZE;
use rand::seq::IteratorRandom;
use rand::Rng;
use shared_types::{Encodable, Hash, Transaction};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Default)]
pub struct OrphanPool {
    by_hash: HashMap<Hash, Transaction>,
    /// Parent txid to the orphans naming it.
    by_prev: HashMap<Hash, HashSet<Hash>>,
}

impl OrphanPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.by_hash.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_hash.is_empty()
    }

    pub fn contains(&self, txid: &Hash) -> bool {
        self.by_hash.contains_key(txid)
    }

    pub fn get(&self, txid: &Hash) -> Option<&Transaction> {
        self.by_hash.get(txid)
    }

    /// Keeps `tx` until a parent arrives. Oversized and known orphans are
    /// refused.
    pub fn add(&mut self, tx: Transaction) -> bool {
        let txid = tx.txid();
        if self.by_hash.contains_key(&txid) {
            return false;
        }
        let size = tx.encoded_len();
        if size > MAX_ORPHAN_TX_SIZE {
            tracing::debug!("[pc-06] Ignoring large orphan tx ({} bytes)", size);
            return false;
        }
        for input in &tx.inputs {
            self.by_prev
                .entry(input.prevout.txid)
                .or_default()
                .insert(txid);
        }
        self.by_hash.insert(txid, tx);
        true
    }

    pub fn remove(&mut self, txid: &Hash) -> Option<Transaction> {
        let tx = self.by_hash.remove(txid)?;
        for input in &tx.inputs {
            if let Some(children) = self.by_prev.get_mut(&input.prevout.txid) {
                children.remove(txid);
                if children.is_empty() {
                    self.by_prev.remove(&input.prevout.txid);
                }
            }
        }
        Some(tx)
    }

    /// Orphans that spend an output of `parent`.
    pub fn children_of(&self, parent: &Hash) -> Vec<Hash> {
        self.by_prev
            .get(parent)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Evicts random orphans until at most `max` remain. Returns how many
    /// were evicted.
    pub fn limit(&mut self, max: usize) -> usize {
        self.limit_with_rng(max, &mut rand::thread_rng())
    }

    pub fn limit_with_rng<R: Rng + ?Sized>(&mut self, max: usize, rng: &mut R) -> usize {
        let mut evicted = 0;
        while self.by_hash.len() > max {
            let Some(victim) = self.by_hash.keys().copied().choose(rng) else {
                break;
            };
            self.remove(&victim);
            evicted += 1;
        }
        evicted
    }
}
