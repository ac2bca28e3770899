//! # Transaction Pool
//!
//! ## Data Structures
//!
//! - `by_hash`: admitted entries by txid
//! - `spends`: which pooled transaction claims each outpoint
//!
//! ## Invariants
//!
//! - No duplicate txids.
//! - Each outpoint is claimed by at most one pooled transaction.
//! - Removing an entry recursively removes pooled spenders of its outputs
//!   when asked to.

use super::entities::MempoolEntry;
use pc_04_utxo::PoolView;
use shared_types::{Hash, OutPoint, Transaction};
use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct TransactionPool {
    by_hash: HashMap<Hash, MempoolEntry>,
    spends: HashMap<OutPoint, Hash>,
}

impl TransactionPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.by_hash.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_hash.is_empty()
    }

    pub fn get(&self, txid: &Hash) -> Option<&MempoolEntry> {
        self.by_hash.get(txid)
    }

    pub fn contains(&self, txid: &Hash) -> bool {
        self.by_hash.contains_key(txid)
    }

    /// The pooled transaction spending `outpoint`, if any.
    pub fn spender_of(&self, outpoint: &OutPoint) -> Option<Hash> {
        self.spends.get(outpoint).copied()
    }

    pub fn entries(&self) -> impl Iterator<Item = &MempoolEntry> {
        self.by_hash.values()
    }

    /// Adds an entry. The caller has checked for duplicates and conflicts.
    pub(crate) fn insert(&mut self, entry: MempoolEntry) {
        for input in &entry.tx.inputs {
            self.spends.insert(input.prevout, entry.txid);
        }
        self.by_hash.insert(entry.txid, entry);
    }

    /// Removes `txid`; with `recursive`, also every pooled descendant.
    /// Returns the removed txids.
    pub fn remove(&mut self, txid: &Hash, recursive: bool) -> Vec<Hash> {
        let mut removed = Vec::new();
        let mut stack = vec![*txid];
        while let Some(next) = stack.pop() {
            let Some(entry) = self.by_hash.remove(&next) else {
                continue;
            };
            for input in &entry.tx.inputs {
                if self.spends.get(&input.prevout) == Some(&next) {
                    self.spends.remove(&input.prevout);
                }
            }
            if recursive {
                for n in 0..entry.tx.outputs.len() as u32 {
                    if let Some(child) = self.spends.get(&OutPoint::new(next, n)) {
                        stack.push(*child);
                    }
                }
            }
            removed.push(next);
        }
        removed
    }

    /// Removes pooled transactions that spend any input of `tx`, other
    /// than `tx` itself, with their descendants.
    pub fn remove_conflicts(&mut self, tx: &Transaction) -> Vec<Hash> {
        let txid = tx.txid();
        let mut removed = Vec::new();
        for input in &tx.inputs {
            if let Some(spender) = self.spender_of(&input.prevout) {
                if spender != txid {
                    removed.extend(self.remove(&spender, true));
                }
            }
        }
        removed
    }

    /// Drops the transactions of a connected block and whatever they
    /// conflict with.
    pub fn remove_for_block(&mut self, transactions: &[Transaction]) -> Vec<Hash> {
        let mut removed = Vec::new();
        for tx in transactions {
            removed.extend(self.remove(&tx.txid(), false));
            removed.extend(self.remove_conflicts(tx));
        }
        removed
    }
}

impl PoolView for TransactionPool {
    fn pooled_tx(&self, txid: &Hash) -> Option<&Transaction> {
        self.by_hash.get(txid).map(|e| &e.tx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pc_05_peg::Fractions;
    use shared_types::{Script, TxIn, TxOut};

    fn tx(prevouts: &[OutPoint], outputs: usize, time: u32) -> Transaction {
        Transaction {
            version: 1,
            time,
            inputs: prevouts.iter().map(|p| TxIn::new(*p)).collect(),
            outputs: (0..outputs)
                .map(|i| TxOut::new(1_000 + i as i64, Script::p2pkh(&[5u8; 20])))
                .collect(),
            lock_time: 0,
        }
    }

    fn entry(tx: Transaction) -> MempoolEntry {
        MempoolEntry {
            txid: tx.txid(),
            fractions: tx.outputs.iter().map(|o| Fractions::std(o.value)).collect(),
            tx,
            spent: Vec::new(),
            fee_fractions: Fractions::new(),
            fee: 0,
            size: 100,
            entry_time: 0,
        }
    }

    #[test]
    fn test_insert_tracks_spends() {
        let mut pool = TransactionPool::new();
        let prevout = OutPoint::new([1u8; 32], 0);
        let a = tx(&[prevout], 2, 1);
        pool.insert(entry(a.clone()));

        assert!(pool.contains(&a.txid()));
        assert_eq!(pool.spender_of(&prevout), Some(a.txid()));
        assert_eq!(pool.pooled_tx(&a.txid()), Some(&a));
    }

    #[test]
    fn test_recursive_removal() {
        let mut pool = TransactionPool::new();
        let parent = tx(&[OutPoint::new([1u8; 32], 0)], 2, 1);
        let child = tx(&[OutPoint::new(parent.txid(), 1)], 1, 2);
        let grandchild = tx(&[OutPoint::new(child.txid(), 0)], 1, 3);
        for t in [&parent, &child, &grandchild] {
            pool.insert(entry(t.clone()));
        }

        let removed = pool.remove(&parent.txid(), false);
        assert_eq!(removed, vec![parent.txid()]);
        assert_eq!(pool.len(), 2);

        pool.insert(entry(parent.clone()));
        let removed = pool.remove(&parent.txid(), true);
        assert_eq!(removed.len(), 3);
        assert!(pool.is_empty());
        assert_eq!(pool.spender_of(&OutPoint::new(parent.txid(), 1)), None);
    }

    #[test]
    fn test_block_removes_included_and_conflicts() {
        let mut pool = TransactionPool::new();
        let shared = OutPoint::new([1u8; 32], 0);
        let pooled = tx(&[shared], 1, 1);
        let child = tx(&[OutPoint::new(pooled.txid(), 0)], 1, 2);
        let included = tx(&[OutPoint::new([2u8; 32], 0)], 1, 1);
        for t in [&pooled, &child, &included] {
            pool.insert(entry(t.clone()));
        }
        let rival = tx(&[shared], 1, 9);

        let removed = pool.remove_for_block(&[included.clone(), rival]);
        assert_eq!(removed.len(), 3);
        assert!(pool.is_empty());
    }
}
