//! Fractions of pooled outputs layered over the committed peg store.

use crate::domain::pool::TransactionPool;
use pc_05_peg::{Fractions, FractionsSource, PegError};
use shared_types::OutPoint;

pub struct PoolFractions<'a> {
    pool: &'a TransactionPool,
    committed: &'a dyn FractionsSource,
    /// Chain time pooled outputs are judged frozen against.
    time: u32,
}

impl<'a> PoolFractions<'a> {
    pub fn new(pool: &'a TransactionPool, committed: &'a dyn FractionsSource, time: u32) -> Self {
        Self {
            pool,
            committed,
            time,
        }
    }
}

impl FractionsSource for PoolFractions<'_> {
    fn fractions(&self, outpoint: &OutPoint) -> Result<Option<Fractions>, PegError> {
        match self.pool.get(&outpoint.txid) {
            Some(entry) => Ok(entry.fractions.get(outpoint.n as usize).cloned()),
            None => self.committed.fractions(outpoint),
        }
    }

    fn is_frozen(&self, outpoint: &OutPoint) -> Result<bool, PegError> {
        match self.pool.get(&outpoint.txid) {
            Some(entry) => Ok(entry
                .fractions
                .get(outpoint.n as usize)
                .is_some_and(|f| f.is_frozen_at(self.time))),
            None => self.committed.is_frozen(outpoint),
        }
    }
}
