//! # Mempool Service
//!
//! Admission pipeline, in order:
//!
//! 1. `check_transaction`; coinbase and coinstake are refused outright
//! 2. standardness, when the network requires it
//! 3. duplicates in the pool or chain, conflicts with pooled spenders
//! 4. input resolution through the pool view (missing parents: orphan)
//! 5. minimum fee, then the free-relay limiter below the relay fee
//! 6. full `connect_inputs` against a throwaway storage transaction

use crate::adapters::fractions::PoolFractions;
use crate::domain::entities::{MempoolConfig, MempoolEntry};
use crate::domain::errors::MempoolError;
use crate::domain::free_relay::FreeRelayLimiter;
use crate::domain::orphans::OrphanPool;
use crate::domain::pool::TransactionPool;
use pc_02_block_storage::{BlockStore, KeyValueStore, StoreTxn};
use pc_03_validator::{check_transaction, is_standard_tx, min_fee, relay_fee};
use pc_04_utxo::{ConnectContext, PoolView, QueuedChanges, TxPos, UtxoEngine};
use pc_05_peg::PegDb;
use shared_types::{short_hash, Amount, ChainParams, Encodable, Hash, Transaction};
use std::collections::VecDeque;

/// What admission needs to know about the active chain.
#[derive(Clone, Copy)]
pub struct ChainView<'a> {
    pub params: &'a ChainParams,
    pub store: &'a dyn KeyValueStore,
    pub blocks: &'a BlockStore,
    /// Height a new block would have.
    pub next_height: u32,
    /// Time of the best block.
    pub tip_time: u32,
    pub adjusted_time: u32,
    /// Supply index of the best block.
    pub supply: u32,
}

#[derive(Debug)]
pub struct Mempool {
    config: MempoolConfig,
    pool: TransactionPool,
    orphans: OrphanPool,
    limiter: FreeRelayLimiter,
}

impl Mempool {
    pub fn new(config: MempoolConfig) -> Self {
        Self {
            config,
            pool: TransactionPool::new(),
            orphans: OrphanPool::new(),
            limiter: FreeRelayLimiter::new(),
        }
    }

    pub fn config(&self) -> &MempoolConfig {
        &self.config
    }

    pub fn pool(&self) -> &TransactionPool {
        &self.pool
    }

    pub fn orphans(&self) -> &OrphanPool {
        &self.orphans
    }

    pub fn len(&self) -> usize {
        self.pool.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pool.is_empty()
    }

    pub fn contains(&self, txid: &Hash) -> bool {
        self.pool.contains(txid)
    }

    /// Admits one transaction. Missing parents are reported, not cached.
    pub fn accept(&mut self, tx: Transaction, chain: &ChainView<'_>) -> Result<Hash, MempoolError> {
        let params = chain.params;
        check_transaction(&tx, params)?;
        if tx.is_coinbase() {
            return Err(MempoolError::Coinbase);
        }
        if tx.is_coinstake() {
            return Err(MempoolError::Coinstake);
        }
        if params.require_standard {
            is_standard_tx(&tx, chain.next_height, chain.adjusted_time, params)?;
        }

        let txid = tx.txid();
        if self.pool.contains(&txid) {
            return Err(MempoolError::AlreadyInPool(txid));
        }
        for input in &tx.inputs {
            if let Some(spender) = self.pool.spender_of(&input.prevout) {
                return Err(MempoolError::Conflict {
                    prevout: input.prevout,
                    spender,
                });
            }
        }

        let txn = StoreTxn::new(chain.store);
        let engine = UtxoEngine::new(&txn, chain.blocks);
        if engine.tx_db().contains_tx(&txid)? {
            return Err(MempoolError::AlreadyInChain(txid));
        }
        let inputs = engine.fetch_inputs(
            &tx,
            &QueuedChanges::new(),
            Some(&self.pool as &dyn PoolView),
            chain.next_height,
        )?;

        let size = tx.encoded_len();
        let ctx = ConnectContext::for_pool(params, chain.next_height, chain.tip_time, chain.supply);
        let value_in: Amount = tx
            .inputs
            .iter()
            .filter_map(|i| {
                let (_, prev) = inputs.get(&i.prevout.txid)?;
                prev.outputs.get(i.prevout.n as usize).map(|o| o.value)
            })
            .fold(0, Amount::saturating_add);
        let value_out = tx.value_out().unwrap_or(Amount::MAX);
        if value_in >= value_out {
            let fee = value_in - value_out;
            let min = min_fee(size, tx.inputs.len(), tx.outputs.len(), ctx.peg_active, params);
            if fee < min {
                return Err(MempoolError::FeeTooLow { fee, min });
            }
            if fee < relay_fee(size, params)
                && !self
                    .limiter
                    .allow(size, chain.adjusted_time, self.config.limit_free_relay)
            {
                return Err(MempoolError::RateLimited);
            }
        }

        let committed = PegDb::new(&txn);
        let peg = PoolFractions::new(&self.pool, &committed, chain.tip_time);
        let connected = engine.connect_inputs(
            &tx,
            &inputs,
            &mut QueuedChanges::new(),
            TxPos::Mempool,
            &ctx,
            &peg,
        )?;
        txn.abort();

        let fractions = connected.fractions.unwrap_or_default();
        self.pool.insert(MempoolEntry {
            txid,
            spent: connected.spent,
            fractions: fractions.outputs,
            fee_fractions: fractions.fee,
            fee: connected.fee,
            size,
            entry_time: chain.adjusted_time,
            tx,
        });
        tracing::debug!(
            "[pc-06] Accepted tx {} (pool size {})",
            short_hash(&txid),
            self.pool.len()
        );
        Ok(txid)
    }

    /// Admits `tx`, caching it as an orphan when parents are missing, and
    /// then admits every orphan it unblocks, breadth first.
    ///
    /// Returns the txids admitted, `tx` first.
    pub fn process(&mut self, tx: Transaction, chain: &ChainView<'_>) -> Result<Vec<Hash>, MempoolError> {
        let txid = match self.accept(tx.clone(), chain) {
            Ok(txid) => txid,
            Err(MempoolError::MissingInputs(parent)) => {
                if self.orphans.add(tx) {
                    let evicted = self.orphans.limit(self.config.max_orphan_txs);
                    if evicted > 0 {
                        tracing::debug!("[pc-06] Orphan pool overflow, evicted {}", evicted);
                    }
                }
                return Err(MempoolError::MissingInputs(parent));
            }
            Err(err) => return Err(err),
        };

        let mut accepted = vec![txid];
        let mut work = VecDeque::from([txid]);
        while let Some(parent) = work.pop_front() {
            for child in self.orphans.children_of(&parent) {
                let Some(orphan) = self.orphans.get(&child).cloned() else {
                    continue;
                };
                match self.accept(orphan, chain) {
                    Ok(id) => {
                        self.orphans.remove(&child);
                        accepted.push(id);
                        work.push_back(id);
                    }
                    Err(MempoolError::MissingInputs(_)) => {}
                    Err(err) => {
                        tracing::debug!(
                            "[pc-06] Dropping orphan {}: {}",
                            short_hash(&child),
                            err
                        );
                        self.orphans.remove(&child);
                    }
                }
            }
        }
        Ok(accepted)
    }

    /// Purges a connected block's transactions and their conflicts.
    pub fn remove_for_block(&mut self, transactions: &[Transaction]) -> Vec<Hash> {
        let removed = self.pool.remove_for_block(transactions);
        for tx in transactions {
            self.orphans.remove(&tx.txid());
        }
        removed
    }

    /// Removes `txid` and its pooled descendants.
    pub fn remove_recursive(&mut self, txid: &Hash) -> Vec<Hash> {
        self.pool.remove(txid, true)
    }
}
