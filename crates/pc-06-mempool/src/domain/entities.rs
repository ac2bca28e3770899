//! Core domain entities for the mempool.

use pc_05_peg::{Fractions, OutputRef};
use shared_types::{Amount, Hash, Transaction};

/// Largest orphan transaction kept while its parents are missing.
pub const MAX_ORPHAN_TX_SIZE: usize = 5000;

/// A transaction admitted to the pool with everything connect resolved.
#[derive(Clone, Debug)]
pub struct MempoolEntry {
    pub tx: Transaction,
    pub txid: Hash,
    /// Previous outputs, in input order.
    pub spent: Vec<OutputRef>,
    /// Fractions of each output as computed at admission.
    pub fractions: Vec<Fractions>,
    pub fee_fractions: Fractions,
    pub fee: Amount,
    pub size: usize,
    /// Adjusted network time at admission.
    pub entry_time: u32,
}

/// Mempool configuration.
#[derive(Clone, Debug)]
pub struct MempoolConfig {
    /// Maximum orphan transactions kept.
    pub max_orphan_txs: usize,
    /// Free-relay allowance in thousands of bytes per ten minutes.
    pub limit_free_relay: u32,
}

impl Default for MempoolConfig {
    fn default() -> Self {
        Self {
            max_orphan_txs: 10_000,
            limit_free_relay: 15,
        }
    }
}

impl MempoolConfig {
    /// Creates a minimal config for testing.
    pub fn for_testing() -> Self {
        Self {
            max_orphan_txs: 8,
            limit_free_relay: 1,
        }
    }
}
