//! Per-address ledger records.

use serde::{Deserialize, Serialize};
use shared_types::{Address, Amount, Hash, OutPoint};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerKind {
    /// Net effect of one transaction on the address.
    Tx,
    /// Synthetic record written by the frozen-queue sweep when output `n`
    /// of `txid` unlocks.
    Unfreeze { n: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerRecord {
    pub txid: Hash,
    pub kind: LedgerKind,
    pub time: u32,
    /// Change of the spendable balance.
    pub spendable: Amount,
    /// Change of the frozen balance.
    pub frozen: Amount,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Balance {
    pub spendable: Amount,
    pub frozen: Amount,
}

impl Balance {
    pub fn is_zero(&self) -> bool {
        self.spendable == 0 && self.frozen == 0
    }

    pub(crate) fn apply(&mut self, record: &LedgerRecord, sign: Amount) {
        self.spendable += sign * record.spendable;
        self.frozen += sign * record.frozen;
    }
}

/// An output waiting in the frozen queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrozenEntry {
    pub outpoint: OutPoint,
    pub address: Address,
    pub value: Amount,
    pub unlock_time: u32,
}

/// An output as the ledger sees it, spent or created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputRef {
    pub outpoint: OutPoint,
    pub address: Option<Address>,
    pub value: Amount,
}
