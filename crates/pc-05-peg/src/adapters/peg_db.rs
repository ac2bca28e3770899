//! # Peg Store
//!
//! Typed view of the peg namespace inside an open [`StoreTxn`]: output
//! fractions, the spendable and frozen address indices, the frozen queue
//! and the per-address ledger.
//!
//! Every mutation has an exact inverse:
//!
//! | Forward | Inverse |
//! |---------|---------|
//! | [`PegDb::connect_tx`] | [`PegDb::disconnect_tx`] |
//! | [`PegDb::process_frozen_queue`] | [`PegDb::undo_frozen_queue`] |
//!
//! Counters and balances are deleted when they return to zero, so a
//! forward step followed by its inverse leaves the store byte-identical.

use crate::adapters::keys;
use crate::domain::errors::PegError;
use crate::domain::fractions::Fractions;
use crate::domain::ledger::{Balance, FrozenEntry, LedgerKind, LedgerRecord, OutputRef};
use crate::ports::outbound::FractionsSource;
use pc_02_block_storage::domain::value_objects::prefix_end;
use pc_02_block_storage::{KVStoreError, StoreTxn};
use serde::de::DeserializeOwned;
use shared_types::{short_hash, Address, Amount, Hash, OutPoint, Transaction};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

fn decode<T: DeserializeOwned>(key: &[u8], bytes: &[u8]) -> Result<T, PegError> {
    bincode::deserialize(bytes).map_err(|e| {
        PegError::Store(KVStoreError::Serialization {
            key: key.to_vec(),
            message: e.to_string(),
        })
    })
}

pub struct PegDb<'a> {
    txn: &'a StoreTxn<'a>,
}

impl<'a> PegDb<'a> {
    pub fn new(txn: &'a StoreTxn<'a>) -> Self {
        Self { txn }
    }

    pub fn read_fractions(&self, outpoint: &OutPoint) -> Result<Option<Fractions>, PegError> {
        Ok(self.txn.get_typed(&keys::fractions(outpoint))?)
    }

    pub fn write_fractions(&self, outpoint: &OutPoint, fractions: &Fractions) -> Result<(), PegError> {
        Ok(self.txn.put_typed(keys::fractions(outpoint), fractions)?)
    }

    pub fn erase_fractions(&self, outpoint: &OutPoint) {
        self.txn.delete(keys::fractions(outpoint));
    }

    pub fn balance(&self, address: &Address) -> Result<Balance, PegError> {
        Ok(self
            .txn
            .get_typed(&keys::balance(address))?
            .unwrap_or_default())
    }

    /// Full history of an address, oldest first.
    pub fn ledger(&self, address: &Address) -> Result<Vec<LedgerRecord>, PegError> {
        self.txn
            .prefix_scan(&keys::ledger_prefix(address))?
            .iter()
            .map(|(key, bytes)| decode(key, bytes))
            .collect()
    }

    /// Spendable outputs of an address.
    pub fn unspent(&self, address: &Address) -> Result<Vec<(OutPoint, Amount)>, PegError> {
        let mut out = Vec::new();
        for (key, bytes) in self.txn.prefix_scan(&keys::unspent_prefix(address))? {
            let outpoint = OutPoint::from_key(&key[keys::ADDRESS_PREFIX_LEN..]).ok_or_else(|| {
                PegError::Store(KVStoreError::CorruptionError {
                    message: format!("malformed unspent key {key:02x?}"),
                })
            })?;
            out.push((outpoint, decode(&key, &bytes)?));
        }
        Ok(out)
    }

    /// Frozen outputs of an address.
    pub fn frozen(&self, address: &Address) -> Result<Vec<FrozenEntry>, PegError> {
        self.txn
            .prefix_scan(&keys::frozen_prefix(address))?
            .iter()
            .map(|(key, bytes)| decode(key, bytes))
            .collect()
    }

    /// The whole frozen queue in unlock order.
    pub fn frozen_queue(&self) -> Result<Vec<FrozenEntry>, PegError> {
        self.txn
            .prefix_scan(&keys::queue_prefix())?
            .iter()
            .map(|(key, bytes)| decode(key, bytes))
            .collect()
    }

    fn head(&self, address: &Address) -> Result<u64, PegError> {
        Ok(self.txn.get_typed(&keys::head(address))?.unwrap_or(0))
    }

    fn set_head(&self, address: &Address, head: u64) -> Result<(), PegError> {
        if head == 0 {
            self.txn.delete(keys::head(address));
            Ok(())
        } else {
            Ok(self.txn.put_typed(keys::head(address), &head)?)
        }
    }

    fn set_balance(&self, address: &Address, balance: Balance) -> Result<(), PegError> {
        if balance.is_zero() {
            self.txn.delete(keys::balance(address));
            Ok(())
        } else {
            Ok(self.txn.put_typed(keys::balance(address), &balance)?)
        }
    }

    fn append_record(&self, address: &Address, record: LedgerRecord) -> Result<(), PegError> {
        let head = self.head(address)?;
        self.txn.put_typed(keys::ledger(address, head), &record)?;
        self.set_head(address, head + 1)?;
        let mut balance = self.balance(address)?;
        balance.apply(&record, 1);
        self.set_balance(address, balance)
    }

    /// Remove the head record of `address`, which must be `kind` for `txid`.
    fn pop_record(&self, address: &Address, txid: &Hash, kind: LedgerKind) -> Result<LedgerRecord, PegError> {
        let inconsistent = || PegError::LedgerInconsistent {
            address: *address,
            txid: *txid,
        };
        let seq = self.head(address)?.checked_sub(1).ok_or_else(inconsistent)?;
        let key = keys::ledger(address, seq);
        let record: LedgerRecord = self.txn.get_typed(&key)?.ok_or_else(inconsistent)?;
        if record.txid != *txid || record.kind != kind {
            return Err(inconsistent());
        }
        self.txn.delete(key);
        self.set_head(address, seq)?;
        let mut balance = self.balance(address)?;
        balance.apply(&record, -1);
        self.set_balance(address, balance)?;
        Ok(record)
    }

    /// Record a connected transaction: output fractions, index moves and one
    /// net ledger record per touched address.
    ///
    /// `spent` lists the resolved inputs; `fractions` has one entry per
    /// output. Outputs still locked at `time` go to the frozen queue.
    pub fn connect_tx(
        &self,
        tx: &Transaction,
        spent: &[OutputRef],
        fractions: &[Fractions],
        time: u32,
    ) -> Result<(), PegError> {
        let txid = tx.txid();
        let mut deltas: BTreeMap<Address, Balance> = BTreeMap::new();

        for input in spent {
            if let Some(address) = input.address {
                self.txn.delete(keys::unspent(&address, &input.outpoint));
                deltas.entry(address).or_default().spendable -= input.value;
            }
        }

        for (n, (out, f)) in tx.outputs.iter().zip(fractions).enumerate() {
            let outpoint = OutPoint::new(txid, n as u32);
            self.write_fractions(&outpoint, f)?;
            let Some(address) = out.script_pubkey.address() else {
                continue;
            };
            let delta = deltas.entry(address).or_default();
            if f.is_frozen_at(time) {
                let entry = FrozenEntry {
                    outpoint,
                    address,
                    value: out.value,
                    unlock_time: f.lock_time,
                };
                self.txn.put_typed(keys::frozen(&address, &outpoint), &entry)?;
                self.txn.put_typed(keys::queue(f.lock_time, &outpoint), &entry)?;
                delta.frozen += out.value;
            } else {
                self.txn.put_typed(keys::unspent(&address, &outpoint), &out.value)?;
                delta.spendable += out.value;
            }
        }

        for (address, delta) in deltas {
            self.append_record(
                &address,
                LedgerRecord {
                    txid,
                    kind: LedgerKind::Tx,
                    time,
                    spendable: delta.spendable,
                    frozen: delta.frozen,
                },
            )?;
        }
        Ok(())
    }

    /// Exact inverse of [`PegDb::connect_tx`].
    pub fn disconnect_tx(&self, tx: &Transaction, spent: &[OutputRef]) -> Result<(), PegError> {
        let txid = tx.txid();
        let touched: BTreeSet<Address> = spent
            .iter()
            .filter_map(|i| i.address)
            .chain(tx.outputs.iter().filter_map(|o| o.script_pubkey.address()))
            .collect();
        for address in &touched {
            self.pop_record(address, &txid, LedgerKind::Tx)?;
        }

        for (n, out) in tx.outputs.iter().enumerate() {
            let outpoint = OutPoint::new(txid, n as u32);
            if let Some(address) = out.script_pubkey.address() {
                let frozen_key = keys::frozen(&address, &outpoint);
                match self.txn.get_typed::<FrozenEntry>(&frozen_key)? {
                    Some(entry) => {
                        self.txn.delete(frozen_key);
                        self.txn.delete(keys::queue(entry.unlock_time, &outpoint));
                    }
                    None => self.txn.delete(keys::unspent(&address, &outpoint)),
                }
            }
            self.erase_fractions(&outpoint);
        }

        for input in spent {
            if let Some(address) = input.address {
                self.txn
                    .put_typed(keys::unspent(&address, &input.outpoint), &input.value)?;
            }
        }
        Ok(())
    }

    /// Release every queued output with `unlock_time <= time` into the
    /// spendable index, appending a synthetic `Unfreeze` record for each.
    /// What was released is remembered under `block` for the undo.
    pub fn process_frozen_queue(&self, block: &Hash, time: u32) -> Result<Vec<FrozenEntry>, PegError> {
        let start = keys::queue_prefix();
        let end = keys::queue_after(time).or_else(|| prefix_end(&start));
        let mut released = Vec::new();

        for (key, bytes) in self.txn.range_scan(&start, end.as_deref())? {
            let entry: FrozenEntry = decode(&key, &bytes)?;
            self.txn.delete(key);
            self.txn.delete(keys::frozen(&entry.address, &entry.outpoint));
            self.txn
                .put_typed(keys::unspent(&entry.address, &entry.outpoint), &entry.value)?;
            self.append_record(
                &entry.address,
                LedgerRecord {
                    txid: entry.outpoint.txid,
                    kind: LedgerKind::Unfreeze { n: entry.outpoint.n },
                    time,
                    spendable: entry.value,
                    frozen: -entry.value,
                },
            )?;
            released.push(entry);
        }

        if !released.is_empty() {
            self.txn.put_typed(keys::released(block), &released)?;
            debug!(
                "[pc-05] 🔓 Block {} released {} frozen outputs",
                short_hash(block),
                released.len()
            );
        }
        Ok(released)
    }

    /// Push the outputs released by `block` back onto the frozen queue.
    pub fn undo_frozen_queue(&self, block: &Hash) -> Result<usize, PegError> {
        let key = keys::released(block);
        let Some(released) = self.txn.get_typed::<Vec<FrozenEntry>>(&key)? else {
            return Ok(0);
        };
        for entry in released.iter().rev() {
            self.pop_record(
                &entry.address,
                &entry.outpoint.txid,
                LedgerKind::Unfreeze { n: entry.outpoint.n },
            )?;
            self.txn.delete(keys::unspent(&entry.address, &entry.outpoint));
            self.txn
                .put_typed(keys::frozen(&entry.address, &entry.outpoint), entry)?;
            self.txn
                .put_typed(keys::queue(entry.unlock_time, &entry.outpoint), entry)?;
        }
        self.txn.delete(key);
        Ok(released.len())
    }
}

impl FractionsSource for PegDb<'_> {
    fn fractions(&self, outpoint: &OutPoint) -> Result<Option<Fractions>, PegError> {
        self.read_fractions(outpoint)
    }

    fn is_frozen(&self, outpoint: &OutPoint) -> Result<bool, PegError> {
        match self.read_fractions(outpoint)? {
            Some(f) if !f.flags.is_empty() => Ok(self.txn.exists(&keys::queue(f.lock_time, outpoint))?),
            _ => Ok(false),
        }
    }
}
