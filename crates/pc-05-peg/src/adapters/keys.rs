//! Key layout of the peg store.
//!
//! | Key | Value |
//! |-----|-------|
//! | `P F <outpoint>` | `Fractions` |
//! | `P U <address> <outpoint>` | value (spendable index) |
//! | `P Z <address> <outpoint>` | `FrozenEntry` (frozen index) |
//! | `P Q <unlock_time BE> <outpoint>` | `FrozenEntry` (frozen queue) |
//! | `P L <address> <seq BE>` | `LedgerRecord` |
//! | `P H <address>` | next ledger sequence |
//! | `P B <address>` | `Balance` |
//! | `P R <block hash>` | entries released by that block's sweep |
//!
//! Big-endian numbers keep range scans in time and sequence order.

use shared_types::{Address, Hash, OutPoint};

pub const PEG: u8 = b'P';

const FRACTIONS: u8 = b'F';
const UNSPENT: u8 = b'U';
const FROZEN: u8 = b'Z';
const QUEUE: u8 = b'Q';
const LEDGER: u8 = b'L';
const HEAD: u8 = b'H';
const BALANCE: u8 = b'B';
const RELEASED: u8 = b'R';

/// Length of `P <tag> <address>`.
pub const ADDRESS_PREFIX_LEN: usize = 22;

fn key(tag: u8, parts: &[&[u8]]) -> Vec<u8> {
    let len = 2 + parts.iter().map(|p| p.len()).sum::<usize>();
    let mut out = Vec::with_capacity(len);
    out.push(PEG);
    out.push(tag);
    for part in parts {
        out.extend_from_slice(part);
    }
    out
}

pub fn fractions(outpoint: &OutPoint) -> Vec<u8> {
    key(FRACTIONS, &[&outpoint.to_key()])
}

pub fn unspent(address: &Address, outpoint: &OutPoint) -> Vec<u8> {
    key(UNSPENT, &[address, &outpoint.to_key()])
}

pub fn unspent_prefix(address: &Address) -> Vec<u8> {
    key(UNSPENT, &[address])
}

pub fn frozen(address: &Address, outpoint: &OutPoint) -> Vec<u8> {
    key(FROZEN, &[address, &outpoint.to_key()])
}

pub fn frozen_prefix(address: &Address) -> Vec<u8> {
    key(FROZEN, &[address])
}

pub fn queue(unlock_time: u32, outpoint: &OutPoint) -> Vec<u8> {
    key(QUEUE, &[&unlock_time.to_be_bytes(), &outpoint.to_key()])
}

pub fn queue_prefix() -> Vec<u8> {
    key(QUEUE, &[])
}

/// First queue key unlocking strictly after `time`, `None` past the end.
pub fn queue_after(time: u32) -> Option<Vec<u8>> {
    time.checked_add(1)
        .map(|next| key(QUEUE, &[&next.to_be_bytes()]))
}

pub fn ledger(address: &Address, seq: u64) -> Vec<u8> {
    key(LEDGER, &[address, &seq.to_be_bytes()])
}

pub fn ledger_prefix(address: &Address) -> Vec<u8> {
    key(LEDGER, &[address])
}

pub fn head(address: &Address) -> Vec<u8> {
    key(HEAD, &[address])
}

pub fn balance(address: &Address) -> Vec<u8> {
    key(BALANCE, &[address])
}

pub fn released(block: &Hash) -> Vec<u8> {
    key(RELEASED, &[block])
}
