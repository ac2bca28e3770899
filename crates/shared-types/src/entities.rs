//! # Core Chain Entities
//!
//! ## Clusters
//!
//! - **Value**: `Amount`, `COIN`, `CENT`, money range
//! - **Transactions**: `OutPoint`, `TxIn`, `TxOut`, `Transaction`
//! - **Blocks**: `BlockHeader`, `Block`, merkle root
//!
//! Transactions carry their own `time`; it is consensus relevant (input
//! causality, stake kernels, freeze unlocks).

use crate::codec::{write_var_bytes, write_vec, CodecError, Decodable, Encodable, Reader};
use crate::crypto::sha256d;
use crate::script::Script;
use serde::{Deserialize, Serialize};
use std::fmt;

// Re-export U256 for hash/target arithmetic
pub use primitive_types::U256;

/// A 32-byte double SHA-256 hash.
pub type Hash = [u8; 32];

/// A 20-byte Keccak address.
pub type Address = [u8; 20];

/// Signed so intermediate sums can be range-checked.
pub type Amount = i64;

pub const COIN: Amount = 100_000_000;
pub const CENT: Amount = 1_000_000;

/// Default money supply cap; networks may lower it in their params.
pub const MAX_MONEY: Amount = 2_000_000_000 * COIN;

/// Lock times below this are block heights, above are unix times.
pub const LOCKTIME_THRESHOLD: u32 = 500_000_000;

pub const SEQUENCE_FINAL: u32 = u32::MAX;

pub const CURRENT_TX_VERSION: i32 = 1;

/// Number of peg fraction buckets; the supply index ranges over
/// `0..PEG_SIZE`.
pub const PEG_SIZE: usize = 1200;

pub fn money_range(value: Amount, max_money: Amount) -> bool {
    (0..=max_money).contains(&value)
}

/// Short hex prefix for log lines.
pub fn short_hash(hash: &Hash) -> String {
    hex::encode(&hash[..6])
}

/// Reference to output `n` of transaction `txid`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OutPoint {
    pub txid: Hash,
    pub n: u32,
}

impl OutPoint {
    pub fn new(txid: Hash, n: u32) -> Self {
        Self { txid, n }
    }

    pub fn null() -> Self {
        Self {
            txid: [0u8; 32],
            n: u32::MAX,
        }
    }

    pub fn is_null(&self) -> bool {
        self.txid == [0u8; 32] && self.n == u32::MAX
    }

    /// Fixed 36-byte key form: txid followed by big-endian index.
    pub fn to_key(&self) -> [u8; 36] {
        let mut key = [0u8; 36];
        key[..32].copy_from_slice(&self.txid);
        key[32..].copy_from_slice(&self.n.to_be_bytes());
        key
    }

    /// Inverse of [`OutPoint::to_key`]; `None` unless exactly 36 bytes.
    pub fn from_key(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != 36 {
            return None;
        }
        let mut txid = [0u8; 32];
        txid.copy_from_slice(&bytes[..32]);
        let mut n = [0u8; 4];
        n.copy_from_slice(&bytes[32..]);
        Some(Self::new(txid, u32::from_be_bytes(n)))
    }
}

impl fmt::Debug for OutPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", short_hash(&self.txid), self.n)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxIn {
    pub prevout: OutPoint,
    pub script_sig: Script,
    pub sequence: u32,
}

impl TxIn {
    pub fn new(prevout: OutPoint) -> Self {
        Self {
            prevout,
            script_sig: Script::new(),
            sequence: SEQUENCE_FINAL,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOut {
    pub value: Amount,
    pub script_pubkey: Script,
}

impl TxOut {
    pub fn new(value: Amount, script_pubkey: Script) -> Self {
        Self {
            value,
            script_pubkey,
        }
    }

    /// The marker output of coinstakes and PoS coinbases.
    pub fn empty() -> Self {
        Self::new(0, Script::new())
    }

    pub fn is_empty(&self) -> bool {
        self.value == 0 && self.script_pubkey.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub version: i32,
    pub time: u32,
    pub inputs: Vec<TxIn>,
    pub outputs: Vec<TxOut>,
    pub lock_time: u32,
}

impl Transaction {
    pub fn txid(&self) -> Hash {
        sha256d(&self.encode())
    }

    pub fn is_coinbase(&self) -> bool {
        self.inputs.len() == 1 && self.inputs[0].prevout.is_null()
    }

    /// First input spends a real output and the first output is the empty
    /// marker.
    pub fn is_coinstake(&self) -> bool {
        !self.inputs.is_empty()
            && !self.inputs[0].prevout.is_null()
            && self.outputs.len() >= 2
            && self.outputs[0].is_empty()
    }

    /// Sum of output values, `None` on overflow.
    pub fn value_out(&self) -> Option<Amount> {
        self.outputs
            .iter()
            .try_fold(0i64, |acc, out| acc.checked_add(out.value))
    }

    pub fn is_final(&self, height: u32, block_time: u32) -> bool {
        if self.lock_time == 0 {
            return true;
        }
        let cutoff = if self.lock_time < LOCKTIME_THRESHOLD {
            height
        } else {
            block_time
        };
        if self.lock_time < cutoff {
            return true;
        }
        self.inputs.iter().all(|input| input.sequence == SEQUENCE_FINAL)
    }

    pub fn legacy_sigops(&self) -> u32 {
        let ins: u32 = self.inputs.iter().map(|i| i.script_sig.sigop_count()).sum();
        let outs: u32 = self
            .outputs
            .iter()
            .map(|o| o.script_pubkey.sigop_count())
            .sum();
        ins + outs
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BlockHeader {
    pub version: i32,
    pub prev_hash: Hash,
    pub merkle_root: Hash,
    pub time: u32,
    pub bits: u32,
    pub nonce: u32,
}

impl BlockHeader {
    pub fn hash(&self) -> Hash {
        sha256d(&self.encode())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub header: BlockHeader,
    pub transactions: Vec<Transaction>,
    /// Staker's signature over the block hash; empty for PoW blocks.
    pub signature: Vec<u8>,
}

impl Block {
    pub fn hash(&self) -> Hash {
        self.header.hash()
    }

    pub fn is_proof_of_stake(&self) -> bool {
        self.transactions.len() > 1 && self.transactions[1].is_coinstake()
    }

    /// Kernel prevout and coinstake time for PoS blocks.
    pub fn proof_of_stake(&self) -> Option<(OutPoint, u32)> {
        if !self.is_proof_of_stake() {
            return None;
        }
        let coinstake = &self.transactions[1];
        Some((coinstake.inputs[0].prevout, coinstake.time))
    }

    pub fn compute_merkle_root(&self) -> Hash {
        let txids: Vec<Hash> = self.transactions.iter().map(Transaction::txid).collect();
        merkle_root(&txids)
    }
}

/// Pairwise double-SHA256 tree; an odd node at any level is paired with
/// itself. An empty list yields the zero hash.
pub fn merkle_root(leaves: &[Hash]) -> Hash {
    if leaves.is_empty() {
        return [0u8; 32];
    }
    let mut level = leaves.to_vec();
    while level.len() > 1 {
        let mut next = Vec::with_capacity(level.len().div_ceil(2));
        for pair in level.chunks(2) {
            let right = pair.get(1).unwrap_or(&pair[0]);
            let mut buf = [0u8; 64];
            buf[..32].copy_from_slice(&pair[0]);
            buf[32..].copy_from_slice(right);
            next.push(sha256d(&buf));
        }
        level = next;
    }
    level[0]
}

// =============================================================================
// CONSENSUS ENCODING
// =============================================================================

impl Encodable for OutPoint {
    fn encode_to(&self, out: &mut Vec<u8>) {
        self.txid.encode_to(out);
        self.n.encode_to(out);
    }
}

impl Decodable for OutPoint {
    fn decode_from(reader: &mut Reader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            txid: reader.read_hash()?,
            n: reader.read_u32()?,
        })
    }
}

impl Encodable for TxIn {
    fn encode_to(&self, out: &mut Vec<u8>) {
        self.prevout.encode_to(out);
        self.script_sig.encode_to(out);
        self.sequence.encode_to(out);
    }
}

impl Decodable for TxIn {
    fn decode_from(reader: &mut Reader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            prevout: OutPoint::decode_from(reader)?,
            script_sig: Script::decode_from(reader)?,
            sequence: reader.read_u32()?,
        })
    }
}

impl Encodable for TxOut {
    fn encode_to(&self, out: &mut Vec<u8>) {
        self.value.encode_to(out);
        self.script_pubkey.encode_to(out);
    }
}

impl Decodable for TxOut {
    fn decode_from(reader: &mut Reader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            value: reader.read_i64()?,
            script_pubkey: Script::decode_from(reader)?,
        })
    }
}

impl Encodable for Transaction {
    fn encode_to(&self, out: &mut Vec<u8>) {
        self.version.encode_to(out);
        self.time.encode_to(out);
        write_vec(out, &self.inputs);
        write_vec(out, &self.outputs);
        self.lock_time.encode_to(out);
    }
}

impl Decodable for Transaction {
    fn decode_from(reader: &mut Reader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            version: reader.read_i32()?,
            time: reader.read_u32()?,
            inputs: reader.read_vec()?,
            outputs: reader.read_vec()?,
            lock_time: reader.read_u32()?,
        })
    }
}

impl Encodable for BlockHeader {
    fn encode_to(&self, out: &mut Vec<u8>) {
        self.version.encode_to(out);
        self.prev_hash.encode_to(out);
        self.merkle_root.encode_to(out);
        self.time.encode_to(out);
        self.bits.encode_to(out);
        self.nonce.encode_to(out);
    }
}

impl Decodable for BlockHeader {
    fn decode_from(reader: &mut Reader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            version: reader.read_i32()?,
            prev_hash: reader.read_hash()?,
            merkle_root: reader.read_hash()?,
            time: reader.read_u32()?,
            bits: reader.read_u32()?,
            nonce: reader.read_u32()?,
        })
    }
}

impl Encodable for Block {
    fn encode_to(&self, out: &mut Vec<u8>) {
        self.header.encode_to(out);
        write_vec(out, &self.transactions);
        write_var_bytes(out, &self.signature);
    }
}

impl Decodable for Block {
    fn decode_from(reader: &mut Reader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            header: BlockHeader::decode_from(reader)?,
            transactions: reader.read_vec()?,
            signature: reader.read_var_bytes()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_tx() -> Transaction {
        Transaction {
            version: 1,
            time: 1_700_000_000,
            inputs: vec![TxIn::new(OutPoint::new([1u8; 32], 3))],
            outputs: vec![TxOut::new(5 * COIN, Script::p2pkh(&[2u8; 20]))],
            lock_time: 0,
        }
    }

    #[test]
    fn test_transaction_decode_matches_encode() {
        let tx = sample_tx();
        let decoded = Transaction::decode(&tx.encode()).unwrap();
        assert_eq!(decoded, tx);
        assert_eq!(decoded.txid(), tx.txid());
    }

    #[test]
    fn test_txid_commits_to_time() {
        let tx = sample_tx();
        let mut later = tx.clone();
        later.time += 1;
        assert_ne!(tx.txid(), later.txid());
    }

    #[test]
    fn test_coinbase_and_coinstake_shapes() {
        let coinbase = Transaction {
            inputs: vec![TxIn::new(OutPoint::null())],
            ..sample_tx()
        };
        assert!(coinbase.is_coinbase());
        assert!(!coinbase.is_coinstake());

        let mut coinstake = sample_tx();
        coinstake.outputs.insert(0, TxOut::empty());
        assert!(coinstake.is_coinstake());
        assert!(!coinstake.is_coinbase());
    }

    #[test]
    fn test_finality_by_height_and_sequence() {
        let mut tx = sample_tx();
        tx.lock_time = 100;
        tx.inputs[0].sequence = 0;
        assert!(!tx.is_final(100, 0));
        assert!(tx.is_final(101, 0));

        tx.inputs[0].sequence = SEQUENCE_FINAL;
        assert!(tx.is_final(50, 0));
    }

    #[test]
    fn test_value_out_overflow() {
        let mut tx = sample_tx();
        tx.outputs.push(TxOut::new(i64::MAX, Script::new()));
        assert_eq!(tx.value_out(), None);
    }

    #[test]
    fn test_merkle_root_odd_leaf_duplicated() {
        let a = [1u8; 32];
        let b = [2u8; 32];
        let c = [3u8; 32];
        assert_eq!(merkle_root(&[a]), a);
        assert_eq!(merkle_root(&[a, b, c]), merkle_root(&[a, b, c, c]));
    }

    #[test]
    fn test_block_truncated_bytes_rejected() {
        let block = Block {
            header: BlockHeader::default(),
            transactions: vec![sample_tx()],
            signature: vec![],
        };
        let bytes = block.encode();
        assert!(Block::decode(&bytes[..bytes.len() - 1]).is_err());
        assert_eq!(Block::decode(&bytes).unwrap(), block);
    }
}
