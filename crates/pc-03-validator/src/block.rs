//! Context-free block checks.
//!
//! Everything here is decidable from the block bytes alone. Rules that need
//! the parent (difficulty, median time, stake kernel) live in consensus.

use crate::errors::BlockCheckError;
use crate::transaction::check_transaction;
use shared_types::crypto::verify_signature;
use shared_types::target::{decode_compact, hash_to_u256};
use shared_types::{
    address_from_pubkey, Address, Block, ChainParams, Encodable, Hash, KeyPair, ScriptKind,
    SignError,
};
use std::collections::HashSet;

/// Optional parts of [`check_block`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckFlags {
    pub check_pow: bool,
    pub check_merkle: bool,
    pub check_signature: bool,
}

impl Default for CheckFlags {
    fn default() -> Self {
        Self {
            check_pow: true,
            check_merkle: true,
            check_signature: true,
        }
    }
}

/// `hash` meets the compact target `bits`, which must be within the PoW limit.
pub fn check_proof_of_work(hash: &Hash, bits: u32, params: &ChainParams) -> Result<(), BlockCheckError> {
    let target = match decode_compact(bits) {
        Some(t) if !t.is_zero() && t <= params.pow_limit => t,
        _ => return Err(BlockCheckError::BadTarget(bits)),
    };
    if hash_to_u256(hash) > target {
        return Err(BlockCheckError::ProofOfWorkFailed(*hash));
    }
    Ok(())
}

pub fn check_block(block: &Block, params: &ChainParams, flags: CheckFlags) -> Result<(), BlockCheckError> {
    let txs = &block.transactions;
    if txs.is_empty() {
        return Err(BlockCheckError::Empty);
    }
    let size = block.encoded_len();
    if size > params.max_block_size {
        return Err(BlockCheckError::Oversize {
            size,
            max: params.max_block_size,
        });
    }

    let proof_of_stake = block.is_proof_of_stake();
    if !proof_of_stake && flags.check_pow {
        check_proof_of_work(&block.hash(), block.header.bits, params)?;
    }

    let coinbase = &txs[0];
    if !coinbase.is_coinbase() {
        return Err(BlockCheckError::FirstNotCoinbase);
    }
    if let Some(index) = txs.iter().skip(1).position(|tx| tx.is_coinbase()) {
        return Err(BlockCheckError::ExtraCoinbase(index + 1));
    }
    if u64::from(block.header.time) > u64::from(coinbase.time) + u64::from(params.max_future_drift) {
        return Err(BlockCheckError::CoinbaseTimeTooEarly {
            coinbase: coinbase.time,
            block: block.header.time,
        });
    }

    let first_plain = if proof_of_stake {
        if coinbase.outputs.len() != 1 || !coinbase.outputs[0].is_empty() {
            return Err(BlockCheckError::StakeCoinbaseOutputs);
        }
        if txs[1].time != block.header.time {
            return Err(BlockCheckError::CoinstakeTime {
                coinstake: txs[1].time,
                block: block.header.time,
            });
        }
        2
    } else {
        1
    };
    if let Some(index) = txs.iter().skip(first_plain).position(|tx| tx.is_coinstake()) {
        return Err(BlockCheckError::MisplacedCoinstake(index + first_plain));
    }

    for (index, tx) in txs.iter().enumerate() {
        check_transaction(tx, params).map_err(|source| BlockCheckError::Transaction { index, source })?;
        if tx.time > block.header.time {
            return Err(BlockCheckError::TxTimeAfterBlock {
                index,
                tx_time: tx.time,
                block_time: block.header.time,
            });
        }
    }

    let txids: Vec<Hash> = txs.iter().map(|tx| tx.txid()).collect();
    let mut unique = HashSet::with_capacity(txids.len());
    for txid in &txids {
        if !unique.insert(*txid) {
            return Err(BlockCheckError::DuplicateTransaction(*txid));
        }
    }

    let sigops: u32 = txs.iter().map(|tx| tx.legacy_sigops()).sum();
    if sigops > params.max_block_sigops {
        return Err(BlockCheckError::TooManySigops {
            count: sigops,
            max: params.max_block_sigops,
        });
    }

    if flags.check_signature && !verify_block_signature(block) {
        return Err(BlockCheckError::BadSignature);
    }

    if flags.check_merkle && block.header.merkle_root != shared_types::merkle_root(&txids) {
        return Err(BlockCheckError::MerkleMismatch);
    }
    Ok(())
}

/// Public key the block must be signed with.
///
/// PoS: the key locking the coinstake's stake output (taken from the stake
/// input's unlock script for pay-to-pubkey-hash). PoW: the coinbase's
/// pay-to-pubkey key, if any.
pub fn block_signing_key(block: &Block) -> Option<Vec<u8>> {
    if block.is_proof_of_stake() {
        let coinstake = &block.transactions[1];
        match coinstake.outputs[1].script_pubkey.classify() {
            ScriptKind::PubKey(key) => Some(key),
            ScriptKind::PubKeyHash(address) => {
                let pushes = coinstake.inputs[0].script_sig.pushes()?;
                let key = pushes.get(1)?;
                (address_from_pubkey(key) == address).then(|| key.to_vec())
            }
            _ => None,
        }
    } else {
        let out = block.transactions.first()?.outputs.first()?;
        match out.script_pubkey.classify() {
            ScriptKind::PubKey(key) => Some(key),
            _ => None,
        }
    }
}

/// PoW blocks may be unsigned; PoS blocks never.
pub fn verify_block_signature(block: &Block) -> bool {
    if !block.is_proof_of_stake() && block.signature.is_empty() {
        return true;
    }
    match block_signing_key(block) {
        Some(key) => verify_signature(&key, &block.hash(), &block.signature),
        None => false,
    }
}

pub fn sign_block(block: &mut Block, key: &KeyPair) -> Result<(), SignError> {
    block.signature = key.sign_hash(&block.hash())?;
    Ok(())
}

/// Address of the staker that produced a PoS block.
pub fn block_staker(block: &Block) -> Option<Address> {
    if !block.is_proof_of_stake() {
        return None;
    }
    block_signing_key(block).map(|key| address_from_pubkey(&key))
}
