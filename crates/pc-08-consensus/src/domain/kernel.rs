//! # Stake Kernel
//!
//! A PoS block proves its right to be produced by hashing a kernel made of
//! the previous block's stake modifier and its stake input:
//!
//! ```text
//! kernel = sha256d(modifier || prev_tx.time || prevout || coinstake.time)
//! valid  ⇔ kernel <= target(bits) * stake_value
//! ```
//!
//! Every block then derives its own modifier from the kernel (PoS) or its
//! hash (PoW): `modifier = sha256d(kernel || prev_modifier)`.
//!
//! Kernel failures score 1: during initial download the stake input may
//! simply live on a chain we have not switched to yet.

use primitive_types::U256;
use shared_types::crypto::sha256d;
use shared_types::target::{decode_compact, hash_to_u256};
use shared_types::{Address, Amount, ChainParams, DosScore, Hash, OutPoint};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KernelError {
    #[error("stake input {0:?} not found in the main chain")]
    MissingStakeInput(OutPoint),

    #[error("coinstake time {coinstake} before stake input time {input}")]
    TimeViolation { input: u32, coinstake: u32 },

    #[error("stake input younger than the minimum age ({age}s < {min}s)")]
    MinAge { age: u32, min: u32 },

    #[error("invalid target bits {0:#010x}")]
    BadTarget(u32),

    #[error("kernel hash above the weighted target")]
    TargetNotMet,
}

impl DosScore for KernelError {
    fn dos_score(&self) -> u32 {
        1
    }
}

/// The staked output and the transaction that created it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StakeInput {
    pub prevout: OutPoint,
    pub value: Amount,
    /// Time of the transaction holding the staked output.
    pub tx_time: u32,
    /// Address the staked output pays to.
    pub owner: Option<Address>,
}

pub fn stake_kernel_hash(modifier: &Hash, input: &StakeInput, time: u32) -> Hash {
    let mut buf = Vec::with_capacity(32 + 4 + 36 + 4);
    buf.extend_from_slice(modifier);
    buf.extend_from_slice(&input.tx_time.to_le_bytes());
    buf.extend_from_slice(&input.prevout.to_key());
    buf.extend_from_slice(&time.to_le_bytes());
    sha256d(&buf)
}

/// Checks the kernel of a coinstake at `time` against `bits`, returning the
/// kernel hash.
pub fn check_stake_kernel(
    modifier: &Hash,
    bits: u32,
    input: &StakeInput,
    time: u32,
    params: &ChainParams,
) -> Result<Hash, KernelError> {
    if time < input.tx_time {
        return Err(KernelError::TimeViolation {
            input: input.tx_time,
            coinstake: time,
        });
    }
    let age = time - input.tx_time;
    if age < params.stake_min_age {
        return Err(KernelError::MinAge {
            age,
            min: params.stake_min_age,
        });
    }

    let target = decode_compact(bits).ok_or(KernelError::BadTarget(bits))?;
    let weight = U256::from(input.value.max(0) as u64);
    let weighted = target.checked_mul(weight).unwrap_or(U256::MAX);

    let kernel = stake_kernel_hash(modifier, input, time);
    if hash_to_u256(&kernel) > weighted {
        return Err(KernelError::TargetNotMet);
    }
    Ok(kernel)
}

/// Modifier of a new block. `proof` is the kernel hash of a PoS block or
/// the hash of a PoW block.
pub fn compute_stake_modifier(prev_modifier: &Hash, proof: &Hash) -> Hash {
    let mut buf = [0u8; 64];
    buf[..32].copy_from_slice(proof);
    buf[32..].copy_from_slice(prev_modifier);
    sha256d(&buf)
}

/// Entropy bit contributed by a block: the low bit of its hash.
pub fn stake_entropy_bit(hash: &Hash) -> bool {
    hash[0] & 1 == 1
}
