//! Structural rejection reasons.

use shared_types::{short_hash, DosScore, Hash, OutPoint};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TxCheckError {
    #[error("transaction has no inputs")]
    NoInputs,

    #[error("transaction has no outputs")]
    NoOutputs,

    #[error("transaction size {size} exceeds {max}")]
    Oversize { size: usize, max: usize },

    #[error("output {index} has a negative value")]
    NegativeOutput { index: usize },

    #[error("output {index} exceeds the money supply")]
    OutputTooLarge { index: usize },

    #[error("output total out of range")]
    OutputTotalOutOfRange,

    #[error("empty output {index} in a user transaction")]
    EmptyUserOutput { index: usize },

    #[error("input {0:?} spent twice")]
    DuplicateInput(OutPoint),

    #[error("coinbase script length {0} outside [2, 100]")]
    CoinbaseScriptSize(usize),

    #[error("input {index} has a null prevout")]
    NullPrevout { index: usize },
}

impl DosScore for TxCheckError {
    fn dos_score(&self) -> u32 {
        match self {
            TxCheckError::NoInputs | TxCheckError::NoOutputs | TxCheckError::NullPrevout { .. } => 10,
            _ => 100,
        }
    }
}

/// Standardness failure. Policy only; never scored.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("non-standard transaction: {0}")]
pub struct NonStandard(pub &'static str);

impl NonStandard {
    pub fn reason(&self) -> &'static str {
        self.0
    }
}

impl DosScore for NonStandard {
    fn dos_score(&self) -> u32 {
        0
    }

    fn is_soft(&self) -> bool {
        true
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BlockCheckError {
    #[error("block has no transactions")]
    Empty,

    #[error("block size {size} exceeds {max}")]
    Oversize { size: usize, max: usize },

    #[error("invalid target bits {0:#010x}")]
    BadTarget(u32),

    #[error("proof of work failed for {}", short_hash(.0))]
    ProofOfWorkFailed(Hash),

    #[error("first transaction is not a coinbase")]
    FirstNotCoinbase,

    #[error("transaction {0} is an extra coinbase")]
    ExtraCoinbase(usize),

    #[error("coinbase of a proof-of-stake block must have one empty output")]
    StakeCoinbaseOutputs,

    #[error("transaction {0} is a misplaced coinstake")]
    MisplacedCoinstake(usize),

    #[error("coinstake time {coinstake} differs from block time {block}")]
    CoinstakeTime { coinstake: u32, block: u32 },

    #[error("block time {block} too far past coinbase time {coinbase}")]
    CoinbaseTimeTooEarly { coinbase: u32, block: u32 },

    #[error("transaction {index} failed: {source}")]
    Transaction {
        index: usize,
        #[source]
        source: TxCheckError,
    },

    #[error("transaction {index} time {tx_time} is after block time {block_time}")]
    TxTimeAfterBlock {
        index: usize,
        tx_time: u32,
        block_time: u32,
    },

    #[error("duplicate transaction {}", short_hash(.0))]
    DuplicateTransaction(Hash),

    #[error("{count} signature operations exceed {max}")]
    TooManySigops { count: u32, max: u32 },

    #[error("merkle root mismatch")]
    MerkleMismatch,

    #[error("bad block signature")]
    BadSignature,
}

impl DosScore for BlockCheckError {
    fn dos_score(&self) -> u32 {
        match self {
            BlockCheckError::BadTarget(_)
            | BlockCheckError::ProofOfWorkFailed(_)
            | BlockCheckError::CoinstakeTime { .. }
            | BlockCheckError::CoinbaseTimeTooEarly { .. }
            | BlockCheckError::TxTimeAfterBlock { .. } => 50,
            BlockCheckError::Transaction { source, .. } => source.dos_score(),
            _ => 100,
        }
    }
}
