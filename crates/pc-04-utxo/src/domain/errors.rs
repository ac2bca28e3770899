//! Input resolution and connection failures.

use pc_02_block_storage::{BlockFileError, KVStoreError};
use pc_05_peg::PegError;
use shared_types::crypto::VerifyError;
use shared_types::{short_hash, Amount, DosScore, Hash, OutPoint};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UtxoError {
    #[error("previous transaction {} not found", short_hash(.0))]
    MissingInputs(Hash),

    #[error("prevout {0:?} is past the end of its transaction")]
    PrevoutOutOfRange(OutPoint),

    #[error("prevout {prevout:?} spent at depth {depth}, before maturity")]
    Immature { prevout: OutPoint, depth: u32 },

    #[error("prevout {0:?} is timestamped after its spender")]
    TimestampViolation(OutPoint),

    #[error("input values out of range")]
    ValueOutOfRange,

    #[error("prevout {0:?} already spent")]
    DoubleSpend(OutPoint),

    #[error("input {index} signature: {source}")]
    BadSignature {
        index: usize,
        #[source]
        source: VerifyError,
    },

    #[error("value in {value_in} below value out {value_out}")]
    InsufficientInputs { value_in: Amount, value_out: Amount },

    #[error("fee out of range")]
    FeeOutOfRange,

    #[error("fee {fee} below minimum {min}")]
    FeeTooLow { fee: Amount, min: Amount },

    #[error("no index for spent prevout {0:?}")]
    MissingPrevIndex(OutPoint),

    #[error(transparent)]
    Peg(#[from] PegError),

    #[error(transparent)]
    Store(#[from] KVStoreError),

    #[error(transparent)]
    BlockFile(#[from] BlockFileError),
}

impl DosScore for UtxoError {
    fn dos_score(&self) -> u32 {
        match self {
            UtxoError::PrevoutOutOfRange(_)
            | UtxoError::TimestampViolation(_)
            | UtxoError::ValueOutOfRange
            | UtxoError::BadSignature { .. }
            | UtxoError::InsufficientInputs { .. }
            | UtxoError::FeeOutOfRange
            | UtxoError::FeeTooLow { .. } => 100,
            UtxoError::Peg(err) => err.dos_score(),
            _ => 0,
        }
    }

    fn is_soft(&self) -> bool {
        match self {
            UtxoError::MissingInputs(_) | UtxoError::Immature { .. } | UtxoError::DoubleSpend(_) => {
                true
            }
            UtxoError::Peg(err) => err.is_soft(),
            _ => false,
        }
    }

    fn is_fatal(&self) -> bool {
        match self {
            UtxoError::MissingPrevIndex(_) | UtxoError::Store(_) | UtxoError::BlockFile(_) => true,
            UtxoError::Peg(err) => err.is_fatal(),
            _ => false,
        }
    }
}
