//! Peg accounting failures.
//!
//! Each variant maps to a short machine-readable cause for logs and
//! rejection messages.

use pc_02_block_storage::KVStoreError;
use shared_types::{short_hash, Address, Amount, DosScore, Hash, OutPoint};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PegError {
    #[error("no stored fractions for input {0:?}")]
    MissingFractions(OutPoint),

    #[error("fractions of input {0:?} do not sum to its value")]
    InputMismatch(OutPoint),

    #[error("liquidity exhausted at output {output}")]
    NoLiquidity { output: usize },

    #[error("fractions of output {output} do not sum to its value")]
    TotalMismatch { output: usize },

    #[error("output {output} has a negative bucket")]
    NegativeBucket { output: usize },

    #[error("fee fractions total {actual}, expected {expected}")]
    FeeMismatch { expected: Amount, actual: Amount },

    #[error("input {0:?} is frozen")]
    Frozen(OutPoint),

    #[error("ledger head of {} does not belong to {}", hex::encode(.address), short_hash(.txid))]
    LedgerInconsistent { address: Address, txid: Hash },

    #[error("peg store: {0}")]
    Store(#[from] KVStoreError),
}

impl PegError {
    pub fn cause(&self) -> &'static str {
        match self {
            PegError::MissingFractions(_) => "missing-fractions",
            PegError::InputMismatch(_) | PegError::TotalMismatch { .. } => "total-mismatch",
            PegError::NoLiquidity { .. } => "no-liquidity",
            PegError::NegativeBucket { .. } => "negative-bucket",
            PegError::FeeMismatch { .. } => "fee-mismatch",
            PegError::Frozen(_) => "frozen",
            PegError::LedgerInconsistent { .. } => "ledger-inconsistent",
            PegError::Store(_) => "store",
        }
    }
}

impl DosScore for PegError {
    fn dos_score(&self) -> u32 {
        match self {
            PegError::NoLiquidity { .. }
            | PegError::TotalMismatch { .. }
            | PegError::NegativeBucket { .. }
            | PegError::FeeMismatch { .. } => 100,
            _ => 0,
        }
    }

    fn is_soft(&self) -> bool {
        matches!(self, PegError::Frozen(_))
    }

    fn is_fatal(&self) -> bool {
        matches!(
            self,
            PegError::MissingFractions(_)
                | PegError::InputMismatch(_)
                | PegError::LedgerInconsistent { .. }
                | PegError::Store(_)
        )
    }
}
