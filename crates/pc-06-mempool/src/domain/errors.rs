//! Mempool error types.

use pc_03_validator::{NonStandard, TxCheckError};
use pc_04_utxo::UtxoError;
use shared_types::{short_hash, Amount, DosScore, Hash, OutPoint};
use thiserror::Error;

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum MempoolError {
    #[error(transparent)]
    Check(#[from] TxCheckError),

    #[error("coinbase is only valid in a block")]
    Coinbase,

    #[error("coinstake is only valid in a block")]
    Coinstake,

    #[error(transparent)]
    NonStandard(#[from] NonStandard),

    #[error("transaction {} already in the pool", short_hash(.0))]
    AlreadyInPool(Hash),

    #[error("transaction {} already in the chain", short_hash(.0))]
    AlreadyInChain(Hash),

    /// Another pooled transaction spends the same output. No replacement.
    #[error("prevout {prevout:?} already spent by pooled {}", short_hash(.spender))]
    Conflict { prevout: OutPoint, spender: Hash },

    #[error("parent {} unknown", short_hash(.0))]
    MissingInputs(Hash),

    #[error("fee {fee} below minimum {min}")]
    FeeTooLow { fee: Amount, min: Amount },

    #[error("free transaction rejected by the rate limiter")]
    RateLimited,

    #[error(transparent)]
    Utxo(UtxoError),
}

impl From<UtxoError> for MempoolError {
    fn from(err: UtxoError) -> Self {
        match err {
            UtxoError::MissingInputs(parent) => MempoolError::MissingInputs(parent),
            other => MempoolError::Utxo(other),
        }
    }
}

impl DosScore for MempoolError {
    fn dos_score(&self) -> u32 {
        match self {
            MempoolError::Check(err) => err.dos_score(),
            MempoolError::Coinbase | MempoolError::Coinstake => 100,
            MempoolError::Utxo(err) => err.dos_score(),
            _ => 0,
        }
    }

    fn is_soft(&self) -> bool {
        match self {
            MempoolError::NonStandard(_)
            | MempoolError::AlreadyInPool(_)
            | MempoolError::AlreadyInChain(_)
            | MempoolError::Conflict { .. }
            | MempoolError::MissingInputs(_) => true,
            MempoolError::Utxo(err) => err.is_soft(),
            _ => false,
        }
    }

    fn is_fatal(&self) -> bool {
        matches!(self, MempoolError::Utxo(err) if err.is_fatal())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_inputs_maps_to_orphan_candidate() {
        let err: MempoolError = UtxoError::MissingInputs([4u8; 32]).into();
        assert_eq!(err, MempoolError::MissingInputs([4u8; 32]));
        assert!(err.is_soft());
        let err: MempoolError = UtxoError::ValueOutOfRange.into();
        assert_eq!(err.dos_score(), 100);
        assert!(MempoolError::Conflict {
            prevout: OutPoint::new([1u8; 32], 0),
            spender: [2u8; 32],
        }
        .is_soft());
    }
}
