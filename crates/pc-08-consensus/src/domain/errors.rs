//! Error types for block acceptance and chain selection.

use super::kernel::KernelError;
use pc_01_chain_index::IndexError;
use pc_02_block_storage::{BlockFileError, KVStoreError};
use pc_03_validator::BlockCheckError;
use pc_04_utxo::UtxoError;
use pc_05_peg::PegError;
use pc_06_mempool::MempoolError;
use shared_types::{short_hash, Amount, CodecError, DosScore, Hash, OutPoint};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainError {
    #[error("block {} already indexed", short_hash(.0))]
    DuplicateBlock(Hash),

    #[error("orphan block {} already cached", short_hash(.0))]
    DuplicateOrphan(Hash),

    #[error("stake {prevout:?} at time {time} already used by another block")]
    DuplicateStake { prevout: OutPoint, time: u32 },

    #[error(transparent)]
    Check(#[from] BlockCheckError),

    #[error("parent {} failed validation", short_hash(.0))]
    InvalidParent(Hash),

    #[error("incorrect difficulty bits {actual:#010x}, expected {expected:#010x}")]
    BadDifficulty { expected: u32, actual: u32 },

    #[error("block time {time} not after median time past {median}")]
    TimeTooOld { time: u32, median: u32 },

    #[error("block time {time} too far in the future (limit {limit})")]
    TimeTooNew { time: u32, limit: u32 },

    #[error("proof-of-work block at height {0} after the last PoW height")]
    PowAfterLastHeight(u32),

    #[error("transaction {} is not final", short_hash(.0))]
    NonFinalTx(Hash),

    #[error("block does not match the checkpoint at height {0}")]
    CheckpointMismatch(u32),

    #[error(transparent)]
    Kernel(#[from] KernelError),

    #[error("coinbase pays {value}, allowed {max}")]
    BadCoinbaseValue { value: Amount, max: Amount },

    #[error("coinstake claims {claimed}, allowed {allowed}")]
    BadStakeReward { claimed: Amount, allowed: Amount },

    #[error("transaction {} would overwrite an unspent one", short_hash(.0))]
    DuplicateTx(Hash),

    #[error("transaction {}: {source}", short_hash(.txid))]
    Tx {
        txid: Hash,
        #[source]
        source: UtxoError,
    },

    #[error(transparent)]
    Utxo(#[from] UtxoError),

    #[error(transparent)]
    Peg(#[from] PegError),

    #[error(transparent)]
    Mempool(#[from] MempoolError),

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error(transparent)]
    Store(#[from] KVStoreError),

    #[error(transparent)]
    BlockFile(#[from] BlockFileError),

    #[error("stored genesis {} does not match the network", short_hash(.0))]
    GenesisMismatch(Hash),

    #[error("block {} missing from the index", short_hash(.0))]
    UnknownBlock(Hash),

    #[error("import stream: {0}")]
    Import(String),

    #[error(transparent)]
    Decode(#[from] CodecError),
}

impl ChainError {
    pub fn tx(txid: Hash) -> impl FnOnce(UtxoError) -> ChainError {
        move |source| ChainError::Tx { txid, source }
    }
}

impl DosScore for ChainError {
    fn dos_score(&self) -> u32 {
        match self {
            ChainError::Check(err) => err.dos_score(),
            ChainError::Kernel(err) => err.dos_score(),
            ChainError::Tx { source, .. } | ChainError::Utxo(source) => source.dos_score(),
            ChainError::Peg(err) => err.dos_score(),
            ChainError::Mempool(err) => err.dos_score(),
            ChainError::BadDifficulty { .. }
            | ChainError::PowAfterLastHeight(_)
            | ChainError::CheckpointMismatch(_)
            | ChainError::BadCoinbaseValue { .. }
            | ChainError::BadStakeReward { .. }
            | ChainError::DuplicateTx(_) => 100,
            ChainError::TimeTooNew { .. } => 50,
            ChainError::NonFinalTx(_) => 10,
            _ => 0,
        }
    }

    fn is_soft(&self) -> bool {
        match self {
            ChainError::DuplicateBlock(_) | ChainError::DuplicateOrphan(_) => true,
            ChainError::Tx { source, .. } | ChainError::Utxo(source) => source.is_soft(),
            ChainError::Peg(err) => err.is_soft(),
            ChainError::Mempool(err) => err.is_soft(),
            _ => false,
        }
    }

    fn is_fatal(&self) -> bool {
        match self {
            ChainError::Index(_)
            | ChainError::Store(_)
            | ChainError::BlockFile(_)
            | ChainError::GenesisMismatch(_)
            | ChainError::UnknownBlock(_)
            | ChainError::Import(_)
            | ChainError::Decode(_) => true,
            ChainError::Tx { source, .. } | ChainError::Utxo(source) => source.is_fatal(),
            ChainError::Peg(err) => err.is_fatal(),
            ChainError::Mempool(err) => err.is_fatal(),
            _ => false,
        }
    }
}

pub type ChainResult<T> = Result<T, ChainError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scores_delegate_to_source() {
        let err = ChainError::Tx {
            txid: [1u8; 32],
            source: UtxoError::ValueOutOfRange,
        };
        assert_eq!(err.dos_score(), 100);
        assert!(!err.is_soft());

        let err = ChainError::Tx {
            txid: [1u8; 32],
            source: UtxoError::MissingInputs([2u8; 32]),
        };
        assert_eq!(err.dos_score(), 0);
        assert!(err.is_soft());
    }

    #[test]
    fn test_local_failures_are_fatal() {
        let err: ChainError = KVStoreError::IOError {
            message: "disk".into(),
        }
        .into();
        assert!(err.is_fatal());
        assert_eq!(err.dos_score(), 0);
        assert!(ChainError::DuplicateBlock([0u8; 32]).is_soft());
        assert_eq!(ChainError::CheckpointMismatch(5).dos_score(), 100);
    }
}
