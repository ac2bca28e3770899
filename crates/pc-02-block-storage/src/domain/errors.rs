//! # Domain Errors
//!
//! Storage failures are never the relaying peer's fault: every error here
//! is classified as fatal by the layers above.

use crate::domain::value_objects::BlockPos;
use shared_types::CodecError;
use std::fmt;

/// Key-value store errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KVStoreError {
    /// I/O error during read/write.
    IOError { message: String },
    /// Data corruption in the store.
    CorruptionError { message: String },
    /// A stored value failed to deserialize.
    Serialization { key: Vec<u8>, message: String },
}

impl fmt::Display for KVStoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KVStoreError::IOError { message } => write!(f, "KV store I/O error: {}", message),
            KVStoreError::CorruptionError { message } => {
                write!(f, "KV store corruption: {}", message)
            }
            KVStoreError::Serialization { key, message } => {
                write!(f, "KV value under key {:02x?} unreadable: {}", key, message)
            }
        }
    }
}

impl std::error::Error for KVStoreError {}

/// Block-file errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockFileError {
    /// I/O error.
    IOError { message: String },
    /// Record framing does not match the requested position.
    BadRecord { pos: BlockPos, reason: &'static str },
    /// Stored checksum differs from the payload's.
    ChecksumMismatch {
        pos: BlockPos,
        expected: u32,
        actual: u32,
    },
    /// Payload is not a valid block encoding.
    Decode { pos: BlockPos, error: CodecError },
    /// Transaction index past the end of the block.
    TxOutOfRange { pos: BlockPos, index: u32 },
}

impl fmt::Display for BlockFileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockFileError::IOError { message } => write!(f, "block file I/O error: {}", message),
            BlockFileError::BadRecord { pos, reason } => {
                write!(f, "bad block record at {}: {}", pos, reason)
            }
            BlockFileError::ChecksumMismatch {
                pos,
                expected,
                actual,
            } => write!(
                f,
                "block record at {} corrupted: checksum {:08x} != {:08x}",
                pos, actual, expected
            ),
            BlockFileError::Decode { pos, error } => {
                write!(f, "block record at {} undecodable: {}", pos, error)
            }
            BlockFileError::TxOutOfRange { pos, index } => {
                write!(f, "no transaction {} in block at {}", index, pos)
            }
        }
    }
}

impl std::error::Error for BlockFileError {}

impl From<std::io::Error> for BlockFileError {
    fn from(err: std::io::Error) -> Self {
        BlockFileError::IOError {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksum_error_display() {
        let err = BlockFileError::ChecksumMismatch {
            pos: BlockPos::new(0, 8, 100),
            expected: 0xdead_beef,
            actual: 1,
        };
        let msg = err.to_string();
        assert!(msg.contains("deadbeef"));
        assert!(msg.contains("blk00000"));
    }
}
