//! # Outbound Ports (Driven Ports)
//!
//! Interfaces the host application implements for the chain-state engine.

use crate::domain::errors::{BlockFileError, KVStoreError};
use crate::domain::txn::StoreTxn;
use crate::domain::value_objects::{prefix_end, BlockPos};

/// Key/value pairs returned by scans, in ascending key order.
pub type ScanResult = Vec<(Vec<u8>, Vec<u8>)>;

/// Ordered key-value database.
///
/// Production: `RocksDbStore` (node-runtime/adapters/storage/rocksdb_adapter.rs)
/// Testing: `InMemoryKVStore`
///
/// Implementations synchronize internally; every method takes `&self`.
pub trait KeyValueStore: Send + Sync {
    /// Get a value by key.
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, KVStoreError>;

    /// Put a single key-value pair.
    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), KVStoreError>;

    /// Delete a key.
    fn delete(&self, key: &[u8]) -> Result<(), KVStoreError>;

    /// Execute an atomic batch write.
    ///
    /// Either ALL operations in the batch are applied, or NONE are.
    fn atomic_batch_write(&self, operations: Vec<BatchOperation>) -> Result<(), KVStoreError>;

    /// Keys in `[start, end)` in ascending order; `end = None` is unbounded.
    fn range_scan(&self, start: &[u8], end: Option<&[u8]>) -> Result<ScanResult, KVStoreError>;

    /// Check if a key exists.
    fn exists(&self, key: &[u8]) -> Result<bool, KVStoreError> {
        Ok(self.get(key)?.is_some())
    }

    /// Iterate over keys with a prefix.
    fn prefix_scan(&self, prefix: &[u8]) -> Result<ScanResult, KVStoreError> {
        let end = prefix_end(prefix);
        self.range_scan(prefix, end.as_deref())
    }
}

impl dyn KeyValueStore + '_ {
    /// Open a transaction overlay on this store.
    pub fn begin(&self) -> StoreTxn<'_> {
        StoreTxn::new(self)
    }
}

/// Batch operation for atomic writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOperation {
    /// Put a key-value pair.
    Put { key: Vec<u8>, value: Vec<u8> },
    /// Delete a key.
    Delete { key: Vec<u8> },
}

impl BatchOperation {
    /// Create a Put operation.
    pub fn put(key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        BatchOperation::Put {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Create a Delete operation.
    pub fn delete(key: impl Into<Vec<u8>>) -> Self {
        BatchOperation::Delete { key: key.into() }
    }
}

/// Append-only block files.
///
/// Production: `FlatFileBlockStore`
/// Testing: `InMemoryBlockFiles`
pub trait BlockFileStore: Send + Sync {
    /// Append one record and return where it landed.
    fn append(&self, bytes: &[u8]) -> Result<BlockPos, BlockFileError>;

    /// Read back the record at `pos`.
    fn read(&self, pos: &BlockPos) -> Result<Vec<u8>, BlockFileError>;

    /// Force appended records to durable storage.
    fn flush(&self) -> Result<(), BlockFileError>;
}
