use crate::domain::errors::{BlockFileError, KVStoreError};
use crate::domain::value_objects::BlockPos;
use crate::ports::outbound::{BatchOperation, BlockFileStore, KeyValueStore, ScanResult};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::ops::Bound;

/// In-memory key-value store for unit tests.
///
/// Ordered by key so range scans match the production backends.
#[derive(Default)]
pub struct InMemoryKVStore {
    data: RwLock<BTreeMap<Vec<u8>, Vec<u8>>>,
}

impl InMemoryKVStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }

    /// Copy of the full contents, for byte-level state comparisons.
    pub fn snapshot(&self) -> BTreeMap<Vec<u8>, Vec<u8>> {
        self.data.read().clone()
    }
}

impl KeyValueStore for InMemoryKVStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, KVStoreError> {
        Ok(self.data.read().get(key).cloned())
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), KVStoreError> {
        self.data.write().insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn delete(&self, key: &[u8]) -> Result<(), KVStoreError> {
        self.data.write().remove(key);
        Ok(())
    }

    fn atomic_batch_write(&self, operations: Vec<BatchOperation>) -> Result<(), KVStoreError> {
        // One write lock for the whole batch
        let mut data = self.data.write();
        for op in operations {
            match op {
                BatchOperation::Put { key, value } => {
                    data.insert(key, value);
                }
                BatchOperation::Delete { key } => {
                    data.remove(&key);
                }
            }
        }
        Ok(())
    }

    fn range_scan(&self, start: &[u8], end: Option<&[u8]>) -> Result<ScanResult, KVStoreError> {
        if end.is_some_and(|end| end <= start) {
            return Ok(Vec::new());
        }
        let upper = match end {
            Some(end) => Bound::Excluded(end.to_vec()),
            None => Bound::Unbounded,
        };
        let data = self.data.read();
        Ok(data
            .range((Bound::Included(start.to_vec()), upper))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }
}

/// In-memory block files for unit tests. Every record lands in file 0.
#[derive(Default)]
pub struct InMemoryBlockFiles {
    records: RwLock<Vec<u8>>,
}

impl InMemoryBlockFiles {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BlockFileStore for InMemoryBlockFiles {
    fn append(&self, bytes: &[u8]) -> Result<BlockPos, BlockFileError> {
        let mut records = self.records.write();
        let pos = BlockPos::new(0, records.len() as u32, bytes.len() as u32);
        records.extend_from_slice(bytes);
        Ok(pos)
    }

    fn read(&self, pos: &BlockPos) -> Result<Vec<u8>, BlockFileError> {
        let records = self.records.read();
        let start = pos.offset as usize;
        let end = start + pos.len as usize;
        if pos.file != 0 || end > records.len() {
            return Err(BlockFileError::BadRecord {
                pos: *pos,
                reason: "past end of file",
            });
        }
        Ok(records[start..end].to_vec())
    }

    fn flush(&self) -> Result<(), BlockFileError> {
        Ok(())
    }
}
