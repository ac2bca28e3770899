//! # Transaction Overlay
//!
//! `StoreTxn` buffers writes in an ordered overlay above a
//! [`KeyValueStore`]. Reads consult the overlay first, so a block connect
//! sees its own pending writes. Nothing reaches the store until `commit`,
//! which hands the whole overlay to `atomic_batch_write`.
//!
//! ```text
//!   begin ──→ get/put/delete/range_scan ... ──→ commit  (one atomic batch)
//!                                          └──→ abort   (drop the overlay)
//! ```
//!
//! The overlay uses interior mutability so several typed views (the
//! transaction index, the peg store) can share one `&StoreTxn`.

use crate::domain::errors::KVStoreError;
use crate::domain::value_objects::prefix_end;
use crate::ports::outbound::{BatchOperation, KeyValueStore, ScanResult};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::ops::Bound;

pub struct StoreTxn<'s> {
    store: &'s dyn KeyValueStore,
    /// `None` marks a pending delete.
    overlay: RefCell<BTreeMap<Vec<u8>, Option<Vec<u8>>>>,
}

impl<'s> StoreTxn<'s> {
    pub fn new(store: &'s dyn KeyValueStore) -> Self {
        Self {
            store,
            overlay: RefCell::new(BTreeMap::new()),
        }
    }

    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, KVStoreError> {
        if let Some(pending) = self.overlay.borrow().get(key) {
            return Ok(pending.clone());
        }
        self.store.get(key)
    }

    pub fn exists(&self, key: &[u8]) -> Result<bool, KVStoreError> {
        Ok(self.get(key)?.is_some())
    }

    pub fn put(&self, key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) {
        self.overlay
            .borrow_mut()
            .insert(key.into(), Some(value.into()));
    }

    pub fn delete(&self, key: impl Into<Vec<u8>>) {
        self.overlay.borrow_mut().insert(key.into(), None);
    }

    /// Merged view of the store and the overlay over `[start, end)`.
    pub fn range_scan(&self, start: &[u8], end: Option<&[u8]>) -> Result<ScanResult, KVStoreError> {
        if end.is_some_and(|end| end <= start) {
            return Ok(Vec::new());
        }
        let mut merged: BTreeMap<Vec<u8>, Vec<u8>> =
            self.store.range_scan(start, end)?.into_iter().collect();

        let upper = match end {
            Some(end) => Bound::Excluded(end.to_vec()),
            None => Bound::Unbounded,
        };
        let overlay = self.overlay.borrow();
        for (key, pending) in overlay.range((Bound::Included(start.to_vec()), upper)) {
            match pending {
                Some(value) => {
                    merged.insert(key.clone(), value.clone());
                }
                None => {
                    merged.remove(key);
                }
            }
        }
        Ok(merged.into_iter().collect())
    }

    pub fn prefix_scan(&self, prefix: &[u8]) -> Result<ScanResult, KVStoreError> {
        let end = prefix_end(prefix);
        self.range_scan(prefix, end.as_deref())
    }

    pub fn get_typed<T: DeserializeOwned>(&self, key: &[u8]) -> Result<Option<T>, KVStoreError> {
        match self.get(key)? {
            Some(bytes) => bincode::deserialize(&bytes).map(Some).map_err(|e| {
                KVStoreError::Serialization {
                    key: key.to_vec(),
                    message: e.to_string(),
                }
            }),
            None => Ok(None),
        }
    }

    pub fn put_typed<T: Serialize>(&self, key: impl Into<Vec<u8>>, value: &T) -> Result<(), KVStoreError> {
        let key = key.into();
        let bytes = bincode::serialize(value).map_err(|e| KVStoreError::Serialization {
            key: key.clone(),
            message: e.to_string(),
        })?;
        self.put(key, bytes);
        Ok(())
    }

    /// Number of buffered writes and deletes.
    pub fn pending_len(&self) -> usize {
        self.overlay.borrow().len()
    }

    /// Apply every buffered write in one atomic batch.
    pub fn commit(self) -> Result<(), KVStoreError> {
        let overlay = self.overlay.into_inner();
        if overlay.is_empty() {
            return Ok(());
        }
        let operations = overlay
            .into_iter()
            .map(|(key, pending)| match pending {
                Some(value) => BatchOperation::put(key, value),
                None => BatchOperation::delete(key),
            })
            .collect();
        self.store.atomic_batch_write(operations)
    }

    /// Discard every buffered write.
    pub fn abort(self) {
        drop(self);
    }
}
