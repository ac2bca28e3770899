//! # Block Storage (pc-02)
//!
//! Persistence collaborators of the chain-state engine: an ordered
//! key-value store with transactional overlays, and append-only block files.
//!
//! ## Architecture
//!
//! ```text
//!  UtxoEngine / PegAccountant / ChainSelector
//!                 │ reads + writes
//!                 ▼
//!          StoreTxn (overlay)  ── commit ──→ KeyValueStore::atomic_batch_write
//!                 │ misses                    (RocksDbStore / FileBackedKVStore /
//!                 ▼                            InMemoryKVStore)
//!          KeyValueStore::get / range_scan
//!
//!  ChainSelector ── write_block ──→ BlockStore ──→ BlockFileStore::append
//!  UtxoEngine    ── read_tx ─────→ BlockStore (LRU) ──→ BlockFileStore::read
//! ```
//!
//! ## Invariants
//!
//! | Invariant | Description |
//! |-----------|-------------|
//! | Atomic commit | A `StoreTxn` applies all of its writes in one batch, or none |
//! | Read-your-writes | Reads through a `StoreTxn` see its own pending writes |
//! | Ordered scans | `range_scan` yields keys in ascending byte order |
//! | Checked reads | Block-file records are framed with magic, length and CRC32 |
//!
//! ## Crate Structure (Hexagonal Architecture)
//!
//! - `domain/` - errors, positions, the transaction overlay
//! - `ports/` - `KeyValueStore` and `BlockFileStore` traits
//! - `adapters/` - in-memory, file-backed KV and flat-file block storage
//! - `service.rs` - `BlockStore`, the decoded-block reader and writer

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod service;

pub use adapters::file::FileBackedKVStore;
pub use adapters::flat_file::{FlatFileBlockStore, FlatFileConfig};
pub use adapters::memory::{InMemoryBlockFiles, InMemoryKVStore};
pub use domain::errors::{BlockFileError, KVStoreError};
pub use domain::txn::StoreTxn;
pub use domain::value_objects::BlockPos;
pub use ports::outbound::{BatchOperation, BlockFileStore, KeyValueStore, ScanResult};
pub use service::BlockStore;
