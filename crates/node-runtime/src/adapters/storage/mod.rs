//! # Storage Adapters
//!
//! Enable the `rocksdb` feature to use the RocksDB backend:
//!
//! ```toml
//! node-runtime = { path = "...", features = ["rocksdb"] }
//! ```
//!
//! Without it the node runs on `FileBackedKVStore` or, for tests, the
//! in-memory store from `pc-02-block-storage`.

pub mod lock;
#[cfg(feature = "rocksdb")]
pub mod rocksdb_adapter;

pub use lock::{DataDirLock, LockError};
#[cfg(feature = "rocksdb")]
pub use rocksdb_adapter::{RocksDbConfig, RocksDbStore};
