//! Adapters connecting the chain state to the host process.

pub mod network;
pub mod shutdown;
pub mod storage;

pub use network::{PeerScoreboard, DEFAULT_BAN_SCORE};
pub use shutdown::ShutdownSignal;
pub use storage::{DataDirLock, LockError};
#[cfg(feature = "rocksdb")]
pub use storage::{RocksDbConfig, RocksDbStore};
