//! # Node Container
//!
//! Opens the stores named by [`NodeConfig`] and builds the shared chain
//! state on top of them.
//!
//! ```text
//! data_dir/
//! ├── .lock            DataDirLock (fs2)
//! ├── blocks/          blkNNNNN.dat flat files
//! ├── chainstate.db    FileBackedKVStore   (storage = file)
//! └── chainstate/      RocksDbStore        (storage = rocksdb)
//! ```

use crate::adapters::{DataDirLock, LockError, PeerScoreboard};
use crate::container::config::{ConfigError, NodeConfig, StorageBackend};
use pc_02_block_storage::{
    BlockFileError, BlockFileStore, FileBackedKVStore, FlatFileBlockStore, FlatFileConfig,
    InMemoryBlockFiles, InMemoryKVStore, KVStoreError, KeyValueStore,
};
use pc_08_consensus::{ChainError, ChainState, ImportSummary, SharedChainState};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NodeError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Lock(#[from] LockError),

    #[error(transparent)]
    Store(#[from] KVStoreError),

    #[error(transparent)]
    BlockFiles(#[from] BlockFileError),

    #[error(transparent)]
    Chain(#[from] ChainError),

    #[error("cannot read import file {path}: {source}")]
    ImportFile {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

pub struct NodeContainer {
    pub config: NodeConfig,
    pub chain: SharedChainState,
    pub scoreboard: Arc<PeerScoreboard>,
    _lock: Option<DataDirLock>,
}

impl NodeContainer {
    pub fn open(config: NodeConfig) -> Result<Self, NodeError> {
        config.validate()?;
        let params = config.chain_params();
        let lock = match config.storage {
            StorageBackend::Memory => None,
            _ => Some(DataDirLock::acquire(&config.data_dir)?),
        };

        let (store, files) = open_stores(&config, params.magic)?;
        let scoreboard = Arc::new(PeerScoreboard::default());
        let chain = ChainState::open(params, config.chain.clone(), store, files)?
            .with_notifier(scoreboard.clone())
            .into_shared();

        tracing::info!(
            "[node] Chain state ready: network={} storage={:?} data_dir={}",
            config.network,
            config.storage,
            config.data_dir.display()
        );
        Ok(Self {
            config,
            chain,
            scoreboard,
            _lock: lock,
        })
    }

    /// Imports a framed block stream from `path`, stopping when `interrupt`
    /// is set.
    pub fn import_file(&self, path: &Path, interrupt: &AtomicBool) -> Result<ImportSummary, NodeError> {
        let file = File::open(path).map_err(|source| NodeError::ImportFile {
            path: path.display().to_string(),
            source,
        })?;
        tracing::info!("[node] 📥 Importing blocks from {}", path.display());
        let mut chain = self.chain.lock();
        let summary = chain.import_stream(BufReader::new(file), interrupt)?;
        chain.flush()?;
        Ok(summary)
    }

    pub fn shutdown(&self) -> Result<(), NodeError> {
        let chain = self.chain.lock();
        chain.flush()?;
        tracing::info!(
            "[node] Shutdown at height {} ({} pooled transactions)",
            chain.best_height(),
            chain.mempool().len()
        );
        Ok(())
    }
}

fn open_stores(
    config: &NodeConfig,
    magic: [u8; 4],
) -> Result<(Arc<dyn KeyValueStore>, Arc<dyn BlockFileStore>), NodeError> {
    if config.storage == StorageBackend::Memory {
        return Ok((Arc::new(InMemoryKVStore::new()), Arc::new(InMemoryBlockFiles::new())));
    }
    let files: Arc<dyn BlockFileStore> = Arc::new(FlatFileBlockStore::open(FlatFileConfig::new(
        config.data_dir.join("blocks"),
        magic,
    ))?);
    let store: Arc<dyn KeyValueStore> = match config.storage {
        #[cfg(feature = "rocksdb")]
        StorageBackend::RocksDb => {
            use crate::adapters::{RocksDbConfig, RocksDbStore};
            Arc::new(RocksDbStore::open(RocksDbConfig {
                path: config.data_dir.join("chainstate"),
                ..Default::default()
            })?)
        }
        #[cfg(not(feature = "rocksdb"))]
        StorageBackend::RocksDb => return Err(ConfigError::RocksDbUnavailable.into()),
        StorageBackend::File | StorageBackend::Memory => {
            Arc::new(FileBackedKVStore::open(config.data_dir.join("chainstate.db"))?)
        }
    };
    Ok((store, files))
}
