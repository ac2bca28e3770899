//! # Node Configuration
//!
//! Defaults suit a local regtest node. Every field can be overridden from
//! the environment:
//!
//! | Variable | Field | Format |
//! |----------|-------|--------|
//! | `PEG_NETWORK` | `network` | `main`, `test`, `regtest` |
//! | `PEG_DATA_DIR` | `data_dir` | path |
//! | `PEG_STORAGE` | `storage` | `memory`, `file`, `rocksdb` |
//! | `PEG_TRUSTED_STAKERS` | `trusted_stakers` | comma-separated hex addresses |
//! | `PEG_MAX_ORPHAN_TXS` | `chain.mempool.max_orphan_txs` | integer |
//! | `PEG_MAX_ORPHAN_BLOCKS` | `chain.max_orphan_blocks` | integer |
//! | `PEG_IMPORT` | `import` | path of a framed block stream |
//! | `RUST_LOG` | `log_filter` | tracing env-filter directive |

use pc_08_consensus::ChainConfig;
use shared_types::{Address, ChainParams, Network};
use std::path::PathBuf;
use thiserror::Error;

/// Key-value backend for the chain state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    /// Nothing survives a restart.
    Memory,
    /// `FileBackedKVStore` under the data directory.
    File,
    /// Requires the `rocksdb` feature.
    RocksDb,
}

/// Complete node configuration.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    pub network: Network,
    /// Holds the lock file, block files and the key-value store.
    pub data_dir: PathBuf,
    pub storage: StorageBackend,
    pub chain: ChainConfig,
    /// Added to the network's trusted staker allowlist.
    pub trusted_stakers: Vec<Address>,
    /// Block stream to import at startup.
    pub import: Option<PathBuf>,
    pub log_filter: String,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            network: Network::Regtest,
            data_dir: PathBuf::from("./data"),
            storage: StorageBackend::File,
            chain: ChainConfig::default(),
            trusted_stakers: Vec::new(),
            import: None,
            log_filter: "info".to_string(),
        }
    }
}

/// Configuration errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var}: {reason}")]
    Invalid { var: &'static str, reason: String },

    #[error("storage backend 'rocksdb' requires building with the `rocksdb` feature")]
    RocksDbUnavailable,
}

impl NodeConfig {
    /// In-memory regtest node with small pools.
    pub fn for_testing() -> Self {
        Self {
            storage: StorageBackend::Memory,
            chain: ChainConfig::for_testing(),
            log_filter: "debug".to_string(),
            ..Self::default()
        }
    }

    /// Defaults overridden by the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_overrides(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    /// Applies `PEG_*` overrides read through `lookup`.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        if let Some(value) = lookup("PEG_NETWORK") {
            self.network = value.parse().map_err(|reason| ConfigError::Invalid {
                var: "PEG_NETWORK",
                reason,
            })?;
        }
        if let Some(value) = lookup("PEG_DATA_DIR") {
            self.data_dir = PathBuf::from(value);
        }
        if let Some(value) = lookup("PEG_STORAGE") {
            self.storage = parse_backend(&value)?;
        }
        if let Some(value) = lookup("PEG_TRUSTED_STAKERS") {
            self.trusted_stakers = parse_addresses(&value)?;
        }
        if let Some(value) = lookup("PEG_MAX_ORPHAN_TXS") {
            self.chain.mempool.max_orphan_txs = parse_count("PEG_MAX_ORPHAN_TXS", &value)?;
        }
        if let Some(value) = lookup("PEG_MAX_ORPHAN_BLOCKS") {
            self.chain.max_orphan_blocks = parse_count("PEG_MAX_ORPHAN_BLOCKS", &value)?;
        }
        if let Some(value) = lookup("PEG_IMPORT") {
            self.import = Some(PathBuf::from(value));
        }
        if let Some(value) = lookup("RUST_LOG") {
            self.log_filter = value;
        }
        Ok(())
    }

    /// Network presets with the configured stakers added.
    pub fn chain_params(&self) -> ChainParams {
        let mut params = ChainParams::for_network(self.network);
        params.trusted_stakers.extend(self.trusted_stakers.iter().copied());
        params
    }

    /// Refuses backends this build cannot open.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.storage == StorageBackend::RocksDb && !cfg!(feature = "rocksdb") {
            return Err(ConfigError::RocksDbUnavailable);
        }
        Ok(())
    }
}

fn parse_backend(value: &str) -> Result<StorageBackend, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "memory" => Ok(StorageBackend::Memory),
        "file" => Ok(StorageBackend::File),
        "rocksdb" => Ok(StorageBackend::RocksDb),
        other => Err(ConfigError::Invalid {
            var: "PEG_STORAGE",
            reason: format!("unknown backend '{other}'"),
        }),
    }
}

fn parse_count(var: &'static str, value: &str) -> Result<usize, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Invalid {
        var,
        reason: format!("'{value}' is not a count"),
    })
}

fn parse_addresses(value: &str) -> Result<Vec<Address>, ConfigError> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            let bytes = hex::decode(s).map_err(|e| ConfigError::Invalid {
                var: "PEG_TRUSTED_STAKERS",
                reason: format!("'{s}': {e}"),
            })?;
            Address::try_from(bytes.as_slice()).map_err(|_| ConfigError::Invalid {
                var: "PEG_TRUSTED_STAKERS",
                reason: format!("'{s}' is not 20 bytes"),
            })
        })
        .collect()
}
