//! Chain state configuration.

use pc_06_mempool::MempoolConfig;

#[derive(Clone, Debug)]
pub struct ChainConfig {
    /// Maximum orphan blocks kept while their parents are missing.
    pub max_orphan_blocks: usize,
    /// Decoded blocks kept in the block store's cache.
    pub block_cache_size: usize,
    pub mempool: MempoolConfig,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            max_orphan_blocks: 750,
            block_cache_size: 64,
            mempool: MempoolConfig::default(),
        }
    }
}

impl ChainConfig {
    /// Creates a minimal config for testing.
    pub fn for_testing() -> Self {
        Self {
            max_orphan_blocks: 8,
            block_cache_size: 4,
            mempool: MempoolConfig::for_testing(),
        }
    }
}
