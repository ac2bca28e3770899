//! # Node Container
//!
//! Configuration and the stores, lock and chain state built from it.

pub mod config;
pub mod node;

pub use config::{ConfigError, NodeConfig, StorageBackend};
pub use node::{NodeContainer, NodeError};
