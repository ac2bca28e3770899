//! # Node Runtime Library
//!
//! Exposes the runtime's modules for testing. The entry point is the
//! `main.rs` binary.

pub mod adapters;
pub mod container;

pub use container::{NodeConfig, NodeContainer, NodeError, StorageBackend};
