//! # Mempool (pc-06)
//!
//! Holds valid, unconfirmed transactions until a block includes them.
//!
//! ```text
//!   tx ──► Mempool::process ──► accept ──ok──► TransactionPool
//!                │                 │
//!                │         MissingInputs
//!                ▼                 ▼
//!        orphans unblocked ◄── OrphanPool (≤ max_orphan_txs, random eviction)
//!
//!   block connected ──► remove_for_block: included txs + conflicts (recursive)
//! ```
//!
//! ## Rules
//!
//! | Rule | Outcome |
//! |------|---------|
//! | input already claimed by a pooled tx | `Conflict`, soft, first seen wins |
//! | parent unknown | `MissingInputs`, soft, kept as orphan (≤ 5000 bytes) |
//! | fee below the minimum fee | `FeeTooLow` |
//! | fee below the relay fee | counted by the free-relay limiter |
//!
//! Pooled outputs carry the fractions computed at admission, so children
//! of unconfirmed parents are checked against the same peg state a block
//! would see.

pub mod adapters;
pub mod domain;
pub mod service;

pub use adapters::fractions::PoolFractions;
pub use domain::entities::{MempoolConfig, MempoolEntry, MAX_ORPHAN_TX_SIZE};
pub use domain::errors::MempoolError;
pub use domain::free_relay::FreeRelayLimiter;
pub use domain::orphans::OrphanPool;
pub use domain::pool::TransactionPool;
pub use service::{ChainView, Mempool};
