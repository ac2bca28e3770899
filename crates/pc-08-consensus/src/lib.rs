//! # pc-08-consensus
//!
//! Chain state for the peg chain: decides which blocks join the index,
//! which tip is best, and moves the committed state between tips.
//!
//! ## Architecture
//!
//! ```text
//!   peers / import ──► ChainState::process_block
//!                         │
//!        ┌────────────────┼──────────────────┬───────────────────┐
//!        ↓                ↓                  ↓                   ↓
//!  [check_block (3)] [ChainIndex (1)]  [UtxoEngine (4)]    [PegDb (5)]
//!                         │                  └──── one StoreTxn ─┘
//!                         ↓
//!              fork choice ─► reorg ─► [Mempool (6)] ─► subscribers
//! ```
//!
//! Proof-of-stake blocks are checked against the stake kernel
//! ([`domain::kernel`]); proof-of-work blocks against their target. Both
//! kinds share one index and one trust measure.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use pc_08_consensus::{ChainConfig, ChainState};
//! use shared_types::ChainParams;
//!
//! let mut chain = ChainState::open(ChainParams::regtest(), ChainConfig::default(), store, files)?
//!     .with_notifier(network);
//!
//! match chain.process_block(block, Some(peer))? {
//!     BlockStatus::Accepted { height, best } => { /* relay */ }
//!     BlockStatus::Orphan { missing } => { /* request `missing` */ }
//! }
//! ```

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod service;

pub use adapters::{ManualClock, NullNotifier, RecordedEvent, RecordingNotifier, RecordingSubscriber};
pub use domain::{
    check_stake_kernel, choose_fork, compute_stake_modifier, stake_kernel_hash, ChainConfig,
    ChainError, ChainResult, ForkDecision, KernelError, OrphanBlocks, StakeInput,
};
pub use ports::{ChainEventSubscriber, Inventory, NetworkNotifier, PeerId, SystemTimeSource, TimeSource};
pub use service::{
    encode_block_record, BlockStatus, BlockStreamReader, ChainState, ImportSummary,
    SharedChainState,
};
