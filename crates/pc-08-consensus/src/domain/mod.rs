//! Domain layer: pure chain-selection logic.

pub mod config;
pub mod errors;
pub mod fork_choice;
pub mod kernel;
pub mod orphans;

pub use config::ChainConfig;
pub use errors::{ChainError, ChainResult};
pub use fork_choice::{choose_fork, ForkDecision};
pub use kernel::{
    check_stake_kernel, compute_stake_modifier, stake_entropy_bit, stake_kernel_hash, KernelError,
    StakeInput,
};
pub use orphans::OrphanBlocks;
