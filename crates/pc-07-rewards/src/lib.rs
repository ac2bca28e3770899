//! # Reward Engine (pc-07)
//!
//! Pure functions of `(chain index, height, params)`:
//!
//! - [`block_trust`]: work credited for a block's target
//! - [`next_target_required`]: exponential per-kind retarget
//! - [`pow_reward`] / [`stake_reward`]: minted value
//!
//! Nothing here touches storage.

pub mod difficulty;
pub mod subsidy;

pub use difficulty::{block_trust, next_target_required};
pub use subsidy::{pow_reward, stake_reward, StakeTier};
