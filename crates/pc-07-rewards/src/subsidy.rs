//! Minted value per block.

use shared_types::{Amount, ChainParams};

/// Reward tier of a coinstake, decided by the peg state of its stake input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StakeTier {
    /// Stake input carries the validator freeze flag.
    ValidatorFrozen,
    /// Stake input carries the bridge freeze flag.
    BridgeFrozen,
    /// More of the stake sits in reserve than in liquidity.
    ReserveHeavy,
    LiquidHeavy,
}

/// Coinbase value allowed for a PoW block: halving subsidy plus fees.
pub fn pow_reward(height: u32, fees: Amount, params: &ChainParams) -> Amount {
    let halvings = height / params.pow_halving_interval.max(1);
    let subsidy = if halvings >= 63 {
        0
    } else {
        params.pow_reward >> halvings
    };
    subsidy.saturating_add(fees)
}

/// Value minted by a coinstake, excluding relayed fees.
pub fn stake_reward(tier: StakeTier, peg_active: bool, params: &ChainParams) -> Amount {
    if !peg_active {
        return params.stake_reward_base;
    }
    match tier {
        StakeTier::ValidatorFrozen => params.stake_reward_v,
        StakeTier::BridgeFrozen => params.stake_reward_f,
        StakeTier::ReserveHeavy => params.stake_reward_reserve,
        StakeTier::LiquidHeavy => params.stake_reward_liquid,
    }
}
