//! # Fraction Calculation
//!
//! Moves input fractions onto outputs for one transaction.
//!
//! ```text
//!  inputs ──split_at(supply)──┬─► reserve pool per address
//!                             └─► common liquidity pool
//!
//!  each output, in order:
//!    own address reserve (ratio part) ──► liquidity for the shortfall
//!    burn / notarized: every reserve in address order ──► liquidity
//!
//!  leftover reserve + liquidity = fee fractions
//! ```
//!
//! A failure anywhere rejects the whole transaction; callers only write
//! output fractions after a successful return.

use crate::domain::errors::PegError;
use crate::domain::fractions::{FractionFlags, Fractions};
use pc_07_rewards::StakeTier;
use shared_types::{Address, Amount, ChainParams, OutPoint, ScriptKind, Transaction, TxOut};
use std::collections::{BTreeMap, BTreeSet};

/// Null-data payload marking a bridge-notarized transaction.
pub const NOTARY_F_MARKER: &[u8] = b"**F**";
/// Null-data payload marking a validator-notarized transaction.
pub const NOTARY_V_MARKER: &[u8] = b"**V**";

/// A resolved input as the accountant sees it.
#[derive(Debug, Clone)]
pub struct InputFractions {
    pub prevout: OutPoint,
    pub address: Option<Address>,
    pub value: Amount,
    pub fractions: Fractions,
}

/// Result of a successful calculation: one entry per output, plus what the
/// transaction leaves behind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TxFractions {
    pub outputs: Vec<Fractions>,
    pub fee: Fractions,
}

/// Freeze kind requested by a notary marker output, if any.
pub fn notary_marker(tx: &Transaction) -> Option<FractionFlags> {
    tx.outputs.iter().find_map(|out| match out.script_pubkey.classify() {
        ScriptKind::NullData(data) if data.starts_with(NOTARY_V_MARKER) => Some(FractionFlags::NOTARY_V),
        ScriptKind::NullData(data) if data.starts_with(NOTARY_F_MARKER) => Some(FractionFlags::NOTARY_F),
        _ => None,
    })
}

pub fn freeze_duration(flags: FractionFlags, params: &ChainParams) -> u32 {
    if flags.contains(FractionFlags::NOTARY_V) {
        params.freeze_duration_v
    } else {
        params.freeze_duration_f
    }
}

/// Reward tier of a stake input at `supply`.
pub fn classify_stake(stake: &Fractions, supply: usize) -> StakeTier {
    if stake.flags.contains(FractionFlags::NOTARY_V) {
        StakeTier::ValidatorFrozen
    } else if stake.flags.contains(FractionFlags::NOTARY_F) {
        StakeTier::BridgeFrozen
    } else if stake.reserve(supply) > stake.liquid(supply) {
        StakeTier::ReserveHeavy
    } else {
        StakeTier::LiquidHeavy
    }
}

struct Pools {
    /// Keyed by funding address; `None` collects inputs without one.
    reserves: BTreeMap<Option<Address>, Fractions>,
    liquidity: Fractions,
}

impl Pools {
    fn from_inputs(inputs: &[InputFractions], supply: usize) -> Result<Self, PegError> {
        let mut pools = Pools {
            reserves: BTreeMap::new(),
            liquidity: Fractions::new(),
        };
        for input in inputs {
            if input.fractions.total() != input.value || !input.fractions.is_non_negative() {
                return Err(PegError::InputMismatch(input.prevout));
            }
            let (reserve, liquid) = input.fractions.split_at(supply);
            pools.reserves.entry(input.address).or_default().add(&reserve);
            pools.liquidity.add(&liquid);
        }
        Ok(pools)
    }

    fn credit(&mut self, address: Option<Address>, minted: &Fractions, supply: usize) {
        let (reserve, liquid) = minted.split_at(supply);
        self.reserves.entry(address).or_default().add(&reserve);
        self.liquidity.add(&liquid);
    }

    fn draw(
        &mut self,
        output: usize,
        value: Amount,
        address: Option<Address>,
        across_reserves: bool,
    ) -> Result<Fractions, PegError> {
        let mut drawn = Fractions::new();
        let mut need = value;

        if across_reserves {
            for reserve in self.reserves.values_mut() {
                if need == 0 {
                    break;
                }
                let take = need.min(reserve.total());
                drawn.add(&reserve.take_ratio_part(take));
                need -= take;
            }
        } else if let Some(reserve) = address.and_then(|a| self.reserves.get_mut(&Some(a))) {
            let take = need.min(reserve.total());
            drawn.add(&reserve.take_ratio_part(take));
            need -= take;
        }

        if need > 0 {
            if self.liquidity.total() < need {
                return Err(PegError::NoLiquidity { output });
            }
            drawn.add(&self.liquidity.take_ratio_part(need));
        }
        Ok(drawn)
    }

    fn leftover(self) -> Fractions {
        let mut fee = self.liquidity;
        for reserve in self.reserves.values() {
            fee.add(reserve);
        }
        fee
    }
}

fn check_output(output: usize, value: Amount, fractions: &Fractions) -> Result<(), PegError> {
    if !fractions.is_non_negative() {
        return Err(PegError::NegativeBucket { output });
    }
    if fractions.total() != value {
        return Err(PegError::TotalMismatch { output });
    }
    Ok(())
}

/// Freeze flags a same-address input passes on to an output that covers
/// its whole value.
fn inherited_freeze(inputs: &[InputFractions], address: Option<Address>, value: Amount) -> (FractionFlags, u32) {
    let mut flags = FractionFlags::empty();
    let mut lock_time = 0;
    let Some(address) = address else {
        return (flags, lock_time);
    };
    for input in inputs {
        if input.address == Some(address) && value >= input.value && !input.fractions.flags.is_empty() {
            flags.insert(input.fractions.flags);
            lock_time = lock_time.max(input.fractions.lock_time);
        }
    }
    (flags, lock_time)
}

fn is_burn(out: &TxOut) -> bool {
    out.value > 0 && out.script_pubkey.is_null_data()
}

/// Fractions for the outputs of an ordinary (non-minting) transaction.
pub fn calculate_standard_fractions(
    tx: &Transaction,
    inputs: &[InputFractions],
    supply: usize,
    params: &ChainParams,
) -> Result<TxFractions, PegError> {
    let mut pools = Pools::from_inputs(inputs, supply)?;
    let notary = notary_marker(tx);
    let funding: BTreeSet<Address> = inputs.iter().filter_map(|i| i.address).collect();

    let mut outputs = Vec::with_capacity(tx.outputs.len());
    for (index, out) in tx.outputs.iter().enumerate() {
        let address = out.script_pubkey.address();
        let notarized = notary.is_some() && address.is_some_and(|a| !funding.contains(&a));

        let mut fractions = pools.draw(index, out.value, address, is_burn(out) || notarized)?;
        let (flags, lock_time) = inherited_freeze(inputs, address, out.value);
        fractions.flags = flags;
        fractions.lock_time = lock_time;
        if let (true, Some(kind)) = (notarized, notary) {
            fractions.flags.insert(kind);
            fractions.lock_time = fractions
                .lock_time
                .max(tx.time.saturating_add(freeze_duration(kind, params)));
        }
        check_output(index, out.value, &fractions)?;
        outputs.push(fractions);
    }

    let fee = pools.leftover();
    let value_in: Amount = inputs.iter().map(|i| i.value).sum();
    let value_out: Amount = tx.outputs.iter().map(|o| o.value).sum();
    if fee.total() != value_in - value_out {
        return Err(PegError::FeeMismatch {
            expected: value_in - value_out,
            actual: fee.total(),
        });
    }
    Ok(TxFractions { outputs, fee })
}

/// Fractions for a coinstake minting `minted` (reward plus relayed fees).
///
/// The minted value is spread as a standard distribution and credited to
/// the staker's reserve and the liquidity pool before outputs draw.
/// Whatever the coinstake leaves unclaimed is returned as `fee`.
pub fn calculate_stake_fractions(
    tx: &Transaction,
    inputs: &[InputFractions],
    supply: usize,
    minted: Amount,
) -> Result<TxFractions, PegError> {
    let mut pools = Pools::from_inputs(inputs, supply)?;
    let staker = inputs.first().and_then(|i| i.address);
    pools.credit(staker, &Fractions::std(minted), supply);

    let mut outputs = Vec::with_capacity(tx.outputs.len());
    for (index, out) in tx.outputs.iter().enumerate() {
        let address = out.script_pubkey.address();
        let mut fractions = pools.draw(index, out.value, address, false)?;
        let (flags, lock_time) = inherited_freeze(inputs, address, out.value);
        fractions.flags = flags;
        fractions.lock_time = lock_time;
        check_output(index, out.value, &fractions)?;
        outputs.push(fractions);
    }
    Ok(TxFractions {
        outputs,
        fee: pools.leftover(),
    })
}
