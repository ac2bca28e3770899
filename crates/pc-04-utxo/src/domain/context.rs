//! Inputs and outputs of one `connect_inputs` call.

use super::tx_index::TxIndex;
use pc_05_peg::{InputFractions, OutputRef, TxFractions};
use pc_07_rewards::StakeTier;
use shared_types::{Amount, ChainParams, Hash, Transaction};
use std::collections::HashMap;

/// Resolved previous transactions keyed by txid.
pub type FetchedInputs = HashMap<Hash, (TxIndex, Transaction)>;

/// Chain position a transaction is connected at.
#[derive(Debug, Clone, Copy)]
pub struct ConnectContext<'p> {
    pub params: &'p ChainParams,
    /// Height of the spending block, or the next height for the pool.
    pub height: u32,
    /// Chain time that frozen outputs are judged against.
    pub time: u32,
    /// Block transactions must pay the minimum fee.
    pub in_block: bool,
    pub check_signatures: bool,
    pub supply: usize,
    pub peg_active: bool,
}

impl<'p> ConnectContext<'p> {
    pub fn for_block(params: &'p ChainParams, height: u32, time: u32, supply: u32) -> Self {
        Self {
            params,
            height,
            time,
            in_block: true,
            check_signatures: height > params.last_checkpoint_height(),
            supply: supply as usize,
            peg_active: params.is_peg_active(height),
        }
    }

    pub fn for_pool(params: &'p ChainParams, next_height: u32, time: u32, supply: u32) -> Self {
        Self {
            in_block: false,
            check_signatures: true,
            ..Self::for_block(params, next_height, time, supply)
        }
    }
}

/// A transaction whose inputs passed every check.
#[derive(Debug, Clone)]
pub struct ConnectedTx {
    pub value_in: Amount,
    /// `value_in - value_out`; zero for a coinstake.
    pub fee: Amount,
    pub spent: Vec<OutputRef>,
    pub inputs: Vec<InputFractions>,
    /// Output and fee fractions. `None` for a coinstake until its minted
    /// value is known at the end of the block.
    pub fractions: Option<TxFractions>,
    /// Reward tier of a coinstake's stake input.
    pub stake_tier: Option<StakeTier>,
}
