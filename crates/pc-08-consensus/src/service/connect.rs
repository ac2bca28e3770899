//! # Block Connect and Reorganization
//!
//! A block is applied in three steps inside the caller's storage
//! transaction:
//!
//! 1. every transaction through `fetch_inputs` + `connect_inputs`, its
//!    outputs recorded by the peg store as soon as it connects
//! 2. the coinstake's fractions once the block's fees are known
//! 3. the frozen-queue sweep at the block's time
//!
//! Disconnect undoes the same steps in reverse. A reorganization runs every
//! disconnect and connect in one transaction and commits only if all of
//! them succeed.

use crate::domain::errors::{ChainError, ChainResult};
use pc_01_chain_index::{BlockId, ChainIndex};
use pc_02_block_storage::{BlockPos, BlockStore, KeyValueStore, StoreTxn};
use pc_04_utxo::{stake_fractions, ConnectContext, ConnectedTx, QueuedChanges, TxIndex, TxPos, UtxoEngine};
use pc_05_peg::{Fractions, PegDb, PegError};
use pc_07_rewards::{pow_reward, stake_reward};
use shared_types::{short_hash, Amount, Block, ChainParams, DosScore, Hash, OutPoint, Transaction};
use std::sync::Arc;

/// Order in which a block's transactions reach the peg store: the coinstake
/// goes last, after the fees it collects are known.
pub(crate) fn peg_order(block: &Block) -> Vec<usize> {
    let n = block.transactions.len();
    if block.is_proof_of_stake() {
        std::iter::once(0)
            .chain(2..n)
            .chain(std::iter::once(1))
            .collect()
    } else {
        (0..n).collect()
    }
}

/// Where a block sits in the chain being connected.
#[derive(Debug, Clone, Copy)]
pub(crate) struct BlockSlot {
    pub pos: BlockPos,
    pub height: u32,
    pub supply: u32,
}

pub(crate) fn connect_block(
    engine: &UtxoEngine<'_>,
    peg: &PegDb<'_>,
    block: &Block,
    slot: BlockSlot,
    params: &ChainParams,
) -> ChainResult<()> {
    let hash = block.hash();
    let time = block.header.time;
    let ctx = ConnectContext::for_block(params, slot.height, time, slot.supply);
    let mut queued = QueuedChanges::new();
    let mut fees: Amount = 0;
    let mut coinstake: Option<(&Transaction, ConnectedTx)> = None;

    for (i, tx) in block.transactions.iter().enumerate() {
        let txid = tx.txid();
        if let Some(existing) = engine.tx_db().read_tx_index(&txid)? {
            if existing.unspent_count() > 0 {
                return Err(ChainError::DuplicateTx(txid));
            }
        }
        let pos = TxPos::disk(slot.pos, i as u32);

        if tx.is_coinbase() {
            queued.insert(txid, TxIndex::new(pos, slot.height, tx.outputs.len()));
            let fractions: Vec<Fractions> =
                tx.outputs.iter().map(|o| Fractions::std(o.value)).collect();
            peg.connect_tx(tx, &[], &fractions, time)?;
            continue;
        }

        let inputs = engine
            .fetch_inputs(tx, &queued, None, slot.height)
            .map_err(ChainError::tx(txid))?;
        let connected = engine
            .connect_inputs(tx, &inputs, &mut queued, pos, &ctx, peg)
            .map_err(ChainError::tx(txid))?;
        queued.insert(txid, TxIndex::new(pos, slot.height, tx.outputs.len()));

        if tx.is_coinstake() {
            coinstake = Some((tx, connected));
            continue;
        }
        fees = fees.saturating_add(connected.fee);
        let fractions = connected
            .fractions
            .ok_or(PegError::MissingFractions(OutPoint::new(txid, 0)))?;
        peg.connect_tx(tx, &connected.spent, &fractions.outputs, time)?;
    }

    if let Some((tx, connected)) = coinstake {
        let reward = connected
            .stake_tier
            .map_or(params.stake_reward_base, |tier| {
                stake_reward(tier, ctx.peg_active, params)
            });
        let allowed = reward.saturating_add(fees);
        let claimed = tx
            .value_out()
            .map_or(Amount::MAX, |out| out - connected.value_in);
        if claimed > allowed {
            return Err(ChainError::BadStakeReward { claimed, allowed });
        }
        let txid = tx.txid();
        let fractions =
            stake_fractions(tx, &connected, allowed, &ctx).map_err(ChainError::tx(txid))?;
        peg.connect_tx(tx, &connected.spent, &fractions.outputs, time)?;
    } else if slot.height > 0 {
        let max = pow_reward(slot.height, fees, params);
        let value = block.transactions[0].value_out().unwrap_or(Amount::MAX);
        if value > max {
            return Err(ChainError::BadCoinbaseValue { value, max });
        }
    }

    engine.flush_queued(&queued)?;
    let released = peg.process_frozen_queue(&hash, time)?;
    if !released.is_empty() {
        tracing::debug!(
            "[pc-08] Block {} released {} frozen outputs",
            short_hash(&hash),
            released.len()
        );
    }
    Ok(())
}

pub(crate) fn disconnect_block(engine: &UtxoEngine<'_>, peg: &PegDb<'_>, block: &Block) -> ChainResult<()> {
    peg.undo_frozen_queue(&block.hash())?;
    for i in peg_order(block).into_iter().rev() {
        let tx = &block.transactions[i];
        let spent = engine
            .disconnect_inputs(tx)
            .map_err(ChainError::tx(tx.txid()))?;
        peg.disconnect_tx(tx, &spent)?;
    }
    Ok(())
}

/// Blocks to disconnect (highest first) and connect (lowest first) to move
/// the best chain from one tip to another.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ReorgPlan {
    pub fork: BlockId,
    pub disconnect: Vec<BlockId>,
    pub connect: Vec<BlockId>,
}

pub(crate) fn plan_reorg(index: &ChainIndex, best: BlockId, target: BlockId) -> Option<ReorgPlan> {
    let fork = index.find_fork(best, target)?;
    let disconnect = index.ancestors(best).take_while(|id| *id != fork).collect();
    let mut connect: Vec<BlockId> = index.ancestors(target).take_while(|id| *id != fork).collect();
    connect.reverse();
    Some(ReorgPlan {
        fork,
        disconnect,
        connect,
    })
}

/// Blocks a committed reorganization moved, with their heights.
#[derive(Debug, Default)]
pub(crate) struct AppliedReorg {
    pub disconnected: Vec<(u32, Arc<Block>)>,
    pub connected: Vec<(u32, Arc<Block>)>,
}

#[derive(Debug)]
pub(crate) enum ReorgFailure {
    /// A candidate block failed validation.
    Invalid { id: BlockId, error: ChainError },
    /// Storage or integrity failure unrelated to any block's validity.
    Local(ChainError),
}

/// Applies `plan` and moves the persisted best pointer to `target`, all in
/// one storage transaction.
pub(crate) fn apply_reorg(
    store: &dyn KeyValueStore,
    blocks: &BlockStore,
    index: &mut ChainIndex,
    params: &ChainParams,
    plan: &ReorgPlan,
    target: &Hash,
) -> Result<AppliedReorg, ReorgFailure> {
    let txn = StoreTxn::new(store);
    let applied = run_reorg(&txn, blocks, index, params, plan, target);
    match applied {
        Ok(applied) => {
            txn.commit().map_err(|e| ReorgFailure::Local(e.into()))?;
            Ok(applied)
        }
        Err(failure) => {
            txn.abort();
            Err(failure)
        }
    }
}

fn run_reorg(
    txn: &StoreTxn<'_>,
    blocks: &BlockStore,
    index: &mut ChainIndex,
    params: &ChainParams,
    plan: &ReorgPlan,
    target: &Hash,
) -> Result<AppliedReorg, ReorgFailure> {
    let engine = UtxoEngine::new(txn, blocks);
    let peg = PegDb::new(txn);
    let mut applied = AppliedReorg::default();

    for id in &plan.disconnect {
        let record = index.get(*id);
        let block = blocks
            .read_block(&record.pos)
            .map_err(|e| ReorgFailure::Local(e.into()))?;
        disconnect_block(&engine, &peg, &block).map_err(ReorgFailure::Local)?;
        applied.disconnected.push((record.height, block));
    }

    for id in &plan.connect {
        let (pos, height) = {
            let record = index.get(*id);
            (record.pos, record.height)
        };
        let block = blocks
            .read_block(&pos)
            .map_err(|e| ReorgFailure::Local(e.into()))?;
        let supply = index.peg_supply_index(*id, params);
        let slot = BlockSlot { pos, height, supply };
        connect_block(&engine, &peg, &block, slot, params).map_err(|error| {
            if error.is_fatal() {
                ReorgFailure::Local(error)
            } else {
                ReorgFailure::Invalid { id: *id, error }
            }
        })?;
        applied.connected.push((height, block));
    }

    engine.tx_db().write_best(target);
    Ok(applied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::{BlockHeader, Script, TxIn, TxOut};

    fn tx(coinstake: bool, tag: u8) -> Transaction {
        let mut outputs = vec![TxOut::new(1, Script::p2pkh(&[tag; 20]))];
        if coinstake {
            outputs.insert(0, TxOut::empty());
        }
        Transaction {
            version: 1,
            time: 0,
            inputs: vec![TxIn::new(OutPoint::new([tag; 32], 0))],
            outputs,
            lock_time: 0,
        }
    }

    #[test]
    fn test_peg_order_puts_coinstake_last() {
        let mut coinbase = tx(false, 0);
        coinbase.inputs[0].prevout = OutPoint::null();
        coinbase.outputs = vec![TxOut::empty()];
        let block = Block {
            header: BlockHeader::default(),
            transactions: vec![coinbase.clone(), tx(true, 1), tx(false, 2), tx(false, 3)],
            signature: Vec::new(),
        };
        assert!(block.is_proof_of_stake());
        assert_eq!(peg_order(&block), vec![0, 2, 3, 1]);

        let pow = Block {
            transactions: vec![coinbase, tx(false, 2)],
            ..block
        };
        assert_eq!(peg_order(&pow), vec![0, 1]);
    }
}
