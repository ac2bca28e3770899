//! # UTXO Engine Service
//!
//! Resolves, connects and disconnects transaction inputs against the
//! `TxDb` namespace of one storage transaction.
//!
//! `connect_inputs` checks in two passes so cheap rejections never pay for
//! signature verification:
//!
//! | Pass | Check | Failure |
//! |------|-------|---------|
//! | 1 | prevout inside its transaction | DoS 100 |
//! | 1 | coinbase/coinstake maturity | soft |
//! | 1 | `prev.time <= tx.time` | DoS 100 |
//! | 1 | input not waiting in the frozen queue | soft |
//! | 1 | values in money range | DoS 100 |
//! | 2 | not already spent | soft |
//! | 2 | signature (above the last checkpoint) | DoS 100 |
//! | - | conservation, fee, block minimum fee | DoS 100 |
//! | - | peg fractions of the outputs | per `PegError` |

use crate::adapters::tx_db::TxDb;
use crate::domain::context::{ConnectContext, ConnectedTx, FetchedInputs};
use crate::domain::errors::UtxoError;
use crate::domain::tx_index::{QueuedChanges, TxIndex, TxPos};
use crate::ports::outbound::PoolView;
use pc_02_block_storage::{BlockStore, StoreTxn};
use pc_03_validator::min_fee;
use pc_05_peg::{
    calculate_stake_fractions, calculate_standard_fractions, classify_stake, Fractions,
    FractionsSource, InputFractions, OutputRef, PegError, TxFractions,
};
use shared_types::crypto::verify_input;
use shared_types::{money_range, Amount, Encodable, Hash, OutPoint, Transaction};

pub struct UtxoEngine<'a> {
    txdb: TxDb<'a>,
    blocks: &'a BlockStore,
}

impl<'a> UtxoEngine<'a> {
    pub fn new(txn: &'a StoreTxn<'a>, blocks: &'a BlockStore) -> Self {
        Self {
            txdb: TxDb::new(txn),
            blocks,
        }
    }

    pub fn tx_db(&self) -> &TxDb<'a> {
        &self.txdb
    }

    /// Body of a transaction stored on disk.
    fn read_body(&self, txid: &Hash, index: &TxIndex) -> Result<Transaction, UtxoError> {
        match index.pos {
            TxPos::Disk { block, index } => Ok(self.blocks.read_tx(&block, index)?),
            TxPos::Mempool => Err(UtxoError::MissingInputs(*txid)),
        }
    }

    /// Resolve the previous transactions of `tx`: the queued batch first,
    /// then the persisted index, then the pool.
    pub fn fetch_inputs(
        &self,
        tx: &Transaction,
        queued: &QueuedChanges,
        pool: Option<&dyn PoolView>,
        next_height: u32,
    ) -> Result<FetchedInputs, UtxoError> {
        let mut inputs = FetchedInputs::new();
        if tx.is_coinbase() {
            return Ok(inputs);
        }

        for input in &tx.inputs {
            let txid = input.prevout.txid;
            if inputs.contains_key(&txid) {
                continue;
            }
            let index = match queued.get(&txid) {
                Some(index) => Some(index.clone()),
                None => self.txdb.read_tx_index(&txid)?,
            };
            let pooled = pool.and_then(|p| p.pooled_tx(&txid));
            let entry = match (index, pooled) {
                (Some(index), pooled) => {
                    let body = match (index.pos, pooled) {
                        (TxPos::Mempool, Some(body)) => body.clone(),
                        _ => self.read_body(&txid, &index)?,
                    };
                    (index, body)
                }
                (None, Some(body)) => (
                    TxIndex::new(TxPos::Mempool, next_height, body.outputs.len()),
                    body.clone(),
                ),
                (None, None) => return Err(UtxoError::MissingInputs(txid)),
            };
            inputs.insert(txid, entry);
        }

        for input in &tx.inputs {
            let prevout = input.prevout;
            let in_range = inputs.get(&prevout.txid).is_some_and(|(index, body)| {
                (prevout.n as usize) < body.outputs.len() && (prevout.n as usize) < index.spent.len()
            });
            if !in_range {
                return Err(UtxoError::PrevoutOutOfRange(prevout));
            }
        }
        Ok(inputs)
    }

    /// Validate the inputs of `tx`, mark them spent by `pos` in `queued`
    /// and compute the output fractions.
    ///
    /// For a coinstake the fractions are left to [`stake_fractions`] once
    /// the block's fees are known.
    pub fn connect_inputs(
        &self,
        tx: &Transaction,
        inputs: &FetchedInputs,
        queued: &mut QueuedChanges,
        pos: TxPos,
        ctx: &ConnectContext<'_>,
        peg: &dyn FractionsSource,
    ) -> Result<ConnectedTx, UtxoError> {
        let params = ctx.params;
        let mut value_in: Amount = 0;
        let mut spent = Vec::with_capacity(tx.inputs.len());

        for input in &tx.inputs {
            let prevout = input.prevout;
            let (index, prev) = inputs
                .get(&prevout.txid)
                .ok_or(UtxoError::MissingInputs(prevout.txid))?;
            let out = prev
                .outputs
                .get(prevout.n as usize)
                .filter(|_| (prevout.n as usize) < index.spent.len())
                .ok_or(UtxoError::PrevoutOutOfRange(prevout))?;

            if prev.is_coinbase() || prev.is_coinstake() {
                let depth = ctx.height.saturating_sub(index.height);
                if depth < params.coinbase_maturity {
                    return Err(UtxoError::Immature { prevout, depth });
                }
            }
            if prev.time > tx.time {
                return Err(UtxoError::TimestampViolation(prevout));
            }
            if peg.is_frozen(&prevout)? {
                return Err(PegError::Frozen(prevout).into());
            }
            if !money_range(out.value, params.max_money) {
                return Err(UtxoError::ValueOutOfRange);
            }
            value_in = value_in
                .checked_add(out.value)
                .filter(|v| money_range(*v, params.max_money))
                .ok_or(UtxoError::ValueOutOfRange)?;

            spent.push(OutputRef {
                outpoint: prevout,
                address: out.script_pubkey.address(),
                value: out.value,
            });
        }

        for (i, input) in tx.inputs.iter().enumerate() {
            let prevout = input.prevout;
            let (index, prev) = inputs
                .get(&prevout.txid)
                .ok_or(UtxoError::MissingInputs(prevout.txid))?;
            if index.is_spent(prevout.n) {
                return Err(UtxoError::DoubleSpend(prevout));
            }
            if ctx.check_signatures {
                let out = &prev.outputs[prevout.n as usize];
                verify_input(tx, i, &out.script_pubkey)
                    .map_err(|source| UtxoError::BadSignature { index: i, source })?;
            }
        }
        for input in &tx.inputs {
            let prevout = input.prevout;
            let (index, _) = inputs
                .get(&prevout.txid)
                .ok_or(UtxoError::MissingInputs(prevout.txid))?;
            let slot = queued
                .entry(prevout.txid)
                .or_insert_with(|| index.clone())
                .spent
                .get_mut(prevout.n as usize)
                .ok_or(UtxoError::PrevoutOutOfRange(prevout))?;
            *slot = Some(pos);
        }

        let input_fractions = spent
            .iter()
            .map(|r| input_fractions(r, ctx, peg))
            .collect::<Result<Vec<_>, _>>()?;

        if tx.is_coinstake() {
            let tier = classify_stake(&input_fractions[0].fractions, ctx.supply);
            return Ok(ConnectedTx {
                value_in,
                fee: 0,
                spent,
                inputs: input_fractions,
                fractions: None,
                stake_tier: Some(tier),
            });
        }

        let value_out = tx.value_out().ok_or(UtxoError::ValueOutOfRange)?;
        if value_in < value_out {
            return Err(UtxoError::InsufficientInputs {
                value_in,
                value_out,
            });
        }
        let fee = value_in - value_out;
        if !money_range(fee, params.max_money) {
            return Err(UtxoError::FeeOutOfRange);
        }
        if ctx.in_block {
            let min = min_fee(
                tx.encoded_len(),
                tx.inputs.len(),
                tx.outputs.len(),
                ctx.peg_active,
                params,
            );
            if fee < min {
                return Err(UtxoError::FeeTooLow { fee, min });
            }
        }

        let fractions = if ctx.peg_active {
            calculate_standard_fractions(tx, &input_fractions, ctx.supply, params)?
        } else {
            standard_split(tx, fee)
        };
        Ok(ConnectedTx {
            value_in,
            fee,
            spent,
            inputs: input_fractions,
            fractions: Some(fractions),
            stake_tier: None,
        })
    }

    /// Undo `connect_inputs` for a committed transaction: clear the spent
    /// slots it set and erase its own index entry.
    ///
    /// Returns the outputs it had spent, for the peg ledger.
    pub fn disconnect_inputs(&self, tx: &Transaction) -> Result<Vec<OutputRef>, UtxoError> {
        let mut spent = Vec::with_capacity(tx.inputs.len());
        if !tx.is_coinbase() {
            for input in &tx.inputs {
                let prevout = input.prevout;
                let mut index = self
                    .txdb
                    .read_tx_index(&prevout.txid)?
                    .ok_or(UtxoError::MissingPrevIndex(prevout))?;
                let slot = index
                    .spent
                    .get_mut(prevout.n as usize)
                    .ok_or(UtxoError::PrevoutOutOfRange(prevout))?;
                *slot = None;
                self.txdb.write_tx_index(&prevout.txid, &index)?;

                let prev = self.read_body(&prevout.txid, &index)?;
                let out = prev
                    .outputs
                    .get(prevout.n as usize)
                    .ok_or(UtxoError::PrevoutOutOfRange(prevout))?;
                spent.push(OutputRef {
                    outpoint: prevout,
                    address: out.script_pubkey.address(),
                    value: out.value,
                });
            }
        }
        self.txdb.erase_tx_index(&tx.txid());
        Ok(spent)
    }

    /// Persist the indices a block touched.
    pub fn flush_queued(&self, queued: &QueuedChanges) -> Result<(), UtxoError> {
        for (txid, index) in queued {
            self.txdb.write_tx_index(txid, index)?;
        }
        tracing::trace!("[pc-04] Flushed {} tx index entries", queued.len());
        Ok(())
    }
}

fn input_fractions(
    spent: &OutputRef,
    ctx: &ConnectContext<'_>,
    peg: &dyn FractionsSource,
) -> Result<InputFractions, UtxoError> {
    let fractions = match peg.fractions(&spent.outpoint)? {
        Some(f) => f,
        None if !ctx.peg_active => Fractions::std(spent.value),
        None => return Err(PegError::MissingFractions(spent.outpoint).into()),
    };
    if fractions.total() != spent.value {
        return Err(PegError::InputMismatch(spent.outpoint).into());
    }
    Ok(InputFractions {
        prevout: spent.outpoint,
        address: spent.address,
        value: spent.value,
        fractions,
    })
}

/// Standard decomposition of every output, used before the peg activates.
fn standard_split(tx: &Transaction, fee: Amount) -> TxFractions {
    TxFractions {
        outputs: tx.outputs.iter().map(|o| Fractions::std(o.value)).collect(),
        fee: Fractions::std(fee),
    }
}

/// Output fractions of a connected coinstake that mints `minted`
/// (reward plus the block's fees).
pub fn stake_fractions(
    tx: &Transaction,
    connected: &ConnectedTx,
    minted: Amount,
    ctx: &ConnectContext<'_>,
) -> Result<TxFractions, UtxoError> {
    if ctx.peg_active {
        return Ok(calculate_stake_fractions(
            tx,
            &connected.inputs,
            ctx.supply,
            minted,
        )?);
    }
    let value_out = tx.value_out().ok_or(UtxoError::ValueOutOfRange)?;
    Ok(standard_split(
        tx,
        (connected.value_in + minted - value_out).max(0),
    ))
}

/// Outpoints of `tx`'s outputs.
pub fn outpoints(tx: &Transaction) -> impl Iterator<Item = OutPoint> + '_ {
    let txid = tx.txid();
    (0..tx.outputs.len() as u32).map(move |n| OutPoint::new(txid, n))
}
