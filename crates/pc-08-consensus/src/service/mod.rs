//! # Chain State Service
//!
//! Owns every piece of mutable chain state: the block index, the orphan
//! blocks, the mempool and the subscribers. Hosts share one instance as
//! [`SharedChainState`].
//!
//! ## Block Pipeline
//!
//! ```text
//! process_block
//!   ├─ duplicate / duplicate stake
//!   ├─ check_block (context free)
//!   ├─ parent unknown ──► OrphanBlocks, report the missing root
//!   └─ accept_block
//!        ├─ difficulty · median time · future drift · last PoW height
//!        ├─ finality · checkpoint · stake kernel
//!        ├─ write block file, persist index record
//!        └─ fork choice ──► set_best_chain (one StoreTxn for the whole reorg)
//!   then orphans waiting on the block, breadth first
//! ```
//!
//! ## Failure Handling
//!
//! | Failure | Effect |
//! |---------|--------|
//! | context-free or contextual rule | block refused, relaying peer scored |
//! | candidate fails to connect | reorg aborted, block and descendants flagged `FAILED_VALID` |
//! | storage failure | reorg aborted, error surfaced as fatal |

mod connect;
mod import;

pub use import::{encode_block_record, BlockStreamReader, ImportSummary};

use crate::adapters::NullNotifier;
use crate::domain::{
    check_stake_kernel, choose_fork, compute_stake_modifier, stake_entropy_bit, ChainConfig,
    ChainError, ChainResult, ForkDecision, KernelError, OrphanBlocks, StakeInput,
};
use crate::ports::{ChainEventSubscriber, Inventory, NetworkNotifier, PeerId, SystemTimeSource, TimeSource};
use connect::{apply_reorg, connect_block, plan_reorg, AppliedReorg, BlockSlot, ReorgFailure};
use parking_lot::Mutex;
use pc_01_chain_index::{BlockFlags, BlockId, BlockIndex, ChainIndex};
use pc_02_block_storage::{BlockFileStore, BlockStore, KeyValueStore, StoreTxn};
use pc_03_validator::{block_staker, check_block, CheckFlags};
use pc_04_utxo::{TxDb, TxIndex, TxPos, UtxoEngine};
use pc_05_peg::{parse_vote, Balance, Fractions, FrozenEntry, LedgerRecord, PegDb};
use pc_06_mempool::{ChainView, Mempool};
use pc_07_rewards::{block_trust, next_target_required};
use primitive_types::U256;
use shared_types::{short_hash, Address, Block, ChainParams, DosScore, Hash, OutPoint, Transaction};
use std::collections::VecDeque;
use std::sync::Arc;

/// Chain state shared between the host's threads.
pub type SharedChainState = Arc<Mutex<ChainState>>;

/// Outcome of [`ChainState::process_block`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockStatus {
    /// Indexed at `height`; `best` is set when it became the best tip.
    Accepted { height: u32, best: bool },
    /// Parent unknown. `missing` is the first block to request.
    Orphan { missing: Hash },
}

pub struct ChainState {
    params: ChainParams,
    config: ChainConfig,
    store: Arc<dyn KeyValueStore>,
    blocks: BlockStore,
    index: ChainIndex,
    mempool: Mempool,
    orphans: OrphanBlocks,
    /// Highest trust of any block that failed to connect.
    best_invalid_trust: U256,
    notifier: Arc<dyn NetworkNotifier>,
    clock: Arc<dyn TimeSource>,
    subscribers: Vec<Arc<dyn ChainEventSubscriber>>,
}

impl ChainState {
    /// Loads the persisted chain, or writes and connects genesis on first
    /// start.
    pub fn open(
        params: ChainParams,
        config: ChainConfig,
        store: Arc<dyn KeyValueStore>,
        files: Arc<dyn BlockFileStore>,
    ) -> ChainResult<Self> {
        let blocks = BlockStore::with_cache_size(files, config.block_cache_size);
        let mempool = Mempool::new(config.mempool.clone());
        let mut state = Self {
            params,
            config,
            store,
            blocks,
            index: ChainIndex::new(),
            mempool,
            orphans: OrphanBlocks::new(),
            best_invalid_trust: U256::zero(),
            notifier: Arc::new(NullNotifier),
            clock: Arc::new(SystemTimeSource),
            subscribers: Vec::new(),
        };

        let best = state.read_view(|txdb, _| Ok(txdb.read_best()?))?;
        match best {
            Some(best) => state.load_index(best)?,
            None => state.init_genesis()?,
        }
        Ok(state)
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn NetworkNotifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_time_source(mut self, clock: Arc<dyn TimeSource>) -> Self {
        self.clock = clock;
        self
    }

    pub fn subscribe(&mut self, subscriber: Arc<dyn ChainEventSubscriber>) {
        self.subscribers.push(subscriber);
    }

    pub fn into_shared(self) -> SharedChainState {
        Arc::new(Mutex::new(self))
    }

    fn load_index(&mut self, best: Hash) -> ChainResult<()> {
        let records = self.read_view(|txdb, _| Ok(txdb.read_block_indices()?))?;
        self.index = ChainIndex::load(records, best)?;

        let expected = self.params.genesis_hash();
        let genesis = self.index.genesis().map(|id| self.index.get(id).hash);
        if genesis != Some(expected) {
            return Err(ChainError::GenesisMismatch(genesis.unwrap_or_default()));
        }

        self.best_invalid_trust = self
            .index
            .records()
            .filter(|record| record.is_failed())
            .map(|record| record.chain_trust)
            .max()
            .unwrap_or_default();
        tracing::info!(
            "[pc-08] Chain loaded: best height {} ({})",
            self.best_height(),
            short_hash(&self.best_hash())
        );
        Ok(())
    }

    fn init_genesis(&mut self) -> ChainResult<()> {
        let block = self.params.genesis_block();
        let hash = block.hash();
        let pos = self.blocks.write_block(&block)?;

        let mut record = BlockIndex::new(hash, block.header.clone(), 0);
        record.chain_trust = block_trust(block.header.bits);
        record.pos = pos;
        if self.params.is_peg_active(0) {
            record.flags.insert(BlockFlags::PEG_ENABLED);
        }
        if stake_entropy_bit(&hash) {
            record.flags.insert(BlockFlags::STAKE_ENTROPY);
        }

        let txn = StoreTxn::new(self.store.as_ref());
        {
            let engine = UtxoEngine::new(&txn, &self.blocks);
            let peg = PegDb::new(&txn);
            let slot = BlockSlot {
                pos,
                height: 0,
                supply: 0,
            };
            connect_block(&engine, &peg, &block, slot, &self.params)?;
            engine.tx_db().write_block_index(&record)?;
            engine.tx_db().write_best(&hash);
        }
        txn.commit()?;

        let id = self.index.insert(record, None)?;
        self.index.set_best(id);
        tracing::info!("[pc-08] 🌱 Genesis block {} written", short_hash(&hash));
        Ok(())
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    pub fn params(&self) -> &ChainParams {
        &self.params
    }

    pub fn config(&self) -> &ChainConfig {
        &self.config
    }

    pub fn index(&self) -> &ChainIndex {
        &self.index
    }

    pub fn mempool(&self) -> &Mempool {
        &self.mempool
    }

    pub fn orphan_block_count(&self) -> usize {
        self.orphans.len()
    }

    pub fn best_height(&self) -> u32 {
        self.index.best_height()
    }

    pub fn best_hash(&self) -> Hash {
        self.index
            .best()
            .map(|id| self.index.get(id).hash)
            .unwrap_or_default()
    }

    pub fn best_trust(&self) -> U256 {
        self.index
            .best()
            .map(|id| self.index.get(id).chain_trust)
            .unwrap_or_default()
    }

    pub fn best_invalid_trust(&self) -> U256 {
        self.best_invalid_trust
    }

    pub fn contains_block(&self, hash: &Hash) -> bool {
        self.index.contains(hash)
    }

    pub fn block_index(&self, hash: &Hash) -> Option<&BlockIndex> {
        self.index.lookup(hash).map(|id| self.index.get(id))
    }

    pub fn read_block(&self, hash: &Hash) -> ChainResult<Option<Arc<Block>>> {
        match self.block_index(hash) {
            Some(record) => Ok(Some(self.blocks.read_block(&record.pos)?)),
            None => Ok(None),
        }
    }

    /// Supply index in effect for the best block.
    pub fn peg_supply_index(&mut self) -> u32 {
        match self.index.best() {
            Some(best) => self.index.peg_supply_index(best, &self.params),
            None => 0,
        }
    }

    pub fn tx_index(&self, txid: &Hash) -> ChainResult<Option<TxIndex>> {
        self.read_view(|txdb, _| Ok(txdb.read_tx_index(txid)?))
    }

    /// Committed transaction by id, read back from its block.
    pub fn transaction(&self, txid: &Hash) -> ChainResult<Option<Transaction>> {
        match self.tx_index(txid)? {
            Some(TxIndex {
                pos: TxPos::Disk { block, index },
                ..
            }) => Ok(Some(self.blocks.read_tx(&block, index)?)),
            _ => Ok(None),
        }
    }

    pub fn fractions(&self, outpoint: &OutPoint) -> ChainResult<Option<Fractions>> {
        self.read_view(|_, peg| Ok(peg.read_fractions(outpoint)?))
    }

    pub fn balance(&self, address: &Address) -> ChainResult<Balance> {
        self.read_view(|_, peg| Ok(peg.balance(address)?))
    }

    pub fn ledger(&self, address: &Address) -> ChainResult<Vec<LedgerRecord>> {
        self.read_view(|_, peg| Ok(peg.ledger(address)?))
    }

    pub fn frozen_queue(&self) -> ChainResult<Vec<FrozenEntry>> {
        self.read_view(|_, peg| Ok(peg.frozen_queue()?))
    }

    /// Runs `f` against a read-only storage transaction.
    fn read_view<T>(&self, f: impl FnOnce(&TxDb<'_>, &PegDb<'_>) -> ChainResult<T>) -> ChainResult<T> {
        let txn = StoreTxn::new(self.store.as_ref());
        let result = {
            let txdb = TxDb::new(&txn);
            let peg = PegDb::new(&txn);
            f(&txdb, &peg)
        };
        txn.abort();
        result
    }

    pub fn flush(&self) -> ChainResult<()> {
        Ok(self.blocks.flush()?)
    }

    fn best_id(&self) -> ChainResult<BlockId> {
        self.index
            .best()
            .ok_or(ChainError::UnknownBlock(self.params.genesis_hash()))
    }

    // ------------------------------------------------------------------
    // Blocks
    // ------------------------------------------------------------------

    /// Entry point for a block from a peer (`from`) or a local source.
    /// Protocol violations charge the peer through the notifier.
    pub fn process_block(&mut self, block: Block, from: Option<PeerId>) -> ChainResult<BlockStatus> {
        let hash = block.hash();
        let result = self.process_block_inner(block);
        if let Err(err) = &result {
            if err.is_soft() {
                tracing::debug!("[pc-08] Block {} ignored: {}", short_hash(&hash), err);
            } else if err.is_fatal() {
                tracing::error!("[pc-08] Block {} hit a local failure: {}", short_hash(&hash), err);
            } else {
                tracing::warn!("[pc-08] ❌ Block {} rejected: {}", short_hash(&hash), err);
            }
            let score = err.dos_score();
            if let (Some(peer), true) = (from, score > 0) {
                self.notifier.misbehaving(peer, score);
            }
        }
        result
    }

    fn process_block_inner(&mut self, block: Block) -> ChainResult<BlockStatus> {
        let hash = block.hash();
        if self.index.contains(&hash) {
            return Err(ChainError::DuplicateBlock(hash));
        }
        if self.orphans.contains(&hash) {
            return Err(ChainError::DuplicateOrphan(hash));
        }
        if let Some((prevout, time)) = block.proof_of_stake() {
            if self.index.is_stake_seen(&prevout, time) {
                return Err(ChainError::DuplicateStake { prevout, time });
            }
        }

        check_block(&block, &self.params, CheckFlags::default())?;

        if !self.index.contains(&block.header.prev_hash) {
            let missing = self.orphans.missing_root(&block.header.prev_hash);
            tracing::debug!(
                "[pc-08] Orphan block {} (missing {})",
                short_hash(&hash),
                short_hash(&missing)
            );
            self.orphans.add(block);
            let evicted = self.orphans.limit(self.config.max_orphan_blocks);
            if evicted > 0 {
                tracing::debug!("[pc-08] Orphan block pool full, evicted {}", evicted);
            }
            return Ok(BlockStatus::Orphan { missing });
        }

        let status = self.accept_block(block)?;
        self.process_orphans(hash);
        Ok(status)
    }

    /// Accepts orphans that were waiting on `parent`, breadth first.
    fn process_orphans(&mut self, parent: Hash) {
        let mut work = VecDeque::from([parent]);
        while let Some(parent) = work.pop_front() {
            for child in self.orphans.children_of(&parent) {
                let Some(block) = self.orphans.remove(&child) else {
                    continue;
                };
                match self.accept_block(block) {
                    Ok(_) => work.push_back(child),
                    Err(err) => {
                        let dropped = self.orphans.remove_descendants(&child);
                        tracing::debug!(
                            "[pc-08] Dropping orphan block {} and {} descendants: {}",
                            short_hash(&child),
                            dropped.len(),
                            err
                        );
                    }
                }
            }
        }
    }

    /// Contextual checks against the parent, then indexing and fork choice.
    fn accept_block(&mut self, block: Block) -> ChainResult<BlockStatus> {
        let hash = block.hash();
        let prev = self
            .index
            .lookup(&block.header.prev_hash)
            .ok_or(ChainError::UnknownBlock(block.header.prev_hash))?;
        let parent = self.index.get(prev);
        if parent.is_failed() {
            return Err(ChainError::InvalidParent(parent.hash));
        }
        let height = parent.height + 1;
        let prev_modifier = parent.stake_modifier;
        let prev_trust = parent.chain_trust;
        let header = &block.header;
        let proof_of_stake = block.is_proof_of_stake();

        let expected = next_target_required(&self.index, Some(prev), proof_of_stake, &self.params);
        if header.bits != expected {
            return Err(ChainError::BadDifficulty {
                expected,
                actual: header.bits,
            });
        }
        let median = self.index.median_time_past(prev);
        if header.time <= median {
            return Err(ChainError::TimeTooOld {
                time: header.time,
                median,
            });
        }
        let limit = self
            .clock
            .adjusted_time()
            .saturating_add(self.params.max_future_drift);
        if header.time > limit {
            return Err(ChainError::TimeTooNew {
                time: header.time,
                limit,
            });
        }
        if !proof_of_stake && height > self.params.last_pow_height {
            return Err(ChainError::PowAfterLastHeight(height));
        }
        if let Some(tx) = block
            .transactions
            .iter()
            .find(|tx| !tx.is_final(height, header.time))
        {
            return Err(ChainError::NonFinalTx(tx.txid()));
        }
        if !self.params.checkpoint_matches(height, &hash) {
            return Err(ChainError::CheckpointMismatch(height));
        }

        let mut record = BlockIndex::new(hash, header.clone(), height);
        let proof = match block.proof_of_stake() {
            Some((prevout, time)) => {
                let input = self.stake_input(&prevout)?;
                let kernel = check_stake_kernel(&prev_modifier, header.bits, &input, time, &self.params)?;
                record.flags.insert(BlockFlags::PROOF_OF_STAKE);
                record.prevout_stake = Some(prevout);
                record.stake_time = time;
                record.peg_vote = parse_vote(&block.transactions[1]);
                record.staker = block_staker(&block).or(input.owner);
                kernel
            }
            None => hash,
        };
        record.stake_modifier = compute_stake_modifier(&prev_modifier, &proof);
        record.chain_trust = prev_trust.saturating_add(block_trust(header.bits));
        if self.params.is_peg_active(height) {
            record.flags.insert(BlockFlags::PEG_ENABLED);
        }
        if stake_entropy_bit(&hash) {
            record.flags.insert(BlockFlags::STAKE_ENTROPY);
        }

        record.pos = self.blocks.write_block(&block)?;
        self.persist_record(&record)?;
        let id = self.index.insert(record, Some(prev))?;

        let best = self.best_id()?;
        let decision = choose_fork(&self.index, best, id, &self.params);
        if decision == ForkDecision::TrustedStaker {
            tracing::info!(
                "[pc-08] Deep fork at {} built by a trusted staker, switching",
                short_hash(&hash)
            );
        }
        let is_best = decision.switches();
        if is_best {
            self.set_best_chain(id)?;
            self.notifier.announce(Inventory::Block(hash));
        } else {
            tracing::debug!(
                "[pc-08] Block {} at height {} stored on a side branch",
                short_hash(&hash),
                height
            );
        }
        Ok(BlockStatus::Accepted {
            height,
            best: is_best,
        })
    }

    /// Resolves the staked output from the committed chain.
    fn stake_input(&self, prevout: &OutPoint) -> ChainResult<StakeInput> {
        let blocks = &self.blocks;
        let found = self.read_view(|txdb, _| {
            let Some(tx_index) = txdb.read_tx_index(&prevout.txid)? else {
                return Ok(None);
            };
            let TxPos::Disk { block, index } = tx_index.pos else {
                return Ok(None);
            };
            let tx = blocks.read_tx(&block, index)?;
            Ok(tx.outputs.get(prevout.n as usize).map(|out| StakeInput {
                prevout: *prevout,
                value: out.value,
                tx_time: tx.time,
                owner: out.script_pubkey.address(),
            }))
        })?;
        found.ok_or_else(|| KernelError::MissingStakeInput(*prevout).into())
    }

    fn persist_record(&self, record: &BlockIndex) -> ChainResult<()> {
        let txn = StoreTxn::new(self.store.as_ref());
        TxDb::new(&txn).write_block_index(record)?;
        txn.commit()?;
        Ok(())
    }

    /// Moves the best chain to `target`, reorganizing if it is not a
    /// direct extension of the current tip.
    fn set_best_chain(&mut self, target: BlockId) -> ChainResult<()> {
        let best = self.best_id()?;
        let target_hash = self.index.get(target).hash;
        let plan = plan_reorg(&self.index, best, target).ok_or(ChainError::UnknownBlock(target_hash))?;
        if !plan.disconnect.is_empty() {
            tracing::info!(
                "[pc-08] 🔀 REORGANIZE: disconnect {} blocks, connect {} blocks, fork at height {}",
                plan.disconnect.len(),
                plan.connect.len(),
                self.index.get(plan.fork).height
            );
        }

        let applied = match apply_reorg(
            self.store.as_ref(),
            &self.blocks,
            &mut self.index,
            &self.params,
            &plan,
            &target_hash,
        ) {
            Ok(applied) => applied,
            Err(ReorgFailure::Invalid { id, error }) => {
                let failed: Vec<BlockId> = plan.connect.iter().copied().skip_while(|c| *c != id).collect();
                self.invalid_chain_found(&failed, &error)?;
                return Err(error);
            }
            Err(ReorgFailure::Local(error)) => {
                tracing::error!("[pc-08] Reorganization aborted: {}", error);
                return Err(error);
            }
        };

        for id in &plan.disconnect {
            if let Some(prev) = self.index.prev(*id) {
                self.index.set_next(prev, None);
            }
        }
        for id in &plan.connect {
            if let Some(prev) = self.index.prev(*id) {
                self.index.set_next(prev, Some(*id));
            }
        }
        self.index.set_best(target);
        if !plan.disconnect.is_empty() {
            tracing::info!("[pc-08] 🔀 REORGANIZE: done");
        }
        tracing::info!(
            "[pc-08] ✅ New best block: height={} hash={} trust={}",
            self.index.get(target).height,
            short_hash(&target_hash),
            self.index.get(target).chain_trust
        );

        self.after_reorg(applied);
        Ok(())
    }

    /// Flags `failed` (a failing block and the candidate blocks above it)
    /// and remembers the trust they claimed.
    fn invalid_chain_found(&mut self, failed: &[BlockId], error: &ChainError) -> ChainResult<()> {
        for id in failed {
            self.index.mark_failed(*id);
            let record = self.index.get(*id).clone();
            self.persist_record(&record)?;
            if record.chain_trust > self.best_invalid_trust {
                self.best_invalid_trust = record.chain_trust;
            }
        }
        if let Some(first) = failed.first() {
            let record = self.index.get(*first);
            tracing::warn!(
                "[pc-08] ⚠️ Invalid block {} at height {}: {}",
                short_hash(&record.hash),
                record.height,
                error
            );
        }
        if self.best_invalid_trust > self.best_trust() {
            tracing::warn!("[pc-08] ⚠️ An invalid chain claims more trust than the best chain");
        }
        Ok(())
    }

    /// Mempool upkeep and subscriber events after a committed reorg.
    fn after_reorg(&mut self, applied: AppliedReorg) {
        let AppliedReorg {
            disconnected,
            connected,
        } = applied;
        for (_, block) in &connected {
            self.mempool.remove_for_block(&block.transactions);
        }

        if !disconnected.is_empty() {
            let Ok(best) = self.best_id() else {
                return;
            };
            let supply = self.index.peg_supply_index(best, &self.params);
            let view = chain_view(
                &self.params,
                &self.store,
                &self.blocks,
                &self.index,
                self.clock.as_ref(),
                supply,
            );
            let checkpoint = self.params.last_checkpoint_height();
            let mut resubmitted = 0;
            for (height, block) in disconnected.iter().rev() {
                if *height <= checkpoint {
                    continue;
                }
                for tx in &block.transactions {
                    if tx.is_coinbase() || tx.is_coinstake() {
                        continue;
                    }
                    match self.mempool.process(tx.clone(), &view) {
                        Ok(admitted) => resubmitted += admitted.len(),
                        Err(err) => tracing::debug!(
                            "[pc-08] Not resubmitting {}: {}",
                            short_hash(&tx.txid()),
                            err
                        ),
                    }
                }
            }
            tracing::debug!("[pc-08] Resubmitted {} transactions to the mempool", resubmitted);
        }

        for subscriber in &self.subscribers {
            for (height, block) in &disconnected {
                subscriber.block_disconnected(block, *height);
            }
            for (height, block) in &connected {
                subscriber.block_connected(block, *height);
            }
        }
    }

    // ------------------------------------------------------------------
    // Transactions
    // ------------------------------------------------------------------

    /// Admits a loose transaction and any orphans it unblocks.
    pub fn accept_to_memory_pool(&mut self, tx: Transaction, from: Option<PeerId>) -> ChainResult<Vec<Hash>> {
        let best = self.best_id()?;
        let supply = self.index.peg_supply_index(best, &self.params);
        let view = chain_view(
            &self.params,
            &self.store,
            &self.blocks,
            &self.index,
            self.clock.as_ref(),
            supply,
        );
        match self.mempool.process(tx, &view) {
            Ok(accepted) => {
                for txid in &accepted {
                    if let Some(entry) = self.mempool.pool().get(txid) {
                        for subscriber in &self.subscribers {
                            subscriber.transaction_accepted(&entry.tx);
                        }
                    }
                    self.notifier.announce(Inventory::Tx(*txid));
                }
                tracing::debug!(
                    "[pc-08] Accepted {} transaction(s), {} pooled",
                    accepted.len(),
                    self.mempool.len()
                );
                Ok(accepted)
            }
            Err(err) => {
                let score = err.dos_score();
                if let (Some(peer), true) = (from, score > 0) {
                    self.notifier.misbehaving(peer, score);
                }
                Err(err.into())
            }
        }
    }
}

fn chain_view<'a>(
    params: &'a ChainParams,
    store: &'a Arc<dyn KeyValueStore>,
    blocks: &'a BlockStore,
    index: &ChainIndex,
    clock: &dyn TimeSource,
    supply: u32,
) -> ChainView<'a> {
    let (next_height, tip_time) = index
        .best()
        .map(|id| (index.get(id).height + 1, index.get(id).time()))
        .unwrap_or_default();
    ChainView {
        params,
        store: store.as_ref(),
        blocks,
        next_height,
        tip_time,
        adjusted_time: clock.adjusted_time(),
        supply,
    }
}
