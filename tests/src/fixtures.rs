//! # Chain Fixtures
//!
//! A regtest chain over in-memory stores with a manual clock and recording
//! adapters, plus builders for blocks and signed transactions.
//!
//! Blocks are stamped 64 seconds apart from genesis; the clock sits far
//! enough ahead that none of them is "too new".

use pc_02_block_storage::{BlockFileStore, InMemoryBlockFiles, InMemoryKVStore, KeyValueStore};
use pc_03_validator::{check_proof_of_work, sign_block};
use pc_07_rewards::{next_target_required, pow_reward};
use pc_08_consensus::{
    BlockStatus, ChainConfig, ChainResult, ChainState, ManualClock, RecordingNotifier,
    RecordingSubscriber,
};
use shared_types::target::encode_compact;
use shared_types::{
    Amount, Block, BlockHeader, ChainParams, Hash, KeyPair, OutPoint, Script, Transaction, TxIn,
    TxOut,
};
use std::sync::Arc;

/// Seconds between fixture blocks.
pub const BLOCK_SPACING: u32 = 64;

/// Builds a key from a one-byte seed.
pub fn key(seed: u8) -> KeyPair {
    KeyPair::from_secret(&[seed; 32]).expect("fixture secret is a valid scalar")
}

pub fn p2pkh(key: &KeyPair) -> Script {
    Script::p2pkh(&key.address())
}

/// A transaction spending `prevout` (locked to `owner`) into `outputs`,
/// signed by `owner`.
pub fn signed_spend(owner: &KeyPair, prevout: OutPoint, outputs: Vec<TxOut>, time: u32) -> Transaction {
    let mut tx = Transaction {
        version: 1,
        time,
        inputs: vec![TxIn::new(prevout)],
        outputs,
        lock_time: 0,
    };
    owner
        .sign_input(&mut tx, 0, &p2pkh(owner))
        .expect("fixture signing");
    tx
}

pub struct TestChain {
    pub state: ChainState,
    pub store: Arc<dyn KeyValueStore>,
    pub files: Arc<dyn BlockFileStore>,
    pub clock: Arc<ManualClock>,
    pub notifier: Arc<RecordingNotifier>,
    pub events: Arc<RecordingSubscriber>,
    /// Paid by every fixture coinbase.
    pub miner: KeyPair,
}

impl TestChain {
    pub fn new() -> Self {
        Self::with_params(ChainParams::regtest())
    }

    pub fn with_params(params: ChainParams) -> Self {
        Self::with_stores(
            params,
            Arc::new(InMemoryKVStore::new()),
            Arc::new(InMemoryBlockFiles::new()),
        )
    }

    /// Opens (or reopens) a chain over existing stores.
    pub fn with_stores(
        params: ChainParams,
        store: Arc<dyn KeyValueStore>,
        files: Arc<dyn BlockFileStore>,
    ) -> Self {
        let clock = Arc::new(ManualClock::new(params.genesis_time + 1_000_000));
        let notifier = Arc::new(RecordingNotifier::new());
        let events = Arc::new(RecordingSubscriber::new());
        let mut state = ChainState::open(params, ChainConfig::for_testing(), store.clone(), files.clone())
            .expect("open regtest chain")
            .with_notifier(notifier.clone())
            .with_time_source(clock.clone());
        state.subscribe(events.clone());
        Self {
            state,
            store,
            files,
            clock,
            notifier,
            events,
            miner: key(0x42),
        }
    }

    pub fn params(&self) -> &ChainParams {
        self.state.params()
    }

    pub fn time_at(&self, height: u32) -> u32 {
        self.params().genesis_time + height * BLOCK_SPACING
    }

    pub fn reward(&self, height: u32) -> Amount {
        pow_reward(height, 0, self.params())
    }

    pub fn coinbase(&self, height: u32, tag: u8, time: u32, value: Amount) -> Transaction {
        let mut input = TxIn::new(OutPoint::null());
        input.script_sig = Script::new()
            .push_data(&height.to_le_bytes())
            .push_data(&[tag]);
        Transaction {
            version: 1,
            time,
            inputs: vec![input],
            outputs: vec![TxOut::new(value, p2pkh(&self.miner))],
            lock_time: 0,
        }
    }

    /// PoW block on `parent` at `time`, ground until it meets the target.
    /// `tag` keeps sibling blocks at the same height distinct.
    pub fn pow_block(
        &self,
        parent: Hash,
        height: u32,
        tag: u8,
        time: u32,
        txs: Vec<Transaction>,
    ) -> Block {
        self.pow_block_paying(parent, height, tag, time, self.reward(height), txs)
    }

    /// [`Self::pow_block`] with an explicit coinbase value.
    pub fn pow_block_paying(
        &self,
        parent: Hash,
        height: u32,
        tag: u8,
        time: u32,
        value: Amount,
        txs: Vec<Transaction>,
    ) -> Block {
        let params = self.params();
        let mut transactions = vec![self.coinbase(height, tag, time, value)];
        transactions.extend(txs);
        let mut block = assemble(parent, time, encode_compact(params.pow_limit), transactions);
        while check_proof_of_work(&block.hash(), block.header.bits, params).is_err() {
            block.header.nonce += 1;
        }
        block
    }

    pub fn mine_on(&self, parent: Hash, height: u32, tag: u8, txs: Vec<Transaction>) -> Block {
        self.pow_block(parent, height, tag, self.time_at(height), txs)
    }

    /// Mines a branch of `count` blocks on `parent`, without submitting it.
    pub fn branch(&self, parent: Hash, parent_height: u32, count: u32, tag: u8) -> Vec<Block> {
        let mut blocks: Vec<Block> = Vec::with_capacity(count as usize);
        for height in parent_height + 1..=parent_height + count {
            let prev = blocks.last().map_or(parent, Block::hash);
            blocks.push(self.mine_on(prev, height, tag, Vec::new()));
        }
        blocks
    }

    /// Mines and submits `count` empty blocks on the best tip.
    pub fn extend(&mut self, count: u32) -> Vec<Block> {
        (0..count)
            .map(|_| self.mine_tip(Vec::new()))
            .collect()
    }

    /// Mines `txs` into a block on the best tip and submits it.
    pub fn mine_tip(&mut self, txs: Vec<Transaction>) -> Block {
        let height = self.state.best_height() + 1;
        let block = self.mine_on(self.state.best_hash(), height, 0, txs);
        assert_eq!(
            self.submit(block.clone()).expect("fixture block accepted"),
            BlockStatus::Accepted { height, best: true }
        );
        block
    }

    pub fn submit(&mut self, block: Block) -> ChainResult<BlockStatus> {
        self.state.process_block(block, None)
    }

    /// Spends output 0 of a fixture coinbase back to the miner, paying `fee`.
    pub fn spend_coinbase(&self, coinbase: &Transaction, fee: Amount, time: u32) -> Transaction {
        signed_spend(
            &self.miner,
            OutPoint::new(coinbase.txid(), 0),
            vec![TxOut::new(coinbase.outputs[0].value - fee, p2pkh(&self.miner))],
            time,
        )
    }

    /// PoS block on the best tip staking output 0 of `stake` (a miner-owned
    /// transaction), claiming `reward` on top of the staked value.
    pub fn stake_block(&self, stake: &Transaction, reward: Amount, time: u32) -> Block {
        self.stake_block_on(
            self.state.best_hash(),
            self.state.best_height(),
            stake,
            reward,
            time,
        )
    }

    /// [`Self::stake_block`] on an arbitrary indexed `parent`.
    pub fn stake_block_on(
        &self,
        prev: Hash,
        parent_height: u32,
        stake: &Transaction,
        reward: Amount,
        time: u32,
    ) -> Block {
        let params = self.params();
        let height = parent_height + 1;

        let mut coinbase = self.coinbase(height, 0, time, 0);
        coinbase.outputs = vec![TxOut::empty()];
        let coinstake = signed_spend(
            &self.miner,
            OutPoint::new(stake.txid(), 0),
            vec![
                TxOut::empty(),
                TxOut::new(stake.outputs[0].value + reward, p2pkh(&self.miner)),
            ],
            time,
        );
        let prev_id = self.state.index().lookup(&prev);
        let bits = next_target_required(self.state.index(), prev_id, true, params);
        let mut block = assemble(prev, time, bits, vec![coinbase, coinstake]);
        sign_block(&mut block, &self.miner).expect("fixture block signing");
        block
    }
}

impl Default for TestChain {
    fn default() -> Self {
        Self::new()
    }
}

fn assemble(parent: Hash, time: u32, bits: u32, transactions: Vec<Transaction>) -> Block {
    let txids: Vec<Hash> = transactions.iter().map(Transaction::txid).collect();
    Block {
        header: BlockHeader {
            version: 1,
            prev_hash: parent,
            merkle_root: shared_types::merkle_root(&txids),
            time,
            bits,
            nonce: 0,
        },
        transactions,
        signature: Vec::new(),
    }
}
