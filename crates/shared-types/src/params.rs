//! # Chain Parameters
//!
//! One plain struct carries every consensus constant; [`Network`] selects a
//! preset. Height-dependent rules are methods on `ChainParams`, never
//! separate parameter types.
//!
//! | Parameter | Main | Test | Regtest |
//! |-----------|------|------|---------|
//! | coinbase maturity | 120 | 20 | 2 |
//! | target spacing | 64s | 64s | 64s |
//! | PoW/PoS limit | `!0 >> 20` | `!0 >> 16` | `!0 >> 1` |
//! | peg start / interval | 20000 / 200 | 1000 / 50 | 0 / 10 |
//! | freeze F / V | 30d / 30d | 1d / 2d | 100s / 200s |

use crate::codec::Encodable;
use crate::entities::{
    merkle_root, Address, Amount, Block, BlockHeader, Hash, OutPoint, Transaction, TxIn, TxOut,
    CENT, COIN, MAX_MONEY,
};
use crate::script::Script;
use crate::target::encode_compact;
use primitive_types::U256;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

const DAY: u32 = 24 * 60 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Network {
    Main,
    Test,
    Regtest,
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Network::Main => "main",
            Network::Test => "test",
            Network::Regtest => "regtest",
        };
        f.write_str(name)
    }
}

impl FromStr for Network {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "main" | "mainnet" => Ok(Network::Main),
            "test" | "testnet" => Ok(Network::Test),
            "regtest" => Ok(Network::Regtest),
            other => Err(format!("unknown network '{other}'")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ChainParams {
    pub network: Network,
    /// Block-file record magic.
    pub magic: [u8; 4],

    // Value and size limits
    pub max_money: Amount,
    pub max_block_size: usize,
    pub max_block_sigops: u32,
    pub max_standard_tx_size: usize,

    // Timing
    pub coinbase_maturity: u32,
    pub stake_min_age: u32,
    pub target_spacing: u32,
    pub target_timespan: u32,
    pub max_future_drift: u32,

    // Difficulty
    pub pow_limit: U256,
    pub pos_limit: U256,
    /// Keep every target at its limit (regression testing).
    pub no_retarget: bool,
    pub last_pow_height: u32,

    // Rewards
    pub pow_reward: Amount,
    pub pow_halving_interval: u32,
    /// Stake reward before the peg activates.
    pub stake_reward_base: Amount,
    pub stake_reward_v: Amount,
    pub stake_reward_f: Amount,
    pub stake_reward_reserve: Amount,
    pub stake_reward_liquid: Amount,

    // Fees
    pub min_tx_fee: Amount,
    pub min_relay_fee: Amount,
    pub peg_fee_per_io: Amount,

    // Peg
    pub peg_start_height: u32,
    pub peg_interval: u32,
    pub freeze_duration_f: u32,
    pub freeze_duration_v: u32,

    // Policy
    pub require_standard: bool,
    pub checkpoints: BTreeMap<u32, Hash>,
    pub trusted_stakers: BTreeSet<Address>,
    /// Fork depth beyond which a trusted staker may win a trust tie.
    pub staker_tiebreak_depth: u32,

    // Genesis
    pub genesis_time: u32,
    pub genesis_message: &'static str,
}

impl ChainParams {
    pub fn for_network(network: Network) -> Self {
        match network {
            Network::Main => Self::main(),
            Network::Test => Self::test(),
            Network::Regtest => Self::regtest(),
        }
    }

    pub fn main() -> Self {
        let mut params = Self {
            network: Network::Main,
            magic: [0x70, 0x35, 0x22, 0x05],
            max_money: 1_000_000_000 * COIN,
            max_block_size: 1_000_000,
            max_block_sigops: 1_000_000 / 50,
            max_standard_tx_size: 100_000,
            coinbase_maturity: 120,
            stake_min_age: 8 * 60 * 60,
            target_spacing: 64,
            target_timespan: 16 * 60,
            max_future_drift: 15,
            pow_limit: U256::MAX >> 20,
            pos_limit: U256::MAX >> 20,
            no_retarget: false,
            last_pow_height: 10_000,
            pow_reward: 50 * COIN,
            pow_halving_interval: 100_000,
            stake_reward_base: 4 * COIN,
            stake_reward_v: 8 * COIN,
            stake_reward_f: 6 * COIN,
            stake_reward_reserve: 5 * COIN,
            stake_reward_liquid: 4 * COIN,
            min_tx_fee: CENT / 100,
            min_relay_fee: CENT / 50,
            peg_fee_per_io: CENT / 100,
            peg_start_height: 20_000,
            peg_interval: 200,
            freeze_duration_f: 30 * DAY,
            freeze_duration_v: 30 * DAY,
            require_standard: true,
            checkpoints: BTreeMap::new(),
            trusted_stakers: BTreeSet::new(),
            staker_tiebreak_depth: 20,
            genesis_time: 1_700_000_000,
            genesis_message: "peg chain main genesis",
        };
        params.checkpoints.insert(0, params.genesis_hash());
        params
    }

    pub fn test() -> Self {
        let mut params = Self {
            network: Network::Test,
            magic: [0xcd, 0xf2, 0xc0, 0xef],
            coinbase_maturity: 20,
            stake_min_age: 60 * 60,
            pow_limit: U256::MAX >> 16,
            pos_limit: U256::MAX >> 16,
            last_pow_height: 2_000,
            peg_start_height: 1_000,
            peg_interval: 50,
            freeze_duration_f: DAY,
            freeze_duration_v: 2 * DAY,
            require_standard: false,
            genesis_time: 1_700_000_100,
            genesis_message: "peg chain test genesis",
            checkpoints: BTreeMap::new(),
            ..Self::main()
        };
        params.checkpoints.insert(0, params.genesis_hash());
        params
    }

    pub fn regtest() -> Self {
        let mut params = Self {
            network: Network::Regtest,
            magic: [0xfa, 0xbf, 0xb5, 0xda],
            max_money: MAX_MONEY,
            coinbase_maturity: 2,
            stake_min_age: 0,
            pow_limit: U256::MAX >> 1,
            pos_limit: U256::MAX >> 1,
            no_retarget: true,
            last_pow_height: 100_000,
            peg_start_height: 0,
            peg_interval: 10,
            freeze_duration_f: 100,
            freeze_duration_v: 200,
            require_standard: true,
            genesis_time: 1_700_000_200,
            genesis_message: "peg chain regtest genesis",
            checkpoints: BTreeMap::new(),
            ..Self::main()
        };
        params.checkpoints.insert(0, params.genesis_hash());
        params
    }

    /// Expected number of blocks per retarget window.
    pub fn target_interval(&self) -> u32 {
        self.target_timespan / self.target_spacing
    }

    pub fn is_peg_active(&self, height: u32) -> bool {
        height >= self.peg_start_height
    }

    pub fn last_checkpoint_height(&self) -> u32 {
        self.checkpoints.keys().next_back().copied().unwrap_or(0)
    }

    /// False only when a checkpoint exists at `height` with another hash.
    pub fn checkpoint_matches(&self, height: u32, hash: &Hash) -> bool {
        self.checkpoints
            .get(&height)
            .map_or(true, |expected| expected == hash)
    }

    pub fn is_trusted_staker(&self, address: &Address) -> bool {
        self.trusted_stakers.contains(address)
    }

    pub fn genesis_block(&self) -> Block {
        let script_sig = Script::new()
            .push_data(&self.genesis_time.to_le_bytes())
            .push_data(self.genesis_message.as_bytes());
        let coinbase = Transaction {
            version: 1,
            time: self.genesis_time,
            inputs: vec![TxIn {
                prevout: OutPoint::null(),
                script_sig,
                sequence: u32::MAX,
            }],
            outputs: vec![TxOut::empty()],
            lock_time: 0,
        };
        let header = BlockHeader {
            version: 1,
            prev_hash: [0u8; 32],
            merkle_root: merkle_root(&[coinbase.txid()]),
            time: self.genesis_time,
            bits: encode_compact(self.pow_limit),
            nonce: 0,
        };
        Block {
            header,
            transactions: vec![coinbase],
            signature: Vec::new(),
        }
    }

    pub fn genesis_hash(&self) -> Hash {
        self.genesis_block().header.hash()
    }

    /// Size in bytes of the genesis block's encoding.
    pub fn genesis_size(&self) -> usize {
        self.genesis_block().encoded_len()
    }
}
