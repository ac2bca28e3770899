//! Chain-wide properties: randomized fork choice, maturity, double
//! spends, and restart from disk.

use crate::fixtures::{p2pkh, signed_spend, TestChain};
use pc_02_block_storage::{FileBackedKVStore, FlatFileBlockStore, FlatFileConfig};
use pc_04_utxo::UtxoError;
use pc_08_consensus::{BlockStatus, ChainError};
use primitive_types::U256;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use shared_types::{Block, ChainParams, OutPoint, TxOut, CENT, COIN};
use std::sync::Arc;
use tempfile::TempDir;

#[test]
fn test_best_trust_never_decreases_under_shuffled_delivery() {
    let mut rng = StdRng::seed_from_u64(0x5eed);
    for _ in 0..8 {
        let mut chain = TestChain::new();
        let genesis = chain.state.best_hash();
        let lengths: Vec<u32> = (0..3).map(|_| rng.gen_range(1..=3)).collect();
        let branches: Vec<Vec<Block>> = lengths
            .iter()
            .zip(1u8..)
            .map(|(len, tag)| chain.branch(genesis, 0, *len, tag))
            .collect();

        let mut delivery: Vec<Block> = branches.iter().flatten().cloned().collect();
        delivery.shuffle(&mut rng);

        let mut trust = chain.state.best_trust();
        for block in delivery {
            chain.submit(block).unwrap();
            let now = chain.state.best_trust();
            assert!(now >= trust);
            trust = now;
        }

        let longest = *lengths.iter().max().unwrap();
        assert_eq!(chain.state.best_height(), longest);
        assert_eq!(chain.state.orphan_block_count(), 0);
        let winners: Vec<_> = branches
            .iter()
            .filter(|b| b.len() as u32 == longest)
            .map(|b| b[b.len() - 1].hash())
            .collect();
        assert!(winners.contains(&chain.state.best_hash()));
        if winners.len() == 1 {
            assert_eq!(chain.state.best_hash(), winners[0]);
        }
        assert!(chain.state.best_trust() > U256::zero());
    }
}

#[test]
fn test_coinbase_spendable_only_after_maturity() {
    let mut chain = TestChain::new();
    let mined = chain.extend(1);
    let coinbase = mined[0].transactions[0].clone();
    let spend = chain.spend_coinbase(&coinbase, CENT, chain.time_at(1));

    let early = chain.mine_on(chain.state.best_hash(), 2, 0, vec![spend.clone()]);
    let err = chain.submit(early).unwrap_err();
    assert!(matches!(
        err,
        ChainError::Tx {
            source: UtxoError::Immature { depth: 1, .. },
            ..
        }
    ));
    assert_eq!(chain.state.best_height(), 1);

    chain.extend(1);
    let block = chain.mine_tip(vec![spend.clone()]);
    assert_eq!(chain.state.best_hash(), block.hash());
    assert!(chain.state.tx_index(&spend.txid()).unwrap().is_some());
}

#[test]
fn test_double_spend_in_one_block_refused() {
    let mut chain = TestChain::new();
    let mined = chain.extend(3);
    let coinbase = &mined[0].transactions[0];
    let first = chain.spend_coinbase(coinbase, CENT, chain.time_at(3));
    let second = chain.spend_coinbase(coinbase, 2 * CENT, chain.time_at(3));
    let tip = chain.state.best_hash();

    let block = chain.mine_on(tip, 4, 0, vec![first, second]);
    let err = chain.submit(block).unwrap_err();
    assert!(matches!(
        err,
        ChainError::Tx {
            source: UtxoError::DoubleSpend(prevout),
            ..
        } if prevout == OutPoint::new(coinbase.txid(), 0)
    ));
    assert_eq!(chain.state.best_hash(), tip);
}

#[test]
fn test_spend_of_spent_output_refused() {
    let mut chain = TestChain::new();
    let mined = chain.extend(3);
    let coinbase = &mined[0].transactions[0];
    let first = chain.spend_coinbase(coinbase, CENT, chain.time_at(3));
    chain.mine_tip(vec![first]);

    let again = signed_spend(
        &chain.miner,
        OutPoint::new(coinbase.txid(), 0),
        vec![TxOut::new(COIN, p2pkh(&chain.miner))],
        chain.time_at(4),
    );
    let block = chain.mine_on(chain.state.best_hash(), 5, 0, vec![again]);
    assert!(matches!(
        chain.submit(block).unwrap_err(),
        ChainError::Tx {
            source: UtxoError::DoubleSpend(_),
            ..
        }
    ));
    assert_eq!(chain.state.best_height(), 4);
}

#[test]
fn test_restart_from_disk_keeps_chain_and_peg_state() {
    let dir = TempDir::new().unwrap();
    let params = ChainParams::regtest();
    let open = || {
        TestChain::with_stores(
            params.clone(),
            Arc::new(FileBackedKVStore::open(dir.path().join("chainstate.db")).unwrap()),
            Arc::new(
                FlatFileBlockStore::open(FlatFileConfig::new(dir.path().join("blocks"), params.magic))
                    .unwrap(),
            ),
        )
    };

    let mut chain = open();
    let mined = chain.extend(3);
    let spend = chain.spend_coinbase(&mined[0].transactions[0], CENT, chain.time_at(3));
    let tip = chain.mine_tip(vec![spend.clone()]);
    let balance = chain.state.balance(&chain.miner.address()).unwrap();
    let fractions = chain.state.fractions(&OutPoint::new(spend.txid(), 0)).unwrap();
    chain.state.flush().unwrap();
    drop(chain);

    let mut reopened = open();
    assert_eq!(reopened.state.best_hash(), tip.hash());
    assert_eq!(reopened.state.best_height(), 4);
    assert_eq!(reopened.state.balance(&reopened.miner.address()).unwrap(), balance);
    assert_eq!(
        reopened.state.fractions(&OutPoint::new(spend.txid(), 0)).unwrap(),
        fractions
    );
    assert_eq!(
        reopened.state.transaction(&spend.txid()).unwrap(),
        Some(spend)
    );
    let next = reopened.mine_on(tip.hash(), 5, 0, Vec::new());
    assert_eq!(
        reopened.submit(next).unwrap(),
        BlockStatus::Accepted { height: 5, best: true }
    );
}

#[test]
fn test_failed_orphan_takes_its_cached_children_along() {
    let mut chain = TestChain::new();
    let mined = chain.extend(2);
    let p3 = chain.mine_on(mined[1].hash(), 3, 0, Vec::new());
    let stale = chain.params().genesis_time;
    let x4 = chain.pow_block(p3.hash(), 4, 0, stale, Vec::new());
    let y5 = chain.mine_on(x4.hash(), 5, 0, Vec::new());
    let z6 = chain.mine_on(y5.hash(), 6, 0, Vec::new());

    for block in [x4, y5, z6] {
        assert!(matches!(
            chain.submit(block).unwrap(),
            BlockStatus::Orphan { missing } if missing == p3.hash()
        ));
    }
    assert_eq!(chain.state.orphan_block_count(), 3);

    assert_eq!(
        chain.submit(p3.clone()).unwrap(),
        BlockStatus::Accepted { height: 3, best: true }
    );
    assert_eq!(chain.state.orphan_block_count(), 0);
    assert_eq!(chain.state.best_hash(), p3.hash());
}
