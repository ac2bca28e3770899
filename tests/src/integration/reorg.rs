//! Deep reorganizations across the full connect/disconnect path.

use crate::fixtures::{p2pkh, signed_spend, TestChain};
use pc_08_consensus::{BlockStatus, ChainError, RecordedEvent};
use shared_types::{Block, Hash, OutPoint, TxOut, CENT};

/// Mines 97 empty blocks, then 98..=100 each carrying one spend of an early
/// coinbase. Returns the chain, the mined blocks and the spends' txids.
fn chain_at_100() -> (TestChain, Vec<Block>, Vec<Hash>) {
    let mut chain = TestChain::new();
    let mut mined = chain.extend(97);
    let mut spends = Vec::new();
    for height in 98..=100u32 {
        let source = mined[(height - 98) as usize].transactions[0].clone();
        let tx = chain.spend_coinbase(&source, CENT, chain.time_at(height - 1));
        spends.push(tx.txid());
        mined.push(chain.mine_tip(vec![tx]));
    }
    assert_eq!(chain.state.best_height(), 100);
    (chain, mined, spends)
}

#[test]
fn test_reorg_from_100_to_103_resubmits_spends() {
    let (mut chain, mined, spends) = chain_at_100();
    let fork = mined[96].hash();
    chain.events.clear();

    let side = chain.branch(fork, 97, 6, 1);
    for (block, height) in side.iter().zip(98..=100) {
        assert_eq!(
            chain.submit(block.clone()).unwrap(),
            BlockStatus::Accepted { height, best: false }
        );
    }
    for (block, height) in side[3..].iter().zip(101..) {
        assert_eq!(
            chain.submit(block.clone()).unwrap(),
            BlockStatus::Accepted { height, best: true }
        );
    }

    assert_eq!(chain.state.best_height(), 103);
    assert_eq!(chain.state.best_hash(), side[5].hash());

    let mut expected = vec![
        RecordedEvent::Disconnected { hash: mined[99].hash(), height: 100 },
        RecordedEvent::Disconnected { hash: mined[98].hash(), height: 99 },
        RecordedEvent::Disconnected { hash: mined[97].hash(), height: 98 },
    ];
    expected.extend(side.iter().zip(98..).map(|(block, height)| RecordedEvent::Connected {
        hash: block.hash(),
        height,
    }));
    let connected: Vec<RecordedEvent> = chain
        .events
        .events()
        .into_iter()
        .filter(|e| matches!(e, RecordedEvent::Connected { .. } | RecordedEvent::Disconnected { .. }))
        .collect();
    assert_eq!(connected, expected);

    for txid in &spends {
        assert_eq!(chain.state.tx_index(txid).unwrap(), None);
        assert!(chain.state.mempool().contains(txid));
    }
    for block in &mined[97..] {
        let coinbase = block.transactions[0].txid();
        assert_eq!(chain.state.tx_index(&coinbase).unwrap(), None);
        assert_eq!(chain.state.fractions(&OutPoint::new(coinbase, 0)).unwrap(), None);
    }
    let tip_coinbase = side[5].transactions[0].txid();
    assert!(chain.state.fractions(&OutPoint::new(tip_coinbase, 0)).unwrap().is_some());

    let pooled: Vec<_> = spends
        .iter()
        .map(|txid| chain.state.mempool().pool().get(txid).unwrap().tx.clone())
        .collect();
    let block = chain.mine_tip(pooled);
    assert_eq!(chain.state.best_height(), 104);
    for txid in &spends {
        assert!(chain.state.tx_index(txid).unwrap().is_some());
    }
    assert_eq!(block.transactions.len(), 4);
    assert!(chain.state.mempool().is_empty());
}

#[test]
fn test_failed_reorg_keeps_old_branch() {
    let (mut chain, mined, spends) = chain_at_100();
    let fork = mined[96].hash();
    let best = chain.state.best_hash();

    let s98 = chain.mine_on(fork, 98, 1, Vec::new());
    let reward = chain.reward(99);
    let s99 = chain.pow_block_paying(s98.hash(), 99, 1, chain.time_at(99), reward + 1, Vec::new());
    let s100 = chain.mine_on(s99.hash(), 100, 1, Vec::new());
    let s101 = chain.mine_on(s100.hash(), 101, 1, Vec::new());
    for block in [&s98, &s99, &s100] {
        assert!(matches!(
            chain.submit(block.clone()).unwrap(),
            BlockStatus::Accepted { best: false, .. }
        ));
    }

    let err = chain.submit(s101.clone()).unwrap_err();
    assert_eq!(
        err,
        ChainError::BadCoinbaseValue {
            value: reward + 1,
            max: reward
        }
    );
    assert_eq!(chain.state.best_hash(), best);
    assert_eq!(chain.state.best_height(), 100);
    for txid in &spends {
        assert!(chain.state.tx_index(txid).unwrap().is_some());
    }

    assert!(!chain.state.block_index(&s98.hash()).unwrap().is_failed());
    for block in [&s99, &s100, &s101] {
        assert!(chain.state.block_index(&block.hash()).unwrap().is_failed());
    }
    assert!(chain.state.best_invalid_trust() > chain.state.best_trust());

    let s102 = chain.mine_on(s101.hash(), 102, 1, Vec::new());
    assert_eq!(
        chain.submit(s102).unwrap_err(),
        ChainError::InvalidParent(s101.hash())
    );

    chain.extend(1);
    assert_eq!(chain.state.best_height(), 101);
}

#[test]
fn test_reorg_back_and_forth_restores_state() {
    let mut chain = TestChain::new();
    let mined = chain.extend(3);
    let spend = chain.spend_coinbase(&mined[0].transactions[0], CENT, chain.time_at(3));
    let a4 = chain.mine_tip(vec![spend.clone()]);
    let balance = chain.state.balance(&chain.miner.address()).unwrap();

    let side = chain.branch(mined[2].hash(), 3, 2, 7);
    for block in &side {
        chain.submit(block.clone()).unwrap();
    }
    assert_eq!(chain.state.best_hash(), side[1].hash());
    assert!(chain.state.mempool().contains(&spend.txid()));

    let a5 = chain.mine_on(a4.hash(), 5, 0, Vec::new());
    let a6 = chain.mine_on(a5.hash(), 6, 0, Vec::new());
    chain.submit(a5).unwrap();
    assert_eq!(
        chain.submit(a6.clone()).unwrap(),
        BlockStatus::Accepted { height: 6, best: true }
    );

    assert_eq!(chain.state.best_hash(), a6.hash());
    assert!(chain.state.tx_index(&spend.txid()).unwrap().is_some());
    assert!(!chain.state.mempool().contains(&spend.txid()));
    let expected = balance.spendable + chain.reward(5) + chain.reward(6);
    assert_eq!(chain.state.balance(&chain.miner.address()).unwrap().spendable, expected);
}

#[test]
fn test_resubmitted_parent_releases_waiting_orphan() {
    let mut chain = TestChain::new();
    let mined = chain.extend(3);
    let time = chain.time_at(3);
    let parent = chain.spend_coinbase(&mined[0].transactions[0], CENT, time);
    let child = signed_spend(
        &chain.miner,
        OutPoint::new(parent.txid(), 0),
        vec![TxOut::new(parent.outputs[0].value - CENT, p2pkh(&chain.miner))],
        time,
    );

    assert!(chain.state.accept_to_memory_pool(child.clone(), None).is_err());
    assert!(chain.state.mempool().orphans().contains(&child.txid()));
    chain.mine_tip(vec![parent.clone()]);
    assert!(chain.state.mempool().is_empty());

    let side = chain.branch(mined[2].hash(), 3, 2, 1);
    for block in side.iter().cloned() {
        chain.submit(block).unwrap();
    }
    assert_eq!(chain.state.best_hash(), side[1].hash());

    assert!(chain.state.mempool().contains(&parent.txid()));
    assert!(chain.state.mempool().contains(&child.txid()));
    assert!(chain.state.mempool().orphans().is_empty());
}
