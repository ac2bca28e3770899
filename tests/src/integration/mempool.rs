//! Mempool admission against a live chain.

use crate::fixtures::{p2pkh, signed_spend, TestChain};
use pc_06_mempool::MempoolError;
use pc_08_consensus::{ChainError, RecordedEvent};
use shared_types::{Amount, DosScore, OutPoint, Transaction, TxOut, CENT};

/// Chain at height 3 and two spends of the first coinbase paying
/// different fees.
fn competing_spends() -> (TestChain, Transaction, Transaction) {
    let mut chain = TestChain::new();
    let mined = chain.extend(3);
    let coinbase = mined[0].transactions[0].clone();
    let time = chain.time_at(3);
    let cheap = chain.spend_coinbase(&coinbase, CENT, time);
    let rich = chain.spend_coinbase(&coinbase, 2 * CENT, time);
    (chain, cheap, rich)
}

fn assert_conflict(err: ChainError, pooled: &Transaction) {
    match err {
        ChainError::Mempool(MempoolError::Conflict { spender, .. }) => {
            assert_eq!(spender, pooled.txid())
        }
        other => panic!("expected a pool conflict, got {other:?}"),
    }
}

#[test]
fn test_conflicting_spend_refused_in_either_order() {
    for cheap_first in [true, false] {
        let (mut chain, cheap, rich) = competing_spends();
        let (first, second) = if cheap_first {
            (cheap, rich)
        } else {
            (rich, cheap)
        };

        assert_eq!(
            chain.state.accept_to_memory_pool(first.clone(), Some(7)).unwrap(),
            vec![first.txid()]
        );
        let err = chain
            .state
            .accept_to_memory_pool(second.clone(), Some(7))
            .unwrap_err();
        assert!(err.is_soft());
        assert_conflict(err, &first);

        assert!(chain.state.mempool().contains(&first.txid()));
        assert!(!chain.state.mempool().contains(&second.txid()));
        assert!(chain.notifier.misbehaving_reports().is_empty());
    }
}

#[test]
fn test_block_spend_evicts_pooled_conflict() {
    let (mut chain, cheap, rich) = competing_spends();
    chain.state.accept_to_memory_pool(cheap.clone(), None).unwrap();

    chain.mine_tip(vec![rich.clone()]);
    assert!(chain.state.mempool().is_empty());
    assert!(chain.state.tx_index(&rich.txid()).unwrap().is_some());

    let err = chain.state.accept_to_memory_pool(cheap, Some(3)).unwrap_err();
    assert!(err.is_soft());
    assert!(chain.notifier.misbehaving_reports().is_empty());
}

#[test]
fn test_orphan_admitted_with_its_parent() {
    let mut chain = TestChain::new();
    let mined = chain.extend(3);
    let time = chain.time_at(3);
    let parent = chain.spend_coinbase(&mined[0].transactions[0], CENT, time);
    let value: Amount = parent.outputs[0].value - CENT;
    let child = signed_spend(
        &chain.miner,
        OutPoint::new(parent.txid(), 0),
        vec![TxOut::new(value, p2pkh(&chain.miner))],
        time,
    );

    let err = chain.state.accept_to_memory_pool(child.clone(), Some(1)).unwrap_err();
    assert_eq!(err, ChainError::Mempool(MempoolError::MissingInputs(parent.txid())));
    assert!(err.is_soft());
    assert!(chain.state.mempool().orphans().contains(&child.txid()));

    assert_eq!(
        chain.state.accept_to_memory_pool(parent.clone(), Some(1)).unwrap(),
        vec![parent.txid(), child.txid()]
    );
    assert!(chain.state.mempool().orphans().is_empty());
    assert_eq!(chain.state.mempool().len(), 2);
    let accepted: Vec<_> = chain
        .events
        .events()
        .into_iter()
        .filter(|e| matches!(e, RecordedEvent::TxAccepted(_)))
        .collect();
    assert_eq!(
        accepted,
        vec![
            RecordedEvent::TxAccepted(parent.txid()),
            RecordedEvent::TxAccepted(child.txid())
        ]
    );

    chain.mine_tip(vec![parent, child]);
    assert!(chain.state.mempool().is_empty());
}

#[test]
fn test_coinbase_from_peer_is_punished() {
    let mut chain = TestChain::new();
    let mined = chain.extend(1);
    let coinbase = mined[0].transactions[0].clone();
    let err = chain.state.accept_to_memory_pool(coinbase, Some(2)).unwrap_err();
    assert_eq!(err, ChainError::Mempool(MempoolError::Coinbase));
    assert_eq!(chain.notifier.misbehaving_reports(), vec![(2, 100)]);
}

#[test]
fn test_fee_below_floor_refused() {
    let mut chain = TestChain::new();
    let mined = chain.extend(3);
    let tx = chain.spend_coinbase(&mined[0].transactions[0], 0, chain.time_at(3));
    let err = chain.state.accept_to_memory_pool(tx, None).unwrap_err();
    assert!(matches!(
        err,
        ChainError::Mempool(MempoolError::FeeTooLow { fee: 0, .. })
    ));
}
