//! Peg bookkeeping through real blocks: notarized freezes, the unlock
//! sweep, and conservation of fractions and balances.

use crate::fixtures::{key, p2pkh, signed_spend, TestChain};
use pc_04_utxo::UtxoError;
use pc_05_peg::{LedgerKind, PegError, NOTARY_F_MARKER};
use pc_06_mempool::MempoolError;
use pc_08_consensus::ChainError;
use shared_types::{Address, Amount, Block, KeyPair, OutPoint, Script, Transaction, TxOut, CENT, COIN};
use std::collections::{BTreeMap, HashMap};

/// Pays `value` from the miner's coinbase to `recipient`, marked for
/// bridge notarization.
fn notarized_payment(
    chain: &TestChain,
    coinbase: &Transaction,
    recipient: &KeyPair,
    value: Amount,
    time: u32,
) -> Transaction {
    let change = coinbase.outputs[0].value - value - CENT;
    signed_spend(
        &chain.miner,
        OutPoint::new(coinbase.txid(), 0),
        vec![
            TxOut::new(value, p2pkh(recipient)),
            TxOut::new(change, p2pkh(&chain.miner)),
            TxOut::new(0, Script::null_data(NOTARY_F_MARKER)),
        ],
        time,
    )
}

/// Main-chain blocks from height 1 to the tip.
fn main_chain(chain: &TestChain) -> Vec<Block> {
    let genesis = chain.params().genesis_hash();
    let mut blocks = Vec::new();
    let mut hash = chain.state.best_hash();
    while hash != genesis {
        let block = chain.state.read_block(&hash).unwrap().unwrap();
        hash = block.header.prev_hash;
        blocks.push((*block).clone());
    }
    blocks.reverse();
    blocks
}

/// Every output's fractions sum to its value, and every address balance
/// matches the unspent outputs it holds.
fn assert_conserved(chain: &TestChain) {
    let mut unspent: HashMap<OutPoint, (Option<Address>, Amount)> = HashMap::new();
    for block in main_chain(chain) {
        for tx in &block.transactions {
            for input in tx.inputs.iter().filter(|i| !i.prevout.is_null()) {
                unspent.remove(&input.prevout);
            }
            let txid = tx.txid();
            for (n, out) in tx.outputs.iter().enumerate() {
                let outpoint = OutPoint::new(txid, n as u32);
                let fractions = chain.state.fractions(&outpoint).unwrap().unwrap();
                assert_eq!(fractions.total(), out.value, "fractions of {outpoint:?}");
                unspent.insert(outpoint, (out.script_pubkey.address(), out.value));
            }
        }
    }

    let mut held: BTreeMap<Address, Amount> = BTreeMap::new();
    for (address, value) in unspent.values() {
        if let Some(address) = address {
            *held.entry(*address).or_default() += value;
        }
    }
    for (address, value) in held {
        let balance = chain.state.balance(&address).unwrap();
        assert_eq!(balance.spendable + balance.frozen, value);
    }
}

#[test]
fn test_notarized_output_unlocks_at_lock_time() {
    let mut chain = TestChain::new();
    let mined = chain.extend(3);
    let bridge = key(0x07);
    let sent = 10 * COIN;
    let paid_at = chain.time_at(3);
    let tx = notarized_payment(&chain, &mined[0].transactions[0], &bridge, sent, paid_at);
    let frozen = OutPoint::new(tx.txid(), 0);
    let unlock = paid_at + chain.params().freeze_duration_f;

    chain.state.accept_to_memory_pool(tx.clone(), None).unwrap();
    chain.mine_tip(vec![tx]);

    let queue = chain.state.frozen_queue().unwrap();
    assert_eq!(queue.len(), 1);
    assert_eq!(queue[0].outpoint, frozen);
    assert_eq!(queue[0].unlock_time, unlock);
    assert_eq!(queue[0].address, bridge.address());
    let balance = chain.state.balance(&bridge.address()).unwrap();
    assert_eq!((balance.spendable, balance.frozen), (0, sent));

    let just_before = chain.pow_block(chain.state.best_hash(), 5, 0, unlock - 1, Vec::new());
    chain.submit(just_before).unwrap();
    assert_eq!(chain.state.frozen_queue().unwrap().len(), 1);

    let spend = signed_spend(
        &bridge,
        frozen,
        vec![TxOut::new(sent - CENT, p2pkh(&bridge))],
        unlock - 1,
    );
    let err = chain.state.accept_to_memory_pool(spend.clone(), Some(4)).unwrap_err();
    assert_eq!(
        err,
        ChainError::Mempool(MempoolError::Utxo(UtxoError::Peg(PegError::Frozen(frozen))))
    );
    assert!(chain.notifier.misbehaving_reports().is_empty());

    let at_unlock = chain.pow_block(chain.state.best_hash(), 6, 0, unlock, Vec::new());
    chain.submit(at_unlock).unwrap();
    assert!(chain.state.frozen_queue().unwrap().is_empty());
    let balance = chain.state.balance(&bridge.address()).unwrap();
    assert_eq!((balance.spendable, balance.frozen), (sent, 0));
    let ledger = chain.state.ledger(&bridge.address()).unwrap();
    assert_eq!(ledger.last().unwrap().kind, LedgerKind::Unfreeze { n: 0 });

    assert_eq!(
        chain.state.accept_to_memory_pool(spend.clone(), None).unwrap(),
        vec![spend.txid()]
    );
    assert_conserved(&chain);
}

#[test]
fn test_disconnecting_the_unlock_block_refreezes() {
    let mut chain = TestChain::new();
    let mined = chain.extend(3);
    let bridge = key(0x08);
    let paid_at = chain.time_at(3);
    let tx = notarized_payment(&chain, &mined[1].transactions[0], &bridge, 5 * COIN, paid_at);
    let unlock = paid_at + chain.params().freeze_duration_f;
    let a4 = chain.mine_tip(vec![tx]);

    let release = chain.pow_block(a4.hash(), 5, 0, unlock, Vec::new());
    chain.submit(release).unwrap();
    assert!(chain.state.frozen_queue().unwrap().is_empty());

    let s5 = chain.pow_block(a4.hash(), 5, 3, unlock - 2, Vec::new());
    let s6 = chain.pow_block(s5.hash(), 6, 3, unlock - 1, Vec::new());
    chain.submit(s5).unwrap();
    chain.submit(s6.clone()).unwrap();
    assert_eq!(chain.state.best_hash(), s6.hash());

    let queue = chain.state.frozen_queue().unwrap();
    assert_eq!(queue.len(), 1);
    assert_eq!(queue[0].unlock_time, unlock);
    let balance = chain.state.balance(&bridge.address()).unwrap();
    assert_eq!((balance.spendable, balance.frozen), (0, 5 * COIN));
    assert_conserved(&chain);
}

#[test]
fn test_fractions_and_balances_conserved() {
    let mut chain = TestChain::new();
    let mined = chain.extend(4);
    let alice = key(0x0a);
    let bob = key(0x0b);
    let time = chain.time_at(4);

    let split = signed_spend(
        &chain.miner,
        OutPoint::new(mined[0].transactions[0].txid(), 0),
        vec![
            TxOut::new(20 * COIN, p2pkh(&alice)),
            TxOut::new(20 * COIN, p2pkh(&bob)),
            TxOut::new(10 * COIN - CENT, p2pkh(&chain.miner)),
        ],
        time,
    );
    let onward = signed_spend(
        &alice,
        OutPoint::new(split.txid(), 0),
        vec![
            TxOut::new(7 * COIN, p2pkh(&bob)),
            TxOut::new(13 * COIN - CENT, p2pkh(&alice)),
        ],
        time,
    );
    chain.state.accept_to_memory_pool(split.clone(), None).unwrap();
    chain.state.accept_to_memory_pool(onward.clone(), None).unwrap();
    chain.mine_tip(vec![split, onward]);
    chain.extend(2);

    assert_conserved(&chain);
    assert_eq!(chain.state.balance(&bob.address()).unwrap().spendable, 27 * COIN);
    assert_eq!(chain.state.balance(&alice.address()).unwrap().spendable, 13 * COIN - CENT);
}
