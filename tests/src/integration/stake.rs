//! Proof-of-stake blocks through acceptance and connect.

use crate::fixtures::{key, TestChain};
use pc_01_chain_index::BlockFlags;
use pc_03_validator::BlockCheckError;
use pc_08_consensus::{BlockStatus, ChainError};
use shared_types::{Block, ChainParams, DosScore, OutPoint, COIN};

#[test]
fn test_stake_block_extends_chain() {
    let mut chain = TestChain::new();
    let mined = chain.extend(3);
    let stake = mined[0].transactions[0].clone();
    let reward = chain.params().stake_reward_liquid;

    let block = chain.stake_block(&stake, reward, chain.time_at(4));
    assert_eq!(
        chain.submit(block.clone()).unwrap(),
        BlockStatus::Accepted { height: 4, best: true }
    );

    let record = chain.state.block_index(&block.hash()).unwrap();
    assert!(record.flags.contains(BlockFlags::PROOF_OF_STAKE));
    assert_eq!(record.prevout_stake, Some(OutPoint::new(stake.txid(), 0)));
    assert_eq!(record.staker, Some(chain.miner.address()));

    let coinstake = &block.transactions[1];
    let paid = OutPoint::new(coinstake.txid(), 1);
    let fractions = chain.state.fractions(&paid).unwrap().unwrap();
    assert_eq!(fractions.total(), stake.outputs[0].value + reward);
    assert!(chain
        .state
        .tx_index(&stake.txid())
        .unwrap()
        .unwrap()
        .is_spent(0));

    chain.extend(1);
    assert_eq!(chain.state.best_height(), 5);
}

#[test]
fn test_stake_reused_at_same_time_refused() {
    let mut chain = TestChain::new();
    let mined = chain.extend(3);
    let stake = mined[0].transactions[0].clone();
    let time = chain.time_at(4);
    let reward = chain.params().stake_reward_liquid;

    let first = chain.stake_block(&stake, reward, time);
    let second = chain.stake_block(&stake, reward - COIN, time);
    assert_ne!(first.hash(), second.hash());
    chain.submit(first).unwrap();

    assert_eq!(
        chain.state.process_block(second, Some(6)).unwrap_err(),
        ChainError::DuplicateStake {
            prevout: OutPoint::new(stake.txid(), 0),
            time
        }
    );
}

#[test]
fn test_stake_overclaim_rejected() {
    let mut chain = TestChain::new();
    let mined = chain.extend(3);
    let tip = chain.state.best_hash();
    let block = chain.stake_block(&mined[0].transactions[0], 100 * COIN, chain.time_at(4));

    let err = chain.state.process_block(block.clone(), Some(2)).unwrap_err();
    assert!(matches!(
        err,
        ChainError::BadStakeReward { claimed, .. } if claimed == 100 * COIN
    ));
    assert_eq!(err.dos_score(), 100);
    assert_eq!(chain.notifier.misbehaving_reports(), vec![(2, 100)]);
    assert_eq!(chain.state.best_hash(), tip);
    assert!(chain.state.block_index(&block.hash()).unwrap().is_failed());
}

#[test]
fn test_unsigned_stake_block_rejected() {
    let mut chain = TestChain::new();
    let mined = chain.extend(3);
    let reward = chain.params().stake_reward_liquid;
    let mut block = chain.stake_block(&mined[0].transactions[0], reward, chain.time_at(4));
    block.signature.clear();

    assert_eq!(
        chain.submit(block).unwrap_err(),
        ChainError::Check(BlockCheckError::BadSignature)
    );
    assert_eq!(chain.state.best_height(), 3);
}

/// Regtest chain whose miner key is a trusted staker, 25 blocks deep.
fn trusted_miner_chain() -> (TestChain, Vec<Block>) {
    let mut params = ChainParams::regtest();
    params.trusted_stakers.insert(key(0x42).address());
    let mut chain = TestChain::with_params(params);
    assert!(chain.params().is_trusted_staker(&chain.miner.address()));
    let mined = chain.extend(25);
    (chain, mined)
}

#[test]
fn test_pow_block_paying_trusted_address_is_not_a_staker() {
    let (mut chain, mined) = trusted_miner_chain();
    let tip = chain.state.best_hash();
    assert!(chain.state.block_index(&tip).unwrap().staker.is_none());

    let side = chain.mine_on(mined[0].hash(), 2, 9, Vec::new());
    assert_eq!(
        chain.submit(side.clone()).unwrap(),
        BlockStatus::Accepted { height: 2, best: false }
    );
    assert!(chain.state.block_index(&side.hash()).unwrap().staker.is_none());
    assert_eq!(chain.state.best_hash(), tip);
    assert_eq!(chain.state.best_height(), 25);
}

#[test]
fn test_trusted_stake_block_takes_deep_fork() {
    let (mut chain, mined) = trusted_miner_chain();
    let stake = mined[0].transactions[0].clone();
    let reward = chain.params().stake_reward_liquid;
    let block = chain.stake_block_on(mined[1].hash(), 2, &stake, reward, chain.time_at(3));

    assert_eq!(
        chain.submit(block.clone()).unwrap(),
        BlockStatus::Accepted { height: 3, best: true }
    );
    assert_eq!(chain.state.best_hash(), block.hash());
    assert_eq!(chain.state.best_height(), 3);
    let record = chain.state.block_index(&block.hash()).unwrap();
    assert_eq!(record.staker, Some(chain.miner.address()));
    assert!(chain.state.block_index(&mined[24].hash()).unwrap().chain_trust > record.chain_trust);
}

#[test]
fn test_untrusted_stake_block_stays_on_side_branch() {
    let mut chain = TestChain::new();
    let mined = chain.extend(25);
    let tip = chain.state.best_hash();
    let stake = mined[0].transactions[0].clone();
    let reward = chain.params().stake_reward_liquid;
    let block = chain.stake_block_on(mined[1].hash(), 2, &stake, reward, chain.time_at(3));

    assert_eq!(
        chain.submit(block.clone()).unwrap(),
        BlockStatus::Accepted { height: 3, best: false }
    );
    assert_eq!(
        chain.state.block_index(&block.hash()).unwrap().staker,
        Some(chain.miner.address())
    );
    assert_eq!(chain.state.best_hash(), tip);
}
