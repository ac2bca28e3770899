//! # Peg-Chain Benchmarks
//!
//! | Area | Measured |
//! |------|----------|
//! | pc-08 block connect | `process_block` of a PoW block extending the tip |
//! | pc-08 reorganization | switch to a two-block-longer side branch |
//! | pc-06 mempool | admission of a signed spend |
//! | pc-05 fractions | proportional draw from a standard distribution |

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use pc_05_peg::Fractions;
use pc_tests::fixtures::TestChain;
use shared_types::{CENT, COIN};
use std::time::Duration;

fn bench_block_connect(c: &mut Criterion) {
    let mut group = c.benchmark_group("pc-08-block-connect");
    group.measurement_time(Duration::from_secs(10));

    group.bench_function("connect_empty_block", |b| {
        b.iter_batched(
            || {
                let mut chain = TestChain::new();
                chain.extend(10);
                let block = chain.mine_on(chain.state.best_hash(), 11, 0, Vec::new());
                (chain, block)
            },
            |(mut chain, block)| black_box(chain.submit(block).is_ok()),
            BatchSize::SmallInput,
        )
    });

    group.bench_function("connect_block_with_spends", |b| {
        b.iter_batched(
            || {
                let mut chain = TestChain::new();
                let mined = chain.extend(10);
                let time = chain.time_at(10);
                let spends = mined[..8]
                    .iter()
                    .map(|block| chain.spend_coinbase(&block.transactions[0], CENT, time))
                    .collect();
                let block = chain.mine_on(chain.state.best_hash(), 11, 0, spends);
                (chain, block)
            },
            |(mut chain, block)| black_box(chain.submit(block).is_ok()),
            BatchSize::SmallInput,
        )
    });

    group.bench_function("reorganize_two_blocks", |b| {
        b.iter_batched(
            || {
                let mut chain = TestChain::new();
                let mined = chain.extend(10);
                let side = chain.branch(mined[7].hash(), 8, 3, 1);
                (chain, side)
            },
            |(mut chain, side)| {
                for block in side {
                    black_box(chain.submit(block).is_ok());
                }
            },
            BatchSize::SmallInput,
        )
    });

    group.finish();
}

fn bench_mempool_admission(c: &mut Criterion) {
    let mut group = c.benchmark_group("pc-06-mempool");

    group.bench_function("accept_signed_spend", |b| {
        b.iter_batched(
            || {
                let mut chain = TestChain::new();
                let mined = chain.extend(3);
                let tx = chain.spend_coinbase(&mined[0].transactions[0], CENT, chain.time_at(3));
                (chain, tx)
            },
            |(mut chain, tx)| black_box(chain.state.accept_to_memory_pool(tx, None).is_ok()),
            BatchSize::SmallInput,
        )
    });

    group.finish();
}

fn bench_fraction_draw(c: &mut Criterion) {
    let mut group = c.benchmark_group("pc-05-fractions");
    let source = Fractions::std(50 * COIN);

    group.bench_function("draw_third", |b| {
        b.iter_batched(
            || source.clone(),
            |mut f| black_box(f.take_ratio_part(black_box(50 * COIN / 3))),
            BatchSize::SmallInput,
        )
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_block_connect,
    bench_mempool_admission,
    bench_fraction_draw
);
criterion_main!(benches);
