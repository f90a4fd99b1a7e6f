//! Criterion benchmarks for kiln-core hot paths.
//!
//! Covers: forward-fill over long gaps, point reads, and 256-bit mul_div.

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use kiln_core::constants::{DEFAULT_MAX_CHECKPOINT_WEEKS, ONE};
use kiln_core::math::{mul_div, pow_fraction};
use kiln_core::time::week_start;
use kiln_core::{CheckpointSeries, FuturePolicy};

const START: u64 = 2_800;

fn bench_checkpoint_gap(c: &mut Criterion) {
    // A series neglected for the maximum materializable gap.
    c.bench_function("series_checkpoint_520_weeks", |b| {
        b.iter(|| {
            let mut s: CheckpointSeries<u128> =
                CheckpointSeries::new(START, FuturePolicy::Zero, DEFAULT_MAX_CHECKPOINT_WEEKS);
            s.record(ONE, week_start(START)).ok();
            s.checkpoint(black_box(week_start(START + DEFAULT_MAX_CHECKPOINT_WEEKS)))
        })
    });
}

fn bench_value_during(c: &mut Criterion) {
    let mut s: CheckpointSeries<u128> =
        CheckpointSeries::new(START, FuturePolicy::Zero, DEFAULT_MAX_CHECKPOINT_WEEKS);
    for w in 0..200 {
        s.record(ONE * w as u128, week_start(START + w)).ok();
    }
    let now = week_start(START + 300);

    c.bench_function("series_value_during", |b| {
        b.iter(|| s.value_during(black_box(START + 150), now))
    });
}

fn bench_math(c: &mut Criterion) {
    c.bench_function("mul_div_256", |b| {
        b.iter(|| mul_div(black_box(u128::MAX / 3), black_box(ONE * 7), black_box(ONE * 11)))
    });
    c.bench_function("pow_fraction_decay_100", |b| {
        b.iter(|| pow_fraction(black_box(ONE / 100 * 99), black_box(100)))
    });
}

criterion_group!(benches, bench_checkpoint_gap, bench_value_during, bench_math);
criterion_main!(benches);
