//! Restoration benchmarks
//!
//! Measures:
//! - restoring one index from the nearest snapshot
//! - sequential replay of a whole log
//! - the bidirectional consistency check
//!
//! Run with: cargo bench --bench restore_bench


use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use edit_history::{CodeRestorer, ConsistencyChecker, NullMonitor};
use harness::make_session;

fn benchmark_restore_index(c: &mut Criterion) {
    let mut group = c.benchmark_group("restore_index");

    for save_every in [0usize, 100, 1000] {
        let log = make_session("src/bench.rs", 2_000, save_every);
        let restorer = CodeRestorer::new(&log);
        let middle = log.len() / 2;

        group.bench_with_input(BenchmarkId::from_parameter(save_every), &middle, |b, &index| {
            b.iter(|| black_box(restorer.restore(black_box(index))).unwrap())
        });
    }
    group.finish();
}

fn benchmark_replay(c: &mut Criterion) {
    let mut group = c.benchmark_group("replay");
    let log = make_session("src/bench.rs", 2_000, 500);
    let restorer = CodeRestorer::new(&log);
    group.throughput(Throughput::Elements(log.len() as u64));

    group.bench_function("sequential", |b| {
        b.iter(|| {
            for (_, code) in restorer.replay(0, log.len() - 1) {
                black_box(code.unwrap());
            }
        })
    });
    group.finish();
}

fn benchmark_consistency(c: &mut Criterion) {
    let logs: Vec<_> = (0..8)
        .map(|i| make_session(&format!("src/file_{}.rs", i), 500, 100))
        .collect();
    let checker = ConsistencyChecker::new();

    c.bench_function("check_all_8_logs", |b| {
        b.iter(|| black_box(checker.check_all(&logs, &NullMonitor)).unwrap())
    });
}

criterion_group!(
    benches,
    benchmark_restore_index,
    benchmark_replay,
    benchmark_consistency
);
criterion_main!(benches);
