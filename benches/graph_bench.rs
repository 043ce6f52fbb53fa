//! Graph construction and slicing benchmarks
//!
//! Run with: cargo bench --bench graph_bench


use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use edit_history::{BuildConfig, GraphBuilder, NullMonitor, ProjectGraph, Slicer};
use harness::{fn_parser, make_session};

fn benchmark_file_graph(c: &mut Criterion) {
    let mut group = c.benchmark_group("file_graph");
    let config = BuildConfig::default();

    for edits in [200usize, 1_000] {
        let log = make_session("src/bench.rs", edits, 100);
        group.bench_with_input(BenchmarkId::from_parameter(edits), &log, |b, log| {
            b.iter(|| {
                black_box(GraphBuilder::new(log, &config).build(&fn_parser, &NullMonitor))
                    .unwrap()
                    .unwrap()
            })
        });
    }
    group.finish();
}

fn benchmark_project_graph(c: &mut Criterion) {
    let logs: Vec<_> = (0..8)
        .map(|i| make_session(&format!("src/file_{}.rs", i), 300, 100))
        .collect();
    let config = BuildConfig::default();

    c.bench_function("project_graph_8_files", |b| {
        b.iter(|| {
            black_box(ProjectGraph::build("bench", &logs, &fn_parser, &config, &NullMonitor))
                .unwrap()
                .unwrap()
        })
    });
}

fn benchmark_slices(c: &mut Criterion) {
    let log = make_session("src/bench.rs", 1_000, 100);
    let graph = GraphBuilder::new(&log, &BuildConfig::default())
        .build(&fn_parser, &NullMonitor)
        .unwrap()
        .unwrap();
    let constructs: Vec<_> = graph
        .nodes()
        .filter(|(_, node)| !node.is_operation())
        .map(|(id, _)| id)
        .take(100)
        .collect();
    let slicer = Slicer::new(&graph);

    c.bench_function("backward_slice_100_constructs", |b| {
        b.iter(|| {
            for &id in &constructs {
                black_box(slicer.backward_slice(id));
            }
        })
    });
}

criterion_group!(
    benches,
    benchmark_file_graph,
    benchmark_project_graph,
    benchmark_slices
);
criterion_main!(benches);
