//! Aggregation benchmarks
//!
//! Measures how fast the in-memory store ingests events and builds
//! snapshots as the number of routes grows.

use callprof_core::{AggregateStore, CaptureEvent, Operation};
use callprof_extras::InMemoryAggregateStore;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

fn events(routes: usize) -> Vec<CaptureEvent> {
    (0..routes)
        .map(|r| {
            CaptureEvent::new(
                Operation::new(format!("/route/{}", r), "Bench", "op"),
                1_000,
                1_000 + r as u64,
                r % 9 == 0,
            )
        })
        .collect()
}

/// Benchmark ingesting one event per route
fn bench_ingest(c: &mut Criterion) {
    let mut group = c.benchmark_group("ingest");

    for routes in [1usize, 10, 100].iter() {
        let store = InMemoryAggregateStore::new(1000);
        let batch = events(*routes);
        group.bench_with_input(BenchmarkId::new("routes", routes), &batch, |b, batch| {
            b.iter(|| {
                for event in batch {
                    let _ = store.ingest(black_box(event.clone()));
                }
            })
        });
    }

    group.finish();
}

/// Benchmark snapshot construction
fn bench_snapshot(c: &mut Criterion) {
    let mut group = c.benchmark_group("snapshot");

    for routes in [10usize, 100, 1_000].iter() {
        let store = InMemoryAggregateStore::new(100);
        for _ in 0..10 {
            for event in events(*routes) {
                let _ = store.ingest(event);
            }
        }
        group.bench_with_input(BenchmarkId::new("routes", routes), &store, |b, store| {
            b.iter(|| store.snapshot())
        });
    }

    group.finish();
}

criterion_group!(benches, bench_ingest, bench_snapshot);
criterion_main!(benches);
