//! Gate overhead benchmarks
//!
//! Compares a bare call with the same call measured through the gate, and
//! measures raw submission throughput with the drain thread running.

use callprof_core::{CaptureEvent, CaptureQueue, Gate, NullStore, Operation};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::time::Duration;

fn work(n: u64) -> Result<u64, ()> {
    Ok(n.wrapping_mul(31).wrapping_add(7))
}

/// Benchmark a bare call against a gated one
fn bench_gate_overhead(c: &mut Criterion) {
    let mut group = c.benchmark_group("gate_overhead");

    group.bench_function("bare", |b| b.iter(|| work(black_box(42))));

    let gate = Gate::new(CaptureQueue::new(NullStore));
    let op = Operation::new("/bench", "Bench", "work");
    group.bench_function("gated", |b| {
        b.iter(|| gate.call(&op, || work(black_box(42))))
    });

    let wrapped = gate.wrap(op.clone(), work);
    group.bench_function("wrapped", |b| b.iter(|| wrapped.call(black_box(42))));

    group.finish();
    let _ = gate.queue().wait_idle(Duration::from_secs(30));
    let _ = gate.queue().shutdown();
}

/// Benchmark submission throughput into a null store
fn bench_submit_throughput(c: &mut Criterion) {
    let mut group = c.benchmark_group("submit_throughput");
    let queue = CaptureQueue::new(NullStore);
    let op = Operation::new("/bench", "Bench", "submit");

    for batch in [1u64, 100, 1_000].iter() {
        group.throughput(Throughput::Elements(*batch));
        group.bench_with_input(BenchmarkId::new("batch", batch), batch, |b, &batch| {
            b.iter(|| {
                for i in 0..batch {
                    queue.submit(CaptureEvent::new(op.clone(), i, i + 1, false));
                }
            })
        });
        let _ = queue.wait_idle(Duration::from_secs(30));
    }

    group.finish();
    let _ = queue.shutdown();
}

criterion_group!(benches, bench_gate_overhead, bench_submit_throughput);
criterion_main!(benches);
