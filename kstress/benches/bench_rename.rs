//! Rename churn benchmarks
//!
//! Full engine runs (bootstrap, probes, teardown) at two op counts.
//!
//! Run: cargo bench --bench bench_rename

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::hint::black_box;

use kstress::rename::RenameEngine;
use kstress::{RunControl, StressArgs};

const OPS: u64 = 10_000;

// ============================================================================
// Core benchmark function
// ============================================================================

fn churn(ops: u64) -> u64 {
    let scratch = tempfile::tempdir().unwrap();
    let args = StressArgs::new("rename", RunControl::new())
        .with_max_ops(ops)
        .with_temp_base(scratch.path());

    RenameEngine::new(&args).unwrap().run().unwrap();
    black_box(args.counter())
}

// ============================================================================
// Benchmarks
// ============================================================================

fn benchmark_churn(c: &mut Criterion) {
    let mut group = c.benchmark_group("Rename Churn");
    group.sample_size(20);

    for ops in [1_000u64, OPS] {
        group.throughput(Throughput::Elements(ops));
        group.bench_with_input(BenchmarkId::new("engine", ops), &ops, |b, &ops| {
            b.iter(|| churn(ops))
        });
    }

    group.finish();
}

criterion_group!(benches, benchmark_churn);
criterion_main!(benches);
