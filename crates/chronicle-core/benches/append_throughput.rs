//! Criterion benchmarks for the append path.
//!
//! The store targets tens of thousands of sealed appends per second on
//! commodity hardware. Batched appends amortize the fsync, so the batch
//! path is benchmarked separately with per-record throughput.

#![allow(missing_docs)]

use chronicle_core::store::{Ledger, RecordInput};
use chronicle_core::verify::verify_all;
use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use tempfile::TempDir;

const PAYLOAD: &str = r#"{"commit":"abc1234def5678","repo":"bench/app"}"#;

fn bench_input(i: i64) -> RecordInput {
    RecordInput {
        timestamp: 1_700_000_000 + i,
        kind: "code".to_string(),
        source: "bench".to_string(),
        payload: PAYLOAD.to_string(),
    }
}

fn bench_append_one(c: &mut Criterion) {
    let dir = TempDir::new().expect("failed to create temp dir");
    let ledger = Ledger::open(dir.path().join("bench.db")).expect("failed to open ledger");

    let mut group = c.benchmark_group("append");
    group.throughput(Throughput::Elements(1));
    let mut i = 0i64;
    group.bench_function("append_one", |b| {
        b.iter(|| {
            i += 1;
            ledger.append_one(&bench_input(i)).expect("append failed")
        });
    });
    group.finish();
}

fn bench_append_batch(c: &mut Criterion) {
    let dir = TempDir::new().expect("failed to create temp dir");
    let ledger = Ledger::open(dir.path().join("bench.db")).expect("failed to open ledger");

    const BATCH: usize = 100;
    let mut group = c.benchmark_group("append");
    group.throughput(Throughput::Elements(BATCH as u64));
    let mut i = 0i64;
    group.bench_function("append_batch_100", |b| {
        b.iter(|| {
            let inputs: Vec<RecordInput> = (0..BATCH)
                .map(|j| {
                    i += 1;
                    bench_input(i + j as i64)
                })
                .collect();
            ledger.append_batch(&inputs).expect("batch failed")
        });
    });
    group.finish();
}

fn bench_verify(c: &mut Criterion) {
    let dir = TempDir::new().expect("failed to create temp dir");
    let ledger = Ledger::open(dir.path().join("bench.db")).expect("failed to open ledger");

    const CHAIN_LEN: u64 = 10_000;
    let inputs: Vec<RecordInput> = (0..CHAIN_LEN).map(|i| bench_input(i as i64)).collect();
    for chunk in inputs.chunks(1000) {
        ledger.append_batch(chunk).expect("seed failed");
    }

    let mut group = c.benchmark_group("verify");
    group.throughput(Throughput::Elements(CHAIN_LEN));
    group.sample_size(20);
    group.bench_function("verify_all_10k", |b| {
        b.iter(|| {
            let report = verify_all(&ledger).expect("verify failed");
            assert!(report.ok);
            report
        });
    });
    group.finish();
}

criterion_group!(benches, bench_append_one, bench_append_batch, bench_verify);
criterion_main!(benches);
