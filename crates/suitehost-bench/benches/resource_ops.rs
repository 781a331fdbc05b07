//! Criterion micro-benchmarks for resource collection operations.

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, Criterion};
use suitehost_bench::{resource_payloads, RESOURCE_KINDS};
use suitehost_host::{CollectionRole, ResourceCollection};

const CAP: usize = 1 << 20;

fn filled(payloads: &[Vec<u8>]) -> ResourceCollection {
    let mut collection = ResourceCollection::new(CollectionRole::Primary, CAP);
    for (i, payload) in payloads.iter().enumerate() {
        collection
            .add(RESOURCE_KINDS[i % RESOURCE_KINDS.len()], payload)
            .unwrap();
    }
    collection
}

/// Benchmark: add 256 entries spread over four kinds, then clear.
fn bench_resource_add_256(c: &mut Criterion) {
    let payloads = resource_payloads(256, 42);
    let mut collection = ResourceCollection::new(CollectionRole::Primary, CAP);
    c.bench_function("resource_add_256", |b| {
        b.iter(|| {
            for (i, payload) in payloads.iter().enumerate() {
                collection
                    .add(RESOURCE_KINDS[i % RESOURCE_KINDS.len()], payload)
                    .unwrap();
            }
            black_box(collection.clear());
        });
    });
}

/// Benchmark: count and fetch every entry of one kind in a 1K collection.
fn bench_resource_lookup_1k(c: &mut Criterion) {
    let payloads = resource_payloads(1024, 42);
    let collection = filled(&payloads);
    let kind = RESOURCE_KINDS[1];
    c.bench_function("resource_lookup_1k", |b| {
        b.iter(|| {
            let count = collection.count(kind) as i16;
            for index in 1..=count {
                black_box(collection.find(kind, index));
            }
        });
    });
}

/// Benchmark: delete the first entry of one kind until it is empty,
/// renumbering the rest each time.
fn bench_resource_delete_front(c: &mut Criterion) {
    let payloads = resource_payloads(512, 7);
    let kind = RESOURCE_KINDS[0];
    c.bench_function("resource_delete_front", |b| {
        b.iter_batched(
            || filled(&payloads),
            |mut collection| {
                while collection.count(kind) > 0 {
                    collection.delete(kind, 1).unwrap();
                }
                collection
            },
            criterion::BatchSize::SmallInput,
        );
    });
}

criterion_group!(
    benches,
    bench_resource_add_256,
    bench_resource_lookup_1k,
    bench_resource_delete_front
);
criterion_main!(benches);
