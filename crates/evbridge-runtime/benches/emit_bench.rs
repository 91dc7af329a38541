//! Emission throughput through the adapter and operator stages.
//!
//! Run with: cargo bench -p evbridge-runtime -- emit

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use std::cell::Cell;
use std::hint::black_box;
use std::rc::Rc;

use evbridge_core::{CancelBag, Value};
use evbridge_runtime::{KeyValueObject, Observable, PublisherExt};

// ---------------------------------------------------------------------------
// 1. Observable fan-out
// ---------------------------------------------------------------------------

fn bench_observable_fanout(c: &mut Criterion) {
    let mut group = c.benchmark_group("emit/observable");

    for subscribers in [1u64, 8, 64] {
        group.throughput(Throughput::Elements(subscribers));

        let obs = Observable::new(0u64);
        let total = Rc::new(Cell::new(0u64));
        let mut bag = CancelBag::new();
        for _ in 0..subscribers {
            let total = Rc::clone(&total);
            obs.publisher()
                .sink(move |v| total.set(total.get().wrapping_add(v)))
                .store_in(&mut bag);
        }

        let mut next = 0u64;
        group.bench_with_input(BenchmarkId::new("set", subscribers), &(), |b, _| {
            b.iter(|| {
                next += 1;
                obs.set(black_box(next));
            })
        });
        black_box(total.get());
    }
    group.finish();
}

// ---------------------------------------------------------------------------
// 2. Operator chain depth
// ---------------------------------------------------------------------------

fn bench_operator_chain(c: &mut Criterion) {
    let mut group = c.benchmark_group("emit/chain");
    group.throughput(Throughput::Elements(1));

    let obs = Observable::new(0i64);
    let seen = Rc::new(Cell::new(0i64));
    let seen_in = Rc::clone(&seen);
    let _sub = obs
        .publisher()
        .map(|v| v * 3)
        .filter(|v| v % 2 == 0)
        .compact_map(|v| v.checked_add(1))
        .remove_duplicates()
        .sink(move |v| seen_in.set(v));

    let mut next = 0i64;
    group.bench_function("map_filter_compact_dedup", |b| {
        b.iter(|| {
            next += 1;
            obs.set(black_box(next));
        })
    });
    black_box(seen.get());
    group.finish();
}

// ---------------------------------------------------------------------------
// 3. Key-path coercion
// ---------------------------------------------------------------------------

fn bench_key_path(c: &mut Criterion) {
    let mut group = c.benchmark_group("emit/kvo");
    group.throughput(Throughput::Elements(1));

    let obj = KeyValueObject::new();
    let hits = Rc::new(Cell::new(0u64));
    let hits_in = Rc::clone(&hits);
    let _sub = obj
        .observe::<i64>("n")
        .sink(move |_| hits_in.set(hits_in.get() + 1));

    let mut next = 0i64;
    group.bench_function("typed", |b| {
        b.iter(|| {
            next += 1;
            obj.set_value("n", Value::Int(black_box(next)));
        })
    });
    group.bench_function("mismatched", |b| {
        b.iter(|| {
            next += 1;
            obj.set_value("n", Value::Text(black_box(next).to_string()));
        })
    });
    black_box(hits.get());
    group.finish();
}

criterion_group!(
    benches,
    bench_observable_fanout,
    bench_operator_chain,
    bench_key_path
);
criterion_main!(benches);
