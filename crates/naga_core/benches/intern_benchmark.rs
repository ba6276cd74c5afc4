//! Benchmark for string interning and lookup.
//!
//! Run with: cargo bench --package naga_core --bench intern_benchmark

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use naga_core::strings::hash_and_len;
use naga_core::StringInterner;

fn resource_names(count: usize) -> Vec<String> {
    (0..count).map(|i| format!("sprites/level_{}/tile_{i:04}.png", i % 12)).collect()
}

fn benchmark_intern_hit(c: &mut Criterion) {
    let interner = StringInterner::new();
    let names = resource_names(1_000);
    for name in &names {
        let _ = interner.intern(name);
    }

    c.bench_function("intern_hit_1000", |b| {
        b.iter(|| {
            for name in &names {
                black_box(interner.intern(name));
            }
        });
    });
}

fn benchmark_intern_miss(c: &mut Criterion) {
    let names = resource_names(1_000);

    c.bench_function("intern_miss_1000", |b| {
        b.iter_batched(
            StringInterner::new,
            |interner| {
                for name in &names {
                    black_box(interner.intern(name));
                }
            },
            BatchSize::SmallInput,
        );
    });
}

fn benchmark_find(c: &mut Criterion) {
    let interner = StringInterner::new();
    let names = resource_names(1_000);
    for name in names.iter().step_by(2) {
        let _ = interner.intern(name);
    }

    c.bench_function("find_half_present_1000", |b| {
        b.iter(|| {
            names
                .iter()
                .filter(|name| interner.find(name).is_some())
                .count()
        });
    });
}

fn benchmark_hash(c: &mut Criterion) {
    let name = "bird/bird_hero.png";
    c.bench_function("hash_and_len", |b| b.iter(|| hash_and_len(black_box(name))));
}

criterion_group!(
    benches,
    benchmark_intern_hit,
    benchmark_intern_miss,
    benchmark_find,
    benchmark_hash
);
criterion_main!(benches);
