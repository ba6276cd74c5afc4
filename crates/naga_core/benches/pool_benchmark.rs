//! Benchmark for pool allocation against the system allocator.
//!
//! Run with: cargo bench --package naga_core --bench pool_benchmark

#![allow(unsafe_code)]

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use naga_core::{managed_object, BlockPool, Handle, Object, PoolRegistry};

struct Particle {
    base: Object,
    position: [f32; 2],
    velocity: [f32; 2],
}
managed_object!(Particle, base = base: Object, tag = "bench.Particle");

fn particle(seed: f32) -> Particle {
    Particle {
        base: Object::new(),
        position: [seed, seed],
        velocity: [1.0, -1.0],
    }
}

fn benchmark_block_pool_cycle(c: &mut Criterion) {
    let mut pool = BlockPool::new(32, 64).unwrap();

    c.bench_function("block_pool_alloc_free_256", |b| {
        let mut cells = Vec::with_capacity(256);
        b.iter(|| {
            for _ in 0..256 {
                cells.push(pool.alloc().unwrap());
            }
            for cell in cells.drain(..) {
                unsafe { pool.free(black_box(cell).as_ptr()) };
            }
        });
    });
}

fn benchmark_registry_cycle(c: &mut Criterion) {
    let registry = PoolRegistry::new();

    c.bench_function("registry_alloc_free", |b| {
        b.iter(|| {
            let cell = registry.allocate::<[u64; 4]>(64).unwrap();
            unsafe { registry.deallocate(64, black_box(cell)) };
        });
    });
}

fn benchmark_handles(c: &mut Criterion) {
    let mut group = c.benchmark_group("handle_create_drop");

    group.bench_function("boxed", |b| {
        let mut seed = 0.0f32;
        b.iter(|| {
            seed += 1.0;
            let handle = Handle::new(particle(seed));
            black_box(handle.position[0] + handle.velocity[0])
        });
    });

    group.bench_function("pooled", |b| {
        let mut seed = 0.0f32;
        b.iter(|| {
            seed += 1.0;
            let handle = Handle::new_pooled::<64>(particle(seed)).ok().unwrap();
            black_box(handle.position[0] + handle.velocity[0])
        });
    });

    group.finish();
}

fn benchmark_handle_clone(c: &mut Criterion) {
    let handle = Handle::new(particle(1.0));

    c.bench_function("handle_clone_drop", |b| {
        b.iter(|| black_box(handle.clone()).ref_count());
    });
}

criterion_group!(
    benches,
    benchmark_block_pool_cycle,
    benchmark_registry_cycle,
    benchmark_handles,
    benchmark_handle_clone
);
criterion_main!(benches);
