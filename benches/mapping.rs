use criterion::{criterion_group, criterion_main, Criterion};
use krait::{UnsafeRegion, WritableRegion};

fn bench_create(c: &mut Criterion) {
    c.bench_function("create_4k_region", |b| {
        b.iter(|| WritableRegion::create(4096).unwrap())
    });
}

fn bench_map(c: &mut Criterion) {
    let region = UnsafeRegion::create(64 * 1024).unwrap();
    c.bench_function("map_64k_region", |b| b.iter(|| region.map().unwrap()));
}

fn bench_duplicate(c: &mut Criterion) {
    let region = UnsafeRegion::create(4096).unwrap();
    c.bench_function("duplicate_region", |b| {
        b.iter(|| region.duplicate().unwrap())
    });
}

criterion_group!(benches, bench_create, bench_map, bench_duplicate);
criterion_main!(benches);
