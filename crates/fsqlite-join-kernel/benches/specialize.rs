use std::sync::Arc;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use fsqlite_join_kernel::{compile_lookup_source_factory, JoinKernelConfig, JoinShape, TypeRegistry, TypeTag};

fn shape_with_channels(channel_count: usize) -> JoinShape {
    let type_vector = (0..channel_count)
        .map(|i| if i % 2 == 0 { TypeTag::Int64 } else { TypeTag::Bytes })
        .collect();
    let join_channel_indices = (0..channel_count).step_by(2).collect();
    JoinShape::new(type_vector, join_channel_indices)
}

fn bench_cold_compile(c: &mut Criterion) {
    let mut group = c.benchmark_group("specialize_cold_compile");
    let registry = TypeRegistry::new();
    let config = JoinKernelConfig::default();

    for channel_count in [2usize, 8, 32] {
        group.bench_with_input(BenchmarkId::from_parameter(channel_count), &channel_count, |b, &channel_count| {
            b.iter(|| {
                let shape = shape_with_channels(channel_count);
                let factory = compile_lookup_source_factory(&shape, &registry, &config).expect("shape should compile");
                criterion::black_box(Arc::strong_count(&factory));
            });
        });
    }

    group.finish();
}

fn bench_cache_hit(c: &mut Criterion) {
    use fsqlite_join_kernel::SpecializationCache;

    let mut group = c.benchmark_group("specialize_cache_hit");
    let registry = TypeRegistry::new();
    let config = JoinKernelConfig::default();
    let cache = SpecializationCache::new(&config);
    let shape = shape_with_channels(8);
    cache.get_or_compile(shape.clone(), &registry, &config).expect("shape should compile");

    group.bench_function("repeated_lookup", |b| {
        b.iter(|| {
            let factory = cache.get_or_compile(shape.clone(), &registry, &config).expect("cached shape should resolve");
            criterion::black_box(factory.channel_count());
        });
    });

    group.finish();
}

criterion_group!(benches, bench_cold_compile, bench_cache_hit);
criterion_main!(benches);
