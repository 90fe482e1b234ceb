use std::sync::Arc;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use fsqlite_join_kernel::{
    compile_lookup_source_factory, ColumnBlock, Int64Block, JoinKernelConfig, JoinShape, LookupSource, OperatorContext,
    Page, TypeRegistry, TypeTag,
};

fn build_source(row_count: usize) -> LookupSource {
    let shape = JoinShape::new(vec![TypeTag::Int64], vec![0]);
    let factory = compile_lookup_source_factory(&shape, &TypeRegistry::new(), &JoinKernelConfig::default())
        .expect("int64 shape should always compile");

    let key_block: Arc<dyn ColumnBlock> = Arc::new(Int64Block::new((0..row_count as i64).map(Some).collect()));
    let page = Page::new(vec![key_block]);

    factory
        .create_lookup_source(vec![page], &OperatorContext::default())
        .expect("build page should compile")
}

fn bench_probe_hit_rate(c: &mut Criterion) {
    let mut group = c.benchmark_group("probe_single_match");

    for row_count in [10_000usize, 100_000] {
        let source = build_source(row_count);
        group.throughput(Throughput::Elements(1));
        group.bench_with_input(BenchmarkId::from_parameter(row_count), &source, |b, source| {
            let probe_blocks: Vec<Arc<dyn ColumnBlock>> = vec![Arc::new(Int64Block::new(vec![Some((row_count / 2) as i64)]))];
            b.iter(|| {
                let hash = source.hash_row(0, &probe_blocks);
                let address = source.get_join_position(0, &probe_blocks, hash);
                criterion::black_box(address);
            });
        });
    }

    group.finish();
}

fn bench_probe_miss(c: &mut Criterion) {
    let mut group = c.benchmark_group("probe_miss");
    let source = build_source(100_000);
    let probe_blocks: Vec<Arc<dyn ColumnBlock>> = vec![Arc::new(Int64Block::new(vec![Some(-1)]))];

    group.bench_function("100_000_rows", |b| {
        b.iter(|| {
            let hash = source.hash_row(0, &probe_blocks);
            let address = source.get_join_position(0, &probe_blocks, hash);
            criterion::black_box(address);
        });
    });

    group.finish();
}

criterion_group!(benches, bench_probe_hit_rate, bench_probe_miss);
criterion_main!(benches);
