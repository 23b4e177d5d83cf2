use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use graphiti_maint::utils::{cosine_similarity, normalize_l2};

fn vector(dim: usize, seed: f32) -> Vec<f32> {
    (0..dim).map(|i| ((i as f32) * 0.37 + seed).sin()).collect()
}

fn similarity_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("cosine_similarity");
    for dim in [768, 1024] {
        let a = vector(dim, 0.1);
        let b = vector(dim, 0.7);
        group.bench_with_input(BenchmarkId::from_parameter(dim), &dim, |bench, _| {
            bench.iter(|| cosine_similarity(black_box(&a), black_box(&b)))
        });
    }
    group.finish();

    let v = vector(1024, 0.3);
    c.bench_function("normalize_l2/1024", |bench| bench.iter(|| normalize_l2(black_box(&v))));
}

criterion_group!(benches, similarity_benchmarks);
criterion_main!(benches);
