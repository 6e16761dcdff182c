use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use spatial_query::{
    BoundingBox, Bvh3, BvhConfig, Octree, PointHashGridSearcher3, PointNeighborSearcher,
    PointParallelHashGridSearcher3,
};

const NUM_POINTS: usize = 100_000;

fn random_points(n: usize) -> Vec<[f64; 3]> {
    let mut rng = StdRng::seed_from_u64(0);
    (0..n)
        .map(|_| [rng.gen_range(0.0..100.0), rng.gen_range(0.0..100.0), rng.gen_range(0.0..100.0)])
        .collect()
}

fn benchmark_hash_grid_build(c: &mut Criterion) {
    let points = random_points(NUM_POINTS);
    let mut group = c.benchmark_group("hash_grid_build");

    group.bench_function("serial", |b| {
        let mut searcher = PointHashGridSearcher3::new([64, 64, 64], 1.5).unwrap();
        b.iter(|| searcher.build(black_box(&points)))
    });
    group.bench_function("parallel", |b| {
        let mut searcher = PointParallelHashGridSearcher3::new([64, 64, 64], 1.5).unwrap();
        b.iter(|| searcher.build(black_box(&points)))
    });
    group.finish();
}

fn benchmark_bvh_build(c: &mut Criterion) {
    let points = random_points(NUM_POINTS);
    let bounds: Vec<BoundingBox<3>> = points.iter().map(|p| BoundingBox::from_point(*p)).collect();
    let mut group = c.benchmark_group("bvh_build");
    group.sample_size(20);

    // usize::MAX keeps the whole build on one thread
    for threshold in [usize::MAX, 65_536, 4096, 512] {
        group.bench_with_input(BenchmarkId::from_parameter(threshold), &threshold, |b, &t| {
            let mut bvh = Bvh3::with_config(BvhConfig { parallel_threshold: t });
            b.iter(|| bvh.build(points.clone(), bounds.clone()).unwrap())
        });
    }
    group.finish();
}

fn benchmark_octree_build(c: &mut Criterion) {
    let points = random_points(NUM_POINTS);
    let region = BoundingBox::new([0.0; 3], [100.0; 3]);
    let mut group = c.benchmark_group("octree_build");
    group.sample_size(20);

    for depth in [4, 6, 8] {
        group.bench_with_input(BenchmarkId::from_parameter(depth), &depth, |b, &d| {
            let mut tree = Octree::new();
            b.iter(|| {
                tree.build_with_bounds(points.clone(), region, |p, r| r.contains(p), |p| BoundingBox::from_point(*p), d)
                    .unwrap()
            })
        });
    }
    group.finish();
}

criterion_group!(benches, benchmark_hash_grid_build, benchmark_bvh_build, benchmark_octree_build);
criterion_main!(benches);
