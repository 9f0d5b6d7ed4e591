//! Density tree benchmarks.
//!
//! Benchmarks for the hot paths of the adaptive tree:
//! - splat throughput, filtered vs unfiltered
//! - sampling from a trained tree
//! - build + refine rebuild cycles

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use guidetree::{DensityTree2, Point, ScalarValue, TreeParams};
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;

type Tree2 = DensityTree2<ScalarValue>;

/// Generate deposit positions with a hot corner, mirroring a typical
/// concentrated integrand.
fn generate_deposits(count: usize, seed: u64) -> Vec<(Point<2>, f32)> {
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
    (0..count)
        .map(|_| {
            let x = Point::uniform(&mut rng);
            let value = if x[0] < 0.2 && x[1] < 0.2 { 4.0 } else { 0.25 };
            (x, value)
        })
        .collect()
}

/// A tree that went through one adapt cycle, so sampling descends a few
/// levels.
fn trained_tree(filtering: bool) -> Tree2 {
    let params = TreeParams {
        filtering,
        ..Default::default()
    };
    let mut tree = Tree2::with_params(params);
    for (x, value) in generate_deposits(20_000, 7) {
        tree.splat(&x, &ScalarValue(value), 1.0);
    }
    tree.build();
    tree.refine();
    for (x, value) in generate_deposits(20_000, 11) {
        tree.splat(&x, &ScalarValue(value), 1.0);
    }
    tree.build();
    tree
}

fn bench_splat(c: &mut Criterion) {
    let mut group = c.benchmark_group("tree/splat");

    for filtering in [false, true] {
        let label = if filtering { "filtered" } else { "unfiltered" };
        let tree = {
            let mut tree = trained_tree(filtering);
            tree.refine();
            tree
        };
        let deposits = generate_deposits(10_000, 13);

        group.throughput(Throughput::Elements(deposits.len() as u64));
        group.bench_with_input(BenchmarkId::new(label, deposits.len()), &deposits, |b, deposits| {
            b.iter(|| {
                for (x, value) in deposits {
                    tree.splat(black_box(x), &ScalarValue(*value), 1.0);
                }
            });
        });
    }

    group.finish();
}

fn bench_sample(c: &mut Criterion) {
    let mut group = c.benchmark_group("tree/sample");
    let tree = trained_tree(true);

    const NUM_SAMPLES: usize = 10_000;
    group.throughput(Throughput::Elements(NUM_SAMPLES as u64));
    group.bench_function("warp", |b| {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(17);
        b.iter(|| {
            let mut acc = 0.0f32;
            for _ in 0..NUM_SAMPLES {
                let mut x = Point::uniform(&mut rng);
                acc += tree.sample(black_box(&mut x)).pdf;
            }
            black_box(acc)
        });
    });

    group.bench_function("pdf", |b| {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(19);
        let points: Vec<Point<2>> = (0..NUM_SAMPLES).map(|_| Point::uniform(&mut rng)).collect();
        b.iter(|| {
            let mut acc = 0.0f32;
            for x in &points {
                acc += tree.pdf(black_box(x));
            }
            black_box(acc)
        });
    });

    group.finish();
}

fn bench_rebuild(c: &mut Criterion) {
    let mut group = c.benchmark_group("tree/rebuild");

    for num_deposits in [10_000usize, 50_000] {
        let deposits = generate_deposits(num_deposits, 23);

        group.throughput(Throughput::Elements(num_deposits as u64));
        group.bench_with_input(
            BenchmarkId::new("build_refine", num_deposits),
            &deposits,
            |b, deposits| {
                b.iter(|| {
                    let mut tree = Tree2::new();
                    for (x, value) in deposits {
                        tree.splat(x, &ScalarValue(*value), 1.0);
                    }
                    tree.build();
                    tree.refine();
                    for (x, value) in deposits {
                        tree.splat(x, &ScalarValue(*value), 1.0);
                    }
                    tree.build();
                    black_box(tree.num_nodes())
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_splat, bench_sample, bench_rebuild);
criterion_main!(benches);
