use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use forcelayout::physics::barnes_hut::{BarnesHutTree, TreeOptions};
use forcelayout::physics::body::Body;
use forcelayout::physics::math::Scalar;
use forcelayout::resources::SharedRng;
use nalgebra::allocator::Allocator;
use nalgebra::{DefaultAllocator, Dim, Dyn, U1, U2, U3, U4, U6};
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::hint::black_box;
use std::time::Duration;

/// Bodies spread uniformly through a cube of side `2 * extent`
fn generate_uniform_bodies<D: Dim>(
    dim: D,
    count: usize,
    seed: u64,
    extent: Scalar,
) -> Vec<Body<D>>
where
    DefaultAllocator: Allocator<D>,
{
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    (0..count)
        .map(|_| {
            let coords: Vec<Scalar> = (0..dim.value())
                .map(|_| rng.random_range(-extent..extent))
                .collect();
            Body::at(dim, &coords).with_mass(rng.random_range(1.0..3.0))
        })
        .collect()
}

/// Bodies packed into a few tight clusters, which makes the tree deep
fn generate_clustered_bodies<D: Dim>(
    dim: D,
    count: usize,
    seed: u64,
    clusters: usize,
) -> Vec<Body<D>>
where
    DefaultAllocator: Allocator<D>,
{
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let centers: Vec<Vec<Scalar>> = (0..clusters)
        .map(|_| (0..dim.value()).map(|_| rng.random_range(-500.0..500.0)).collect())
        .collect();

    (0..count)
        .map(|i| {
            let center = &centers[i % clusters];
            let coords: Vec<Scalar> = center
                .iter()
                .map(|c| c + rng.random_range(-5.0..5.0))
                .collect();
            Body::at(dim, &coords)
        })
        .collect()
}

// =============================================================================
// Construction
// =============================================================================

fn bench_construction_scaling(c: &mut Criterion) {
    let mut group = c.benchmark_group("construction_scaling");

    for &count in &[100, 1_000, 10_000, 60_000] {
        let template = generate_uniform_bodies(U2, count, 42, 500.0);
        let mut tree = BarnesHutTree::new(U2, TreeOptions::default());
        let mut rng = SharedRng::from_seed(42);

        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::new("bodies", count), &count, |b, _| {
            let mut bodies = template.clone();
            b.iter(|| {
                tree.insert_bodies(black_box(&mut bodies), &mut rng);
                black_box(tree.node_count());
            });
        });
    }

    group.finish();
}

fn bench_construction_dimensions(c: &mut Criterion) {
    let mut group = c.benchmark_group("construction_dimensions");
    let count = 10_000;
    group.throughput(Throughput::Elements(count as u64));

    macro_rules! bench_dimension {
        ($dim:expr, $label:expr) => {
            let mut bodies = generate_uniform_bodies($dim, count, 7, 500.0);
            let mut tree = BarnesHutTree::new($dim, TreeOptions::default());
            let mut rng = SharedRng::from_seed(7);
            group.bench_function(BenchmarkId::new("dimensions", $label), |b| {
                b.iter(|| tree.insert_bodies(black_box(&mut bodies), &mut rng));
            });
        };
    }

    bench_dimension!(U1, "1");
    bench_dimension!(U2, "2");
    bench_dimension!(U3, "3");
    bench_dimension!(U4, "4");
    bench_dimension!(U6, "6");
    // Heap-backed vectors: same count as a static kernel, then past them
    bench_dimension!(Dyn(3), "3_dyn");
    bench_dimension!(Dyn(8), "8_dyn");
    bench_dimension!(Dyn(16), "16_dyn");

    group.finish();
}

fn bench_coincident_bodies(c: &mut Criterion) {
    let mut group = c.benchmark_group("coincident_bodies");
    group.measurement_time(Duration::from_secs(10));

    // Every body on one point: worst case for the nudge-and-retry path
    for &count in &[10, 100, 1_000] {
        let template: Vec<Body<U2>> = (0..count).map(|_| Body::at(U2, &[3.0, 3.0])).collect();
        let mut tree = BarnesHutTree::new(U2, TreeOptions::default());
        let mut rng = SharedRng::from_seed(3);

        group.bench_with_input(BenchmarkId::new("bodies", count), &count, |b, _| {
            b.iter(|| {
                let mut bodies = template.clone();
                tree.insert_bodies(black_box(&mut bodies), &mut rng);
                black_box(tree.skipped_bodies());
            });
        });
    }

    group.finish();
}

// =============================================================================
// Force queries
// =============================================================================

fn bench_force_scaling(c: &mut Criterion) {
    let mut group = c.benchmark_group("force_scaling");

    for &count in &[100, 1_000, 10_000, 60_000] {
        let mut bodies = generate_uniform_bodies(U2, count, 42, 500.0);
        let mut tree = BarnesHutTree::new(U2, TreeOptions::default());
        let mut rng = SharedRng::from_seed(42);
        tree.insert_bodies(&mut bodies, &mut rng);

        // One query on the middle body; should grow like log n
        group.throughput(Throughput::Elements(1));
        group.bench_with_input(BenchmarkId::new("bodies", count), &count, |b, _| {
            b.iter(|| black_box(tree.body_force(black_box(count / 2), &bodies, &mut rng)));
        });
    }

    group.finish();
}

fn bench_theta_tradeoff(c: &mut Criterion) {
    let mut group = c.benchmark_group("theta_tradeoff");
    let count = 5_000;
    let bodies = generate_clustered_bodies(U3, count, 42, 8);

    for &theta in &[0.0, 0.3, 0.5, 0.8, 1.2] {
        let options = TreeOptions {
            theta,
            ..Default::default()
        };
        let mut tree = BarnesHutTree::new(U3, options);
        let mut rng = SharedRng::from_seed(42);
        let mut bodies = bodies.clone();
        tree.insert_bodies(&mut bodies, &mut rng);

        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::new("theta", theta), &theta, |b, _| {
            b.iter(|| {
                for source in 0..count {
                    black_box(tree.body_force(source, &bodies, &mut rng));
                }
            });
        });
    }

    group.finish();
}

criterion_group!(
    construction,
    bench_construction_scaling,
    bench_construction_dimensions,
    bench_coincident_bodies
);

criterion_group!(queries, bench_force_scaling, bench_theta_tradeoff);

criterion_main!(construction, queries);
