use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use mesh_weave::prelude::*;

fn cube(n: usize) -> Mesh {
    MeshFactory::new(&NoComm, MeshConfig::default())
        .create_box([0.0; 3], [1.0; 3], [n, n, n])
        .expect("grid generation")
}

fn bench_generation(c: &mut Criterion) {
    let mut group = c.benchmark_group("create_box");
    group.sample_size(20);
    for &n in &[4usize, 8, 16] {
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, &n| b.iter(|| cube(black_box(n))));
    }
    group.finish();
}

fn bench_adjacency(c: &mut Criterion) {
    let mut group = c.benchmark_group("adjacency");
    for &n in &[8usize, 16] {
        let m = cube(n);
        let cells = m.num_entities(EntityKind::Cell, ParallelType::Used);
        let nodes = m.num_entities(EntityKind::Node, ParallelType::Used);
        group.bench_with_input(BenchmarkId::new("cell_faces_and_dirs", n), &m, |b, m| {
            b.iter(|| (0..cells).map(|c| m.cell_get_faces_and_dirs(c).0.len()).sum::<usize>())
        });
        group.bench_with_input(BenchmarkId::new("cell_faces_ordered", n), &m, |b, m| {
            b.iter(|| (0..cells).map(|c| m.cell_get_faces_ordered(c).len()).sum::<usize>())
        });
        group.bench_with_input(BenchmarkId::new("face_adj_cells", n), &m, |b, m| {
            b.iter(|| {
                (0..cells)
                    .map(|c| m.cell_get_face_adj_cells(c, ParallelType::Used).len())
                    .sum::<usize>()
            })
        });
        group.bench_with_input(BenchmarkId::new("node_cells", n), &m, |b, m| {
            b.iter(|| (0..nodes).map(|v| m.node_get_cells(v, ParallelType::Used).len()).sum::<usize>())
        });
    }
    group.finish();
}

fn bench_point_regions(c: &mut Criterion) {
    let m = cube(8);
    let mut rng = StdRng::seed_from_u64(42);
    let points: Vec<Point> = (0..64)
        .map(|_| [rng.gen_range(0.0..1.0), rng.gen_range(0.0..1.0), rng.gen_range(0.0..1.0)])
        .collect();
    let cells = m.num_entities(EntityKind::Cell, ParallelType::Used);
    c.bench_function("point_in_cell_scan", |b| {
        b.iter(|| {
            points
                .iter()
                .filter(|&&p| (0..cells).any(|c| m.point_in_cell(p, c)))
                .count()
        })
    });
}

criterion_group!(benches, bench_generation, bench_adjacency, bench_point_regions);
criterion_main!(benches);
