//! Timestep and full-run benchmarks
//!
//! - Kernel throughput on a single partition
//! - Halo exchange cost on a two-rank ring
//! - End-to-end runs at different worker counts

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use tokio::runtime::Runtime as TokioRuntime;

use ringlife::grid::CellGrid;
use ringlife::halo;
use ringlife::prelude::*;
use ringlife::timestep;

fn random_grid(rows: usize, cols: usize) -> CellGrid {
    let mut grid = CellGrid::new(rows, cols).unwrap();
    WorldInit::Random { seed: 42 }.apply(&mut grid);
    grid.wrap_columns();
    grid
}

/// Benchmark the Life kernel on one partition
fn bench_kernel(c: &mut Criterion) {
    let mut group = c.benchmark_group("timestep/kernel");

    for size in [64usize, 256, 1024].iter() {
        group.throughput(Throughput::Elements((*size * *size) as u64));

        group.bench_with_input(BenchmarkId::new("step", size), size, |b, &size| {
            let old = random_grid(size, size);
            let mut new = old.clone();
            b.iter(|| {
                timestep::step(black_box(&old), &mut new);
                black_box(&new);
            });
        });
    }

    group.finish();
}

/// Benchmark one halo exchange between two ranks
fn bench_halo_exchange(c: &mut Criterion) {
    let mut group = c.benchmark_group("timestep/halo");
    let rt = TokioRuntime::new().unwrap();

    for cols in [64usize, 1024].iter() {
        group.throughput(Throughput::Bytes(4 * (*cols as u64 + 2)));

        group.bench_with_input(BenchmarkId::new("two_ranks", cols), cols, |b, &cols| {
            let broker = CommBuilder::new().build(2);
            let mut e0 = broker.register(Rank(0)).unwrap();
            let mut e1 = broker.register(Rank(1)).unwrap();
            let mut g0 = random_grid(8, cols);
            let mut g1 = random_grid(8, cols);
            let mut iteration = 0u64;

            b.iter(|| {
                iteration += 1;
                rt.block_on(async {
                    let (first, second) = tokio::join!(
                        halo::exchange(&mut e0, &mut g0, iteration),
                        halo::exchange(&mut e1, &mut g1, iteration)
                    );
                    first.unwrap();
                    second.unwrap();
                });
            });
        });
    }

    group.finish();
}

/// Benchmark complete simulation runs
fn bench_simulation(c: &mut Criterion) {
    let mut group = c.benchmark_group("timestep/simulation");
    group.sample_size(10);
    let rt = TokioRuntime::new().unwrap();

    for workers in [1usize, 2, 4, 8].iter() {
        group.bench_with_input(
            BenchmarkId::new("random_256x256_50_steps", workers),
            workers,
            |b, &workers| {
                b.iter(|| {
                    let config = SimConfig::builder()
                        .world(256, 256)
                        .steps(50)
                        .workers(workers)
                        .build()
                        .unwrap();
                    let report = rt
                        .block_on(Simulation::new(config).unwrap().run())
                        .unwrap();
                    black_box(report.live_cells);
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_kernel, bench_halo_exchange, bench_simulation);
criterion_main!(benches);
