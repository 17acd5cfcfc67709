//! Criterion benchmarks for the data-parallel radix pipeline.
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::Rng;

use parallel_radix_sort::{check_order, RadixSorter, SortConfig};

/// Generate random test data of given size
fn generate_random_data(size: usize) -> Vec<i32> {
    let mut rng = rand::thread_rng();
    (0..size).map(|_| rng.gen()).collect()
}

/// Benchmark the standard-library sort as the baseline
fn bench_std_sort(c: &mut Criterion) {
    let mut group = c.benchmark_group("std sort_unstable");

    for size_exp in [12, 14, 16, 18, 20] {
        let size = 1usize << size_exp;
        group.throughput(Throughput::Elements(size as u64));

        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            b.iter_batched(
                || generate_random_data(size),
                |mut data| {
                    data.sort_unstable();
                    data
                },
                criterion::BatchSize::LargeInput,
            )
        });
    }

    group.finish();
}

/// Benchmark the parallel radix pipeline
fn bench_radix_pipeline(c: &mut Criterion) {
    let mut group = c.benchmark_group("parallel radix sort");
    let sorter = RadixSorter::new(SortConfig::default());

    // Sizes are powers of two >= 2048, so they all partition across the
    // default 16 x 128 workers.
    for size_exp in [12, 14, 16, 18, 20] {
        let size = 1usize << size_exp;
        group.throughput(Throughput::Elements(size as u64));

        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            b.iter_batched(
                || generate_random_data(size),
                |mut data| {
                    sorter.sort(black_box(&mut data)).unwrap();
                    data
                },
                criterion::BatchSize::LargeInput,
            )
        });
    }

    group.finish();
}

/// Benchmark the parallel order checker
fn bench_order_checker(c: &mut Criterion) {
    let mut group = c.benchmark_group("order checker");

    for size_exp in [16, 20] {
        let size = 1usize << size_exp;
        let data: Vec<i32> = (0..size as i32).collect();
        group.throughput(Throughput::Elements(size as u64));

        group.bench_with_input(BenchmarkId::from_parameter(size), &data, |b, data| {
            b.iter(|| check_order::mismatches(black_box(data)))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_std_sort, bench_radix_pipeline, bench_order_checker);
criterion_main!(benches);
