//! Radix Sort Comparison Harness
//!
//! Generates a random array, sorts it with the data-parallel radix
//! pipeline, the standard-library sort as a baseline, and the GPU
//! backend when a device is available, then verifies every result with
//! the parallel order checker and prints timings.
//!
//! Usage: `parallel-radix-sort [array_size]`
//! The size must be a multiple of N_GROUPS * WG_SIZE (2048 with the
//! default configuration); it is rounded up if it is not.

use std::time::Instant;

use rand::Rng;

use parallel_radix_sort::{check_order, GpuRadixSorter, RadixSorter, SortConfig};

/// Default array size: 1M elements.
const DEFAULT_ARRAY_SIZE: usize = 1 << 20;

fn main() {
    env_logger::init();

    println!("Parallel Radix Sort");
    println!("===================\n");

    let config = SortConfig::default();

    let args: Vec<String> = std::env::args().collect();
    let requested = if args.len() > 1 {
        args[1].parse().unwrap_or(DEFAULT_ARRAY_SIZE)
    } else {
        DEFAULT_ARRAY_SIZE
    };

    // Round up to a partitionable size rather than rejecting, since this
    // harness picks its own input anyway.
    let lanes = config.lanes();
    let array_size = requested.div_ceil(lanes) * lanes;
    if array_size != requested {
        println!(
            "Note: rounding {} up to {} (multiple of {} workers)",
            requested, array_size, lanes
        );
    }

    println!(
        "Array size: {} elements ({} MB)",
        array_size,
        array_size * 4 / 1_000_000
    );
    println!(
        "Configuration: RADIX={} WG_SIZE={} N_GROUPS={} BITS={} ({} passes, {} buckets)",
        config.radix(),
        config.wg_size(),
        config.n_groups(),
        config.bits(),
        config.passes(),
        config.buckets()
    );

    println!("\nGenerating random data...");
    let mut rng = rand::thread_rng();
    let data: Vec<i32> = (0..array_size).map(|_| rng.gen()).collect();

    // Standard-library baseline
    println!("\n--- CPU baseline (std::sort_unstable / pdqsort) ---");
    let mut baseline = data.clone();
    let start = Instant::now();
    baseline.sort_unstable();
    let baseline_duration = start.elapsed();
    println!(
        "Baseline sort time: {:.3} ms",
        baseline_duration.as_secs_f64() * 1000.0
    );

    // Data-parallel radix pipeline
    println!("\n--- Parallel radix sort (rayon pipeline) ---");
    let sorter = RadixSorter::new(config);
    let mut radix_data = data.clone();
    let start = Instant::now();
    let radix_duration = match sorter.sort(&mut radix_data) {
        Ok(()) => {
            let duration = start.elapsed();
            println!(
                "Radix sort time: {:.3} ms",
                duration.as_secs_f64() * 1000.0
            );
            let mismatches = check_order::mismatches(&radix_data);
            if mismatches == 0 && radix_data == baseline {
                println!("Radix sort verified: OK (0 mismatches)");
            } else {
                println!("ERROR: radix sort failed verification ({} mismatches)", mismatches);
            }
            Some(duration)
        }
        Err(e) => {
            println!("Radix sort error: {}", e);
            None
        }
    };

    // GPU backend, if this machine has one
    println!("\n--- GPU radix sort (Metal) ---");
    let gpu_duration = match GpuRadixSorter::new(config) {
        Ok(sorter) => {
            println!("Using GPU: {}", sorter.device_name());
            let mut gpu_data = data.clone();
            let start = Instant::now();
            match sorter.sort(&mut gpu_data) {
                Ok(()) => {
                    let duration = start.elapsed();
                    println!(
                        "GPU radix sort time: {:.3} ms",
                        duration.as_secs_f64() * 1000.0
                    );
                    match sorter.check_order(&gpu_data) {
                        Ok(0) if gpu_data == baseline => {
                            println!("GPU radix sort verified: OK (0 mismatches)")
                        }
                        Ok(count) => println!(
                            "ERROR: GPU radix sort failed verification ({} mismatches)",
                            count
                        ),
                        Err(e) => println!("GPU order check error: {}", e),
                    }
                    Some(duration)
                }
                Err(e) => {
                    println!("GPU radix sort error: {}", e);
                    None
                }
            }
        }
        Err(e) => {
            println!("GPU not available: {}", e);
            None
        }
    };

    // Comparison
    println!("\n--- Performance Comparison ---");
    let baseline_ms = baseline_duration.as_secs_f64() * 1000.0;

    if let Some(duration) = radix_duration {
        let radix_ms = duration.as_secs_f64() * 1000.0;
        let speedup = baseline_ms / radix_ms;
        if speedup > 1.0 {
            println!("Parallel radix vs baseline: radix is {:.2}x faster", speedup);
        } else {
            println!(
                "Parallel radix vs baseline: baseline is {:.2}x faster",
                1.0 / speedup
            );
        }
    }

    if let Some(duration) = gpu_duration {
        let gpu_ms = duration.as_secs_f64() * 1000.0;
        let speedup = baseline_ms / gpu_ms;
        if speedup > 1.0 {
            println!("GPU radix vs baseline: GPU is {:.2}x faster", speedup);
        } else {
            println!(
                "GPU radix vs baseline: baseline is {:.2}x faster",
                1.0 / speedup
            );
        }
    }
}
