//! Host Data-Parallel Radix Sort Pipeline
//!
//! This module runs the multi-pass counting sort on the CPU with rayon
//! fork-join parallelism. It is the reference realization of the stage
//! semantics shared with the GPU backend: every pass runs
//! histogram → local scan → block scan → coalesce → scatter with a full
//! barrier between stages (each stage only starts once every parallel
//! task of the previous stage has joined).
//!
//! ## Layout
//!
//! The array is split into `n_groups` contiguous partitions; each
//! partition is covered by `wg_size` workers, each owning a contiguous
//! sub-block of `elems_per_worker` elements. The histogram holds one
//! counter per (bucket, group, slot) triple, flattened in exactly that
//! order:
//!
//! ```text
//! index(bucket, group, slot) = (bucket * n_groups + group) * wg_size + slot
//! ```
//!
//! Flat order therefore equals the output order of a pass: all elements
//! of bucket 0 (group 0 first, its workers in slot order), then bucket 1,
//! and so on. A global exclusive prefix sum over this table gives every
//! (bucket, group, slot) counter the destination offset of its first
//! element, which makes the scatter a stable bijection: workers own
//! contiguous sub-blocks, so slot order equals original partition order.
//!
//! The global scan itself is hierarchical: the flat table is cut into
//! `n_groups` chunks of `buckets * wg_size` entries, each chunk is
//! scanned locally and reports its total (block sum), the block sums are
//! scanned, and each chunk's base offset is coalesced back into its
//! entries. No global atomics are needed at any point.

use rayon::prelude::*;

use crate::config::SortConfig;
use crate::double_buffer::DoubleBuffer;
use crate::error::SortError;
use crate::stage::{Stage, StageObserver};

/// Raw pointer wrapper so disjoint parallel writes can cross the rayon
/// closure boundary.
struct SyncPtr<T>(*mut T);

// SAFETY: only used for writes to index sets proven disjoint per worker.
unsafe impl<T> Send for SyncPtr<T> {}
unsafe impl<T> Sync for SyncPtr<T> {}

/// Multi-pass data-parallel radix sorter running on the host CPU.
pub struct RadixSorter {
    config: SortConfig,
}

impl RadixSorter {
    pub fn new(config: SortConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SortConfig {
        &self.config
    }

    /// Sort the given keys in ascending order.
    ///
    /// Arrays of length 0 or 1 are trivially sorted and return
    /// immediately; any other length must partition evenly across
    /// `n_groups * wg_size` workers or the sort is rejected with a
    /// configuration error before any pipeline work starts.
    pub fn sort(&self, data: &mut [i32]) -> Result<(), SortError> {
        self.run(data, None)
    }

    /// Sort with an instrumentation hook that receives each stage's
    /// output buffer after the stage completes.
    pub fn sort_with_observer(
        &self,
        data: &mut [i32],
        observer: &mut StageObserver<'_>,
    ) -> Result<(), SortError> {
        self.run(data, Some(observer))
    }

    fn run(
        &self,
        data: &mut [i32],
        mut observer: Option<&mut StageObserver<'_>>,
    ) -> Result<(), SortError> {
        if data.len() <= 1 {
            return Ok(());
        }
        let config = &self.config;
        config.validate_len(data.len())?;

        let n = data.len();
        let flip = config.key_flip();

        // Bias the sign bit so two's-complement keys compare as unsigned.
        let keys: Vec<u32> = data.iter().map(|&k| (k as u32) ^ flip).collect();
        let mut buffers = DoubleBuffer::new(keys, vec![0u32; n]);

        for pass in 0..config.passes() {
            let shift = pass * config.radix();
            log::debug!(
                "pass {}/{}: digit bits [{}, {})",
                pass + 1,
                config.passes(),
                shift,
                shift + config.radix()
            );

            let mut table = build_histogram(config, buffers.source(), shift);
            debug_assert_eq!(table.iter().map(|&c| c as usize).sum::<usize>(), n);
            if let Some(hook) = observer.as_deref_mut() {
                hook(Stage::Histogram, pass, &table);
            }

            let mut block_sums = local_scan(config, &mut table);
            if let Some(hook) = observer.as_deref_mut() {
                hook(Stage::LocalScan, pass, &table);
            }

            let total = block_scan(&mut block_sums);
            debug_assert_eq!(total as usize, n);
            if let Some(hook) = observer.as_deref_mut() {
                hook(Stage::BlockScan, pass, &block_sums);
            }

            coalesce(config, &mut table, &block_sums);
            if let Some(hook) = observer.as_deref_mut() {
                hook(Stage::Coalesce, pass, &table);
            }

            {
                let (source, destination) = buffers.split_mut();
                scatter(config, source, destination, &mut table, shift);
            }
            buffers.swap();
            if let Some(hook) = observer.as_deref_mut() {
                hook(Stage::Scatter, pass, buffers.source());
            }
            // The histogram, prefix-sum table and block sums carry no
            // state across passes; they are dropped here and rebuilt.
        }

        for (out, key) in data.iter_mut().zip(buffers.into_source()) {
            *out = (key ^ flip) as i32;
        }
        Ok(())
    }
}

/// Tally the current digit of every element into per-(bucket, group,
/// slot) counters. Groups run concurrently; counters are per-worker so
/// no two tasks ever touch the same entry.
fn build_histogram(config: &SortConfig, keys: &[u32], shift: u32) -> Vec<u32> {
    let n_groups = config.n_groups();
    let wg_size = config.wg_size();
    let mask = config.mask();
    let epw = config.elems_per_worker(keys.len());
    let group_len = wg_size * epw;

    // Each group tallies its partition into a private table indexed by
    // (bucket, slot).
    let locals: Vec<Vec<u32>> = (0..n_groups)
        .into_par_iter()
        .map(|group| {
            let mut counts = vec![0u32; config.chunk_len()];
            let partition = &keys[group * group_len..(group + 1) * group_len];
            for slot in 0..wg_size {
                for &key in &partition[slot * epw..(slot + 1) * epw] {
                    let bucket = ((key >> shift) & mask) as usize;
                    counts[bucket * wg_size + slot] += 1;
                }
            }
            counts
        })
        .collect();

    // Interleave the private tables into the flat (bucket, group, slot)
    // order the scan and scatter stages expect.
    let mut table = vec![0u32; config.histogram_len()];
    for bucket in 0..config.buckets() {
        for (group, local) in locals.iter().enumerate() {
            let base = (bucket * n_groups + group) * wg_size;
            table[base..base + wg_size]
                .copy_from_slice(&local[bucket * wg_size..(bucket + 1) * wg_size]);
        }
    }
    table
}

/// Exclusive prefix sum within each scan chunk of the flat table, in
/// place. Returns one block sum (chunk total) per chunk.
fn local_scan(config: &SortConfig, table: &mut [u32]) -> Vec<u32> {
    table
        .par_chunks_mut(config.chunk_len())
        .map(|chunk| {
            let mut sum = 0u32;
            for entry in chunk.iter_mut() {
                let count = *entry;
                *entry = sum;
                sum += count;
            }
            sum
        })
        .collect()
}

/// Exclusive prefix sum over the block sums, in place. The group count
/// is small, so a single sequential scan pass suffices as the second
/// level of the hierarchy. Returns the grand total, which must equal
/// the element count.
fn block_scan(block_sums: &mut [u32]) -> u32 {
    let mut sum = 0u32;
    for entry in block_sums.iter_mut() {
        let count = *entry;
        *entry = sum;
        sum += count;
    }
    sum
}

/// Add each chunk's base offset back into every one of its entries,
/// turning the per-chunk scans into one global exclusive prefix sum.
fn coalesce(config: &SortConfig, table: &mut [u32], block_offsets: &[u32]) {
    table
        .par_chunks_mut(config.chunk_len())
        .zip(block_offsets.par_iter())
        .for_each(|(chunk, &base)| {
            for entry in chunk.iter_mut() {
                *entry += base;
            }
        });
}

/// Write every element to its destination. Each worker re-walks its
/// contiguous sub-block in original order and post-increments its own
/// (bucket, group, slot) offsets, so equal-digit elements keep their
/// relative source order and every destination slot is written exactly
/// once.
fn scatter(
    config: &SortConfig,
    source: &[u32],
    destination: &mut [u32],
    offsets: &mut [u32],
    shift: u32,
) {
    let n_groups = config.n_groups();
    let wg_size = config.wg_size();
    let mask = config.mask();
    let epw = config.elems_per_worker(source.len());
    let group_len = wg_size * epw;

    let out = SyncPtr(destination.as_mut_ptr());
    let off = SyncPtr(offsets.as_mut_ptr());

    (0..n_groups).into_par_iter().for_each(|group| {
        let out = &out;
        let off = &off;
        for slot in 0..wg_size {
            let base = group * group_len + slot * epw;
            for &key in &source[base..base + epw] {
                let bucket = ((key >> shift) & mask) as usize;
                let index = (bucket * n_groups + group) * wg_size + slot;
                // SAFETY: each (group, slot) worker owns its offset
                // entries exclusively, and the prefix sum makes the
                // destination indices a bijection over the array.
                unsafe {
                    let position = *off.0.add(index);
                    *off.0.add(index) = position + 1;
                    *out.0.add(position as usize) = key;
                }
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::check_order;
    use crate::error::{ConfigError, SortError};
    use rand::Rng;

    fn small_config() -> SortConfig {
        // 2 groups x 4 workers: arrays of any multiple of 8 elements.
        SortConfig::new(4, 4, 2, 32).unwrap()
    }

    #[test]
    fn test_sort_known_vector() {
        let sorter = RadixSorter::new(small_config());
        let mut data = vec![120, 223, 102, 300, 335, 160, 253, 111];
        sorter.sort(&mut data).unwrap();
        assert_eq!(data, vec![102, 111, 120, 160, 223, 253, 300, 335]);
        assert_eq!(check_order::mismatches(&data), 0);
    }

    #[test]
    fn test_sort_reverse() {
        let sorter = RadixSorter::new(small_config());
        let mut data = vec![8, 7, 6, 5, 4, 3, 2, 1];
        sorter.sort(&mut data).unwrap();
        assert_eq!(data, vec![1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(check_order::mismatches(&data), 0);
    }

    #[test]
    fn test_sort_all_equal() {
        let config = SortConfig::new(4, 128, 4, 32).unwrap();
        let sorter = RadixSorter::new(config);
        let mut data = vec![1i32; 512];
        sorter.sort(&mut data).unwrap();
        assert_eq!(data, vec![1i32; 512]);
        assert_eq!(check_order::mismatches(&data), 0);
    }

    #[test]
    fn test_sort_is_permutation() {
        let sorter = RadixSorter::new(small_config());
        let mut rng = rand::thread_rng();
        let mut data: Vec<i32> = (0..4096).map(|_| rng.gen()).collect();
        let mut expected = data.clone();
        expected.sort_unstable();

        sorter.sort(&mut data).unwrap();
        assert_eq!(data, expected);
    }

    #[test]
    fn test_sort_negative_keys() {
        let sorter = RadixSorter::new(small_config());
        let mut data = vec![5, -3, 7, i32::MIN, 0, -1, i32::MAX, -128];
        let mut expected = data.clone();
        expected.sort_unstable();

        sorter.sort(&mut data).unwrap();
        assert_eq!(data, expected);
    }

    #[test]
    fn test_sort_idempotent() {
        let sorter = RadixSorter::new(small_config());
        let mut rng = rand::thread_rng();
        let mut data: Vec<i32> = (0..1024).map(|_| rng.gen()).collect();
        sorter.sort(&mut data).unwrap();
        let once = data.clone();
        sorter.sort(&mut data).unwrap();
        assert_eq!(data, once);
    }

    #[test]
    fn test_sort_trivial_lengths() {
        let sorter = RadixSorter::new(small_config());
        let mut empty: Vec<i32> = vec![];
        sorter.sort(&mut empty).unwrap();
        assert!(empty.is_empty());

        let mut single = vec![42];
        sorter.sort(&mut single).unwrap();
        assert_eq!(single, vec![42]);
    }

    #[test]
    fn test_sort_rejects_unpartitionable_length() {
        let sorter = RadixSorter::new(small_config());
        let mut data = vec![3i32; 10];
        let err = sorter.sort(&mut data).unwrap_err();
        assert!(matches!(
            err,
            SortError::Config(ConfigError::UnpartitionableLength { len: 10, lanes: 8 })
        ));
        // Rejected input is left untouched.
        assert_eq!(data, vec![3i32; 10]);
    }

    #[test]
    fn test_sort_stability_on_tagged_duplicates() {
        // With BITS=16 only the low 16 bits participate in digit
        // extraction, so a tag stored above bit 16 rides along
        // untouched. Equal keys must keep their input order, i.e. tags
        // must come out ascending within each key.
        let config = SortConfig::new(4, 4, 2, 16).unwrap();
        let sorter = RadixSorter::new(config);

        let keys = [7, 3, 7, 3, 7, 3, 1, 1];
        let mut data: Vec<i32> = keys
            .iter()
            .enumerate()
            .map(|(tag, &key)| ((tag as i32) << 16) | key)
            .collect();
        sorter.sort(&mut data).unwrap();

        let sorted_keys: Vec<i32> = data.iter().map(|&v| v & 0xFFFF).collect();
        assert_eq!(sorted_keys, vec![1, 1, 3, 3, 3, 7, 7, 7]);
        for window in data.windows(2) {
            if window[0] & 0xFFFF == window[1] & 0xFFFF {
                assert!(
                    window[0] >> 16 < window[1] >> 16,
                    "equal keys reordered: tags {} then {}",
                    window[0] >> 16,
                    window[1] >> 16
                );
            }
        }
    }

    #[test]
    fn test_sort_wide_radix() {
        let config = SortConfig::new(8, 16, 4, 32).unwrap();
        let sorter = RadixSorter::new(config);
        let mut rng = rand::thread_rng();
        let mut data: Vec<i32> = (0..8192).map(|_| rng.gen()).collect();
        let mut expected = data.clone();
        expected.sort_unstable();

        sorter.sort(&mut data).unwrap();
        assert_eq!(data, expected);
    }

    #[test]
    fn test_sort_large_default_config() {
        let sorter = RadixSorter::new(SortConfig::default());
        let mut rng = rand::thread_rng();
        // 64 * 2048 lanes
        let mut data: Vec<i32> = (0..131_072).map(|_| rng.gen()).collect();
        let mut expected = data.clone();
        expected.sort_unstable();

        sorter.sort(&mut data).unwrap();
        assert_eq!(data, expected);
    }

    #[test]
    fn test_observer_sees_all_stages_in_order() {
        let sorter = RadixSorter::new(small_config());
        let mut data = vec![120, 223, 102, 300, 335, 160, 253, 111];
        let mut seen: Vec<(Stage, u32)> = Vec::new();
        sorter
            .sort_with_observer(&mut data, &mut |stage, pass, _buffer| {
                seen.push((stage, pass));
            })
            .unwrap();

        let passes = small_config().passes() as usize;
        assert_eq!(seen.len(), passes * Stage::ALL.len());
        for (pass_index, pass_stages) in seen.chunks(Stage::ALL.len()).enumerate() {
            for (stage_index, &(stage, pass)) in pass_stages.iter().enumerate() {
                assert_eq!(stage, Stage::ALL[stage_index]);
                assert_eq!(pass as usize, pass_index);
            }
        }
    }

    #[test]
    fn test_histogram_counts_sum_to_n() {
        let config = small_config();
        let keys: Vec<u32> = (0..16).map(|v| v * 37).collect();
        let table = build_histogram(&config, &keys, 0);
        assert_eq!(table.len(), config.histogram_len());
        assert_eq!(table.iter().map(|&c| c as usize).sum::<usize>(), 16);
    }

    #[test]
    fn test_histogram_slot_ownership() {
        let config = small_config();
        // 16 elements, all with digit 5 for pass 0: every worker's own
        // counter for bucket 5 must hold exactly its 2 elements.
        let keys = vec![5u32; 16];
        let table = build_histogram(&config, &keys, 0);
        for group in 0..config.n_groups() {
            for slot in 0..config.wg_size() {
                let index = (5 * config.n_groups() + group) * config.wg_size() + slot;
                assert_eq!(table[index], 2);
            }
        }
    }

    #[test]
    fn test_two_level_scan_matches_flat_scan() {
        let config = small_config();
        let mut rng = rand::thread_rng();
        let original: Vec<u32> = (0..config.histogram_len())
            .map(|_| rng.gen_range(0..7))
            .collect();

        // Reference: one flat exclusive scan.
        let mut expected = Vec::with_capacity(original.len());
        let mut sum = 0u32;
        for &count in &original {
            expected.push(sum);
            sum += count;
        }

        let mut table = original.clone();
        let mut block_sums = local_scan(&config, &mut table);
        assert_eq!(block_sums.len(), config.n_groups());
        let total = block_scan(&mut block_sums);
        assert_eq!(total, sum);
        coalesce(&config, &mut table, &block_sums);

        assert_eq!(table, expected);
    }

    #[test]
    fn test_scan_table_monotone_in_flat_order() {
        let config = small_config();
        let keys: Vec<u32> = (0..32).map(|v| v * 13 + 1).collect();
        let mut table = build_histogram(&config, &keys, 0);
        let mut block_sums = local_scan(&config, &mut table);
        block_scan(&mut block_sums);
        coalesce(&config, &mut table, &block_sums);

        for window in table.windows(2) {
            assert!(window[0] <= window[1]);
        }
    }

    #[test]
    fn test_scatter_is_bijection() {
        let config = small_config();
        let mut rng = rand::thread_rng();
        let source: Vec<u32> = (0..64).map(|_| rng.gen_range(0..1000)).collect();

        let mut table = build_histogram(&config, &source, 0);
        let mut block_sums = local_scan(&config, &mut table);
        block_scan(&mut block_sums);
        coalesce(&config, &mut table, &block_sums);

        let mut destination = vec![u32::MAX; source.len()];
        scatter(&config, &source, &mut destination, &mut table, 0);

        // Same multiset: every slot written exactly once.
        let mut expected = source.clone();
        expected.sort_unstable();
        let mut produced = destination.clone();
        produced.sort_unstable();
        assert_eq!(produced, expected);

        // And the pass itself sorted by the low digit.
        for window in destination.windows(2) {
            assert!(window[0] & 0xF <= window[1] & 0xF);
        }
    }
}
