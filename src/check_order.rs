//! Parallel Order Checker
//!
//! Independently verifies that a candidate sorted array is
//! non-decreasing: every adjacent pair is compared in parallel into a
//! flag vector, and the flags are summed with a pairwise tree reduction.
//! A result of 0 means fully non-decreasing; a positive count is the
//! number of adjacent inversions detected (not the number of misplaced
//! elements), and means downstream consumers must not trust sortedness.

use rayon::prelude::*;

/// Count adjacent inversions in `data`.
///
/// Returns 0 iff the array is non-decreasing. A reverse-sorted array of
/// length M reports exactly M - 1.
pub fn mismatches(data: &[i32]) -> usize {
    if data.len() < 2 {
        return 0;
    }
    let flags: Vec<u32> = data
        .par_windows(2)
        .map(|pair| (pair[0] > pair[1]) as u32)
        .collect();
    tree_reduce(flags) as usize
}

/// Check if a slice is sorted in ascending order.
#[inline]
pub fn is_sorted(data: &[i32]) -> bool {
    mismatches(data) == 0
}

/// Pairwise parallel reduction: halve the vector until one sum remains.
fn tree_reduce(mut values: Vec<u32>) -> u32 {
    while values.len() > 1 {
        let len = values.len();
        values = (0..len.div_ceil(2))
            .into_par_iter()
            .map(|i| {
                let left = values[2 * i];
                let right = if 2 * i + 1 < len { values[2 * i + 1] } else { 0 };
                left + right
            })
            .collect();
    }
    values[0]
}
