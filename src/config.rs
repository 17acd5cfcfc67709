//! Sort Configuration
//!
//! All pipeline dimensions are collected in an immutable [`SortConfig`]
//! that is validated once, before any buffer is allocated or any stage is
//! dispatched. Inconsistent combinations (a radix that does not divide the
//! key width, an array that does not partition evenly across the workers)
//! are rejected here rather than producing undefined behavior downstream.

use crate::error::ConfigError;

/// Default number of bits processed per pass.
pub const DEFAULT_RADIX: u32 = 4;
/// Default number of workers per group.
pub const DEFAULT_WG_SIZE: usize = 128;
/// Default number of groups partitioning the array.
pub const DEFAULT_N_GROUPS: usize = 16;
/// Default key width in bits.
pub const DEFAULT_BITS: u32 = 32;

/// Validated, immutable configuration for a radix sort pipeline.
///
/// Construction via [`SortConfig::new`] enforces:
/// - all parameters nonzero
/// - `bits <= 32` (keys are 32-bit integers)
/// - `radix` divides `bits` evenly
///
/// The per-sort relationship between the array length and the worker
/// layout is checked separately by [`SortConfig::validate_len`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortConfig {
    radix: u32,
    wg_size: usize,
    n_groups: usize,
    bits: u32,
}

impl SortConfig {
    /// Create a validated configuration.
    pub fn new(
        radix: u32,
        wg_size: usize,
        n_groups: usize,
        bits: u32,
    ) -> Result<Self, ConfigError> {
        if radix == 0 {
            return Err(ConfigError::ZeroParameter { name: "RADIX" });
        }
        if wg_size == 0 {
            return Err(ConfigError::ZeroParameter { name: "WG_SIZE" });
        }
        if n_groups == 0 {
            return Err(ConfigError::ZeroParameter { name: "N_GROUPS" });
        }
        if bits == 0 {
            return Err(ConfigError::ZeroParameter { name: "BITS" });
        }
        if bits > 32 {
            return Err(ConfigError::BitsTooWide { bits });
        }
        if bits % radix != 0 {
            return Err(ConfigError::RadixBitsMismatch { radix, bits });
        }
        Ok(Self {
            radix,
            wg_size,
            n_groups,
            bits,
        })
    }

    /// Bits processed per pass.
    pub fn radix(&self) -> u32 {
        self.radix
    }

    /// Workers per group.
    pub fn wg_size(&self) -> usize {
        self.wg_size
    }

    /// Number of groups partitioning the array.
    pub fn n_groups(&self) -> usize {
        self.n_groups
    }

    /// Total key width in bits.
    pub fn bits(&self) -> u32 {
        self.bits
    }

    /// Number of buckets per pass (`2^radix`).
    pub fn buckets(&self) -> usize {
        1usize << self.radix
    }

    /// Number of passes (`bits / radix`).
    pub fn passes(&self) -> u32 {
        self.bits / self.radix
    }

    /// Digit mask (`buckets - 1`).
    pub fn mask(&self) -> u32 {
        (self.buckets() - 1) as u32
    }

    /// Total parallel workers across all groups.
    pub fn lanes(&self) -> usize {
        self.n_groups * self.wg_size
    }

    /// Entries in the flat histogram / prefix-sum table:
    /// one counter per (bucket, group, slot) triple.
    pub fn histogram_len(&self) -> usize {
        self.buckets() * self.lanes()
    }

    /// Entries scanned by one scan group: a contiguous chunk of the
    /// flat histogram, `buckets * wg_size` long. There are exactly
    /// `n_groups` such chunks.
    pub fn chunk_len(&self) -> usize {
        self.buckets() * self.wg_size
    }

    /// XOR applied to keys before digit extraction so that signed keys
    /// sort in two's-complement order. Only meaningful for full-width
    /// keys; narrower sorts order by the low `bits` bits as-is.
    pub fn key_flip(&self) -> u32 {
        if self.bits == 32 {
            1 << 31
        } else {
            0
        }
    }

    /// Check that `len` partitions evenly across all workers.
    ///
    /// Non-conforming lengths are rejected outright; the pipeline never
    /// pads or truncates.
    pub fn validate_len(&self, len: usize) -> Result<(), ConfigError> {
        if len % self.lanes() != 0 {
            return Err(ConfigError::UnpartitionableLength {
                len,
                lanes: self.lanes(),
            });
        }
        Ok(())
    }

    /// Elements each worker processes for an array of `len` elements.
    /// Callers must have checked [`SortConfig::validate_len`] first.
    pub fn elems_per_worker(&self, len: usize) -> usize {
        len / self.lanes()
    }
}

impl Default for SortConfig {
    /// The configuration of the reference implementation:
    /// RADIX=4, WG_SIZE=128, N_GROUPS=16, BITS=32.
    fn default() -> Self {
        Self {
            radix: DEFAULT_RADIX,
            wg_size: DEFAULT_WG_SIZE,
            n_groups: DEFAULT_N_GROUPS,
            bits: DEFAULT_BITS,
        }
    }
}
