//! Multi-Pass Parallel Radix Sort
//!
//! This crate sorts arrays of 32-bit signed integers with an LSD
//! (Least Significant Digit) radix sort expressed as a data-parallel
//! pipeline of three stages per pass:
//!
//! 1. **Histogram**: every group of workers tallies the digits of its
//!    partition into per-worker counters
//! 2. **Prefix Sum**: a two-level hierarchical exclusive scan (local scan,
//!    block-sum scan, coalesce) turns the counters into global offsets
//! 3. **Scatter**: every element is written to its offset in the
//!    destination buffer, preserving order among equal digits
//!
//! Passes ping-pong between two buffers until all digit positions have
//! been processed. A companion order checker verifies sortedness with a
//! parallel compare + tree reduction.
//!
//! Two backends share the same stage semantics:
//! - [`pipeline::RadixSorter`] runs the stages on the CPU with rayon
//!   fork-join parallelism and works on every platform
//! - [`gpu_radix_sort::GpuRadixSorter`] dispatches the stages as Metal
//!   compute kernels (macOS only; a stub that reports
//!   [`error::SortError::DeviceNotFound`] is compiled elsewhere)

pub mod check_order;
pub mod config;
pub mod double_buffer;
pub mod error;
pub mod gpu_radix_sort;
pub mod pipeline;
pub mod stage;

pub use check_order::{is_sorted, mismatches};
pub use config::SortConfig;
pub use double_buffer::DoubleBuffer;
pub use error::{ConfigError, SortError};
pub use gpu_radix_sort::GpuRadixSorter;
pub use pipeline::RadixSorter;
pub use stage::{Stage, StageObserver};
