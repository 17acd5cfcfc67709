//! Pipeline Stages
//!
//! Each radix sort pass runs five stages in a fixed order, with a full
//! barrier between them. The [`Stage`] enum names them for error
//! reporting, logging, and the instrumentation hook; kernels are bound to
//! these identifiers once at setup rather than looked up by string at
//! dispatch time.

use std::fmt;

/// One stage of a radix sort pass (in execution order), or one of the
/// two order-checker stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    /// Tally per-(bucket, group, slot) digit counts.
    Histogram,
    /// Exclusive prefix sum within each scan chunk, emitting block sums.
    LocalScan,
    /// Exclusive prefix sum over the per-chunk block sums.
    BlockScan,
    /// Add each chunk's base offset back into its local entries.
    Coalesce,
    /// Permute elements into the destination buffer.
    Scatter,
    /// Order checker: flag adjacent inversions.
    Compare,
    /// Order checker: tree-reduce the flags to a mismatch count.
    Reduce,
}

impl Stage {
    /// The stages of one sort pass, in the order they execute.
    pub const ALL: [Stage; 5] = [
        Stage::Histogram,
        Stage::LocalScan,
        Stage::BlockScan,
        Stage::Coalesce,
        Stage::Scatter,
    ];

    /// Stable lowercase name, used in error messages and logs.
    pub fn name(&self) -> &'static str {
        match self {
            Stage::Histogram => "histogram",
            Stage::LocalScan => "local scan",
            Stage::BlockScan => "block scan",
            Stage::Coalesce => "coalesce",
            Stage::Scatter => "scatter",
            Stage::Compare => "compare",
            Stage::Reduce => "reduce",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Instrumentation hook invoked after each stage completes, with the
/// stage, the pass index, and a snapshot of the buffer that stage
/// produced (the histogram/prefix-sum table for the counting and scan
/// stages, the block sums for the block scan, the destination keys for
/// the scatter).
///
/// This replaces ad-hoc conditional read-back of intermediate buffers:
/// callers that want to inspect the pipeline inject a callback instead of
/// recompiling with a debug flag.
pub type StageObserver<'a> = dyn FnMut(Stage, u32, &[u32]) + 'a;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_order() {
        assert_eq!(Stage::ALL[0], Stage::Histogram);
        assert_eq!(Stage::ALL[4], Stage::Scatter);
        assert!(Stage::Histogram < Stage::LocalScan);
        assert!(Stage::Coalesce < Stage::Scatter);
    }

    #[test]
    fn test_stage_display() {
        assert_eq!(Stage::BlockScan.to_string(), "block scan");
        assert_eq!(Stage::Scatter.to_string(), "scatter");
    }
}
