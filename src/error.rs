//! Error Types
//!
//! Every failure mode of the sort pipeline is fatal at the point it
//! occurs: there is no internal retry and no partial result. Errors carry
//! enough context (stage name, pass index) to diagnose which dispatch of
//! which pass went wrong.

use crate::stage::Stage;

/// Rejected configuration or array/configuration mismatch.
///
/// All of these are detected before any buffer is allocated or any
/// device work begins.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// A pipeline dimension was zero.
    #[error("{name} must be nonzero")]
    ZeroParameter { name: &'static str },

    /// Keys are 32-bit integers; a wider key width is meaningless.
    #[error("BITS ({bits}) must not exceed 32")]
    BitsTooWide { bits: u32 },

    /// The digit width must divide the key width so that every pass
    /// covers a full RADIX-bit slice.
    #[error("RADIX ({radix}) must evenly divide BITS ({bits})")]
    RadixBitsMismatch { radix: u32, bits: u32 },

    /// The array does not partition evenly across the workers. The
    /// pipeline rejects such inputs rather than padding or truncating.
    #[error("array length {len} is not divisible by N_GROUPS * WG_SIZE ({lanes})")]
    UnpartitionableLength { len: usize, lanes: usize },
}

/// Fatal sort failure.
#[derive(Debug, thiserror::Error)]
pub enum SortError {
    /// Invalid configuration or array/configuration mismatch.
    #[error("invalid sort configuration: {0}")]
    Config(#[from] ConfigError),

    /// No compute device is available on this system.
    #[error("no Metal GPU device found")]
    DeviceNotFound,

    /// The kernel program failed to build. The build log is surfaced
    /// verbatim.
    #[error("shader compilation failed: {0}")]
    ShaderCompilation(String),

    /// Binding arguments or launching a stage failed. Indicates an
    /// orchestrator invariant violation such as mismatched buffer sizes.
    #[error("{stage} dispatch failed on pass {pass}: {reason}")]
    Dispatch {
        stage: Stage,
        pass: u32,
        reason: String,
    },

    /// A dispatched stage reported failure on completion. The remaining
    /// passes are aborted and no partial result is returned.
    #[error("{stage} execution failed on pass {pass}: {reason}")]
    Execution {
        stage: Stage,
        pass: u32,
        reason: String,
    },
}
