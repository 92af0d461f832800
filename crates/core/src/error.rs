//! Error taxonomy
//!
//! Every variant is a deterministic input or configuration defect. Callers abort the
//! current mining or verification attempt instead of retrying.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AihashError {
    #[error("cache size {size} is not a positive multiple of 64 bytes")]
    InvalidCacheSize { size: usize },

    #[error("prime index {index} out of range for a table of {len} primes")]
    PrimeIndexOutOfRange { index: usize, len: usize },

    #[error("cache too small: need {required} bytes, have {actual}")]
    CacheTooSmall { required: usize, actual: usize },

    #[error("dimension mismatch: {left} does not match {right}")]
    DimensionMismatch { left: usize, right: usize },

    #[error("index ({row}, {col}) out of range for a {rows}x{cols} matrix")]
    IndexOutOfRange {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },

    #[error("insufficient mixing material: need {required} bytes, have {actual}")]
    InsufficientMixingMaterial { required: usize, actual: usize },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("cache store error: {0}")]
    Store(String),

    #[error("epoch {epoch} is stored under a different seed")]
    SeedMismatch { epoch: u64 },
}

pub type Result<T> = std::result::Result<T, AihashError>;
