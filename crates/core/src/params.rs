//! Aihash Algorithm Parameters
//!
//! Fixed constants of the construction plus the tunable [`AihashConfig`].
//! Every node on a network must agree on the config bit for bit.

use serde::{Deserialize, Serialize};

use crate::error::{AihashError, Result};

/// Row size of the cache in bytes (one SHA3-512 output)
pub const HASH_BYTES: usize = 64;

/// Number of randomized mixing rounds over the cache
pub const CACHE_ROUNDS: usize = 3;

/// Final digest size (SHA3-256)
pub const DIGEST_BYTES: usize = 32;

/// Epoch seed size (SHA3-256)
pub const SEED_BYTES: usize = 32;

/// Bump whenever [`PRIMES`] changes; it is consensus-critical.
pub const PRIME_TABLE_VERSION: u32 = 1;

/// Offsets used to rotate matrix extraction windows within an epoch.
/// Indexed by `(height - 1) % epoch_length`.
#[rustfmt::skip]
pub const PRIMES: [usize; 128] = [
    3, 5, 7, 11, 13, 17, 19, 23,
    29, 31, 37, 41, 43, 47, 53, 59,
    61, 67, 71, 73, 79, 83, 89, 97,
    101, 103, 107, 109, 113, 127, 131, 137,
    139, 149, 151, 157, 163, 167, 173, 179,
    181, 191, 193, 197, 199, 211, 223, 227,
    229, 233, 239, 241, 251, 257, 263, 269,
    271, 277, 281, 283, 293, 307, 311, 313,
    317, 331, 337, 347, 349, 353, 359, 367,
    373, 379, 383, 389, 397, 401, 409, 419,
    421, 431, 433, 439, 443, 449, 457, 461,
    463, 467, 479, 487, 491, 499, 503, 509,
    521, 523, 541, 547, 557, 563, 569, 571,
    577, 587, 593, 599, 601, 607, 613, 617,
    619, 631, 641, 643, 647, 653, 659, 661,
    673, 677, 683, 691, 701, 709, 719, 727,
];

/// Tunable algorithm parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AihashConfig {
    /// Side length of every square matrix
    pub mat_size: usize,
    /// Number of matrices carved from the cache per height
    pub mat_num: usize,
    /// Multiplication rounds (each round performs two products)
    pub mul_rounds: usize,
    /// Blocks per epoch; must not exceed the prime table
    pub epoch_length: u64,
    /// Cache size in bytes; positive multiple of [`HASH_BYTES`]
    pub cache_size: usize,
}

impl AihashConfig {
    /// Production parameters: 256x256 matrices over a 16 MiB cache.
    pub const fn mainnet() -> Self {
        Self {
            mat_size: 256,
            mat_num: 256,
            mul_rounds: 256,
            epoch_length: 128,
            cache_size: 256 * 256 * 256,
        }
    }

    /// Light parameters for test networks and CPU-only development.
    pub const fn testnet() -> Self {
        Self {
            mat_size: 32,
            mat_num: 64,
            mul_rounds: 16,
            epoch_length: 128,
            cache_size: 32 * 32 * 64,
        }
    }

    /// Check that every parameter is usable before any expensive work starts.
    pub fn validate(&self) -> Result<()> {
        if self.mat_size == 0 {
            return Err(AihashError::InvalidConfig("mat_size must be at least 1".into()));
        }
        if self.mat_num == 0 {
            return Err(AihashError::InvalidConfig("mat_num must be at least 1".into()));
        }
        if self.epoch_length == 0 {
            return Err(AihashError::InvalidConfig(
                "epoch_length must be at least 1".into(),
            ));
        }
        check_cache_size(self.cache_size)?;
        if self.epoch_length > PRIMES.len() as u64 {
            return Err(AihashError::PrimeIndexOutOfRange {
                index: (self.epoch_length - 1) as usize,
                len: PRIMES.len(),
            });
        }
        let required = self.window_len();
        if self.cache_size < required {
            return Err(AihashError::CacheTooSmall {
                required,
                actual: self.cache_size,
            });
        }
        Ok(())
    }

    /// Epoch number for a block height
    #[inline]
    pub fn epoch(&self, height: u64) -> u64 {
        height / self.epoch_length
    }

    /// Bytes backing one matrix
    #[inline]
    pub fn matrix_bytes(&self) -> usize {
        self.mat_size * self.mat_size
    }

    /// Bytes of the cache addressed by matrix extraction
    #[inline]
    pub fn window_len(&self) -> usize {
        self.matrix_bytes() * self.mat_num
    }

    /// Minimum mixing material length accepted by [`crate::hash`]
    #[inline]
    pub fn mixing_material_len(&self) -> usize {
        2 * self.mul_rounds
    }
}

impl Default for AihashConfig {
    fn default() -> Self {
        Self::mainnet()
    }
}

/// Cache sizes must be a positive whole number of rows.
pub(crate) fn check_cache_size(size: usize) -> Result<()> {
    if size == 0 || size % HASH_BYTES != 0 {
        return Err(AihashError::InvalidCacheSize { size });
    }
    Ok(())
}
