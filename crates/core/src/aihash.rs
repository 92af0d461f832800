//! Aihash proof-of-work engine
//!
//! For a height and a piece of mixing material (header fields plus nonce):
//!
//! 1. Carve the matrix list for the height out of the epoch cache
//! 2. `ma = 0`, `mb = list[0]`; per round `ma = list[m[2r] % n] × mb`,
//!    `mb = ma × list[m[2r+1] % n]`
//! 3. Digest = SHA3-256 of `mb` flattened row-major
//!
//! Miners and verifiers run exactly this code; there is no separate verification path.

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use sha3::{Digest, Sha3_256};

use crate::cache::Cache;
use crate::error::{AihashError, Result};
use crate::extract::{MatrixList, fill_matrix_list};
use crate::matrix::Matrix;
use crate::params::{AihashConfig, DIGEST_BYTES};

/// Aihash engine bound to a validated parameter set
#[derive(Debug, Clone)]
pub struct Aihash {
    config: AihashConfig,
}

impl Aihash {
    /// Validate `config` and create an engine.
    pub fn new(config: AihashConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &AihashConfig {
        &self.config
    }

    /// Matrix list for `height`; reusable for every nonce at that height.
    pub fn matrix_list(&self, height: u64, cache: &Cache) -> Result<MatrixList> {
        fill_matrix_list(
            cache,
            self.config.mat_size,
            self.config.mat_num,
            self.config.epoch_length,
            height,
        )
    }

    /// Compute the digest for `height` and `mixing_material`.
    pub fn hash(
        &self,
        height: u64,
        mixing_material: &[u8],
        cache: &Cache,
    ) -> Result<[u8; DIGEST_BYTES]> {
        self.check_material(mixing_material)?;
        let list = self.matrix_list(height, cache)?;
        self.hash_with_list(&list, mixing_material)
    }

    /// Compute the digest against a prebuilt matrix list.
    pub fn hash_with_list(
        &self,
        list: &MatrixList,
        mixing_material: &[u8],
    ) -> Result<[u8; DIGEST_BYTES]> {
        self.check_material(mixing_material)?;
        if list.mat_size() != self.config.mat_size {
            return Err(AihashError::DimensionMismatch {
                left: self.config.mat_size,
                right: list.mat_size(),
            });
        }
        if list.len() != self.config.mat_num {
            return Err(AihashError::DimensionMismatch {
                left: self.config.mat_num,
                right: list.len(),
            });
        }
        let product = mul_matrix(list, self.config.mul_rounds, mixing_material)?;
        Ok(hash_matrix(&product))
    }

    /// Hash many candidates at one height, building the matrix list once.
    #[cfg(feature = "parallel")]
    pub fn hash_batch(
        &self,
        height: u64,
        materials: &[Vec<u8>],
        cache: &Cache,
    ) -> Result<Vec<[u8; DIGEST_BYTES]>> {
        let list = self.matrix_list(height, cache)?;
        materials
            .par_iter()
            .map(|material| self.hash_with_list(&list, material))
            .collect()
    }

    /// Hash many candidates at one height (sequential fallback).
    #[cfg(not(feature = "parallel"))]
    pub fn hash_batch(
        &self,
        height: u64,
        materials: &[Vec<u8>],
        cache: &Cache,
    ) -> Result<Vec<[u8; DIGEST_BYTES]>> {
        let list = self.matrix_list(height, cache)?;
        materials
            .iter()
            .map(|material| self.hash_with_list(&list, material))
            .collect()
    }

    fn check_material(&self, mixing_material: &[u8]) -> Result<()> {
        let required = self.config.mixing_material_len();
        if mixing_material.len() < required {
            return Err(AihashError::InsufficientMixingMaterial {
                required,
                actual: mixing_material.len(),
            });
        }
        Ok(())
    }
}

/// One-shot hash with explicit parameters.
pub fn hash(
    height: u64,
    mixing_material: &[u8],
    cache: &Cache,
    config: &AihashConfig,
) -> Result<[u8; DIGEST_BYTES]> {
    Aihash::new(*config)?.hash(height, mixing_material, cache)
}

/// Multiplication chain selected by the mixing material bytes
fn mul_matrix(list: &MatrixList, mul_rounds: usize, mat_index: &[u8]) -> Result<Matrix> {
    let mat_num = list.len();
    let mut mb = list[0].clone();

    for round in 0..mul_rounds {
        let index = mat_index[2 * round] as usize % mat_num;
        let ma = Matrix::multiply(&list[index], &mb)?;

        let index = mat_index[2 * round + 1] as usize % mat_num;
        mb = Matrix::multiply(&ma, &list[index])?;
    }

    Ok(mb)
}

/// SHA3-256 over the entries, 1-based row-major
fn hash_matrix(m: &Matrix) -> [u8; DIGEST_BYTES] {
    Sha3_256::digest(m.to_bytes()).into()
}

/// Check that `digest`, read as a big-endian number, is strictly below `target`.
#[inline]
pub fn meets_target(digest: &[u8; DIGEST_BYTES], target: &[u8; DIGEST_BYTES]) -> bool {
    digest < target
}

/// Check if a digest has at least `difficulty` leading zero bits.
///
/// # Example
///
/// ```rust
/// use aihash_core::meets_difficulty;
///
/// let mut digest = [0xFFu8; 32];
/// digest[0] = 0x00;
/// digest[1] = 0x0F;
/// assert!(meets_difficulty(&digest, 12));
/// assert!(!meets_difficulty(&digest, 13));
/// ```
#[inline(always)]
pub fn meets_difficulty(digest: &[u8; DIGEST_BYTES], difficulty: u32) -> bool {
    let mut zero_bits = 0u32;

    for byte in digest.iter() {
        if *byte == 0 {
            zero_bits += 8;
        } else {
            zero_bits += byte.leading_zeros();
            break;
        }
    }

    zero_bits >= difficulty
}
