//! Matrix extraction from the epoch cache
//!
//! Only the first `mat_size² × mat_num` bytes of the cache are addressed. They are treated
//! as a circular buffer; matrix `i` starts at `mat_size² × i + prime` where the prime
//! rotates with the height inside the epoch.

use crate::cache::Cache;
use crate::error::{AihashError, Result};
use crate::matrix::Matrix;
use crate::params::PRIMES;

/// Matrices carved from the cache for one height
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatrixList {
    height: u64,
    mat_size: usize,
    matrices: Vec<Matrix>,
}

impl MatrixList {
    /// Height the offsets were derived from
    pub fn height(&self) -> u64 {
        self.height
    }

    pub fn mat_size(&self) -> usize {
        self.mat_size
    }

    pub fn len(&self) -> usize {
        self.matrices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matrices.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Matrix> {
        self.matrices.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Matrix> {
        self.matrices.iter()
    }
}

impl core::ops::Index<usize> for MatrixList {
    type Output = Matrix;

    fn index(&self, index: usize) -> &Matrix {
        &self.matrices[index]
    }
}

/// Extraction offset for `height`: `PRIMES[(height - 1) % epoch_length]`.
///
/// Height 0 wraps to `u64::MAX % epoch_length`.
pub fn prime_for_height(height: u64, epoch_length: u64) -> Result<usize> {
    if epoch_length == 0 {
        return Err(AihashError::InvalidConfig(
            "epoch_length must be at least 1".into(),
        ));
    }
    let index = (height.wrapping_sub(1) % epoch_length) as usize;
    PRIMES
        .get(index)
        .copied()
        .ok_or(AihashError::PrimeIndexOutOfRange {
            index,
            len: PRIMES.len(),
        })
}

/// Carve `mat_num` square matrices of side `mat_size` out of `cache` for `height`.
pub fn fill_matrix_list(
    cache: &Cache,
    mat_size: usize,
    mat_num: usize,
    epoch_length: u64,
    height: u64,
) -> Result<MatrixList> {
    if mat_size == 0 || mat_num == 0 {
        return Err(AihashError::InvalidConfig(
            "mat_size and mat_num must be at least 1".into(),
        ));
    }

    let prime = prime_for_height(height, epoch_length)?;
    let matrix_bytes = mat_size * mat_size;
    let window_len = matrix_bytes * mat_num;
    let bytes = cache.as_bytes();

    if bytes.len() < window_len {
        return Err(AihashError::CacheTooSmall {
            required: window_len,
            actual: bytes.len(),
        });
    }
    let window = &bytes[..window_len];

    let mut matrices = Vec::with_capacity(mat_num);
    for i in 0..mat_num {
        let start = (matrix_bytes * i + prime) % window_len;
        let end = (matrix_bytes * (i + 1) + prime) % window_len;

        let matrix = if start < end {
            Matrix::square(mat_size, &window[start..end])?
        } else {
            // Window crosses the end of the circular buffer: tail then head
            let mut data = Vec::with_capacity(matrix_bytes);
            data.extend_from_slice(&window[start..]);
            data.extend_from_slice(&window[..end]);
            Matrix::square(mat_size, &data)?
        };
        matrices.push(matrix);
    }

    Ok(MatrixList {
        height,
        mat_size,
        matrices,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counting_cache(len: usize) -> Cache {
        Cache::from_bytes((0..len).map(|i| i as u8).collect()).unwrap()
    }

    #[test]
    fn test_prime_rotation() {
        assert_eq!(prime_for_height(1, 10).unwrap(), 3);
        assert_eq!(prime_for_height(2, 10).unwrap(), 5);
        assert_eq!(prime_for_height(10, 10).unwrap(), PRIMES[9]);
        assert_eq!(prime_for_height(11, 10).unwrap(), 3);
        // 0 - 1 wraps to u64::MAX; u64::MAX % 10 == 5
        assert_eq!(prime_for_height(0, 10).unwrap(), PRIMES[5]);
    }

    #[test]
    fn test_prime_table_boundary() {
        assert_eq!(prime_for_height(128, 128).unwrap(), 727);
        assert_eq!(
            prime_for_height(129, 129),
            Err(AihashError::PrimeIndexOutOfRange { index: 128, len: 128 })
        );
        // Lower heights in an oversized epoch still resolve
        assert!(prime_for_height(128, 129).is_ok());
    }

    #[test]
    fn test_contiguous_windows() {
        // mat_size 2, mat_num 4 -> 16 byte window, prime 3 at height 1
        let cache = counting_cache(64);
        let list = fill_matrix_list(&cache, 2, 4, 10, 1).unwrap();
        assert_eq!(list.len(), 4);
        assert_eq!(list.height(), 1);
        assert_eq!(list[0].to_bytes(), vec![3, 4, 5, 6]);
        assert_eq!(list[1].to_bytes(), vec![7, 8, 9, 10]);
        assert_eq!(list[2].to_bytes(), vec![11, 12, 13, 14]);
    }

    #[test]
    fn test_wraparound_window() {
        let cache = counting_cache(64);
        let list = fill_matrix_list(&cache, 2, 4, 10, 1).unwrap();

        // start = (12 + 3) % 16 = 15, end = (16 + 3) % 16 = 3
        let bytes = cache.as_bytes();
        let mut expected = bytes[15..16].to_vec();
        expected.extend_from_slice(&bytes[0..3]);
        assert_eq!(list[3].to_bytes(), expected);
        assert_eq!(list[3].to_bytes(), vec![15, 0, 1, 2]);
    }

    #[test]
    fn test_single_matrix_wraps_whole_window() {
        // mat_num 1: start == end, the whole window rotated by the prime
        let cache = counting_cache(64);
        let list = fill_matrix_list(&cache, 4, 1, 10, 1).unwrap();
        let expected: Vec<u8> = (0..16).map(|k| ((k + 3) % 16) as u8).collect();
        assert_eq!(list[0].to_bytes(), expected);
    }

    #[test]
    fn test_cache_too_small() {
        let cache = counting_cache(64);
        assert_eq!(
            fill_matrix_list(&cache, 4, 8, 10, 1),
            Err(AihashError::CacheTooSmall {
                required: 128,
                actual: 64
            })
        );
    }

    #[test]
    fn test_matrices_are_signed() {
        let cache = Cache::from_bytes(vec![0xFF; 64]).unwrap();
        let list = fill_matrix_list(&cache, 2, 2, 4, 3).unwrap();
        assert!(list.iter().all(|m| m.as_slice().iter().all(|&v| v == -1)));
    }
}
