//! Signed 8-bit matrices
//!
//! Entries are `i8`, addressed 1-based on both axes. Products accumulate each dot product
//! in `i32` and narrow with two's-complement wrapping, which matches 8-bit wrapping
//! arithmetic on every platform.

use crate::error::{AihashError, Result};

/// Row-major matrix of signed bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Matrix {
    rows: usize,
    cols: usize,
    data: Vec<i8>,
}

impl Matrix {
    /// Wrap row-major entries; `data.len()` must equal `rows * cols`.
    pub fn new(rows: usize, cols: usize, data: Vec<i8>) -> Result<Self> {
        if data.len() != rows * cols {
            return Err(AihashError::DimensionMismatch {
                left: rows * cols,
                right: data.len(),
            });
        }
        Ok(Self { rows, cols, data })
    }

    /// Square matrix from raw cache bytes, reinterpreted as signed.
    pub fn square(size: usize, bytes: &[u8]) -> Result<Self> {
        let data = bytes.iter().map(|&b| b as i8).collect();
        Self::new(size, size, data)
    }

    /// All-zero matrix
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            data: vec![0; rows * cols],
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Entry at 1-based `(i, j)`
    pub fn get(&self, i: usize, j: usize) -> Result<i8> {
        let offset = self.offset(i, j)?;
        Ok(self.data[offset])
    }

    /// Overwrite the entry at 1-based `(i, j)`
    pub fn set(&mut self, i: usize, j: usize, value: i8) -> Result<()> {
        let offset = self.offset(i, j)?;
        self.data[offset] = value;
        Ok(())
    }

    /// Standard matrix product `a × b`.
    pub fn multiply(a: &Matrix, b: &Matrix) -> Result<Matrix> {
        if a.cols != b.rows {
            return Err(AihashError::DimensionMismatch {
                left: a.cols,
                right: b.rows,
            });
        }

        let (n, m, k_dim) = (a.rows, b.cols, a.cols);
        let mut out = vec![0i8; n * m];
        let mut acc = vec![0i32; m];

        for i in 0..n {
            acc.iter_mut().for_each(|v| *v = 0);
            let a_row = &a.data[i * k_dim..(i + 1) * k_dim];

            // i-k-j order keeps both operands streaming row-major
            for (k, &a_val) in a_row.iter().enumerate() {
                if a_val == 0 {
                    continue;
                }
                let a_val = a_val as i32;
                let b_row = &b.data[k * m..(k + 1) * m];
                for (slot, &b_val) in acc.iter_mut().zip(b_row) {
                    *slot = slot.wrapping_add(a_val * b_val as i32);
                }
            }

            for (dst, &sum) in out[i * m..(i + 1) * m].iter_mut().zip(acc.iter()) {
                *dst = sum as i8;
            }
        }

        Ok(Matrix {
            rows: n,
            cols: m,
            data: out,
        })
    }

    /// Entries as bytes, walking `i = 1..=rows`, `j = 1..=cols`.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.data.iter().map(|&v| v as u8).collect()
    }

    /// Row-major entries
    pub fn as_slice(&self) -> &[i8] {
        &self.data
    }

    #[inline(always)]
    fn offset(&self, i: usize, j: usize) -> Result<usize> {
        if i == 0 || j == 0 || i > self.rows || j > self.cols {
            return Err(AihashError::IndexOutOfRange {
                row: i,
                col: j,
                rows: self.rows,
                cols: self.cols,
            });
        }
        Ok((i - 1) * self.cols + (j - 1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn naive_multiply(a: &Matrix, b: &Matrix) -> Matrix {
        let mut c = Matrix::zeros(a.rows(), b.cols());
        for i in 1..=a.rows() {
            for j in 1..=b.cols() {
                let mut v: i8 = 0;
                for k in 1..=a.cols() {
                    let p = a.get(i, k).unwrap().wrapping_mul(b.get(k, j).unwrap());
                    v = v.wrapping_add(p);
                }
                c.set(i, j, v).unwrap();
            }
        }
        c
    }

    #[test]
    fn test_one_based_access() {
        let mut m = Matrix::square(2, &[1, 2, 3, 0xFF]).unwrap();
        assert_eq!(m.get(1, 1).unwrap(), 1);
        assert_eq!(m.get(1, 2).unwrap(), 2);
        assert_eq!(m.get(2, 1).unwrap(), 3);
        assert_eq!(m.get(2, 2).unwrap(), -1);

        m.set(2, 2, 7).unwrap();
        assert_eq!(m.get(2, 2).unwrap(), 7);
    }

    #[test]
    fn test_out_of_range_access() {
        let mut m = Matrix::zeros(3, 3);
        for (i, j) in [(0, 1), (1, 0), (4, 1), (1, 4)] {
            assert!(matches!(m.get(i, j), Err(AihashError::IndexOutOfRange { .. })));
            assert!(matches!(m.set(i, j, 1), Err(AihashError::IndexOutOfRange { .. })));
        }
    }

    #[test]
    fn test_construction_length_checked() {
        assert!(matches!(
            Matrix::square(3, &[0u8; 8]),
            Err(AihashError::DimensionMismatch { left: 9, right: 8 })
        ));
    }

    #[test]
    fn test_multiply_small() {
        let a = Matrix::new(2, 2, vec![1, 2, 3, 4]).unwrap();
        let b = Matrix::new(2, 2, vec![5, 6, 7, 8]).unwrap();
        let c = Matrix::multiply(&a, &b).unwrap();
        assert_eq!(c.as_slice(), &[19, 22, 43, 50]);
    }

    #[test]
    fn test_multiply_rectangular() {
        let a = Matrix::new(1, 3, vec![1, -1, 2]).unwrap();
        let b = Matrix::new(3, 2, vec![1, 0, 0, 1, 3, -2]).unwrap();
        let c = Matrix::multiply(&a, &b).unwrap();
        assert_eq!((c.rows(), c.cols()), (1, 2));
        assert_eq!(c.as_slice(), &[7, -5]);
    }

    #[test]
    fn test_multiply_wraps_like_i8() {
        // 127*127 + 127*127 = 32258 = 0x7E02 -> low byte 0x02
        let a = Matrix::new(1, 2, vec![127, 127]).unwrap();
        let b = Matrix::new(2, 1, vec![127, 127]).unwrap();
        assert_eq!(Matrix::multiply(&a, &b).unwrap().as_slice(), &[2]);

        // -128 * -128 = 16384 = 0x4000 -> 0
        let a = Matrix::new(1, 1, vec![-128]).unwrap();
        assert_eq!(Matrix::multiply(&a, &a).unwrap().as_slice(), &[0]);
    }

    #[test]
    fn test_multiply_matches_wrapping_reference() {
        let bytes: Vec<u8> = (0..64u32).map(|i| (i * 37 + 11) as u8).collect();
        let a = Matrix::square(8, &bytes).unwrap();
        let b = Matrix::square(8, &bytes.iter().rev().copied().collect::<Vec<_>>()).unwrap();
        assert_eq!(Matrix::multiply(&a, &b).unwrap(), naive_multiply(&a, &b));
    }

    #[test]
    fn test_multiply_dimension_mismatch() {
        let a = Matrix::zeros(2, 3);
        let b = Matrix::zeros(2, 3);
        assert!(matches!(
            Matrix::multiply(&a, &b),
            Err(AihashError::DimensionMismatch { left: 3, right: 2 })
        ));
    }

    #[test]
    fn test_to_bytes_row_major() {
        let m = Matrix::new(2, 2, vec![-1, 2, -3, 4]).unwrap();
        assert_eq!(m.to_bytes(), vec![0xFF, 0x02, 0xFD, 0x04]);
    }
}
