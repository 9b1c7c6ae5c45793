use crate::bits::{Bit, BitVector};
use crate::error::Error;

/// A dense binary matrix, stored as rows.
///
/// An `r x c` matrix is a linear map from GF(2)^c to GF(2)^r, acting on column
/// vectors through [`Matrix::mul_vec`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Matrix {
    rows: Vec<BitVector>,
    cols: usize,
}

impl Matrix {
    pub fn zero(rows: usize, cols: usize) -> Self {
        Self {
            rows: vec![BitVector::zeros(cols); rows],
            cols,
        }
    }

    pub fn identity(size: usize) -> Self {
        let mut out = Self::zero(size, size);
        for (i, row) in out.rows.iter_mut().enumerate() {
            row.set(i, Bit::one());
        }
        out
    }

    /// Assemble a matrix from its rows.
    ///
    /// Every row must have exactly `cols` bits.
    pub fn from_rows(rows: Vec<BitVector>, cols: usize) -> Result<Self, Error> {
        if let Some(bad) = rows.iter().find(|row| row.len() != cols) {
            return Err(Error::DimensionMismatch {
                expected: cols,
                actual: bad.len(),
            });
        }
        Ok(Self { rows, cols })
    }

    pub(crate) fn from_generated_rows(rows: Vec<BitVector>, cols: usize) -> Self {
        debug_assert!(rows.iter().all(|row| row.len() == cols));
        Self { rows, cols }
    }

    pub fn rows(&self) -> usize {
        self.rows.len()
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn row(&self, index: usize) -> &BitVector {
        &self.rows[index]
    }

    pub fn get(&self, row: usize, col: usize) -> Bit {
        self.rows[row].get(col)
    }

    pub fn is_square(&self) -> bool {
        self.rows.len() == self.cols
    }

    /// Multiply this matrix with a column vector.
    ///
    /// Each output bit is the parity of the vector anded with the matching row.
    pub fn mul_vec(&self, v: &BitVector) -> Result<BitVector, Error> {
        if v.len() != self.cols {
            return Err(Error::DimensionMismatch {
                expected: self.cols,
                actual: v.len(),
            });
        }
        Ok(BitVector::from_bits(self.rows.iter().map(|row| row.dot(v))))
    }

    /// The matrix product `self * other`.
    pub fn mul(&self, other: &Matrix) -> Result<Matrix, Error> {
        if other.rows() != self.cols {
            return Err(Error::DimensionMismatch {
                expected: self.cols,
                actual: other.rows(),
            });
        }
        let rows = self
            .rows
            .iter()
            .map(|row| {
                let mut acc = BitVector::zeros(other.cols);
                for (k, other_row) in other.rows.iter().enumerate() {
                    if row.get(k).is_set() {
                        acc ^= other_row;
                    }
                }
                acc
            })
            .collect();
        Ok(Matrix {
            rows,
            cols: other.cols,
        })
    }

    /// The rank of this matrix over GF(2).
    ///
    /// Columns are eliminated from the most significant down to the least.
    /// A column with no pivot at or below the current row is skipped without
    /// advancing the pivot row.
    pub fn rank(&self) -> usize {
        let mut mat = self.rows.clone();
        let mut row = 0;
        for col in (0..self.cols).rev() {
            if row == mat.len() {
                break;
            }
            let Some(pivot) = (row..mat.len()).find(|&r| mat[r].get(col).is_set()) else {
                continue;
            };
            mat.swap(row, pivot);
            let (upper, lower) = mat.split_at_mut(row + 1);
            let pivot_row = &upper[row];
            for r in lower.iter_mut().filter(|r| r.get(col).is_set()) {
                *r ^= pivot_row;
            }
            row += 1;
        }
        row
    }

    /// The inverse of a square, full rank matrix.
    ///
    /// Row operations reducing `self` to the identity are mirrored onto a
    /// companion matrix seeded with the identity, which ends up holding the
    /// inverse.
    pub fn invert(&self) -> Result<Matrix, Error> {
        if !self.is_square() {
            return Err(Error::SingularMatrix);
        }
        let size = self.cols;
        let mut mat = self.rows.clone();
        let mut inv = Matrix::identity(size).rows;

        // Forward elimination to upper triangular form.
        for col in 0..size {
            let pivot = (col..size)
                .find(|&r| mat[r].get(col).is_set())
                .ok_or(Error::SingularMatrix)?;
            if pivot != col {
                mat.swap(col, pivot);
                inv.swap(col, pivot);
            }
            for r in col + 1..size {
                if mat[r].get(col).is_set() {
                    let (upper, lower) = mat.split_at_mut(r);
                    lower[0] ^= &upper[col];
                    let (upper, lower) = inv.split_at_mut(r);
                    lower[0] ^= &upper[col];
                }
            }
        }

        // Back substitution, clearing everything above the diagonal.
        for col in (0..size).rev() {
            for r in 0..col {
                if mat[r].get(col).is_set() {
                    let (upper, lower) = mat.split_at_mut(col);
                    upper[r] ^= &lower[0];
                    let (upper, lower) = inv.split_at_mut(col);
                    upper[r] ^= &lower[0];
                }
            }
        }

        Ok(Matrix {
            rows: inv,
            cols: size,
        })
    }
}
