//! Transpose, Gauss-Jordan inversion, determinant, trace.
//!
//! Inversion and the determinant share one elimination scheme: no
//! pivoting, each row normalized by the reciprocal of its diagonal
//! element (conjugate over squared modulus for complex cells), the pivot
//! column zeroed downward and then upward. A zero pivot makes `invert`
//! fail with [`MatrixError::Singular`] but makes `det` return zero; the
//! asymmetry is part of the contract.

use crate::error::MatrixError;
use crate::scalar::{CellScalar, FieldScalar};

use super::Dense;

impl<T: CellScalar> Dense<T> {
    /// Transpose into a fresh `Pending` result:
    /// `target[x*R + y] = source[y*C + x]`.
    ///
    /// Defined for every representation; complex cells change position
    /// only, they are not conjugated.
    pub(crate) fn transpose(&self) -> Dense<T> {
        let mut out = Dense::pending(self.cols, self.rows);
        for y in 0..self.rows {
            for x in 0..self.cols {
                out.data[x * self.rows + y] = self.data[y * self.cols + x];
            }
        }
        out
    }

    /// Sum of the diagonal `source[i*(C+1)]`.
    pub(crate) fn trace(&self) -> Result<T, MatrixError> {
        self.ensure_done()?;
        let n = self.rows.min(self.cols);
        let mut sum = T::zero();
        for i in 0..n {
            sum = sum + self.data[i * (self.cols + 1)];
        }
        Ok(sum)
    }

    fn ensure_square(&self) -> Result<usize, MatrixError> {
        if self.rows != self.cols {
            Err(MatrixError::DimensionMismatch(format!(
                "operation requires a square matrix, got {}x{}",
                self.rows, self.cols
            )))
        } else {
            Ok(self.rows)
        }
    }
}

impl<T: FieldScalar> Dense<T> {
    /// Gauss-Jordan inversion with an identity augment.
    ///
    /// Fails with [`MatrixError::Singular`] on the first zero pivot.
    pub(crate) fn invert(&self) -> Result<Dense<T>, MatrixError> {
        self.ensure_done()?;
        let n = self.ensure_square()?;
        let mut source = self.data.clone();
        let mut out = Dense::pending(n, n);
        for i in 0..n {
            out.data[i * (n + 1)] = T::one();
        }
        for y in 0..n {
            let diag = source[y * (n + 1)];
            if diag.is_zero_cell() {
                return Err(MatrixError::Singular);
            }
            let inv = T::one() / diag;
            for x in 0..n {
                source[y * n + x] = source[y * n + x] * inv;
                out.data[y * n + x] = out.data[y * n + x] * inv;
            }
            for i in (y + 1)..n {
                let value = source[i * n + y];
                for x in 0..n {
                    source[i * n + x] = source[i * n + x] - value * source[y * n + x];
                    out.data[i * n + x] = out.data[i * n + x] - value * out.data[y * n + x];
                }
            }
        }
        for y in (0..n).rev() {
            for i in (0..y).rev() {
                let value = source[i * n + y];
                for x in 0..n {
                    source[i * n + x] = source[i * n + x] - value * source[y * n + x];
                    out.data[i * n + x] = out.data[i * n + x] - value * out.data[y * n + x];
                }
            }
        }
        Ok(out)
    }

    /// Determinant via the same elimination path, without the identity
    /// augment: the product of pivots, or zero as soon as a zero pivot
    /// appears (this differs from `invert`, which fails instead).
    pub(crate) fn det(&self) -> Result<T, MatrixError> {
        self.ensure_done()?;
        let n = self.ensure_square()?;
        let mut source = self.data.clone();
        let mut det = T::one();
        for y in 0..n {
            let diag = source[y * (n + 1)];
            if diag.is_zero_cell() {
                return Ok(T::zero());
            }
            det = det * diag;
            let inv = T::one() / diag;
            for x in 0..n {
                source[y * n + x] = source[y * n + x] * inv;
            }
            for i in (y + 1)..n {
                let value = source[i * n + y];
                for x in 0..n {
                    source[i * n + x] = source[i * n + x] - value * source[y * n + x];
                }
            }
        }
        Ok(det)
    }
}
