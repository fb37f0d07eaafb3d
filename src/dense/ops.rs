//! Elementwise and product kernels shared by every cell-addressed
//! representation.
//!
//! Binary operands arrive here already normalized to the receiver's cell
//! type (the [`Matrix`](crate::matrix::Matrix) layer extracts foreign
//! matrices and flat item slices into native cells first). Every kernel
//! allocates a fresh `Pending` result; operands are never mutated.

use crate::error::MatrixError;
use crate::scalar::CellScalar;

use super::Dense;

impl<T: CellScalar> Dense<T> {
    /// Elementwise combination over the common prefix of `self` and
    /// `rhs`. Cells past the prefix stay zero in the freshly allocated
    /// result.
    pub(crate) fn ew_prefix(&self, rhs: &[T], f: impl Fn(T, T) -> T) -> Dense<T> {
        let mut out = Dense::pending(self.rows, self.cols);
        let n = self.data.len().min(rhs.len());
        for i in 0..n {
            out.data[i] = f(self.data[i], rhs[i]);
        }
        out
    }

    /// Map every cell through `f` into a fresh `Pending` result.
    pub(crate) fn map_cells(&self, f: impl Fn(T) -> T) -> Dense<T> {
        let mut out = Dense::pending(self.rows, self.cols);
        for (o, &s) in out.data.iter_mut().zip(self.data.iter()) {
            *o = f(s);
        }
        out
    }

    /// Standard matrix product `self * rhs`.
    ///
    /// `rhs` is given as flat row-major cells with its own dimensions;
    /// its row count must equal the receiver's column count.
    pub(crate) fn matmul(
        &self,
        rhs: &[T],
        rhs_rows: usize,
        rhs_cols: usize,
    ) -> Result<Dense<T>, MatrixError> {
        if rhs_rows != self.cols {
            return Err(MatrixError::DimensionMismatch(format!(
                "operand has {} rows but the receiver has {} columns",
                rhs_rows, self.cols
            )));
        }
        let mut out = Dense::pending(self.rows, rhs_cols);
        for y in 0..self.rows {
            for x in 0..rhs_cols {
                let mut sum = T::zero();
                for k in 0..rhs_rows {
                    sum = sum + self.data[y * self.cols + k] * rhs[k * rhs_cols + x];
                }
                out.data[y * rhs_cols + x] = sum;
            }
        }
        Ok(out)
    }

    /// Reversed product `rhs * self`.
    pub(crate) fn matmul_from(
        &self,
        rhs: &[T],
        rhs_rows: usize,
        rhs_cols: usize,
    ) -> Result<Dense<T>, MatrixError> {
        if self.rows != rhs_cols {
            return Err(MatrixError::DimensionMismatch(format!(
                "operand has {} columns but the receiver has {} rows",
                rhs_cols, self.rows
            )));
        }
        let mut out = Dense::pending(rhs_rows, self.cols);
        for y in 0..rhs_rows {
            for x in 0..self.cols {
                let mut sum = T::zero();
                for k in 0..self.rows {
                    sum = sum + rhs[y * rhs_cols + k] * self.data[k * self.cols + x];
                }
                out.data[y * self.cols + x] = sum;
            }
        }
        Ok(out)
    }

    /// Tensor (Kronecker) product `self (x) rhs`, sized
    /// `(R1*R2) x (C1*C2)`.
    ///
    /// Target index for source cell `(y1,x1)` and operand cell `(y2,x2)`
    /// is `y1*C2*C1*R2 + y2*C1*R2 + x1*C2 + x2`. Source cells that are
    /// exactly zero are skipped; the result buffer starts zeroed, so the
    /// corresponding blocks remain zero.
    pub(crate) fn tensor(&self, rhs: &[T], rhs_rows: usize, rhs_cols: usize) -> Dense<T> {
        let mut out = Dense::pending(self.rows * rhs_rows, self.cols * rhs_cols);
        Self::tensor_into(
            &mut out.data,
            &self.data,
            self.rows,
            self.cols,
            rhs,
            rhs_rows,
            rhs_cols,
        );
        out
    }

    /// Reversed tensor product `rhs (x) self`.
    pub(crate) fn tensor_from(&self, rhs: &[T], rhs_rows: usize, rhs_cols: usize) -> Dense<T> {
        let mut out = Dense::pending(self.rows * rhs_rows, self.cols * rhs_cols);
        Self::tensor_into(
            &mut out.data,
            rhs,
            rhs_rows,
            rhs_cols,
            &self.data,
            self.rows,
            self.cols,
        );
        out
    }

    fn tensor_into(
        target: &mut [T],
        left: &[T],
        left_rows: usize,
        left_cols: usize,
        right: &[T],
        right_rows: usize,
        right_cols: usize,
    ) {
        for y1 in 0..left_rows {
            for x1 in 0..left_cols {
                let value = left[y1 * left_cols + x1];
                if value.is_zero_cell() {
                    continue;
                }
                for y2 in 0..right_rows {
                    for x2 in 0..right_cols {
                        let target_index = y1 * right_cols * left_cols * right_rows
                            + y2 * left_cols * right_rows
                            + x1 * right_cols
                            + x2;
                        target[target_index] = value * right[y2 * right_cols + x2];
                    }
                }
            }
        }
    }
}
