//! The capability surface: one closed variant type over the seven
//! backends.
//!
//! Dispatch is a plain `match` — adding a representation means adding one
//! variant and one arm per operation, never touching the other backends.
//! Cross-type operands are normalized by extracting the other matrix's
//! content into the receiver's native item width before combining; this
//! is intentional truncation, never an implicit upcast. Real and complex
//! matrices never mix implicitly: combining them fails with
//! [`MatrixError::TypeMismatch`] until one side is `cast`.
//!
//! Every producing operation returns its result in the `Pending` state;
//! call [`Matrix::done`] before reading (§ deferred-completion protocol).

use std::fmt;
use std::io::{Read, Write};

use num_complex::Complex;
use tracing::trace;

use crate::bit::BitDense;
use crate::dense::{AggregateDirection, AggregateOp, Dense};
use crate::error::MatrixError;
use crate::kind::MatrixKind;
use crate::piece::Piece;
use crate::scalar::{CellScalar, RawItem};

/// A dense matrix in one of the seven representations.
///
/// Constructed through the [factory](crate::factory); see the crate-level
/// docs for the operation catalog.
#[derive(Debug, Clone)]
pub enum Matrix {
    Bit(BitDense),
    Int32(Dense<i32>),
    Int64(Dense<i64>),
    Float32(Dense<f32>),
    Float64(Dense<f64>),
    Complex32(Dense<Complex<f32>>),
    Complex64(Dense<Complex<f64>>),
}

/// Dispatch over every variant; `$m` binds either backend type, so the
/// body may only use the surface both share.
macro_rules! for_any {
    ($self:expr, $m:ident => $body:expr) => {
        match $self {
            Matrix::Bit($m) => $body,
            Matrix::Int32($m) => $body,
            Matrix::Int64($m) => $body,
            Matrix::Float32($m) => $body,
            Matrix::Float64($m) => $body,
            Matrix::Complex32($m) => $body,
            Matrix::Complex64($m) => $body,
        }
    };
}

/// Dispatch with a per-variant re-wrap constructor for the six
/// cell-addressed backends and a separate bit arm.
macro_rules! with_dense {
    ($self:expr, $m:ident, $wrap:ident => $dense:expr, $bm:ident => $bit:expr) => {
        match $self {
            Matrix::Bit($bm) => $bit,
            Matrix::Int32($m) => {
                let $wrap = Matrix::Int32;
                $dense
            }
            Matrix::Int64($m) => {
                let $wrap = Matrix::Int64;
                $dense
            }
            Matrix::Float32($m) => {
                let $wrap = Matrix::Float32;
                $dense
            }
            Matrix::Float64($m) => {
                let $wrap = Matrix::Float64;
                $dense
            }
            Matrix::Complex32($m) => {
                let $wrap = Matrix::Complex32;
                $dense
            }
            Matrix::Complex64($m) => {
                let $wrap = Matrix::Complex64;
                $dense
            }
        }
    };
}

// ── Operand normalization helpers ───────────────────────────────────

/// Items of another matrix at the receiver's native width, with the
/// real/complex compatibility check.
fn operand_items<T: CellScalar>(
    _recv: &Dense<T>,
    rhs: &Matrix,
) -> Result<Vec<T::Item>, MatrixError> {
    if rhs.kind().is_complex() != T::KIND.is_complex() {
        return Err(MatrixError::TypeMismatch {
            left: T::KIND,
            right: rhs.kind(),
        });
    }
    rhs.extract_items(None)
}

/// Another matrix's content as the receiver's cells.
fn operand_cells<T: CellScalar>(recv: &Dense<T>, rhs: &Matrix) -> Result<Vec<T>, MatrixError> {
    let items = operand_items(recv, rhs)?;
    Ok(items.chunks_exact(T::ITEMS).map(T::from_chunk).collect())
}

/// Flat item slice as the receiver's cells (trailing partial cell
/// dropped).
fn cells_like<T: CellScalar, R: RawItem>(_recv: &Dense<T>, items: &[R]) -> Vec<T> {
    items.chunks_exact(T::ITEMS).map(T::from_chunk).collect()
}

/// Single item broadcast into the receiver's cell type.
fn value_like<T: CellScalar, R: RawItem>(_recv: &Dense<T>, v: R) -> T {
    T::from_value(v)
}

/// Another matrix's content as 0/1 bits for the bit backend; complex
/// operands are rejected.
fn bit_operand(rhs: &Matrix) -> Result<Vec<bool>, MatrixError> {
    if rhs.kind().is_complex() {
        return Err(MatrixError::TypeMismatch {
            left: MatrixKind::Bit,
            right: rhs.kind(),
        });
    }
    let items: Vec<i64> = rhs.extract_items(None)?;
    Ok(items.into_iter().map(|v| v != 0).collect())
}

fn bit_items<R: RawItem>(items: &[R]) -> Vec<bool> {
    items.iter().map(|v| v.is_nonzero()).collect()
}

impl Matrix {
    // ── Shape and state ─────────────────────────────────────────────

    pub(crate) fn zeroed(kind: MatrixKind, rows: usize, cols: usize) -> Matrix {
        match kind {
            MatrixKind::Bit => Matrix::Bit(BitDense::new(rows, cols)),
            MatrixKind::Int32 => Matrix::Int32(Dense::new(rows, cols)),
            MatrixKind::Int64 => Matrix::Int64(Dense::new(rows, cols)),
            MatrixKind::Float32 => Matrix::Float32(Dense::new(rows, cols)),
            MatrixKind::Float64 => Matrix::Float64(Dense::new(rows, cols)),
            MatrixKind::Complex32 => Matrix::Complex32(Dense::new(rows, cols)),
            MatrixKind::Complex64 => Matrix::Complex64(Dense::new(rows, cols)),
        }
    }

    pub fn kind(&self) -> MatrixKind {
        match self {
            Matrix::Bit(_) => MatrixKind::Bit,
            Matrix::Int32(_) => MatrixKind::Int32,
            Matrix::Int64(_) => MatrixKind::Int64,
            Matrix::Float32(_) => MatrixKind::Float32,
            Matrix::Float64(_) => MatrixKind::Float64,
            Matrix::Complex32(_) => MatrixKind::Complex32,
            Matrix::Complex64(_) => MatrixKind::Complex64,
        }
    }

    #[inline]
    pub fn rows(&self) -> usize {
        for_any!(self, m => m.rows())
    }

    #[inline]
    pub fn cols(&self) -> usize {
        for_any!(self, m => m.cols())
    }

    #[inline]
    pub fn is_done(&self) -> bool {
        for_any!(self, m => m.is_done())
    }

    /// The completion barrier: transition `Pending -> Done` and hand the
    /// matrix back, so results chain as `a.add(&b)?.done()`.
    pub fn done(mut self) -> Matrix {
        for_any!(&mut self, m => m.mark_done());
        self
    }

    /// Release non-heap resources. A placeholder: every current backend
    /// is heap-only, so this does nothing.
    pub fn close(&mut self) {}

    fn ensure_done(&self) -> Result<(), MatrixError> {
        for_any!(self, m => m.ensure_done())
    }

    fn total(&self) -> Piece {
        Piece::total(self.rows(), self.cols())
    }

    /// Content equality: same kind, same dimensions, cell-exact values.
    /// Both operands must be `Done`.
    pub fn deep_equals(&self, other: &Matrix) -> Result<bool, MatrixError> {
        self.ensure_done()?;
        other.ensure_done()?;
        if self.kind() != other.kind() || self.rows() != other.rows() || self.cols() != other.cols()
        {
            return Ok(false);
        }
        Ok(match (self, other) {
            (Matrix::Bit(a), Matrix::Bit(b)) => a.eq_bits(b),
            (Matrix::Int32(a), Matrix::Int32(b)) => a.eq_cells(b.cells()),
            (Matrix::Int64(a), Matrix::Int64(b)) => a.eq_cells(b.cells()),
            (Matrix::Float32(a), Matrix::Float32(b)) => a.eq_cells(b.cells()),
            (Matrix::Float64(a), Matrix::Float64(b)) => a.eq_cells(b.cells()),
            (Matrix::Complex32(a), Matrix::Complex32(b)) => a.eq_cells(b.cells()),
            (Matrix::Complex64(a), Matrix::Complex64(b)) => a.eq_cells(b.cells()),
            _ => false,
        })
    }

    // ── Extraction / assignment / fill ──────────────────────────────

    /// Extract a piece (or the whole matrix) row-major as flat items of
    /// width `R`. Complex cells contribute two interleaved items; bit
    /// cells expand to 0 or 1.
    pub fn extract_items<R: RawItem>(&self, piece: Option<Piece>) -> Result<Vec<R>, MatrixError> {
        let piece = piece.unwrap_or_else(|| self.total());
        with_dense!(self, m, _wrap => m.extract_items(&piece),
            bm => bm.extract_items(&piece))
    }

    /// Stream a piece's scalars to `w` at width `R`, row-major,
    /// big-endian, no header; kind and piece travel out-of-band.
    pub fn extract_to<R: RawItem, W: Write>(
        &self,
        piece: Option<Piece>,
        w: &mut W,
    ) -> Result<(), MatrixError> {
        let piece = piece.unwrap_or_else(|| self.total());
        with_dense!(self, m, _wrap => m.extract_to::<R, W>(&piece, w),
            bm => bm.extract_to::<R, W>(&piece, w))
    }

    /// Overwrite a piece from flat items of width `R` (nonzero maps to 1
    /// for bit matrices). A short slice covers only a prefix.
    pub fn assign_items<R: RawItem>(
        &mut self,
        piece: Option<Piece>,
        items: &[R],
    ) -> Result<&mut Matrix, MatrixError> {
        let piece = piece.unwrap_or_else(|| self.total());
        with_dense!(&mut *self, m, _wrap => m.assign_items(&piece, items)?,
            bm => bm.assign_items(&piece, items)?);
        Ok(self)
    }

    /// Overwrite a piece from another matrix's content, converted to the
    /// receiver's representation. Real and complex never mix.
    pub fn assign_matrix(&mut self, piece: Option<Piece>, rhs: &Matrix) -> Result<&mut Matrix, MatrixError> {
        let piece = piece.unwrap_or_else(|| self.total());
        with_dense!(&mut *self, m, _wrap => {
            let items = operand_items(m, rhs)?;
            m.assign_items(&piece, &items)?
        }, bm => {
            let bools = bit_operand(rhs)?;
            let items: Vec<i32> = bools.into_iter().map(i32::from).collect();
            bm.assign_items(&piece, &items)?
        });
        Ok(self)
    }

    /// Overwrite a piece from a binary stream of scalars encoded at
    /// `kind`'s width. A stream that ends early fills what it can.
    pub fn assign_from<R: Read>(
        &mut self,
        piece: Option<Piece>,
        r: &mut R,
        kind: MatrixKind,
    ) -> Result<&mut Matrix, MatrixError> {
        let piece = piece.unwrap_or_else(|| self.total());
        with_dense!(&mut *self, m, _wrap => m.assign_from(&piece, r, kind)?,
            bm => bm.assign_from(&piece, r, kind)?);
        Ok(self)
    }

    /// Set every cell of the piece to `value` (complex: imaginary 0,
    /// bit: nonzero maps to 1).
    pub fn fill(&mut self, piece: Piece, value: f64) -> Result<&mut Matrix, MatrixError> {
        with_dense!(&mut *self, m, _wrap => m.fill(&piece, value_like(m, value))?,
            bm => bm.fill(&piece, value != 0.0)?);
        Ok(self)
    }

    /// `fill` at 64-bit integer width (exact for `Int64` receivers).
    pub fn fill_long(&mut self, piece: Piece, value: i64) -> Result<&mut Matrix, MatrixError> {
        with_dense!(&mut *self, m, _wrap => m.fill(&piece, value_like(m, value))?,
            bm => bm.fill(&piece, value != 0)?);
        Ok(self)
    }

    /// Set every cell of the piece to `re + im*i`. Complex matrices
    /// only.
    pub fn fill_complex(&mut self, piece: Piece, re: f64, im: f64) -> Result<&mut Matrix, MatrixError> {
        match self {
            Matrix::Complex32(m) => m.fill(&piece, Complex::new(re as f32, im as f32))?,
            Matrix::Complex64(m) => m.fill(&piece, Complex::new(re, im))?,
            other => return Err(MatrixError::unsupported(other.kind(), "complex fill")),
        }
        Ok(self)
    }

    // ── Elementwise arithmetic, matrix operands ─────────────────────

    /// Elementwise sum (bit: bitwise OR).
    ///
    /// ```
    /// use polymat::{new_matrix_with, MatrixKind};
    ///
    /// let a = new_matrix_with(MatrixKind::Int32, 1, 2, &[1_i32, 2]).unwrap();
    /// let b = new_matrix_with(MatrixKind::Int32, 1, 2, &[10_i32, 20]).unwrap();
    /// let sum = a.add(&b).unwrap().done();
    /// assert_eq!(sum.extract_items::<i32>(None).unwrap(), vec![11, 22]);
    /// ```
    pub fn add(&self, rhs: &Matrix) -> Result<Matrix, MatrixError> {
        self.ensure_done()?;
        with_dense!(self, m, wrap => {
            let cells = operand_cells(m, rhs)?;
            Ok(wrap(m.ew_prefix(&cells, |a, b| a + b)))
        }, bm => Ok(Matrix::Bit(bm.or(&bit_operand(rhs)?))))
    }

    /// Elementwise difference (bit: `a & !(a & b)` — remove `b` from
    /// `a`).
    pub fn subtract(&self, rhs: &Matrix) -> Result<Matrix, MatrixError> {
        self.ensure_done()?;
        with_dense!(self, m, wrap => {
            let cells = operand_cells(m, rhs)?;
            Ok(wrap(m.ew_prefix(&cells, |a, b| a - b)))
        }, bm => Ok(Matrix::Bit(bm.and_not(&bit_operand(rhs)?))))
    }

    /// Reversed elementwise difference: `rhs - self`.
    pub fn subtract_from(&self, rhs: &Matrix) -> Result<Matrix, MatrixError> {
        self.ensure_done()?;
        with_dense!(self, m, wrap => {
            let cells = operand_cells(m, rhs)?;
            Ok(wrap(m.ew_prefix(&cells, |a, b| b - a)))
        }, bm => Ok(Matrix::Bit(bm.and_not_from(&bit_operand(rhs)?))))
    }

    /// Hadamard (elementwise) product (bit: bitwise AND).
    pub fn mul_hadamard(&self, rhs: &Matrix) -> Result<Matrix, MatrixError> {
        self.ensure_done()?;
        with_dense!(self, m, wrap => {
            let cells = operand_cells(m, rhs)?;
            Ok(wrap(m.ew_prefix(&cells, |a, b| a * b)))
        }, bm => Ok(Matrix::Bit(bm.and(&bit_operand(rhs)?))))
    }

    /// Hadamard quotient `self / rhs` (complex: conjugate over squared
    /// modulus). Not defined for bit matrices.
    pub fn mul_inv_hadamard(&self, rhs: &Matrix) -> Result<Matrix, MatrixError> {
        self.ensure_done()?;
        with_dense!(self, m, wrap => {
            let cells = operand_cells(m, rhs)?;
            Ok(wrap(m.ew_prefix(&cells, |a, b| a / b)))
        }, bm => Err(MatrixError::unsupported(bm_kind(bm), "Hadamard division")))
    }

    /// Reversed Hadamard quotient `rhs / self`.
    pub fn mul_inv_from_hadamard(&self, rhs: &Matrix) -> Result<Matrix, MatrixError> {
        self.ensure_done()?;
        with_dense!(self, m, wrap => {
            let cells = operand_cells(m, rhs)?;
            Ok(wrap(m.ew_prefix(&cells, |a, b| b / a)))
        }, bm => Err(MatrixError::unsupported(bm_kind(bm), "Hadamard division")))
    }

    // ── Elementwise arithmetic, flat item operands ──────────────────

    /// `add` against a flat row-major item slice.
    pub fn add_items<R: RawItem>(&self, items: &[R]) -> Result<Matrix, MatrixError> {
        self.ensure_done()?;
        with_dense!(self, m, wrap =>
            Ok(wrap(m.ew_prefix(&cells_like(m, items), |a, b| a + b))),
            bm => Ok(Matrix::Bit(bm.or(&bit_items(items)))))
    }

    /// `subtract` against a flat item slice.
    pub fn subtract_items<R: RawItem>(&self, items: &[R]) -> Result<Matrix, MatrixError> {
        self.ensure_done()?;
        with_dense!(self, m, wrap =>
            Ok(wrap(m.ew_prefix(&cells_like(m, items), |a, b| a - b))),
            bm => Ok(Matrix::Bit(bm.and_not(&bit_items(items)))))
    }

    /// `subtract_from` against a flat item slice.
    pub fn subtract_from_items<R: RawItem>(&self, items: &[R]) -> Result<Matrix, MatrixError> {
        self.ensure_done()?;
        with_dense!(self, m, wrap =>
            Ok(wrap(m.ew_prefix(&cells_like(m, items), |a, b| b - a))),
            bm => Ok(Matrix::Bit(bm.and_not_from(&bit_items(items)))))
    }

    /// Hadamard product against a flat item slice.
    pub fn mul_hadamard_items<R: RawItem>(&self, items: &[R]) -> Result<Matrix, MatrixError> {
        self.ensure_done()?;
        with_dense!(self, m, wrap =>
            Ok(wrap(m.ew_prefix(&cells_like(m, items), |a, b| a * b))),
            bm => Ok(Matrix::Bit(bm.and(&bit_items(items)))))
    }

    /// Hadamard quotient against a flat item slice.
    pub fn mul_inv_hadamard_items<R: RawItem>(&self, items: &[R]) -> Result<Matrix, MatrixError> {
        self.ensure_done()?;
        with_dense!(self, m, wrap =>
            Ok(wrap(m.ew_prefix(&cells_like(m, items), |a, b| a / b))),
            bm => Err(MatrixError::unsupported(bm_kind(bm), "Hadamard division")))
    }

    /// Reversed Hadamard quotient against a flat item slice.
    pub fn mul_inv_from_hadamard_items<R: RawItem>(
        &self,
        items: &[R],
    ) -> Result<Matrix, MatrixError> {
        self.ensure_done()?;
        with_dense!(self, m, wrap =>
            Ok(wrap(m.ew_prefix(&cells_like(m, items), |a, b| b / a))),
            bm => Err(MatrixError::unsupported(bm_kind(bm), "Hadamard division")))
    }

    // ── Scalar arithmetic ───────────────────────────────────────────

    /// Add `v` to every cell (bit: OR with nonzero).
    pub fn add_value<R: RawItem>(&self, v: R) -> Result<Matrix, MatrixError> {
        self.ensure_done()?;
        with_dense!(self, m, wrap => {
            let x = value_like(m, v);
            Ok(wrap(m.map_cells(|a| a + x)))
        }, bm => Ok(Matrix::Bit(bm.map_value(v.is_nonzero(), |a, b| a | b))))
    }

    /// Subtract `v` from every cell (bit: remove-nonzero law).
    pub fn subtract_value<R: RawItem>(&self, v: R) -> Result<Matrix, MatrixError> {
        self.ensure_done()?;
        with_dense!(self, m, wrap => {
            let x = value_like(m, v);
            Ok(wrap(m.map_cells(|a| a - x)))
        }, bm => Ok(Matrix::Bit(bm.map_value(v.is_nonzero(), |a, b| a & !(a & b)))))
    }

    /// Subtract every cell from `v`.
    pub fn subtract_from_value<R: RawItem>(&self, v: R) -> Result<Matrix, MatrixError> {
        self.ensure_done()?;
        with_dense!(self, m, wrap => {
            let x = value_like(m, v);
            Ok(wrap(m.map_cells(|a| x - a)))
        }, bm => Ok(Matrix::Bit(bm.map_value(v.is_nonzero(), |a, b| b & !(b & a)))))
    }

    /// Multiply every cell by `v` (bit: AND with nonzero).
    pub fn mul_value<R: RawItem>(&self, v: R) -> Result<Matrix, MatrixError> {
        self.ensure_done()?;
        with_dense!(self, m, wrap => {
            let x = value_like(m, v);
            Ok(wrap(m.map_cells(|a| a * x)))
        }, bm => Ok(Matrix::Bit(bm.map_value(v.is_nonzero(), |a, b| a & b))))
    }

    /// Divide every cell by `v`. Not defined for bit matrices.
    pub fn div_value<R: RawItem>(&self, v: R) -> Result<Matrix, MatrixError> {
        self.ensure_done()?;
        with_dense!(self, m, wrap => {
            let x = value_like(m, v);
            Ok(wrap(m.map_cells(|a| a / x)))
        }, bm => Err(MatrixError::unsupported(bm_kind(bm), "scalar division")))
    }

    /// Divide `v` by every cell.
    pub fn div_from_value<R: RawItem>(&self, v: R) -> Result<Matrix, MatrixError> {
        self.ensure_done()?;
        with_dense!(self, m, wrap => {
            let x = value_like(m, v);
            Ok(wrap(m.map_cells(|a| x / a)))
        }, bm => Err(MatrixError::unsupported(bm_kind(bm), "scalar division")))
    }

    /// Add `re + im*i` to every cell. Complex matrices only.
    pub fn add_complex_value(&self, re: f64, im: f64) -> Result<Matrix, MatrixError> {
        self.complex_scalar_op(re, im, "complex scalar addition", |a, x| a + x)
    }

    /// Subtract `re + im*i` from every cell. Complex matrices only.
    pub fn subtract_complex_value(&self, re: f64, im: f64) -> Result<Matrix, MatrixError> {
        self.complex_scalar_op(re, im, "complex scalar subtraction", |a, x| a - x)
    }

    /// Subtract every cell from `re + im*i`. Complex matrices only.
    pub fn subtract_from_complex_value(&self, re: f64, im: f64) -> Result<Matrix, MatrixError> {
        self.complex_scalar_op(re, im, "complex scalar subtraction", |a, x| x - a)
    }

    /// Multiply every cell by `re + im*i`. Complex matrices only.
    pub fn mul_complex_value(&self, re: f64, im: f64) -> Result<Matrix, MatrixError> {
        self.complex_scalar_op(re, im, "complex scalar multiplication", |a, x| a * x)
    }

    /// Divide every cell by `re + im*i` (conjugate over squared
    /// modulus). Complex matrices only.
    pub fn div_complex_value(&self, re: f64, im: f64) -> Result<Matrix, MatrixError> {
        self.complex_scalar_op(re, im, "complex scalar division", |a, x| a / x)
    }

    /// Divide `re + im*i` by every cell. Complex matrices only.
    pub fn div_from_complex_value(&self, re: f64, im: f64) -> Result<Matrix, MatrixError> {
        self.complex_scalar_op(re, im, "complex scalar division", |a, x| x / a)
    }

    fn complex_scalar_op(
        &self,
        re: f64,
        im: f64,
        what: &str,
        f: impl Fn(Complex<f64>, Complex<f64>) -> Complex<f64>,
    ) -> Result<Matrix, MatrixError> {
        self.ensure_done()?;
        match self {
            Matrix::Complex32(m) => {
                let x = Complex::new(re, im);
                Ok(Matrix::Complex32(m.map_cells(|a| {
                    let r = f(Complex::new(a.re as f64, a.im as f64), x);
                    Complex::new(r.re as f32, r.im as f32)
                })))
            }
            Matrix::Complex64(m) => {
                let x = Complex::new(re, im);
                Ok(Matrix::Complex64(m.map_cells(|a| f(a, x))))
            }
            other => Err(MatrixError::unsupported(other.kind(), what)),
        }
    }

    // ── Products ────────────────────────────────────────────────────

    /// Standard matrix product `self * rhs`; the operand's row count
    /// must equal the receiver's column count.
    pub fn mul(&self, rhs: &Matrix) -> Result<Matrix, MatrixError> {
        self.ensure_done()?;
        with_dense!(self, m, wrap => {
            let cells = operand_cells(m, rhs)?;
            Ok(wrap(m.matmul(&cells, rhs.rows(), rhs.cols())?))
        }, bm => Err(MatrixError::unsupported(bm_kind(bm), "matrix product")))
    }

    /// Reversed product `rhs * self`.
    pub fn mul_from(&self, rhs: &Matrix) -> Result<Matrix, MatrixError> {
        self.ensure_done()?;
        with_dense!(self, m, wrap => {
            let cells = operand_cells(m, rhs)?;
            Ok(wrap(m.matmul_from(&cells, rhs.rows(), rhs.cols())?))
        }, bm => Err(MatrixError::unsupported(bm_kind(bm), "matrix product")))
    }

    /// Tensor (Kronecker) product `self (x) rhs`, sized
    /// `(R1*R2) x (C1*C2)`.
    pub fn tensor_mul(&self, rhs: &Matrix) -> Result<Matrix, MatrixError> {
        self.ensure_done()?;
        with_dense!(self, m, wrap => {
            let cells = operand_cells(m, rhs)?;
            Ok(wrap(m.tensor(&cells, rhs.rows(), rhs.cols())))
        }, bm => {
            let bools = bit_operand(rhs)?;
            Ok(Matrix::Bit(bm.tensor(&bools, rhs.rows(), rhs.cols())))
        })
    }

    /// Reversed tensor product `rhs (x) self`.
    pub fn tensor_mul_from(&self, rhs: &Matrix) -> Result<Matrix, MatrixError> {
        self.ensure_done()?;
        with_dense!(self, m, wrap => {
            let cells = operand_cells(m, rhs)?;
            Ok(wrap(m.tensor_from(&cells, rhs.rows(), rhs.cols())))
        }, bm => {
            let bools = bit_operand(rhs)?;
            Ok(Matrix::Bit(bm.tensor_from(&bools, rhs.rows(), rhs.cols())))
        })
    }

    // ── Linear algebra ──────────────────────────────────────────────

    /// Transpose; defined for every representation. Complex cells swap
    /// position without conjugation.
    pub fn transpose(&self) -> Result<Matrix, MatrixError> {
        self.ensure_done()?;
        with_dense!(self, m, wrap => Ok(wrap(m.transpose())),
            bm => Ok(Matrix::Bit(bm.transpose())))
    }

    /// Gauss-Jordan inversion; float and complex-float square matrices
    /// only. Fails with [`MatrixError::Singular`] on a zero pivot.
    pub fn invert(&self) -> Result<Matrix, MatrixError> {
        self.ensure_done()?;
        trace!(rows = self.rows(), cols = self.cols(), "inverting matrix");
        match self {
            Matrix::Float32(m) => Ok(Matrix::Float32(m.invert()?)),
            Matrix::Float64(m) => Ok(Matrix::Float64(m.invert()?)),
            Matrix::Complex32(m) => Ok(Matrix::Complex32(m.invert()?)),
            Matrix::Complex64(m) => Ok(Matrix::Complex64(m.invert()?)),
            other => Err(MatrixError::unsupported(other.kind(), "inversion")),
        }
    }

    /// Determinant of a real float/double square matrix. Returns `0`
    /// when a zero pivot is met, unlike [`Matrix::invert`], which fails.
    pub fn det(&self) -> Result<f64, MatrixError> {
        match self {
            Matrix::Float32(m) => Ok(m.det()? as f64),
            Matrix::Float64(m) => m.det(),
            other => Err(MatrixError::unsupported(other.kind(), "real determinant")),
        }
    }

    /// Determinant of a complex square matrix, as a complex pair.
    pub fn det2(&self) -> Result<Complex<f64>, MatrixError> {
        match self {
            Matrix::Complex32(m) => {
                let d = m.det()?;
                Ok(Complex::new(d.re as f64, d.im as f64))
            }
            Matrix::Complex64(m) => m.det(),
            other => Err(MatrixError::unsupported(other.kind(), "complex determinant")),
        }
    }

    /// Sum of the diagonal of a real matrix.
    pub fn trace(&self) -> Result<f64, MatrixError> {
        match self {
            Matrix::Int32(m) => Ok(m.trace()? as f64),
            Matrix::Int64(m) => Ok(m.trace()? as f64),
            Matrix::Float32(m) => Ok(m.trace()? as f64),
            Matrix::Float64(m) => m.trace(),
            other => Err(MatrixError::unsupported(other.kind(), "real trace")),
        }
    }

    /// Sum of the diagonal of a complex matrix, as a complex pair.
    pub fn trace2(&self) -> Result<Complex<f64>, MatrixError> {
        match self {
            Matrix::Complex32(m) => {
                let t = m.trace()?;
                Ok(Complex::new(t.re as f64, t.im as f64))
            }
            Matrix::Complex64(m) => m.trace(),
            other => Err(MatrixError::unsupported(other.kind(), "complex trace")),
        }
    }

    // ── Aggregation ─────────────────────────────────────────────────

    /// Directional reduction. `ByColumns` collapses each row (`R x 1`),
    /// `ByRows` each column (`1 x C`), `Total` everything (`1 x 1`).
    ///
    /// Integer matrices reject `Avg`; bit matrices reject every op. The
    /// asymmetry is part of the contract.
    ///
    /// ```
    /// use polymat::{new_matrix_with, AggregateDirection, AggregateOp, MatrixKind};
    ///
    /// let m = new_matrix_with(MatrixKind::Float64, 2, 2, &[1.0_f64, 2.0, 3.0, 4.0]).unwrap();
    /// let sums = m
    ///     .aggregate(AggregateDirection::ByColumns, AggregateOp::Sum)
    ///     .unwrap()
    ///     .done();
    /// assert_eq!(sums.extract_items::<f64>(None).unwrap(), vec![3.0, 7.0]);
    /// ```
    pub fn aggregate(
        &self,
        dir: AggregateDirection,
        op: AggregateOp,
    ) -> Result<Matrix, MatrixError> {
        self.ensure_done()?;
        match self {
            Matrix::Bit(_) => Err(MatrixError::unsupported(MatrixKind::Bit, "aggregation")),
            Matrix::Int32(m) => {
                if op == AggregateOp::Avg {
                    Err(MatrixError::unsupported(MatrixKind::Int32, "Avg aggregation"))
                } else {
                    Ok(Matrix::Int32(m.aggregate(dir, op)))
                }
            }
            Matrix::Int64(m) => {
                if op == AggregateOp::Avg {
                    Err(MatrixError::unsupported(MatrixKind::Int64, "Avg aggregation"))
                } else {
                    Ok(Matrix::Int64(m.aggregate(dir, op)))
                }
            }
            Matrix::Float32(m) => Ok(Matrix::Float32(m.aggregate(dir, op))),
            Matrix::Float64(m) => Ok(Matrix::Float64(m.aggregate(dir, op))),
            Matrix::Complex32(m) => Ok(Matrix::Complex32(m.aggregate(dir, op))),
            Matrix::Complex64(m) => Ok(Matrix::Complex64(m.aggregate(dir, op))),
        }
    }

    // ── Casting ─────────────────────────────────────────────────────

    /// Convert the whole matrix to another representation.
    ///
    /// Real-to-real converts numerically (narrowing truncates),
    /// real-to-complex zeroes the imaginary component, complex-to-real
    /// and bit-to-complex fail with
    /// [`MatrixError::UnsupportedConversion`], real-to-bit collapses
    /// nonzero to 1, and a self-cast returns a copy.
    ///
    /// ```
    /// use polymat::{new_matrix_with, MatrixKind};
    ///
    /// let m = new_matrix_with(MatrixKind::Int32, 1, 2, &[1_i32, 2]).unwrap();
    /// let z = m.cast(MatrixKind::Complex64).unwrap().done();
    /// assert_eq!(z.extract_items::<f64>(None).unwrap(), vec![1.0, 0.0, 2.0, 0.0]);
    /// assert!(z.cast(MatrixKind::Int32).is_err());
    /// ```
    pub fn cast(&self, target: MatrixKind) -> Result<Matrix, MatrixError> {
        self.ensure_done()?;
        if target == self.kind() {
            return Ok(with_dense!(self, m, wrap => wrap(m.copy_pending()),
                bm => Matrix::Bit(bm.copy_pending())));
        }
        if self.kind().is_complex() && !target.is_complex() {
            return Err(MatrixError::UnsupportedConversion(format!(
                "{:?} -> {:?}: the imaginary component cannot be dropped implicitly",
                self.kind(),
                target
            )));
        }
        if self.kind().is_bit() && target.is_complex() {
            return Err(MatrixError::UnsupportedConversion(format!(
                "{:?} -> {:?}",
                self.kind(),
                target
            )));
        }
        trace!(from = ?self.kind(), to = ?target, "casting matrix");
        Ok(match target {
            MatrixKind::Bit => {
                let items: Vec<f64> = self.extract_items(None)?;
                let mut out = BitDense::new(self.rows(), self.cols());
                out.assign_items(&self.total(), &items)?;
                Matrix::Bit(out.copy_pending())
            }
            MatrixKind::Int32 => Matrix::Int32(self.cast_cells()?),
            MatrixKind::Int64 => Matrix::Int64(self.cast_cells()?),
            MatrixKind::Float32 => Matrix::Float32(self.cast_cells()?),
            MatrixKind::Float64 => Matrix::Float64(self.cast_cells()?),
            MatrixKind::Complex32 => Matrix::Complex32(self.cast_cells()?),
            MatrixKind::Complex64 => Matrix::Complex64(self.cast_cells()?),
        })
    }

    fn cast_cells<D: CellScalar>(&self) -> Result<Dense<D>, MatrixError> {
        let items: Vec<D::Item> = self.extract_items(None)?;
        let cells: Vec<D> = if self.kind().items_per_cell() == 2 {
            items.chunks_exact(2).map(D::from_chunk).collect()
        } else {
            items.into_iter().map(|v| D::from_value(v)).collect()
        };
        Ok(Dense::from_cells_pending(self.rows(), self.cols(), cells))
    }

    // ── Apply ───────────────────────────────────────────────────────

    /// Piece-scoped transform of a bit matrix; the callback sees
    /// `(row, col, bit)` and returns the replacement bit.
    pub fn apply_bits(
        &self,
        piece: Piece,
        f: impl FnMut(usize, usize, bool) -> bool,
    ) -> Result<Matrix, MatrixError> {
        match self {
            Matrix::Bit(bm) => Ok(Matrix::Bit(bm.apply_bits(&piece, f)?)),
            other => Err(MatrixError::unsupported(other.kind(), "bit apply")),
        }
    }

    /// Piece-scoped transform of an `Int32` matrix.
    pub fn apply_ints(
        &self,
        piece: Piece,
        f: impl FnMut(usize, usize, i32) -> i32,
    ) -> Result<Matrix, MatrixError> {
        match self {
            Matrix::Int32(m) => Ok(Matrix::Int32(m.apply_cells(&piece, f)?)),
            other => Err(MatrixError::unsupported(other.kind(), "int apply")),
        }
    }

    /// Piece-scoped transform of an `Int64` matrix.
    pub fn apply_longs(
        &self,
        piece: Piece,
        f: impl FnMut(usize, usize, i64) -> i64,
    ) -> Result<Matrix, MatrixError> {
        match self {
            Matrix::Int64(m) => Ok(Matrix::Int64(m.apply_cells(&piece, f)?)),
            other => Err(MatrixError::unsupported(other.kind(), "long apply")),
        }
    }

    /// Piece-scoped transform of a `Float32` matrix.
    pub fn apply_floats(
        &self,
        piece: Piece,
        f: impl FnMut(usize, usize, f32) -> f32,
    ) -> Result<Matrix, MatrixError> {
        match self {
            Matrix::Float32(m) => Ok(Matrix::Float32(m.apply_cells(&piece, f)?)),
            other => Err(MatrixError::unsupported(other.kind(), "float apply")),
        }
    }

    /// Piece-scoped transform of a `Float64` matrix.
    pub fn apply_doubles(
        &self,
        piece: Piece,
        f: impl FnMut(usize, usize, f64) -> f64,
    ) -> Result<Matrix, MatrixError> {
        match self {
            Matrix::Float64(m) => Ok(Matrix::Float64(m.apply_cells(&piece, f)?)),
            other => Err(MatrixError::unsupported(other.kind(), "double apply")),
        }
    }

    /// Piece-scoped transform of a `Complex32` matrix; the callback
    /// mutates the cell in place.
    pub fn apply_complex_floats(
        &self,
        piece: Piece,
        mut f: impl FnMut(usize, usize, &mut Complex<f32>),
    ) -> Result<Matrix, MatrixError> {
        match self {
            Matrix::Complex32(m) => Ok(Matrix::Complex32(m.apply_cells(&piece, |r, c, v| {
                let mut cell = v;
                f(r, c, &mut cell);
                cell
            })?)),
            other => Err(MatrixError::unsupported(other.kind(), "complex apply")),
        }
    }

    /// Piece-scoped transform of a `Complex64` matrix; the callback
    /// mutates the cell in place.
    pub fn apply_complex_doubles(
        &self,
        piece: Piece,
        mut f: impl FnMut(usize, usize, &mut Complex<f64>),
    ) -> Result<Matrix, MatrixError> {
        match self {
            Matrix::Complex64(m) => Ok(Matrix::Complex64(m.apply_cells(&piece, |r, c, v| {
                let mut cell = v;
                f(r, c, &mut cell);
                cell
            })?)),
            other => Err(MatrixError::unsupported(other.kind(), "complex apply")),
        }
    }
}

fn bm_kind(_bm: &BitDense) -> MatrixKind {
    MatrixKind::Bit
}

// ── Human-readable dump ─────────────────────────────────────────────

impl fmt::Display for Matrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "=== Matrix: type={:?}, size={}x{}:",
            self.kind(),
            self.rows(),
            self.cols()
        )?;
        if !self.is_done() {
            writeln!(f, "<pending: call done() before reading>")?;
        } else {
            for y in 0..self.rows() {
                for x in 0..self.cols() {
                    match self {
                        Matrix::Bit(bm) => {
                            let bit = bm
                                .extract_items::<i32>(&Piece::of(x, y, 1, 1))
                                .map_err(|_| fmt::Error)?[0];
                            write!(f, "{bit} ")?;
                        }
                        Matrix::Int32(m) => m.at(y, x).fmt_cell(f)?,
                        Matrix::Int64(m) => m.at(y, x).fmt_cell(f)?,
                        Matrix::Float32(m) => m.at(y, x).fmt_cell(f)?,
                        Matrix::Float64(m) => m.at(y, x).fmt_cell(f)?,
                        Matrix::Complex32(m) => m.at(y, x).fmt_cell(f)?,
                        Matrix::Complex64(m) => m.at(y, x).fmt_cell(f)?,
                    }
                }
                writeln!(f)?;
            }
        }
        write!(f, "=== End matrix")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factory::new_matrix;

    fn f64_matrix(rows: usize, cols: usize, values: &[f64]) -> Matrix {
        let mut m = new_matrix(MatrixKind::Float64, rows, cols).unwrap();
        m.assign_items(None, values).unwrap();
        m
    }

    #[test]
    fn add_produces_pending_result() {
        let a = f64_matrix(2, 2, &[1.0, 2.0, 3.0, 4.0]);
        let b = f64_matrix(2, 2, &[10.0, 20.0, 30.0, 40.0]);
        let sum = a.add(&b).unwrap();
        assert!(!sum.is_done());
        let sum = sum.done();
        assert_eq!(
            sum.extract_items::<f64>(None).unwrap(),
            vec![11.0, 22.0, 33.0, 44.0]
        );
    }

    #[test]
    fn pending_operand_is_rejected() {
        let a = f64_matrix(2, 2, &[1.0; 4]);
        let pending = a.add_value(1.0_f64).unwrap();
        assert!(matches!(
            a.add(&pending),
            Err(MatrixError::PendingState)
        ));
    }

    #[test]
    fn cross_type_operand_narrows_into_receiver() {
        let mut ints = new_matrix(MatrixKind::Int32, 1, 3).unwrap();
        ints.assign_items(None, &[1_i32, 2, 3]).unwrap();
        let floats = f64_matrix(1, 3, &[0.9, 1.9, 2.9]);
        // float operand truncates into the int receiver
        let sum = ints.add(&floats).unwrap().done();
        assert_eq!(sum.extract_items::<i32>(None).unwrap(), vec![1, 3, 5]);
    }

    #[test]
    fn real_complex_mix_is_rejected() {
        let real = f64_matrix(2, 2, &[1.0; 4]);
        let complex = new_matrix(MatrixKind::Complex64, 2, 2).unwrap();
        assert!(matches!(
            real.add(&complex),
            Err(MatrixError::TypeMismatch { .. })
        ));
        assert!(matches!(
            complex.add(&real),
            Err(MatrixError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn deep_equals_requires_done_and_matches_exactly() {
        let a = f64_matrix(2, 2, &[1.0, 2.0, 3.0, 4.0]);
        let b = f64_matrix(2, 2, &[1.0, 2.0, 3.0, 4.0]);
        assert!(a.deep_equals(&b).unwrap());

        let c = f64_matrix(2, 2, &[1.0, 2.0, 3.0, 5.0]);
        assert!(!a.deep_equals(&c).unwrap());

        let pending = a.add_value(0.0_f64).unwrap();
        assert!(matches!(
            a.deep_equals(&pending),
            Err(MatrixError::PendingState)
        ));
    }

    #[test]
    fn kind_mismatch_is_unequal_not_an_error() {
        let a = f64_matrix(1, 1, &[1.0]);
        let mut b = new_matrix(MatrixKind::Float32, 1, 1).unwrap();
        b.assign_items(None, &[1.0_f32]).unwrap();
        assert!(!a.deep_equals(&b).unwrap());
    }

    #[test]
    fn scalar_round_trip_recovers_input() {
        let m = f64_matrix(2, 3, &[1.0, -2.0, 3.5, 0.0, 7.0, -9.25]);
        let back = m
            .add_value(4.5_f64)
            .unwrap()
            .done()
            .subtract_value(4.5_f64)
            .unwrap()
            .done();
        assert!(m.deep_equals(&back).unwrap());
    }

    #[test]
    fn div_from_value_inverts_cells() {
        let m = f64_matrix(1, 2, &[2.0, 4.0]);
        let inv = m.div_from_value(1.0_f64).unwrap().done();
        assert_eq!(inv.extract_items::<f64>(None).unwrap(), vec![0.5, 0.25]);
    }

    #[test]
    fn apply_is_kind_segregated() {
        let m = f64_matrix(1, 1, &[1.0]);
        assert!(matches!(
            m.apply_ints(Piece::total(1, 1), |_, _, v| v),
            Err(MatrixError::UnsupportedConversion(_))
        ));
        assert!(matches!(
            m.apply_complex_doubles(Piece::total(1, 1), |_, _, _| ()),
            Err(MatrixError::UnsupportedConversion(_))
        ));
        let doubled = m
            .apply_doubles(Piece::total(1, 1), |_, _, v| v * 2.0)
            .unwrap()
            .done();
        assert_eq!(doubled.extract_items::<f64>(None).unwrap(), vec![2.0]);
    }

    #[test]
    fn display_marks_pending() {
        let m = f64_matrix(1, 1, &[1.0]);
        let pending = m.add_value(1.0_f64).unwrap();
        let text = format!("{pending}");
        assert!(text.contains("pending"));
        let done = pending.done();
        assert!(format!("{done}").contains("=== Matrix: type=Float64, size=1x1"));
    }
}
