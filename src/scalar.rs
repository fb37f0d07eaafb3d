//! Element trait hierarchy for the generic backends.
//!
//! - [`RawItem`] — the four primitive item types streamed in and out of
//!   matrix cells (`i32`, `i64`, `f32`, `f64`). Conversions among widths
//!   are plain `as` casts: narrowing is intentional truncation, never an
//!   implicit promotion.
//! - [`CellScalar`] — the six cell types a [`Dense`](crate::dense::Dense)
//!   backend can store: the four reals plus `Complex<f32>` /
//!   `Complex<f64>` (two interleaved items per cell).
//! - [`FieldScalar`] — the four cell types over which Gauss-Jordan
//!   elimination is defined (real and complex floats).

use std::fmt;
use std::io::{self, Read, Write};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use num_complex::Complex;
use num_traits::{Num, One, Zero};

use crate::kind::MatrixKind;

/// A primitive scalar item as it appears on the wire and in flat operand
/// slices.
///
/// Streamed big-endian at its native width (4 bytes for `i32`/`f32`,
/// 8 for `i64`/`f64`), with no header or framing.
pub trait RawItem: Copy + PartialEq + fmt::Debug {
    fn from_i32(v: i32) -> Self;
    fn from_i64(v: i64) -> Self;
    fn from_f32(v: f32) -> Self;
    fn from_f64(v: f64) -> Self;

    fn to_i32(self) -> i32;
    fn to_i64(self) -> i64;
    fn to_f32(self) -> f32;
    fn to_f64(self) -> f64;

    fn is_nonzero(self) -> bool;

    fn read_from<R: Read>(r: &mut R) -> io::Result<Self>;
    fn write_to<W: Write>(self, w: &mut W) -> io::Result<()>;
}

macro_rules! impl_raw_item {
    ($($t:ty, $read:ident, $write:ident;)*) => {
        $(
            impl RawItem for $t {
                #[inline] fn from_i32(v: i32) -> Self { v as $t }
                #[inline] fn from_i64(v: i64) -> Self { v as $t }
                #[inline] fn from_f32(v: f32) -> Self { v as $t }
                #[inline] fn from_f64(v: f64) -> Self { v as $t }

                #[inline] fn to_i32(self) -> i32 { self as i32 }
                #[inline] fn to_i64(self) -> i64 { self as i64 }
                #[inline] fn to_f32(self) -> f32 { self as f32 }
                #[inline] fn to_f64(self) -> f64 { self as f64 }

                #[inline] fn is_nonzero(self) -> bool { self != (0 as $t) }

                #[inline]
                fn read_from<R: Read>(r: &mut R) -> io::Result<Self> {
                    r.$read::<BigEndian>()
                }

                #[inline]
                fn write_to<W: Write>(self, w: &mut W) -> io::Result<()> {
                    w.$write::<BigEndian>(self)
                }
            }
        )*
    };
}

impl_raw_item! {
    i32, read_i32, write_i32;
    i64, read_i64, write_i64;
    f32, read_f32, write_f32;
    f64, read_f64, write_f64;
}

/// A matrix cell value.
///
/// Real cells carry one item, complex cells two (re, im). Conversion to
/// and from item streams goes through [`RawItem`], so a cell can be
/// produced from, or rendered into, a flat slice of any item width.
pub trait CellScalar: Copy + PartialEq + fmt::Debug + Zero + One + Num {
    /// The item type at this cell's native width.
    type Item: RawItem;

    const KIND: MatrixKind;

    /// Items per cell: 1 for reals, 2 for complex.
    const ITEMS: usize;

    /// Append this cell's items to `out`, converted to width `R`.
    fn push_items<R: RawItem>(self, out: &mut Vec<R>);

    /// Build a cell from the first `Self::ITEMS` entries of `chunk`.
    fn from_chunk<R: RawItem>(chunk: &[R]) -> Self;

    /// Broadcast a single item into a cell (complex: imaginary = 0).
    fn from_value<R: RawItem>(v: R) -> Self;

    /// Cell value used as the Avg divisor for a reduction over `n` cells.
    fn from_count(n: usize) -> Self;

    /// Aggregation ordering: plain `>` for reals, squared modulus for
    /// complex cells.
    fn agg_gt(self, other: Self) -> bool;

    #[inline]
    fn is_zero_cell(self) -> bool {
        self == Self::zero()
    }

    /// Render one cell for the human-readable dump.
    fn fmt_cell(self, f: &mut fmt::Formatter<'_>) -> fmt::Result;
}

macro_rules! impl_cell_real {
    ($($t:ty, $kind:expr, $from:ident, $to:ident, $fmt:literal;)*) => {
        $(
            impl CellScalar for $t {
                type Item = $t;
                const KIND: MatrixKind = $kind;
                const ITEMS: usize = 1;

                #[inline]
                fn push_items<R: RawItem>(self, out: &mut Vec<R>) {
                    out.push(R::$from(self));
                }

                #[inline]
                fn from_chunk<R: RawItem>(chunk: &[R]) -> Self {
                    chunk[0].$to()
                }

                #[inline]
                fn from_value<R: RawItem>(v: R) -> Self {
                    v.$to()
                }

                #[inline]
                fn from_count(n: usize) -> Self {
                    n as $t
                }

                #[inline]
                fn agg_gt(self, other: Self) -> bool {
                    self > other
                }

                fn fmt_cell(self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    write!(f, $fmt, self)
                }
            }
        )*
    };
}

impl_cell_real! {
    i32, MatrixKind::Int32,   from_i32, to_i32, "{:>10} ";
    i64, MatrixKind::Int64,   from_i64, to_i64, "{:>20} ";
    f32, MatrixKind::Float32, from_f32, to_f32, "{:>13.6e} ";
    f64, MatrixKind::Float64, from_f64, to_f64, "{:>22.15e} ";
}

macro_rules! impl_cell_complex {
    ($($t:ty, $kind:expr, $from:ident, $to:ident;)*) => {
        $(
            impl CellScalar for Complex<$t> {
                type Item = $t;
                const KIND: MatrixKind = $kind;
                const ITEMS: usize = 2;

                #[inline]
                fn push_items<R: RawItem>(self, out: &mut Vec<R>) {
                    out.push(R::$from(self.re));
                    out.push(R::$from(self.im));
                }

                #[inline]
                fn from_chunk<R: RawItem>(chunk: &[R]) -> Self {
                    Complex::new(chunk[0].$to(), chunk[1].$to())
                }

                #[inline]
                fn from_value<R: RawItem>(v: R) -> Self {
                    Complex::new(v.$to(), 0 as $t)
                }

                #[inline]
                fn from_count(n: usize) -> Self {
                    Complex::new(n as $t, 0 as $t)
                }

                #[inline]
                fn agg_gt(self, other: Self) -> bool {
                    self.norm_sqr() > other.norm_sqr()
                }

                fn fmt_cell(self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    if self.im == (0 as $t) {
                        write!(f, "{:>13.6e} ", self.re)
                    } else if self.re == (0 as $t) {
                        write!(f, "{:>13.6e}i ", self.im)
                    } else {
                        write!(f, "{:>13.6e}{:>+13.6e}i ", self.re, self.im)
                    }
                }
            }
        )*
    };
}

impl_cell_complex! {
    f32, MatrixKind::Complex32, from_f32, to_f32;
    f64, MatrixKind::Complex64, from_f64, to_f64;
}

/// Cell types over which Gauss-Jordan inversion and determinants are
/// defined: division by a nonzero cell is exact field division (for
/// complex cells, multiplication by the conjugate over the squared
/// modulus).
pub trait FieldScalar: CellScalar {}

impl FieldScalar for f32 {}
impl FieldScalar for f64 {}
impl FieldScalar for Complex<f32> {}
impl FieldScalar for Complex<f64> {}
