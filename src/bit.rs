//! Bit-packed backend.
//!
//! One bit per cell, packed into 64-bit words: cell `(y, x)` lives at bit
//! `(y*C + x) % 64` of word `(y*C + x) / 64`. Extraction expands each
//! stored bit to 0 or 1 at the requested item width; assignment collapses
//! nonzero to 1.
//!
//! Arithmetic degenerates to boolean laws: `add` is OR, the Hadamard
//! product is AND, and `subtract` is `a & !(a & b)` — the one place in
//! the engine where "subtract" is not numeric subtraction.

use std::io::{self, ErrorKind, Read, Write};

use crate::dense::State;
use crate::error::MatrixError;
use crate::kind::MatrixKind;
use crate::piece::Piece;
use crate::scalar::RawItem;

/// Packed boolean matrix storage.
#[derive(Debug, Clone)]
pub struct BitDense {
    words: Vec<u64>,
    rows: usize,
    cols: usize,
    state: State,
}

impl BitDense {
    /// An all-zero `rows x cols` bit matrix in the `Done` state.
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            words: vec![0; (rows * cols).div_ceil(64)],
            rows,
            cols,
            state: State::Done,
        }
    }

    pub(crate) fn pending(rows: usize, cols: usize) -> Self {
        let mut m = Self::new(rows, cols);
        m.state = State::Pending;
        m
    }

    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    #[inline]
    pub fn cols(&self) -> usize {
        self.cols
    }

    #[inline]
    pub fn is_done(&self) -> bool {
        self.state == State::Done
    }

    #[inline]
    pub fn mark_done(&mut self) {
        self.state = State::Done;
    }

    #[inline]
    pub(crate) fn ensure_done(&self) -> Result<(), MatrixError> {
        if self.is_done() {
            Ok(())
        } else {
            Err(MatrixError::PendingState)
        }
    }

    #[inline]
    fn get(&self, index: usize) -> bool {
        (self.words[index / 64] >> (index % 64)) & 1 != 0
    }

    #[inline]
    fn set(&mut self, index: usize, value: bool) {
        let mask = 1u64 << (index % 64);
        if value {
            self.words[index / 64] |= mask;
        } else {
            self.words[index / 64] &= !mask;
        }
    }

    pub(crate) fn copy_pending(&self) -> Self {
        Self {
            words: self.words.clone(),
            rows: self.rows,
            cols: self.cols,
            state: State::Pending,
        }
    }

    fn check(&self, piece: &Piece) -> Result<(), MatrixError> {
        self.ensure_done()?;
        piece.fit_within(self.rows, self.cols)
    }

    // ── Extraction / assignment ─────────────────────────────────────

    /// Extract the piece row-major as bools.
    pub fn extract_bools(&self, piece: &Piece) -> Result<Vec<bool>, MatrixError> {
        self.check(piece)?;
        let mut out = Vec::with_capacity(piece.cells());
        for y in 0..piece.height() {
            let row = (piece.top() + y) * self.cols + piece.left();
            for x in 0..piece.width() {
                out.push(self.get(row + x));
            }
        }
        Ok(out)
    }

    /// Extract the piece row-major, each bit expanded to 0 or 1 at
    /// width `R`.
    pub fn extract_items<R: RawItem>(&self, piece: &Piece) -> Result<Vec<R>, MatrixError> {
        Ok(self
            .extract_bools(piece)?
            .into_iter()
            .map(|b| R::from_i32(i32::from(b)))
            .collect())
    }

    /// Overwrite the piece from flat items; nonzero maps to 1. A short
    /// slice covers only a prefix.
    pub fn assign_items<R: RawItem>(
        &mut self,
        piece: &Piece,
        items: &[R],
    ) -> Result<(), MatrixError> {
        self.check(piece)?;
        let mut it = items.iter();
        'rows: for y in 0..piece.height() {
            let row = (piece.top() + y) * self.cols + piece.left();
            for x in 0..piece.width() {
                match it.next() {
                    Some(v) => self.set(row + x, v.is_nonzero()),
                    None => break 'rows,
                }
            }
        }
        Ok(())
    }

    pub fn fill(&mut self, piece: &Piece, value: bool) -> Result<(), MatrixError> {
        self.check(piece)?;
        for y in 0..piece.height() {
            let row = (piece.top() + y) * self.cols + piece.left();
            for x in 0..piece.width() {
                self.set(row + x, value);
            }
        }
        Ok(())
    }

    // ── Binary I/O ──────────────────────────────────────────────────

    /// Stream the piece's bits as 0/1 items of width `R`.
    pub fn extract_to<R: RawItem, W: Write>(
        &self,
        piece: &Piece,
        w: &mut W,
    ) -> Result<(), MatrixError> {
        for b in self.extract_bools(piece)? {
            R::from_i32(i32::from(b)).write_to(w)?;
        }
        Ok(())
    }

    /// Overwrite the piece from a stream of items encoded at `kind`'s
    /// width; nonzero maps to 1. A stream that ends early fills what it
    /// can.
    pub fn assign_from<R: Read>(
        &mut self,
        piece: &Piece,
        r: &mut R,
        kind: MatrixKind,
    ) -> Result<(), MatrixError> {
        self.check(piece)?;
        'rows: for y in 0..piece.height() {
            let row = (piece.top() + y) * self.cols + piece.left();
            for x in 0..piece.width() {
                match read_nonzero(r, kind) {
                    Ok(bit) => self.set(row + x, bit),
                    Err(e) if e.kind() == ErrorKind::UnexpectedEof => break 'rows,
                    Err(e) => return Err(e.into()),
                }
            }
        }
        Ok(())
    }

    // ── Boolean elementwise family ──────────────────────────────────

    /// `add`: bitwise OR over the common prefix; the rest of the fresh
    /// result stays zero.
    pub(crate) fn or(&self, rhs: &[bool]) -> BitDense {
        self.zip_prefix(rhs, |a, b| a | b)
    }

    /// Hadamard product: bitwise AND.
    pub(crate) fn and(&self, rhs: &[bool]) -> BitDense {
        self.zip_prefix(rhs, |a, b| a & b)
    }

    /// `subtract`: remove `b` from `a`, `a & !(a & b)`.
    pub(crate) fn and_not(&self, rhs: &[bool]) -> BitDense {
        self.zip_prefix(rhs, |a, b| a & !(a & b))
    }

    /// Reversed `subtract`: remove `a` from `b`.
    pub(crate) fn and_not_from(&self, rhs: &[bool]) -> BitDense {
        self.zip_prefix(rhs, |a, b| b & !(b & a))
    }

    fn zip_prefix(&self, rhs: &[bool], f: impl Fn(bool, bool) -> bool) -> BitDense {
        let mut out = BitDense::pending(self.rows, self.cols);
        let n = (self.rows * self.cols).min(rhs.len());
        for i in 0..n {
            out.set(i, f(self.get(i), rhs[i]));
        }
        out
    }

    /// Scalar broadcast of the same boolean laws (OR / AND / and-not).
    pub(crate) fn map_value(&self, value: bool, f: impl Fn(bool, bool) -> bool) -> BitDense {
        let mut out = BitDense::pending(self.rows, self.cols);
        for i in 0..self.rows * self.cols {
            out.set(i, f(self.get(i), value));
        }
        out
    }

    // ── Structure ───────────────────────────────────────────────────

    pub(crate) fn transpose(&self) -> BitDense {
        let mut out = BitDense::pending(self.cols, self.rows);
        for y in 0..self.rows {
            for x in 0..self.cols {
                out.set(x * self.rows + y, self.get(y * self.cols + x));
            }
        }
        out
    }

    /// Tensor product over 0/1 cells: the cell product is AND, zero
    /// source cells are skipped.
    pub(crate) fn tensor(&self, rhs: &[bool], rhs_rows: usize, rhs_cols: usize) -> BitDense {
        let own = self.all_bools();
        tensor_bools(&own, self.rows, self.cols, rhs, rhs_rows, rhs_cols)
    }

    /// Reversed tensor product `rhs (x) self`.
    pub(crate) fn tensor_from(&self, rhs: &[bool], rhs_rows: usize, rhs_cols: usize) -> BitDense {
        let own = self.all_bools();
        tensor_bools(rhs, rhs_rows, rhs_cols, &own, self.rows, self.cols)
    }

    fn all_bools(&self) -> Vec<bool> {
        (0..self.rows * self.cols).map(|i| self.get(i)).collect()
    }

    // ── Apply ───────────────────────────────────────────────────────

    pub(crate) fn apply_bits(
        &self,
        piece: &Piece,
        mut f: impl FnMut(usize, usize, bool) -> bool,
    ) -> Result<BitDense, MatrixError> {
        self.check(piece)?;
        let mut out = self.copy_pending();
        for y in 0..piece.height() {
            let row = piece.top() + y;
            for x in 0..piece.width() {
                let col = piece.left() + x;
                let index = row * self.cols + col;
                out.set(index, f(row, col, self.get(index)));
            }
        }
        Ok(out)
    }

    pub(crate) fn eq_bits(&self, other: &BitDense) -> bool {
        self.words == other.words
    }
}

fn tensor_bools(
    left: &[bool],
    left_rows: usize,
    left_cols: usize,
    right: &[bool],
    right_rows: usize,
    right_cols: usize,
) -> BitDense {
    let mut out = BitDense::pending(left_rows * right_rows, left_cols * right_cols);
    for y1 in 0..left_rows {
        for x1 in 0..left_cols {
            if !left[y1 * left_cols + x1] {
                continue;
            }
            for y2 in 0..right_rows {
                for x2 in 0..right_cols {
                    let target_index = y1 * right_cols * left_cols * right_rows
                        + y2 * left_cols * right_rows
                        + x1 * right_cols
                        + x2;
                    out.set(target_index, right[y2 * right_cols + x2]);
                }
            }
        }
    }
    out
}

fn read_nonzero<R: Read>(r: &mut R, kind: MatrixKind) -> io::Result<bool> {
    match kind {
        MatrixKind::Bit => {
            let mut b = [0u8; 1];
            r.read_exact(&mut b)?;
            Ok(b[0] != 0)
        }
        _ => crate::dense::read_item_as::<i64, R>(r, kind).map(|v| v != 0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bits(rows: usize, cols: usize, values: &[i32]) -> BitDense {
        let mut m = BitDense::new(rows, cols);
        m.assign_items(&Piece::total(rows, cols), values).unwrap();
        m
    }

    #[test]
    fn packing_round_trip_past_word_boundary() {
        let mut m = BitDense::new(9, 9); // 81 cells, two words
        m.assign_items(
            &Piece::total(9, 9),
            &(0..81).map(|i| i % 3).collect::<Vec<i32>>(),
        )
        .unwrap();
        let got = m.extract_items::<i32>(&Piece::total(9, 9)).unwrap();
        for (i, v) in got.iter().enumerate() {
            assert_eq!(*v, i32::from(i % 3 != 0), "cell {i}");
        }
    }

    #[test]
    fn or_and_subtract_laws() {
        let a = bits(2, 2, &[1, 0, 0, 1]);
        let b = bits(2, 2, &[1, 1, 0, 0]);
        let b_bools = b.extract_bools(&Piece::total(2, 2)).unwrap();

        let mut or = a.or(&b_bools);
        assert!(matches!(
            or.extract_items::<i32>(&Piece::total(2, 2)),
            Err(MatrixError::PendingState)
        ));
        or.mark_done();
        assert_eq!(or.extract_items::<i32>(&Piece::total(2, 2)).unwrap(), vec![1, 1, 0, 1]);

        let mut and = a.and(&b_bools);
        and.mark_done();
        assert_eq!(and.extract_items::<i32>(&Piece::total(2, 2)).unwrap(), vec![1, 0, 0, 0]);

        let mut sub = a.and_not(&b_bools);
        sub.mark_done();
        assert_eq!(sub.extract_items::<i32>(&Piece::total(2, 2)).unwrap(), vec![0, 0, 0, 1]);

        let mut sub_from = a.and_not_from(&b_bools);
        sub_from.mark_done();
        assert_eq!(
            sub_from.extract_items::<i32>(&Piece::total(2, 2)).unwrap(),
            vec![0, 1, 0, 0]
        );
    }

    #[test]
    fn extraction_expands_to_requested_width() {
        let m = bits(1, 3, &[0, 7, 0]);
        assert_eq!(m.extract_items::<f64>(&Piece::total(1, 3)).unwrap(), vec![0.0, 1.0, 0.0]);
        assert_eq!(m.extract_items::<i64>(&Piece::total(1, 3)).unwrap(), vec![0, 1, 0]);
    }

    #[test]
    fn transpose_moves_bits() {
        let m = bits(2, 3, &[1, 0, 0, 0, 0, 1]);
        let mut t = m.transpose();
        t.mark_done();
        assert_eq!(
            t.extract_items::<i32>(&Piece::total(3, 2)).unwrap(),
            vec![1, 0, 0, 0, 0, 1]
        );
    }

    #[test]
    fn tensor_is_and_product() {
        let a = bits(1, 2, &[1, 0]);
        let b = bits(1, 2, &[1, 1]);
        let mut t = a.tensor(&b.extract_bools(&Piece::total(1, 2)).unwrap(), 1, 2);
        t.mark_done();
        assert_eq!(
            t.extract_items::<i32>(&Piece::total(1, 4)).unwrap(),
            vec![1, 1, 0, 0]
        );
    }

    #[test]
    fn stream_round_trip() {
        let m = bits(2, 2, &[1, 0, 1, 1]);
        let mut buf = Vec::new();
        m.extract_to::<i32, _>(&Piece::total(2, 2), &mut buf).unwrap();
        assert_eq!(buf.len(), 16);

        let mut back = BitDense::new(2, 2);
        back.assign_from(&Piece::total(2, 2), &mut buf.as_slice(), MatrixKind::Int32)
            .unwrap();
        assert!(back.eq_bits(&m));
    }

    #[test]
    fn apply_flips_piece() {
        let m = bits(2, 2, &[1, 0, 0, 1]);
        let mut out = m.apply_bits(&Piece::of(0, 0, 2, 1), |_, _, b| !b).unwrap();
        out.mark_done();
        assert_eq!(
            out.extract_items::<i32>(&Piece::total(2, 2)).unwrap(),
            vec![0, 1, 0, 1]
        );
    }
}
