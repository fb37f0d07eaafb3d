//! Generic dense backend: one implementation shared by the six
//! cell-addressed representations (`i32`, `i64`, `f32`, `f64`,
//! `Complex<f32>`, `Complex<f64>`).
//!
//! Storage is a row-major `Vec<T>` sized exactly `rows * cols`, never
//! resized after construction. The bit-packed backend lives separately in
//! [`crate::bit`] since its storage unit is a 64-bit word, not a cell.

mod aggregate;
mod apply;
mod io;
mod linalg;
mod ops;

pub use aggregate::{AggregateDirection, AggregateOp};
pub(crate) use io::read_item_as;

use crate::error::MatrixError;
use crate::piece::Piece;
use crate::scalar::{CellScalar, RawItem};

/// Completion state of a matrix handle.
///
/// Every operation that produces a new matrix returns it `Pending`; the
/// explicit `done()` barrier transitions it to `Done`, after which its
/// contents may be read. The transition is one-way. All computation is
/// eager today; the protocol exists so that a future backend may complete
/// results asynchronously without changing the observable contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Pending,
    Done,
}

/// Dense rectangular storage for cells of type `T`.
#[derive(Debug, Clone)]
pub struct Dense<T> {
    data: Vec<T>,
    rows: usize,
    cols: usize,
    state: State,
}

impl<T: CellScalar> Dense<T> {
    /// A zero-filled `rows x cols` matrix in the `Done` state.
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            data: vec![T::zero(); rows * cols],
            rows,
            cols,
            state: State::Done,
        }
    }

    /// A zero-filled result buffer in the `Pending` state.
    pub(crate) fn pending(rows: usize, cols: usize) -> Self {
        Self {
            data: vec![T::zero(); rows * cols],
            rows,
            cols,
            state: State::Pending,
        }
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

    /// One-way `Pending -> Done` transition.
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
    pub(crate) fn cells(&self) -> &[T] {
        &self.data
    }

    #[inline]
    pub(crate) fn cells_mut(&mut self) -> &mut [T] {
        &mut self.data
    }

    #[inline]
    pub(crate) fn at(&self, row: usize, col: usize) -> T {
        self.data[row * self.cols + col]
    }

    /// A pending copy, used by self-casts.
    pub(crate) fn copy_pending(&self) -> Self {
        Self {
            data: self.data.clone(),
            rows: self.rows,
            cols: self.cols,
            state: State::Pending,
        }
    }

    /// Wrap pre-built cells into a `Pending` matrix (cast results).
    pub(crate) fn from_cells_pending(rows: usize, cols: usize, data: Vec<T>) -> Self {
        debug_assert_eq!(data.len(), rows * cols);
        Self {
            data,
            rows,
            cols,
            state: State::Pending,
        }
    }

    fn check(&self, piece: &Piece) -> Result<(), MatrixError> {
        self.ensure_done()?;
        piece.fit_within(self.rows, self.cols)
    }

    /// Extract the piece row-major as flat items of width `R`
    /// (complex cells contribute two interleaved items).
    pub fn extract_items<R: RawItem>(&self, piece: &Piece) -> Result<Vec<R>, MatrixError> {
        self.check(piece)?;
        let mut out = Vec::with_capacity(piece.cells() * T::ITEMS);
        for y in 0..piece.height() {
            let row = (piece.top() + y) * self.cols + piece.left();
            for x in 0..piece.width() {
                self.data[row + x].push_items(&mut out);
            }
        }
        Ok(out)
    }

    /// Overwrite the piece row-major from flat items of width `R`.
    ///
    /// A slice shorter than the piece covers only a prefix of it; the
    /// remaining cells keep their current values. Trailing items that do
    /// not complete a whole cell are dropped.
    pub fn assign_items<R: RawItem>(
        &mut self,
        piece: &Piece,
        items: &[R],
    ) -> Result<(), MatrixError> {
        self.check(piece)?;
        let mut chunks = items.chunks_exact(T::ITEMS);
        'rows: for y in 0..piece.height() {
            let row = (piece.top() + y) * self.cols + piece.left();
            for x in 0..piece.width() {
                match chunks.next() {
                    Some(chunk) => self.data[row + x] = T::from_chunk(chunk),
                    None => break 'rows,
                }
            }
        }
        Ok(())
    }

    /// Set every cell of the piece to `value`.
    pub fn fill(&mut self, piece: &Piece, value: T) -> Result<(), MatrixError> {
        self.check(piece)?;
        for y in 0..piece.height() {
            let row = (piece.top() + y) * self.cols + piece.left();
            for x in 0..piece.width() {
                self.data[row + x] = value;
            }
        }
        Ok(())
    }

    /// Cell-exact content comparison; dimensions must already match.
    pub(crate) fn eq_cells(&self, other: &[T]) -> bool {
        self.data.as_slice() == other
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_is_zeroed_and_done() {
        let m: Dense<f64> = Dense::new(2, 3);
        assert_eq!(m.rows(), 2);
        assert_eq!(m.cols(), 3);
        assert!(m.is_done());
        assert!(m.cells().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn extract_respects_piece() {
        let mut m: Dense<i32> = Dense::new(2, 3);
        m.assign_items(&Piece::total(2, 3), &[1, 2, 3, 4, 5, 6])
            .unwrap();
        let got = m.extract_items::<i32>(&Piece::of(1, 0, 2, 2)).unwrap();
        assert_eq!(got, vec![2, 3, 5, 6]);
    }

    #[test]
    fn extract_converts_width() {
        let mut m: Dense<f64> = Dense::new(1, 3);
        m.assign_items(&Piece::total(1, 3), &[1.9_f64, -2.9, 3.0])
            .unwrap();
        let ints = m.extract_items::<i32>(&Piece::total(1, 3)).unwrap();
        assert_eq!(ints, vec![1, -2, 3]);
    }

    #[test]
    fn assign_prefix_leaves_rest() {
        let mut m: Dense<i64> = Dense::new(2, 2);
        m.fill(&Piece::total(2, 2), 9).unwrap();
        m.assign_items(&Piece::total(2, 2), &[1_i64, 2]).unwrap();
        assert_eq!(m.cells(), &[1, 2, 9, 9]);
    }

    #[test]
    fn piece_out_of_bounds() {
        let m: Dense<f32> = Dense::new(2, 2);
        assert!(matches!(
            m.extract_items::<f32>(&Piece::of(1, 1, 2, 1)),
            Err(MatrixError::OutOfBounds { .. })
        ));
    }

    #[test]
    fn pending_blocks_reads() {
        let m: Dense<f64> = Dense::pending(2, 2);
        assert!(matches!(
            m.extract_items::<f64>(&Piece::total(2, 2)),
            Err(MatrixError::PendingState)
        ));
    }

    #[test]
    fn fill_scopes_to_piece() {
        let mut m: Dense<i32> = Dense::new(3, 3);
        m.fill(&Piece::of(1, 1, 2, 2), 7).unwrap();
        assert_eq!(
            m.cells(),
            &[0, 0, 0, 0, 7, 7, 0, 7, 7]
        );
    }
}
