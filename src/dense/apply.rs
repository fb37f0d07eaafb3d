//! Piece-scoped functional transform.
//!
//! The callback sees `(row, col, current)` in absolute matrix
//! coordinates and returns the replacement cell. The result is a fresh
//! `Pending` matrix: cells outside the piece carry the source values
//! unchanged.

use crate::error::MatrixError;
use crate::piece::Piece;
use crate::scalar::CellScalar;

use super::{Dense, State};

impl<T: CellScalar> Dense<T> {
    pub(crate) fn apply_cells(
        &self,
        piece: &Piece,
        mut f: impl FnMut(usize, usize, T) -> T,
    ) -> Result<Dense<T>, MatrixError> {
        self.ensure_done()?;
        piece.fit_within(self.rows, self.cols)?;
        let mut out = Dense {
            data: self.data.clone(),
            rows: self.rows,
            cols: self.cols,
            state: State::Pending,
        };
        for y in 0..piece.height() {
            let row = piece.top() + y;
            for x in 0..piece.width() {
                let col = piece.left() + x;
                let index = row * self.cols + col;
                out.data[index] = f(row, col, out.data[index]);
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn apply_transforms_piece_only() {
        let mut m: Dense<i32> = Dense::new(2, 3);
        m.assign_items(&Piece::total(2, 3), &[1, 2, 3, 4, 5, 6])
            .unwrap();
        let out = m
            .apply_cells(&Piece::of(1, 0, 2, 2), |_, _, v| v * 10)
            .unwrap();
        assert_eq!(out.cells(), &[1, 20, 30, 4, 50, 60]);
        assert!(!out.is_done());
        // source untouched
        assert_eq!(m.cells(), &[1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn apply_sees_absolute_coordinates() {
        let m: Dense<i32> = Dense::new(2, 2);
        let out = m
            .apply_cells(&Piece::of(1, 1, 1, 1), |r, c, _| (r * 10 + c) as i32)
            .unwrap();
        assert_eq!(out.cells(), &[0, 0, 0, 11]);
    }

    #[test]
    fn apply_checks_bounds_and_state() {
        let m: Dense<f32> = Dense::new(2, 2);
        assert!(matches!(
            m.apply_cells(&Piece::of(0, 0, 3, 1), |_, _, v| v),
            Err(MatrixError::OutOfBounds { .. })
        ));
        let p: Dense<f32> = Dense::pending(2, 2);
        assert!(matches!(
            p.apply_cells(&Piece::total(2, 2), |_, _, v| v),
            Err(MatrixError::PendingState)
        ));
    }
}
