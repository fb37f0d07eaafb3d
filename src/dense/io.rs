//! Binary piece I/O.
//!
//! One scalar item per stream slot, row-major, left-to-right then
//! top-to-bottom, big-endian at the item's native width (4 bytes for
//! i32/f32, 8 for i64/f64). No header or magic number: kind and piece
//! travel out-of-band, supplied by the caller on both ends.

use std::io::{self, ErrorKind, Read, Write};

use byteorder::ReadBytesExt;

use crate::error::MatrixError;
use crate::kind::MatrixKind;
use crate::piece::Piece;
use crate::scalar::{CellScalar, RawItem};

use super::Dense;

/// Read one item encoded at `kind`'s width and convert it to `I`.
///
/// `Bit` reads a single byte and collapses it to 0/1; both complex kinds
/// read one item at their component width (the caller decides how many
/// items make a cell).
pub(crate) fn read_item_as<I: RawItem, R: Read>(
    r: &mut R,
    kind: MatrixKind,
) -> io::Result<I> {
    match kind {
        MatrixKind::Bit => r.read_u8().map(|b| I::from_i32(i32::from(b != 0))),
        MatrixKind::Int32 => i32::read_from(r).map(I::from_i32),
        MatrixKind::Int64 => i64::read_from(r).map(I::from_i64),
        MatrixKind::Float32 | MatrixKind::Complex32 => f32::read_from(r).map(I::from_f32),
        MatrixKind::Float64 | MatrixKind::Complex64 => f64::read_from(r).map(I::from_f64),
    }
}

impl<T: CellScalar> Dense<T> {
    /// Stream the piece's cells to `w` as items of width `R`.
    pub fn extract_to<R: RawItem, W: Write>(
        &self,
        piece: &Piece,
        w: &mut W,
    ) -> Result<(), MatrixError> {
        self.ensure_done()?;
        piece.fit_within(self.rows, self.cols)?;
        let mut buf: Vec<R> = Vec::with_capacity(T::ITEMS);
        for y in 0..piece.height() {
            let row = (piece.top() + y) * self.cols + piece.left();
            for x in 0..piece.width() {
                buf.clear();
                self.data[row + x].push_items(&mut buf);
                for &item in &buf {
                    item.write_to(w)?;
                }
            }
        }
        Ok(())
    }

    /// Overwrite the piece from a stream of items encoded at `kind`'s
    /// width.
    ///
    /// One cell consumes `T::ITEMS` stream slots, except a `Bit` source,
    /// which supplies a single 0/1 byte per cell (the imaginary item of a
    /// complex receiver is zeroed). A stream that ends early fills what
    /// it can and leaves the remaining cells untouched.
    pub fn assign_from<R: Read>(
        &mut self,
        piece: &Piece,
        r: &mut R,
        kind: MatrixKind,
    ) -> Result<(), MatrixError> {
        self.ensure_done()?;
        piece.fit_within(self.rows, self.cols)?;
        let slots = if kind.is_bit() { 1 } else { T::ITEMS };
        'rows: for y in 0..piece.height() {
            let row = (piece.top() + y) * self.cols + piece.left();
            for x in 0..piece.width() {
                let mut chunk = [T::Item::from_i32(0); 2];
                for slot in chunk.iter_mut().take(slots) {
                    match read_item_as::<T::Item, R>(r, kind) {
                        Ok(v) => *slot = v,
                        Err(e) if e.kind() == ErrorKind::UnexpectedEof => break 'rows,
                        Err(e) => return Err(e.into()),
                    }
                }
                self.data[row + x] = T::from_chunk(&chunk[..T::ITEMS]);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_complex::Complex;

    #[test]
    fn extract_streams_native_width() {
        let mut m: Dense<i32> = Dense::new(1, 3);
        m.assign_items(&Piece::total(1, 3), &[1, 2, 3]).unwrap();
        let mut buf = Vec::new();
        m.extract_to::<i32, _>(&Piece::total(1, 3), &mut buf).unwrap();
        assert_eq!(buf.len(), 12);
        assert_eq!(&buf[..4], &[0, 0, 0, 1]);
    }

    #[test]
    fn round_trip_through_stream() {
        let mut src: Dense<f64> = Dense::new(2, 2);
        src.assign_items(&Piece::total(2, 2), &[1.5_f64, -2.5, 3.5, 0.0])
            .unwrap();
        let mut buf = Vec::new();
        src.extract_to::<f64, _>(&Piece::total(2, 2), &mut buf)
            .unwrap();

        let mut dst: Dense<f64> = Dense::new(2, 2);
        dst.assign_from(&Piece::total(2, 2), &mut buf.as_slice(), MatrixKind::Float64)
            .unwrap();
        assert_eq!(dst.cells(), src.cells());
    }

    #[test]
    fn assign_converts_source_width() {
        let mut buf = Vec::new();
        7_i32.write_to(&mut buf).unwrap();
        (-3_i32).write_to(&mut buf).unwrap();

        let mut m: Dense<f64> = Dense::new(1, 2);
        m.assign_from(&Piece::total(1, 2), &mut buf.as_slice(), MatrixKind::Int32)
            .unwrap();
        assert_eq!(m.cells(), &[7.0, -3.0]);
    }

    #[test]
    fn complex_cells_take_two_slots() {
        let mut src: Dense<Complex<f32>> = Dense::new(1, 2);
        src.assign_items(&Piece::total(1, 2), &[1.0_f32, 2.0, 3.0, 4.0])
            .unwrap();
        let mut buf = Vec::new();
        src.extract_to::<f32, _>(&Piece::total(1, 2), &mut buf)
            .unwrap();
        assert_eq!(buf.len(), 16);

        let mut dst: Dense<Complex<f32>> = Dense::new(1, 2);
        dst.assign_from(&Piece::total(1, 2), &mut buf.as_slice(), MatrixKind::Complex32)
            .unwrap();
        assert_eq!(dst.cells(), src.cells());
    }

    #[test]
    fn bit_source_reads_one_byte_per_cell() {
        let bytes = [1_u8, 0, 1];
        let mut m: Dense<i32> = Dense::new(1, 3);
        m.assign_from(&Piece::total(1, 3), &mut bytes.as_slice(), MatrixKind::Bit)
            .unwrap();
        assert_eq!(m.cells(), &[1, 0, 1]);
    }

    #[test]
    fn short_stream_fills_prefix() {
        let mut buf = Vec::new();
        9_i32.write_to(&mut buf).unwrap();

        let mut m: Dense<i32> = Dense::new(1, 3);
        m.fill(&Piece::total(1, 3), 5).unwrap();
        m.assign_from(&Piece::total(1, 3), &mut buf.as_slice(), MatrixKind::Int32)
            .unwrap();
        assert_eq!(m.cells(), &[9, 5, 5]);
    }
}
