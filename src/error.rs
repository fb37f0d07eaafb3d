use crate::kind::MatrixKind;
use crate::piece::Piece;

/// Errors raised by the matrix engine.
///
/// All failures are synchronous and non-recoverable: the engine performs
/// pure in-memory computation, and the only I/O path (streaming piece
/// extract/assign) surfaces the underlying stream error unchanged through
/// the [`Io`](MatrixError::Io) variant.
///
/// # Example
///
/// ```
/// use polymat::{new_matrix, MatrixError, MatrixKind};
///
/// let m = new_matrix(MatrixKind::Float64, 2, 2).unwrap();
/// let pending = m.add_items(&[1.0_f64, 2.0, 3.0, 4.0]).unwrap();
/// assert!(matches!(
///     pending.extract_items::<f64>(None),
///     Err(MatrixError::PendingState)
/// ));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum MatrixError {
    /// Operand shapes are incompatible (matrix product inner dimensions,
    /// or a square-only operation on a rectangular matrix).
    #[error("dimension mismatch: {0}")]
    DimensionMismatch(String),

    /// A real matrix was combined with a complex one (or vice versa).
    /// Cast one of the operands first.
    #[error("type mismatch: {left:?} cannot be combined with {right:?}; cast first")]
    TypeMismatch {
        left: MatrixKind,
        right: MatrixKind,
    },

    /// A piece extends beyond the matrix extent.
    #[error("piece {piece:?} lies outside a {rows}x{cols} matrix")]
    OutOfBounds {
        piece: Piece,
        rows: usize,
        cols: usize,
    },

    /// A read was attempted on a matrix still in the pending state.
    /// Call `done()` before reading.
    #[error("matrix is still pending; call done() before reading")]
    PendingState,

    /// Gauss-Jordan elimination met a zero pivot during inversion.
    #[error("matrix is singular: zero element on diagonal")]
    Singular,

    /// The requested cast or operation/representation combination is not
    /// defined for this matrix kind.
    #[error("unsupported conversion: {0}")]
    UnsupportedConversion(String),

    /// A constructor argument is out of range (zero dimension, element
    /// count overflowing a 32-bit index, unknown factory URI, ...).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// An underlying stream failure during binary piece I/O.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl MatrixError {
    pub(crate) fn unsupported(kind: MatrixKind, what: &str) -> Self {
        MatrixError::UnsupportedConversion(format!("{what} is not defined for {kind:?} matrices"))
    }
}
