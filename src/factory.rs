//! Matrix construction and factory discovery.
//!
//! Factories are addressed by URI under the `matrix-factory:` scheme;
//! the built-in standalone (in-process, heap-backed) implementation
//! answers `matrix-factory:standalone:/`. The selection mechanism exists
//! so alternative backends (memory-mapped, device-resident) can be
//! plugged in behind the same capability surface later.

use tracing::debug;

use crate::error::MatrixError;
use crate::kind::MatrixKind;
use crate::matrix::Matrix;
use crate::scalar::RawItem;

/// URI scheme under which matrix factories are discovered.
pub const URI_SCHEME: &str = "matrix-factory";

/// URI answered by the standalone factory.
pub const STANDALONE_URI: &str = "matrix-factory:standalone:/";

/// The in-process, heap-backed factory.
#[derive(Debug, Default, Clone, Copy)]
pub struct StandaloneFactory;

impl StandaloneFactory {
    /// Whether this factory serves `uri`.
    pub fn supports(&self, uri: &str) -> bool {
        uri == STANDALONE_URI || uri == "matrix-factory:standalone:"
    }

    /// A zero-filled `rows x cols` matrix of the given kind, ready to
    /// read (`Done`).
    ///
    /// Fails with [`MatrixError::InvalidArgument`] when a dimension is
    /// zero or `rows * cols * items_per_cell` does not fit a 32-bit
    /// element count.
    pub fn new_matrix(
        &self,
        kind: MatrixKind,
        rows: usize,
        cols: usize,
    ) -> Result<Matrix, MatrixError> {
        if rows == 0 {
            return Err(MatrixError::InvalidArgument(
                "number of rows must be greater than 0".into(),
            ));
        }
        if cols == 0 {
            return Err(MatrixError::InvalidArgument(
                "number of columns must be greater than 0".into(),
            ));
        }
        let items = rows
            .checked_mul(cols)
            .and_then(|n| n.checked_mul(kind.items_per_cell()))
            .filter(|&n| n <= i32::MAX as usize);
        if items.is_none() {
            return Err(MatrixError::InvalidArgument(format!(
                "{rows}x{cols} {kind:?} matrix exceeds the 32-bit element count limit"
            )));
        }
        debug!(?kind, rows, cols, "creating matrix");
        Ok(Matrix::zeroed(kind, rows, cols))
    }

    /// Like [`new_matrix`](Self::new_matrix), additionally assigning the
    /// flat row-major `values` (a short slice fills a prefix).
    pub fn new_matrix_with<R: RawItem>(
        &self,
        kind: MatrixKind,
        rows: usize,
        cols: usize,
        values: &[R],
    ) -> Result<Matrix, MatrixError> {
        let mut m = self.new_matrix(kind, rows, cols)?;
        m.assign_items(None, values)?;
        Ok(m)
    }
}

/// Resolve a factory URI. Only the standalone implementation is
/// registered in this crate.
pub fn factory_for(uri: &str) -> Result<StandaloneFactory, MatrixError> {
    let factory = StandaloneFactory;
    if factory.supports(uri) {
        Ok(factory)
    } else {
        Err(MatrixError::InvalidArgument(format!(
            "no matrix factory answers [{uri}]"
        )))
    }
}

/// Shorthand for [`StandaloneFactory::new_matrix`].
///
/// ```
/// use polymat::{new_matrix, MatrixKind};
///
/// let m = new_matrix(MatrixKind::Bit, 2, 2).unwrap();
/// assert_eq!(m.kind(), MatrixKind::Bit);
/// assert!(m.is_done());
/// ```
pub fn new_matrix(kind: MatrixKind, rows: usize, cols: usize) -> Result<Matrix, MatrixError> {
    StandaloneFactory.new_matrix(kind, rows, cols)
}

/// Shorthand for [`StandaloneFactory::new_matrix_with`].
pub fn new_matrix_with<R: RawItem>(
    kind: MatrixKind,
    rows: usize,
    cols: usize,
    values: &[R],
) -> Result<Matrix, MatrixError> {
    StandaloneFactory.new_matrix_with(kind, rows, cols, values)
}
