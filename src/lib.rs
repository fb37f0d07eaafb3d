//! # polymat
//!
//! Dense matrix algebra over seven interchangeable numeric
//! representations — packed bits, 32/64-bit signed integers, 32/64-bit
//! floats, and 32/64-bit complex pairs — behind one capability surface.
//!
//! ## Quick start
//!
//! ```
//! use polymat::{new_matrix_with, MatrixKind};
//!
//! let a = new_matrix_with(MatrixKind::Float64, 2, 2, &[2.0_f64, 0.0, 0.0, 2.0]).unwrap();
//! let inv = a.invert().unwrap().done(); // results are Pending until done()
//! assert_eq!(inv.extract_items::<f64>(None).unwrap(), vec![0.5, 0.0, 0.0, 0.5]);
//! assert_eq!(a.det().unwrap(), 4.0);
//! ```
//!
//! ## Modules
//!
//! - [`matrix`] — [`Matrix`], the closed variant type over the seven
//!   backends and the whole operation set: piece-scoped
//!   extract/assign/fill, elementwise and scalar arithmetic, Hadamard and
//!   tensor (Kronecker) products, Gauss-Jordan inversion and
//!   determinants, directional aggregation, casting, and the
//!   kind-segregated `apply` transforms.
//!
//! - [`dense`] — the generic cell-addressed backend `Dense<T>` shared by
//!   the integer, float, and complex representations, plus the
//!   [`AggregateDirection`]/[`AggregateOp`] reduction vocabulary.
//!
//! - [`bit`] — the bit-packed backend: one bit per cell in 64-bit words,
//!   boolean arithmetic laws (add = OR, Hadamard = AND, subtract =
//!   `a & !(a & b)`).
//!
//! - [`piece`] — [`Piece`], the rectangular sub-region descriptor every
//!   scoped operation is bounds-checked against.
//!
//! - [`factory`] — construction and `matrix-factory:<impl>:/` URI
//!   discovery; [`new_matrix`] / [`new_matrix_with`] shorthands.
//!
//! - [`scalar`] — the [`RawItem`]/[`CellScalar`]/[`FieldScalar`] element
//!   trait hierarchy the generic backend is parameterized over.
//!
//! - [`error`] — the [`MatrixError`] taxonomy.
//!
//! ## Deferred completion
//!
//! Every operation that produces a new matrix returns it in the
//! `Pending` state; reading it (extraction, comparison, casting,
//! aggregation, use as an operand) fails with
//! [`MatrixError::PendingState`] until the explicit [`Matrix::done`]
//! barrier is called. All computation is eager today — the protocol
//! keeps the door open for backends that complete results
//! asynchronously without changing any caller-visible contract.
//!
//! ## Mixing representations
//!
//! Cross-type operands are converted into the receiver's native scalar
//! width before combining; the conversion narrows (a float operand used
//! against an integer matrix is truncated, never promoted). Real and
//! complex matrices never mix implicitly — `cast` one side first.

pub mod bit;
pub mod dense;
pub mod error;
pub mod factory;
pub mod kind;
pub mod matrix;
pub mod piece;
pub mod scalar;

pub use dense::{AggregateDirection, AggregateOp, Dense, State};
pub use error::MatrixError;
pub use factory::{
    factory_for, new_matrix, new_matrix_with, StandaloneFactory, STANDALONE_URI, URI_SCHEME,
};
pub use kind::MatrixKind;
pub use matrix::Matrix;
pub use piece::Piece;
pub use scalar::{CellScalar, FieldScalar, RawItem};

pub use num_complex::Complex;
