//! Implicit linear operators for matfree.
//!
//! Every solver in the workspace consumes an operator through the
//! [`ImplicitOperator`] trait ("multiply by a vector") or the richer
//! [`PartialImplicitOperator`] trait (sub-block products and diagonal
//! entries). This crate defines those traits, the shared [`Error`] type, and
//! several storage schemes that implement them.
//!
//! # Operators
//!
//! - [`DenseOperator`] - explicit nalgebra matrix
//! - [`SparseOperator`] - CSC matrix assembled from triplets (faer)
//! - [`SparseRowOperator`] - vector of sparse rows
//! - [`CovarianceOperator`] - XᵀX / m over a data matrix, never materialized

pub mod covariance;
pub mod dense;
pub mod error;
pub mod operator;
pub mod sparse;
pub mod sparse_rows;

pub use covariance::CovarianceOperator;
pub use dense::DenseOperator;
pub use error::{Error, Result};
pub use operator::{ImplicitOperator, PartialImplicitOperator, ensure_square};
pub use sparse::SparseOperator;
pub use sparse_rows::{SparseRow, SparseRowOperator};
