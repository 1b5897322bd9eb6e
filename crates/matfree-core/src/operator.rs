//! Implicit operator traits.
//!
//! Solvers in this workspace never look inside a matrix. They only ask an
//! operator for its action on a vector, and (for coordinate descent) for the
//! action of a row/column sub-block plus individual diagonal entries. Any
//! storage scheme that can answer those questions can be solved against.

use crate::error::{Error, Result};

/// A linear operator exposed only through its action on vectors.
pub trait ImplicitOperator {
    /// Number of rows.
    fn nrows(&self) -> usize;

    /// Number of columns.
    fn ncols(&self) -> usize;

    /// Compute y = A * x.
    ///
    /// Callers guarantee `x.len() == ncols()` and `y.len() == nrows()`.
    /// Use [`ImplicitOperator::multiply`] for a checked variant.
    fn apply(&self, x: &[f64], y: &mut [f64]);

    /// Whether the operator has as many rows as columns.
    fn is_square(&self) -> bool {
        self.nrows() == self.ncols()
    }

    /// Compute A * x into a fresh vector, checking dimensions first.
    fn multiply(&self, x: &[f64]) -> Result<Vec<f64>> {
        if x.len() != self.ncols() {
            return Err(Error::DimensionMismatch {
                expected: self.ncols(),
                actual: x.len(),
            });
        }
        let mut y = vec![0.0; self.nrows()];
        self.apply(x, &mut y);
        Ok(y)
    }
}

/// An implicit operator that can also multiply restricted sub-blocks.
///
/// `apply_block(rows, cols, x, y)` computes `y = A[rows, cols] * x`, where
/// `x` is indexed like `cols` and `y` like `rows`. This lets a solver touch
/// only its working set instead of the whole operator.
pub trait PartialImplicitOperator: ImplicitOperator {
    /// Compute y = A[rows, cols] * x.
    ///
    /// Callers guarantee `x.len() == cols.len()`, `y.len() == rows.len()` and
    /// that every index is in range.
    fn apply_block(&self, rows: &[usize], cols: &[usize], x: &[f64], y: &mut [f64]);

    /// Diagonal entry A[i, i].
    fn diagonal(&self, i: usize) -> f64;

    /// Checked sub-block product into a fresh vector.
    fn multiply_block(&self, rows: &[usize], cols: &[usize], x: &[f64]) -> Result<Vec<f64>> {
        if x.len() != cols.len() {
            return Err(Error::DimensionMismatch {
                expected: cols.len(),
                actual: x.len(),
            });
        }
        check_indices(rows, self.nrows())?;
        check_indices(cols, self.ncols())?;

        let mut y = vec![0.0; rows.len()];
        self.apply_block(rows, cols, x, &mut y);
        Ok(y)
    }
}

fn check_indices(indices: &[usize], dim: usize) -> Result<()> {
    match indices.iter().find(|&&i| i >= dim) {
        Some(&index) => Err(Error::IndexOutOfBounds { index, dim }),
        None => Ok(()),
    }
}

/// Fail with [`Error::NotSquare`] unless the operator is square.
pub fn ensure_square(op: &(impl ImplicitOperator + ?Sized)) -> Result<usize> {
    if op.is_square() {
        Ok(op.nrows())
    } else {
        Err(Error::NotSquare {
            rows: op.nrows(),
            cols: op.ncols(),
        })
    }
}

impl<T: ImplicitOperator + ?Sized> ImplicitOperator for &T {
    fn nrows(&self) -> usize {
        (**self).nrows()
    }

    fn ncols(&self) -> usize {
        (**self).ncols()
    }

    fn apply(&self, x: &[f64], y: &mut [f64]) {
        (**self).apply(x, y)
    }
}

impl<T: PartialImplicitOperator + ?Sized> PartialImplicitOperator for &T {
    fn apply_block(&self, rows: &[usize], cols: &[usize], x: &[f64], y: &mut [f64]) {
        (**self).apply_block(rows, cols, x, y)
    }

    fn diagonal(&self, i: usize) -> f64 {
        (**self).diagonal(i)
    }
}
