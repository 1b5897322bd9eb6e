//! Dense operator backed by an explicit nalgebra matrix.

use nalgebra::DMatrix;

use crate::operator::{ImplicitOperator, PartialImplicitOperator};

/// Explicit dense matrix exposed through the implicit operator traits.
///
/// Mostly useful for testing solvers on small problems and for operators
/// that are cheap to store densely.
#[derive(Debug, Clone)]
pub struct DenseOperator {
    matrix: DMatrix<f64>,
}

impl DenseOperator {
    /// Wrap an existing matrix.
    pub fn new(matrix: DMatrix<f64>) -> Self {
        Self { matrix }
    }

    /// The n x n identity operator.
    pub fn identity(n: usize) -> Self {
        Self {
            matrix: DMatrix::identity(n, n),
        }
    }

    /// Get a reference to the underlying matrix.
    pub fn matrix(&self) -> &DMatrix<f64> {
        &self.matrix
    }

    /// Consume the operator and return its matrix.
    pub fn into_inner(self) -> DMatrix<f64> {
        self.matrix
    }
}

impl From<DMatrix<f64>> for DenseOperator {
    fn from(matrix: DMatrix<f64>) -> Self {
        Self::new(matrix)
    }
}

impl ImplicitOperator for DenseOperator {
    fn nrows(&self) -> usize {
        self.matrix.nrows()
    }

    fn ncols(&self) -> usize {
        self.matrix.ncols()
    }

    fn apply(&self, x: &[f64], y: &mut [f64]) {
        assert_eq!(x.len(), self.matrix.ncols());
        assert_eq!(y.len(), self.matrix.nrows());

        y.iter_mut().for_each(|yi| *yi = 0.0);

        // Column-major storage: accumulate A[:, j] * x[j]
        for (j, &xj) in x.iter().enumerate() {
            if xj == 0.0 {
                continue;
            }
            for (yi, &aij) in y.iter_mut().zip(self.matrix.column(j).iter()) {
                *yi += aij * xj;
            }
        }
    }
}

impl PartialImplicitOperator for DenseOperator {
    fn apply_block(&self, rows: &[usize], cols: &[usize], x: &[f64], y: &mut [f64]) {
        assert_eq!(x.len(), cols.len());
        assert_eq!(y.len(), rows.len());

        y.iter_mut().for_each(|yi| *yi = 0.0);

        for (&j, &xj) in cols.iter().zip(x) {
            let column = self.matrix.column(j);
            for (yi, &i) in y.iter_mut().zip(rows) {
                *yi += column[i] * xj;
            }
        }
    }

    fn diagonal(&self, i: usize) -> f64 {
        self.matrix[(i, i)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::dmatrix;

    #[test]
    fn dense_matches_nalgebra_product() {
        let a = dmatrix![2.0, -1.0, 0.0; -1.0, 2.0, -1.0; 0.0, -1.0, 2.0];
        let op = DenseOperator::new(a.clone());

        let x = vec![1.0, 2.0, 3.0];
        let mut y = vec![0.0; 3];
        op.apply(&x, &mut y);

        let expected = &a * nalgebra::DVector::from_vec(x);
        for i in 0..3 {
            assert!((y[i] - expected[i]).abs() < 1e-15);
        }
    }

    #[test]
    fn dense_rectangular_dimensions() {
        let op = DenseOperator::new(DMatrix::zeros(2, 5));
        assert_eq!(op.nrows(), 2);
        assert_eq!(op.ncols(), 5);
        assert!(!op.is_square());
    }

    #[test]
    fn dense_block_product() {
        let a = dmatrix![1.0, 2.0, 3.0; 4.0, 5.0, 6.0; 7.0, 8.0, 9.0];
        let op = DenseOperator::new(a);

        // A[{2, 0}, {1}] * [10] = [80, 20]
        let y = op.multiply_block(&[2, 0], &[1], &[10.0]).unwrap();
        assert_eq!(y, vec![80.0, 20.0]);

        assert_eq!(op.diagonal(1), 5.0);
    }

    #[test]
    fn dense_identity() {
        let op = DenseOperator::identity(4);
        let y = op.multiply(&[1.0, -2.0, 3.0, -4.0]).unwrap();
        assert_eq!(y, vec![1.0, -2.0, 3.0, -4.0]);
    }
}
