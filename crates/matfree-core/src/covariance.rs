//! Covariance (Gram) operator over a data matrix.

use nalgebra::DMatrix;

use crate::error::{Error, Result};
use crate::operator::{ImplicitOperator, PartialImplicitOperator};

/// Implicit operator A = XᵀX / m + ridge * I for an m x n data matrix X.
///
/// Rows of `X` are samples, columns are features. The n x n operator is never
/// formed; every product goes through `X` twice, so the cost per product is
/// O(m * n) instead of O(n²) storage.
#[derive(Debug, Clone)]
pub struct CovarianceOperator {
    data: DMatrix<f64>,
    ridge: f64,
}

impl CovarianceOperator {
    /// Build from a data matrix without centering.
    pub fn new(data: DMatrix<f64>) -> Result<Self> {
        if data.nrows() == 0 {
            return Err(Error::OperatorConstruction(
                "covariance needs at least one sample".into(),
            ));
        }
        Ok(Self { data, ridge: 0.0 })
    }

    /// Build from a data matrix, subtracting each column's mean first.
    pub fn centered(mut data: DMatrix<f64>) -> Result<Self> {
        if data.nrows() == 0 {
            return Err(Error::OperatorConstruction(
                "covariance needs at least one sample".into(),
            ));
        }
        for mut column in data.column_iter_mut() {
            let mean = column.mean();
            column.add_scalar_mut(-mean);
        }
        Ok(Self { data, ridge: 0.0 })
    }

    /// Add `ridge * I` to the operator.
    pub fn with_ridge(mut self, ridge: f64) -> Self {
        self.ridge = ridge;
        self
    }

    /// Number of samples m.
    pub fn num_samples(&self) -> usize {
        self.data.nrows()
    }

    /// Get a reference to the (possibly centered) data matrix.
    pub fn data(&self) -> &DMatrix<f64> {
        &self.data
    }

    /// t = X[:, cols] * x
    fn project(&self, cols: impl Iterator<Item = usize>, x: &[f64]) -> Vec<f64> {
        let mut t = vec![0.0; self.data.nrows()];
        for (j, &xj) in cols.zip(x) {
            if xj == 0.0 {
                continue;
            }
            for (tk, &xkj) in t.iter_mut().zip(self.data.column(j).iter()) {
                *tk += xkj * xj;
            }
        }
        t
    }
}

impl ImplicitOperator for CovarianceOperator {
    fn nrows(&self) -> usize {
        self.data.ncols()
    }

    fn ncols(&self) -> usize {
        self.data.ncols()
    }

    fn apply(&self, x: &[f64], y: &mut [f64]) {
        assert_eq!(x.len(), self.data.ncols());
        assert_eq!(y.len(), self.data.ncols());

        let scale = 1.0 / self.data.nrows() as f64;
        let t = self.project(0..x.len(), x);

        for (i, (yi, &xi)) in y.iter_mut().zip(x).enumerate() {
            let dot: f64 = self.data.column(i).iter().zip(&t).map(|(a, b)| a * b).sum();
            *yi = dot * scale + self.ridge * xi;
        }
    }
}

impl PartialImplicitOperator for CovarianceOperator {
    fn apply_block(&self, rows: &[usize], cols: &[usize], x: &[f64], y: &mut [f64]) {
        assert_eq!(x.len(), cols.len());
        assert_eq!(y.len(), rows.len());

        let scale = 1.0 / self.data.nrows() as f64;
        let t = self.project(cols.iter().copied(), x);

        for (yi, &i) in y.iter_mut().zip(rows) {
            let dot: f64 = self.data.column(i).iter().zip(&t).map(|(a, b)| a * b).sum();
            *yi = dot * scale;
            if self.ridge != 0.0 {
                *yi += cols
                    .iter()
                    .zip(x)
                    .filter(|&(&j, _)| j == i)
                    .map(|(_, &xj)| self.ridge * xj)
                    .sum::<f64>();
            }
        }
    }

    fn diagonal(&self, i: usize) -> f64 {
        self.data.column(i).norm_squared() / self.data.nrows() as f64 + self.ridge
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::dmatrix;

    fn explicit(op: &CovarianceOperator) -> DMatrix<f64> {
        let x = op.data();
        let n = x.ncols();
        x.transpose() * x / x.nrows() as f64 + DMatrix::identity(n, n) * op.ridge
    }

    #[test]
    fn covariance_matches_explicit_gram() {
        let data = dmatrix![1.0, 2.0, 0.0; 0.5, -1.0, 3.0; 2.0, 0.0, 1.0; -1.0, 1.0, 1.0];
        let op = CovarianceOperator::new(data).unwrap().with_ridge(0.1);
        let a = explicit(&op);

        let x = vec![0.3, -0.7, 1.1];
        let y = op.multiply(&x).unwrap();
        let expected = &a * nalgebra::DVector::from_vec(x);
        for i in 0..3 {
            assert!((y[i] - expected[i]).abs() < 1e-12);
        }

        for i in 0..3 {
            assert!((op.diagonal(i) - a[(i, i)]).abs() < 1e-12);
        }
    }

    #[test]
    fn covariance_block_matches_explicit() {
        let data = dmatrix![1.0, 2.0, 0.0; 0.5, -1.0, 3.0; 2.0, 0.0, 1.0];
        let op = CovarianceOperator::new(data).unwrap().with_ridge(0.5);
        let a = explicit(&op);

        let rows = [2, 0];
        let cols = [0, 1];
        let x = [2.0, -1.0];
        let y = op.multiply_block(&rows, &cols, &x).unwrap();

        for (k, &i) in rows.iter().enumerate() {
            let expected: f64 = cols.iter().zip(&x).map(|(&j, &xj)| a[(i, j)] * xj).sum();
            assert!((y[k] - expected).abs() < 1e-12);
        }
    }

    #[test]
    fn centered_columns_have_zero_mean() {
        let data = dmatrix![1.0, 10.0; 3.0, 20.0; 5.0, 30.0];
        let op = CovarianceOperator::centered(data).unwrap();
        for column in op.data().column_iter() {
            assert!(column.mean().abs() < 1e-12);
        }
        // var([1, 3, 5]) with 1/m normalization
        assert!((op.diagonal(0) - 8.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn empty_data_is_rejected() {
        let result = CovarianceOperator::new(DMatrix::zeros(0, 3));
        assert!(matches!(result, Err(Error::OperatorConstruction(_))));
    }
}
