//! Sparse operator built from (row, col, value) triplets.
//!
//! Wraps faer's compressed sparse column matrix and implements the implicit
//! operator traits on top of its raw CSC arrays.

use faer::sparse::{SparseColMat, Triplet};

use crate::error::{Error, Result};
use crate::operator::{ImplicitOperator, PartialImplicitOperator};

/// Sparse real-valued operator in CSC layout.
pub struct SparseOperator {
    matrix: SparseColMat<usize, f64>,
}

impl SparseOperator {
    /// Create from an existing sparse matrix.
    pub fn from_matrix(matrix: SparseColMat<usize, f64>) -> Self {
        Self { matrix }
    }

    /// Create a square operator from triplets (row, col, value).
    ///
    /// Duplicate entries at the same position are summed.
    pub fn from_triplets(size: usize, triplets: &[(usize, usize, f64)]) -> Result<Self> {
        Self::from_triplets_rect(size, size, triplets)
    }

    /// Create a rectangular operator from triplets (row, col, value).
    pub fn from_triplets_rect(
        nrows: usize,
        ncols: usize,
        triplets: &[(usize, usize, f64)],
    ) -> Result<Self> {
        let faer_triplets: Vec<_> = triplets
            .iter()
            .map(|&(r, c, v)| Triplet::new(r, c, v))
            .collect();

        SparseColMat::<usize, f64>::try_new_from_triplets(nrows, ncols, &faer_triplets)
            .map(|matrix| Self { matrix })
            .map_err(|e| Error::OperatorConstruction(format!("{e:?}")))
    }

    /// Get a reference to the underlying matrix.
    pub fn matrix(&self) -> &SparseColMat<usize, f64> {
        &self.matrix
    }

    /// Number of stored entries.
    pub fn nnz(&self) -> usize {
        self.matrix.as_ref().row_idx().len()
    }

    /// Accumulate A[:, j] * xj into a full-length output.
    fn scatter_column(&self, j: usize, xj: f64, out: &mut [f64]) {
        let mat_ref = self.matrix.as_ref();
        let col_ptrs = mat_ref.col_ptr();
        let row_indices = mat_ref.row_idx();
        let values = mat_ref.val();

        for idx in col_ptrs[j]..col_ptrs[j + 1] {
            out[row_indices[idx]] += values[idx] * xj;
        }
    }
}

impl ImplicitOperator for SparseOperator {
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

        // CSC matrix-vector multiplication: y = A * x
        // For each column j, add A[:, j] * x[j] to y
        for (j, &xj) in x.iter().enumerate() {
            self.scatter_column(j, xj, y);
        }
    }
}

impl PartialImplicitOperator for SparseOperator {
    fn apply_block(&self, rows: &[usize], cols: &[usize], x: &[f64], y: &mut [f64]) {
        assert_eq!(x.len(), cols.len());
        assert_eq!(y.len(), rows.len());

        // Only the requested columns are visited; rows are gathered afterwards.
        let mut full = vec![0.0; self.matrix.nrows()];
        for (&j, &xj) in cols.iter().zip(x) {
            self.scatter_column(j, xj, &mut full);
        }
        for (yi, &i) in y.iter_mut().zip(rows) {
            *yi = full[i];
        }
    }

    fn diagonal(&self, i: usize) -> f64 {
        let mat_ref = self.matrix.as_ref();
        let col_ptrs = mat_ref.col_ptr();
        let row_indices = mat_ref.row_idx();
        let values = mat_ref.val();

        (col_ptrs[i]..col_ptrs[i + 1])
            .filter(|&idx| row_indices[idx] == i)
            .map(|idx| values[idx])
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tridiagonal() -> SparseOperator {
        // [ 2 -1  0]
        // [-1  2 -1]
        // [ 0 -1  2]
        let triplets = vec![
            (0, 0, 2.0),
            (0, 1, -1.0),
            (1, 0, -1.0),
            (1, 1, 2.0),
            (1, 2, -1.0),
            (2, 1, -1.0),
            (2, 2, 2.0),
        ];
        SparseOperator::from_triplets(3, &triplets).unwrap()
    }

    #[test]
    fn sparse_identity() {
        let triplets = vec![(0, 0, 1.0), (1, 1, 1.0), (2, 2, 1.0)];
        let op = SparseOperator::from_triplets(3, &triplets).unwrap();

        assert_eq!(op.nrows(), 3);
        assert_eq!(op.nnz(), 3);

        let y = op.multiply(&[1.0, 2.0, 3.0]).unwrap();
        assert_eq!(y, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn sparse_tridiagonal() {
        let op = tridiagonal();

        let x = vec![1.0, 2.0, 3.0];
        let mut y = vec![0.0; 3];
        op.apply(&x, &mut y);

        // y[0] = 2*1 - 1*2 = 0
        // y[1] = -1*1 + 2*2 - 1*3 = 0
        // y[2] = -1*2 + 2*3 = 4
        assert!((y[0] - 0.0).abs() < 1e-15);
        assert!((y[1] - 0.0).abs() < 1e-15);
        assert!((y[2] - 4.0).abs() < 1e-15);
    }

    #[test]
    fn sparse_block_and_diagonal() {
        let op = tridiagonal();

        // A[{0, 2}, {1}] * [3] = [-3, -3]
        let y = op.multiply_block(&[0, 2], &[1], &[3.0]).unwrap();
        assert_eq!(y, vec![-3.0, -3.0]);

        assert_eq!(op.diagonal(0), 2.0);
        assert_eq!(op.diagonal(2), 2.0);
    }

    #[test]
    fn sparse_duplicate_triplets_are_summed() {
        let triplets = vec![(0, 0, 2.0), (0, 0, 3.0), (1, 1, 1.0)];
        let op = SparseOperator::from_triplets(2, &triplets).unwrap();
        assert_eq!(op.diagonal(0), 5.0);
    }

    #[test]
    fn sparse_out_of_range_triplet_fails() {
        let triplets = vec![(0, 0, 1.0), (5, 0, 1.0)];
        let result = SparseOperator::from_triplets(2, &triplets);
        assert!(matches!(result, Err(Error::OperatorConstruction(_))));
    }

    #[test]
    fn sparse_as_trait_object() {
        let triplets = vec![(0, 0, 2.0), (1, 1, 3.0)];
        let op = SparseOperator::from_triplets(2, &triplets).unwrap();
        let op_ref: &dyn ImplicitOperator = &op;

        let x = vec![5.0, 7.0];
        let mut y = vec![0.0; 2];
        op_ref.apply(&x, &mut y);

        assert!((y[0] - 10.0).abs() < 1e-15);
        assert!((y[1] - 21.0).abs() < 1e-15);
    }
}
