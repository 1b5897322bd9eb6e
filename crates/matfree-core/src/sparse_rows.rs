//! Operator stored as a vector of sparse rows.

use crate::error::{Error, Result};
use crate::operator::{ImplicitOperator, PartialImplicitOperator};

/// One sparse row: (column, value) pairs sorted by column.
pub type SparseRow = Vec<(usize, f64)>;

/// Row-major sparse operator.
///
/// Suited to operators assembled row by row, where each row is produced
/// independently (e.g. kernel rows truncated to their largest entries).
#[derive(Debug, Clone)]
pub struct SparseRowOperator {
    rows: Vec<SparseRow>,
    ncols: usize,
}

impl SparseRowOperator {
    /// Build from rows of (column, value) pairs.
    ///
    /// Entries within a row are sorted by column and duplicates summed.
    pub fn new(mut rows: Vec<SparseRow>, ncols: usize) -> Result<Self> {
        for row in rows.iter_mut() {
            if let Some(&(col, _)) = row.iter().find(|&&(c, _)| c >= ncols) {
                return Err(Error::IndexOutOfBounds {
                    index: col,
                    dim: ncols,
                });
            }
            row.sort_by_key(|&(c, _)| c);
            row.dedup_by(|next, kept| {
                if next.0 == kept.0 {
                    kept.1 += next.1;
                    true
                } else {
                    false
                }
            });
        }
        Ok(Self { rows, ncols })
    }

    /// Square operator from rows; fails if any row index exceeds the row count.
    pub fn square(rows: Vec<SparseRow>) -> Result<Self> {
        let n = rows.len();
        Self::new(rows, n)
    }

    /// Access row i.
    pub fn row(&self, i: usize) -> &[(usize, f64)] {
        &self.rows[i]
    }

    fn row_dot(&self, i: usize, x: &[f64]) -> f64 {
        self.rows[i].iter().map(|&(c, v)| v * x[c]).sum()
    }
}

impl ImplicitOperator for SparseRowOperator {
    fn nrows(&self) -> usize {
        self.rows.len()
    }

    fn ncols(&self) -> usize {
        self.ncols
    }

    fn apply(&self, x: &[f64], y: &mut [f64]) {
        assert_eq!(x.len(), self.ncols);
        assert_eq!(y.len(), self.rows.len());

        for (i, yi) in y.iter_mut().enumerate() {
            *yi = self.row_dot(i, x);
        }
    }
}

impl PartialImplicitOperator for SparseRowOperator {
    fn apply_block(&self, rows: &[usize], cols: &[usize], x: &[f64], y: &mut [f64]) {
        assert_eq!(x.len(), cols.len());
        assert_eq!(y.len(), rows.len());

        let mut scattered = vec![0.0; self.ncols];
        for (&j, &xj) in cols.iter().zip(x) {
            scattered[j] += xj;
        }
        for (yi, &i) in y.iter_mut().zip(rows) {
            *yi = self.row_dot(i, &scattered);
        }
    }

    fn diagonal(&self, i: usize) -> f64 {
        let row = &self.rows[i];
        row.binary_search_by_key(&i, |&(c, _)| c)
            .map(|pos| row[pos].1)
            .unwrap_or(0.0)
    }
}
