//! Incrementally grown inverse of the active-set Gram matrix.

/// Symmetric inverse R = A[B, B]⁻¹, grown one coordinate at a time.
///
/// Stored as a packed lower triangle (row-major), so appending a coordinate
/// only pushes one new row. Adding coordinate s with `beta = R * A[B, s]`
/// and `nu = 1 / (A[s, s] - A[B, s]ᵀ beta)` gives
///
/// ```text
/// [ R + nu beta betaᵀ   -nu beta ]
/// [ -nu betaᵀ                nu  ]
/// ```
#[derive(Debug, Clone, Default)]
pub struct IncrementalInverse {
    packed: Vec<f64>,
    dim: usize,
}

impl IncrementalInverse {
    /// Empty factor with room for `capacity` coordinates.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            packed: Vec::with_capacity(capacity * (capacity + 1) / 2),
            dim: 0,
        }
    }

    /// Current size of the active set.
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Whether no coordinate has been added yet.
    pub fn is_empty(&self) -> bool {
        self.dim == 0
    }

    #[inline]
    fn index(i: usize, j: usize) -> usize {
        let (hi, lo) = if i >= j { (i, j) } else { (j, i) };
        hi * (hi + 1) / 2 + lo
    }

    /// Entry (i, j) of the symmetric inverse.
    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.packed[Self::index(i, j)]
    }

    /// Start from a single coordinate with diagonal entry `a_ss`.
    pub fn first(&mut self, a_ss: f64) {
        self.packed.clear();
        self.packed.push(1.0 / a_ss);
        self.dim = 1;
    }

    /// Rank-1 update adding one coordinate.
    pub fn extend(&mut self, beta: &[f64], nu: f64) {
        assert_eq!(beta.len(), self.dim);

        for i in 0..self.dim {
            for j in 0..=i {
                self.packed[Self::index(i, j)] += nu * beta[i] * beta[j];
            }
        }
        self.packed.extend(beta.iter().map(|&bj| -nu * bj));
        self.packed.push(nu);
        self.dim += 1;
    }

    /// y = R * v
    pub fn mul(&self, v: &[f64]) -> Vec<f64> {
        assert_eq!(v.len(), self.dim);

        let mut y = vec![0.0; self.dim];
        for i in 0..self.dim {
            let row = i * (i + 1) / 2;
            for j in 0..i {
                let rij = self.packed[row + j];
                y[i] += rij * v[j];
                y[j] += rij * v[i];
            }
            y[i] += self.packed[row + i] * v[i];
        }
        y
    }
}
