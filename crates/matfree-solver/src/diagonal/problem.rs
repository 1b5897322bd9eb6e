//! Smoothed diagonal-fit subproblem for a fixed smoothing level.

use nalgebra::{DMatrix, DVector, SymmetricEigen};

use crate::optimize::Objective;

const EIGEN_EPS: f64 = 1e-12;
const EIGEN_MAX_SWEEPS: usize = 10_000;

/// Objective for one smoothing level epsilon:
///
/// ```text
/// f(D) = ε · ln Σ_i exp(λ_i(A - diag D) / ε) + ½ ‖D‖²
/// ```
///
/// The log-sum-exp term is a smooth upper bound on the largest eigenvalue of
/// `A - diag D`. Each objective evaluation decomposes the matrix and caches
/// the spectrum for the following gradient call.
#[derive(Debug, Clone)]
pub struct DiagonalApproxProblem<'a> {
    a: &'a DMatrix<f64>,
    d: DVector<f64>,
    epsilon: f64,
    eigenvalues: DVector<f64>,
    eigenvectors: DMatrix<f64>,
    decomposed: bool,
}

impl<'a> DiagonalApproxProblem<'a> {
    /// Subproblem on the square matrix `a` starting from the diagonal `d`.
    pub fn new(a: &'a DMatrix<f64>, d: DVector<f64>, epsilon: f64) -> Self {
        let n = a.nrows();
        debug_assert_eq!(a.ncols(), n);
        debug_assert_eq!(d.len(), n);
        Self {
            a,
            d,
            epsilon,
            eigenvalues: DVector::zeros(n),
            eigenvectors: DMatrix::zeros(n, n),
            decomposed: false,
        }
    }

    /// Smoothing level.
    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    /// Current diagonal.
    pub fn diagonal(&self) -> &DVector<f64> {
        &self.d
    }

    /// Consume the problem and return its diagonal.
    pub fn into_diagonal(self) -> DVector<f64> {
        self.d
    }

    /// Smallest eigenvalue of `A - diag D` from the last evaluation, if the
    /// decomposition succeeded.
    pub fn smallest_eigenvalue(&self) -> Option<f64> {
        if self.decomposed && !self.eigenvalues.is_empty() {
            Some(self.eigenvalues[0])
        } else {
            None
        }
    }

    /// Decompose `A - diag D`, keeping eigenpairs sorted by ascending value.
    fn decompose(&mut self) {
        let mut shifted = self.a.clone();
        for (i, di) in self.d.iter().enumerate() {
            shifted[(i, i)] -= di;
        }

        let Some(eigen) = SymmetricEigen::try_new(shifted, EIGEN_EPS, EIGEN_MAX_SWEEPS) else {
            log::debug!("symmetric eigendecomposition failed to converge");
            self.decomposed = false;
            return;
        };

        let n = eigen.eigenvalues.len();
        let mut order: Vec<usize> = (0..n).collect();
        order.sort_by(|&x, &y| eigen.eigenvalues[x].total_cmp(&eigen.eigenvalues[y]));

        self.eigenvalues = DVector::from_iterator(n, order.iter().map(|&i| eigen.eigenvalues[i]));
        self.eigenvectors = eigen.eigenvectors.select_columns(&order);
        self.decomposed = true;
    }

    /// Softmax weights of the eigenvalues at the current smoothing level.
    fn weights(&self) -> DVector<f64> {
        let max = self.eigenvalues.max();
        let mut mu = self.eigenvalues.map(|l| ((l - max) / self.epsilon).exp());
        let total = mu.sum();
        mu /= total;
        mu
    }
}

impl Objective for DiagonalApproxProblem<'_> {
    fn parameters(&self) -> &DVector<f64> {
        &self.d
    }

    fn parameters_mut(&mut self) -> &mut DVector<f64> {
        &mut self.d
    }

    fn compute_objective(&mut self) -> f64 {
        self.decompose();
        if !self.decomposed || self.eigenvalues.is_empty() {
            return 0.0;
        }

        // ε ln Σ exp(λ/ε), shifted by the largest eigenvalue
        let max = self.eigenvalues.max();
        let sum: f64 = self
            .eigenvalues
            .iter()
            .map(|l| ((l - max) / self.epsilon).exp())
            .sum();
        let f = max + self.epsilon * sum.ln() + 0.5 * self.d.norm_squared();

        if f.is_finite() { f } else { f64::INFINITY }
    }

    fn compute_gradient(&mut self, gradient: &mut DVector<f64>) {
        if !self.decomposed {
            gradient.fill(0.0);
            return;
        }

        // ∂λ_i/∂D_j = -V[j, i]²
        let mu = self.weights();
        for j in 0..self.d.len() {
            let row = self.eigenvectors.row(j);
            let smooth: f64 = row.iter().zip(mu.iter()).map(|(v, m)| m * v * v).sum();
            gradient[j] = self.d[j] - smooth;
        }
    }
}
