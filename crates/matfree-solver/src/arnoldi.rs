//! Dominant eigenpairs by block Arnoldi-style iteration.
//!
//! Keeps k basis columns and sweeps over them once per iteration. For column
//! j the sweep normalizes it, applies the operator, and removes the
//! components along the columns 0..j already refreshed in the same sweep.
//! Column j therefore performs a power iteration deflated by the first j
//! vectors and converges towards the j-th dominant eigenvector.
//!
//! ```text
//! for j in 0..k:
//!     q_j = r_j / ||r_j||
//!     r_j = A q_j
//!     r_j -= sum_{i<j} <r_j, q_i> q_i
//! delta = max_j ||r_j - r_j_prev||
//! ```
//!
//! Orthogonalizing only against the current sweep (not the full history)
//! costs one Gram-Schmidt pass per iteration.

use std::ops::Range;

use matfree_core::{Error, ImplicitOperator, Result, ensure_square};
use nalgebra::{DMatrix, DVector};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Norm below which a basis column is considered annihilated by the operator.
const ZERO_COLUMN_NORM: f64 = 1e-300;

/// Eigen-iteration configuration.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ArnoldiConfig {
    /// Maximum number of sweeps.
    pub max_iterations: usize,
    /// Stop once the largest column change of a sweep falls below this value.
    pub tolerance: f64,
    /// Sort eigenpairs by decreasing eigenvalue before returning.
    pub verify_decreasing_order: bool,
    /// Seed for [`EvArnoldi::solve`].
    pub seed: u64,
}

impl Default for ArnoldiConfig {
    fn default() -> Self {
        Self {
            max_iterations: 1000,
            tolerance: 1e-7,
            verify_decreasing_order: true,
            seed: 0xa5a5,
        }
    }
}

impl ArnoldiConfig {
    /// Set the maximum number of sweeps.
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Set the convergence tolerance.
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Enable or disable sorting by decreasing eigenvalue.
    pub fn with_decreasing_order(mut self, verify: bool) -> Self {
        self.verify_decreasing_order = verify;
        self
    }

    /// Set the seed used by [`EvArnoldi::solve`].
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

/// Eigenpairs returned by [`EvArnoldi`].
#[derive(Debug, Clone)]
pub struct EigenResult {
    /// Eigenvalue estimates (Rayleigh quotients), one per column.
    pub eigenvalues: DVector<f64>,
    /// Unit-norm eigenvector estimates, n x k.
    pub eigenvectors: DMatrix<f64>,
    /// Number of sweeps performed.
    pub iterations: usize,
    /// Largest column change of the last sweep.
    pub delta: f64,
    /// Whether `delta` fell below the tolerance.
    pub converged: bool,
}

/// Top-k eigenpair solver for symmetric implicit operators.
#[derive(Debug, Clone, Default)]
pub struct EvArnoldi {
    config: ArnoldiConfig,
}

#[inline]
fn column(n: usize, j: usize) -> Range<usize> {
    j * n..(j + 1) * n
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn norm(a: &[f64]) -> f64 {
    dot(a, a).sqrt()
}

/// Scale `v` to unit norm, replacing it with a random direction if it vanished.
fn normalize_or_reseed<R: Rng + ?Sized>(v: &mut [f64], rng: &mut R) {
    let mut len = norm(v);
    while len < ZERO_COLUMN_NORM {
        v.iter_mut()
            .for_each(|vi| *vi = rng.random_range(-1.0..1.0));
        len = norm(v);
    }
    v.iter_mut().for_each(|vi| *vi /= len);
}

impl EvArnoldi {
    /// Create a solver with the given configuration.
    pub fn new(config: ArnoldiConfig) -> Self {
        Self { config }
    }

    /// Get the configuration.
    pub fn config(&self) -> &ArnoldiConfig {
        &self.config
    }

    /// Compute the top-k eigenpairs with a generator seeded from the
    /// configuration.
    pub fn solve(&self, op: &dyn ImplicitOperator, k: usize) -> Result<EigenResult> {
        let mut rng = StdRng::seed_from_u64(self.config.seed);
        self.solve_with_rng(op, k, &mut rng)
    }

    /// Compute the top-k eigenpairs, drawing the initial basis from `rng`.
    pub fn solve_with_rng<R: Rng + ?Sized>(
        &self,
        op: &dyn ImplicitOperator,
        k: usize,
        rng: &mut R,
    ) -> Result<EigenResult> {
        let cfg = &self.config;
        let n = ensure_square(op)?;
        if k == 0 || k > n {
            return Err(Error::InvalidArgument(format!(
                "number of eigenpairs must be in 1..={n}, got {k}"
            )));
        }

        // r: Krylov images (un-normalized), q: normalized basis of the sweep
        let mut r = DMatrix::<f64>::from_fn(n, k, |_, _| rng.random_range(-1.0..1.0));
        let mut q = DMatrix::<f64>::zeros(n, k);
        let mut previous = r.clone();

        let mut iterations = 0;
        let mut delta = f64::INFINITY;

        while iterations < cfg.max_iterations {
            for j in 0..k {
                let cols = column(n, j);
                {
                    let q_data = q.as_mut_slice();
                    q_data[cols.clone()].copy_from_slice(&r.as_slice()[cols.clone()]);
                    normalize_or_reseed(&mut q_data[cols.clone()], rng);
                }

                let q_data = q.as_slice();
                let r_data = r.as_mut_slice();
                op.apply(&q_data[cols.clone()], &mut r_data[cols.clone()]);

                for i in 0..j {
                    let qi = &q_data[column(n, i)];
                    let rj = &mut r_data[cols.clone()];
                    let h = dot(rj, qi);
                    rj.iter_mut().zip(qi).for_each(|(a, &b)| *a -= h * b);
                }
            }

            delta = (0..k)
                .map(|j| {
                    let cols = column(n, j);
                    r.as_slice()[cols.clone()]
                        .iter()
                        .zip(&previous.as_slice()[cols])
                        .map(|(a, b)| (a - b) * (a - b))
                        .sum::<f64>()
                        .sqrt()
                })
                .fold(0.0, f64::max);
            previous.copy_from(&r);
            iterations += 1;

            log::trace!("Arnoldi sweep {}: delta = {:.3e}", iterations, delta);
            if delta < cfg.tolerance {
                break;
            }
        }

        let converged = delta < cfg.tolerance;
        if !converged {
            log::warn!(
                "Arnoldi iteration did not converge after {} sweeps (delta: {:.2e})",
                iterations,
                delta
            );
        }

        // Final normalization and Rayleigh quotients
        let mut eigenvalues = DVector::<f64>::zeros(k);
        let mut image = vec![0.0; n];
        for j in 0..k {
            let cols = column(n, j);
            let vj = &mut r.as_mut_slice()[cols];
            normalize_or_reseed(vj, rng);
            op.apply(vj, &mut image);
            eigenvalues[j] = dot(&image, vj);
        }
        let mut eigenvectors = r;

        if cfg.verify_decreasing_order && k > 1 {
            let mut order: Vec<usize> = (0..k).collect();
            order.sort_by(|&a, &b| eigenvalues[b].total_cmp(&eigenvalues[a]));
            permute_columns(&mut eigenvectors, &mut eigenvalues, &order);
        }

        log::debug!(
            "Arnoldi: n = {}, k = {}, {} sweeps, delta = {:.3e}",
            n,
            k,
            iterations,
            delta
        );

        Ok(EigenResult {
            eigenvalues,
            eigenvectors,
            iterations,
            delta,
            converged,
        })
    }
}

/// Reorder columns so that new column i is old column `order[i]`.
///
/// Follows each permutation cycle, holding only the single column displaced
/// at the start of the cycle. Panics unless `order` is a permutation of
/// `0..k`.
pub(crate) fn permute_columns(
    vectors: &mut DMatrix<f64>,
    values: &mut DVector<f64>,
    order: &[usize],
) {
    let n = vectors.nrows();
    let k = order.len();
    assert_eq!(vectors.ncols(), k);
    assert_eq!(values.len(), k);

    let mut placed = vec![false; k];
    for &src in order {
        assert!(
            src < k && !placed[src],
            "column order is not a permutation of 0..{k}"
        );
        placed[src] = true;
    }
    placed.fill(false);

    let data = vectors.as_mut_slice();
    let mut displaced = vec![0.0; n];

    for start in 0..k {
        if placed[start] || order[start] == start {
            placed[start] = true;
            continue;
        }

        displaced.copy_from_slice(&data[column(n, start)]);
        let displaced_value = values[start];

        let mut dst = start;
        loop {
            placed[dst] = true;
            let src = order[dst];
            if src == start {
                data[column(n, dst)].copy_from_slice(&displaced);
                values[dst] = displaced_value;
                break;
            }
            data.copy_within(column(n, src), dst * n);
            values[dst] = values[src];
            dst = src;
        }
    }
}
