//! Greedy block coordinate descent for symmetric positive-definite systems.
//!
//! Solves A*x = b (equivalently, minimizes ½xᵀAx - bᵀx) for an implicit
//! operator A. Each outer iteration greedily builds a small working set B of
//! coordinates from randomly sampled candidates, solves the system exactly
//! on that block, and applies the update:
//!
//! ```text
//! grad = A*x - b
//! repeat:
//!     (B, dalpha) = greedy_step(grad)      // |B| <= step_components
//!     x[B]  += dalpha
//!     grad  += A[:, B] * dalpha
//! until ||dalpha||_2 < min_delta
//! ```
//!
//! The operator is only touched through sub-block products and diagonal
//! entries; it is never materialized.
//!
//! # Module Structure
//!
//! - [`factor`] - incremental inverse of the active-set Gram matrix
//! - [`candidates`] - eligible-coordinate tracking and random sampling

pub mod candidates;
pub mod factor;

use std::time::{Duration, Instant};

use matfree_core::{Error, PartialImplicitOperator, Result, ensure_square};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub use candidates::CandidateSet;
pub use factor::IncrementalInverse;

/// Greedy block coordinate descent configuration.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GbcdConfig {
    /// Working-set size per outer iteration.
    pub step_components: usize,
    /// Number of random candidates scored before each greedy pick.
    pub random_set_size: usize,
    /// Maximum number of outer iterations.
    pub max_iterations: usize,
    /// Stop once the block update 2-norm falls below this value.
    pub min_delta: f64,
    /// Record residual norm and elapsed time after every outer iteration.
    pub record_trace: bool,
    /// Seed for [`GbcdSolver::solve`].
    pub seed: u64,
}

impl Default for GbcdConfig {
    fn default() -> Self {
        Self {
            step_components: 50,
            random_set_size: 60,
            max_iterations: 1000,
            min_delta: 1e-7,
            record_trace: false,
            seed: 0x6bcd,
        }
    }
}

impl GbcdConfig {
    /// Set the working-set size.
    pub fn with_step_components(mut self, step_components: usize) -> Self {
        self.step_components = step_components;
        self
    }

    /// Set the candidate pool size.
    pub fn with_random_set_size(mut self, random_set_size: usize) -> Self {
        self.random_set_size = random_set_size;
        self
    }

    /// Set the maximum number of outer iterations.
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Set the update-norm stopping threshold.
    pub fn with_min_delta(mut self, min_delta: f64) -> Self {
        self.min_delta = min_delta;
        self
    }

    /// Enable or disable per-iteration tracing.
    pub fn with_trace(mut self, record_trace: bool) -> Self {
        self.record_trace = record_trace;
        self
    }

    /// Set the seed used by [`GbcdSolver::solve`].
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

/// Diagnostics for one outer iteration.
#[derive(Debug, Clone)]
pub struct IterationRecord {
    /// Outer iteration index (0-based).
    pub iteration: usize,
    /// ||A*x - b||_inf after the update.
    pub residual_inf_norm: f64,
    /// ||dalpha||_2 of the update.
    pub update_norm: f64,
    /// Wall-clock time since the solve started.
    pub elapsed: Duration,
}

/// Result of a greedy block coordinate descent solve.
///
/// The solution itself is written to the caller's `x`.
#[derive(Debug, Clone)]
pub struct GbcdResult {
    /// Number of outer iterations performed.
    pub iterations: usize,
    /// Whether the update norm dropped below `min_delta`.
    pub converged: bool,
    /// 2-norm of the last block update.
    pub last_update_norm: f64,
    /// Per-iteration records (empty unless `record_trace` is set).
    pub trace: Vec<IterationRecord>,
}

/// One greedy working-set selection.
struct BlockStep {
    active: Vec<usize>,
    delta: Vec<f64>,
}

/// Greedy block coordinate descent solver.
#[derive(Debug, Clone, Default)]
pub struct GbcdSolver {
    config: GbcdConfig,
}

impl GbcdSolver {
    /// Create a solver with the given configuration.
    pub fn new(config: GbcdConfig) -> Self {
        Self { config }
    }

    /// Get the configuration.
    pub fn config(&self) -> &GbcdConfig {
        &self.config
    }

    /// Solve A*x = b with a generator seeded from the configuration.
    ///
    /// `x` is the initial guess and receives the solution. If its length
    /// differs from the operator dimension it is replaced by zeros.
    pub fn solve(
        &self,
        op: &dyn PartialImplicitOperator,
        b: &[f64],
        x: &mut Vec<f64>,
    ) -> Result<GbcdResult> {
        let mut rng = StdRng::seed_from_u64(self.config.seed);
        self.solve_with_rng(op, b, x, &mut rng)
    }

    /// Solve A*x = b drawing candidates from `rng`.
    pub fn solve_with_rng<R: Rng + ?Sized>(
        &self,
        op: &dyn PartialImplicitOperator,
        b: &[f64],
        x: &mut Vec<f64>,
        rng: &mut R,
    ) -> Result<GbcdResult> {
        let cfg = &self.config;
        let n = ensure_square(op)?;
        if b.len() != n {
            return Err(Error::DimensionMismatch {
                expected: n,
                actual: b.len(),
            });
        }
        if cfg.step_components == 0 {
            return Err(Error::InvalidArgument(
                "step_components must be at least 1".into(),
            ));
        }
        if cfg.random_set_size == 0 {
            return Err(Error::InvalidArgument(
                "random_set_size must be at least 1".into(),
            ));
        }

        if x.len() != n {
            *x = vec![0.0; n];
        }

        let start = Instant::now();
        let all_rows: Vec<usize> = (0..n).collect();

        // grad = A*x - b
        let mut grad = op.multiply(x)?;
        for (gi, &bi) in grad.iter_mut().zip(b) {
            *gi -= bi;
        }

        let mut result = GbcdResult {
            iterations: 0,
            converged: false,
            last_update_norm: f64::INFINITY,
            trace: Vec::new(),
        };

        for iteration in 0..cfg.max_iterations {
            let step = self.greedy_step(op, &grad, rng)?;
            if step.active.is_empty() {
                break;
            }
            result.iterations = iteration + 1;

            for (&i, &d) in step.active.iter().zip(&step.delta) {
                x[i] += d;
            }
            let grad_update = op.multiply_block(&all_rows, &step.active, &step.delta)?;
            for (gi, &u) in grad.iter_mut().zip(&grad_update) {
                *gi += u;
            }

            let update_norm = step.delta.iter().map(|d| d * d).sum::<f64>().sqrt();
            result.last_update_norm = update_norm;

            if cfg.record_trace {
                let residual_inf_norm = grad.iter().fold(0.0_f64, |m, g| m.max(g.abs()));
                result.trace.push(IterationRecord {
                    iteration,
                    residual_inf_norm,
                    update_norm,
                    elapsed: start.elapsed(),
                });
            }
            log::trace!(
                "GBCD iteration {}: |B| = {}, ||dalpha|| = {:.3e}",
                iteration,
                step.active.len(),
                update_norm
            );

            if update_norm < cfg.min_delta {
                result.converged = true;
                break;
            }
        }

        if result.converged {
            log::debug!(
                "GBCD converged after {} iterations (n = {}, ||dalpha|| = {:.3e})",
                result.iterations,
                n,
                result.last_update_norm
            );
        } else {
            log::warn!(
                "GBCD did not converge after {} iterations (||dalpha|| = {:.3e})",
                result.iterations,
                result.last_update_norm
            );
        }

        Ok(result)
    }

    /// Greedily select up to `step_components` coordinates and their joint
    /// optimal update given the current gradient.
    fn greedy_step<R: Rng + ?Sized>(
        &self,
        op: &dyn PartialImplicitOperator,
        grad: &[f64],
        rng: &mut R,
    ) -> Result<BlockStep> {
        let cfg = &self.config;
        let n = grad.len();

        // error vector: gradient after the partial update on B
        let mut e = grad.to_vec();
        let mut candidates = CandidateSet::new(n);
        let mut factor = IncrementalInverse::with_capacity(cfg.step_components);
        let mut active: Vec<usize> = Vec::with_capacity(cfg.step_components);
        let mut delta: Vec<f64> = Vec::new();

        let mut pool = candidates.sample(cfg.random_set_size, rng);

        'picks: for pick in 0..cfg.step_components {
            // Closed-form single-coordinate gain -e²/(2 A[s,s]); first minimum wins.
            let (s, a_ss) = loop {
                if pool.is_empty() {
                    log::warn!(
                        "GBCD candidate pool exhausted after {} of {} picks",
                        pick,
                        cfg.step_components
                    );
                    break 'picks;
                }
                if let Some(found) = best_candidate(op, &pool, &e) {
                    break found;
                }
                // Coordinates with a non-positive diagonal can never be picked.
                log::trace!("GBCD pool of {} has no positive diagonal; resampling", pool.len());
                for &c in &pool {
                    candidates.exclude(c);
                }
                pool = candidates.sample(cfg.random_set_size, rng);
                refresh_errors(op, &pool, &active, &delta, grad, &mut e)?;
            };

            if factor.is_empty() {
                factor.first(a_ss);
            } else {
                let a_bs = op.multiply_block(&active, &[s], &[1.0])?;
                let beta = factor.mul(&a_bs);
                let schur = a_ss - a_bs.iter().zip(&beta).map(|(a, b)| a * b).sum::<f64>();
                let nu = 1.0 / schur;
                if schur.is_nan() || schur <= 0.0 || !nu.is_finite() {
                    log::warn!(
                        "GBCD active set lost positive definiteness at coordinate {} (pivot {:.3e}); truncating to {} coordinates",
                        s,
                        schur,
                        active.len()
                    );
                    break;
                }
                factor.extend(&beta, nu);
            }

            active.push(s);
            candidates.exclude(s);

            let grad_active: Vec<f64> = active.iter().map(|&i| grad[i]).collect();
            delta = factor.mul(&grad_active);
            delta.iter_mut().for_each(|d| *d = -*d);

            pool = candidates.sample(cfg.random_set_size, rng);
            refresh_errors(op, &pool, &active, &delta, grad, &mut e)?;
        }

        Ok(BlockStep { active, delta })
    }
}

/// Pool coordinate with the best gain and its diagonal entry, skipping
/// non-positive diagonals.
fn best_candidate(
    op: &dyn PartialImplicitOperator,
    pool: &[usize],
    e: &[f64],
) -> Option<(usize, f64)> {
    let mut best: Option<(usize, f64, f64)> = None;
    for &c in pool {
        let a_cc = op.diagonal(c);
        if a_cc.is_nan() || a_cc <= 0.0 {
            continue;
        }
        let gain = -e[c] * e[c] / (2.0 * a_cc);
        if best.is_none_or(|(_, g, _)| gain < g) {
            best = Some((c, gain, a_cc));
        }
    }
    best.map(|(c, _, a_cc)| (c, a_cc))
}

/// e[O] = A[O, B] * delta + grad[O]
fn refresh_errors(
    op: &dyn PartialImplicitOperator,
    pool: &[usize],
    active: &[usize],
    delta: &[f64],
    grad: &[f64],
    e: &mut [f64],
) -> Result<()> {
    if pool.is_empty() || active.is_empty() {
        return Ok(());
    }
    let refreshed = op.multiply_block(pool, active, delta)?;
    for (&o, &r) in pool.iter().zip(&refreshed) {
        e[o] = r + grad[o];
    }
    Ok(())
}

/// Quadratic-program objective ½xᵀAx - bᵀx.
pub fn quadratic_objective(
    op: &dyn PartialImplicitOperator,
    b: &[f64],
    x: &[f64],
) -> Result<f64> {
    if b.len() != x.len() {
        return Err(Error::DimensionMismatch {
            expected: x.len(),
            actual: b.len(),
        });
    }
    let ax = op.multiply(x)?;
    Ok(x
        .iter()
        .zip(&ax)
        .zip(b)
        .map(|((&xi, &axi), &bi)| 0.5 * xi * axi - bi * xi)
        .sum())
}

#[cfg(test)]
mod tests {
    use super::*;
    use matfree_core::DenseOperator;
    use nalgebra::{DMatrix, dmatrix};

    #[test]
    fn gbcd_config_default() {
        let config = GbcdConfig::default();
        assert_eq!(config.step_components, 50);
        assert_eq!(config.random_set_size, 60);
        assert_eq!(config.max_iterations, 1000);
        assert!(!config.record_trace);
    }

    #[test]
    fn identity_solved_in_one_iteration() {
        let op = DenseOperator::identity(5);
        let b = vec![1.0, -2.0, 3.0, 0.5, 4.0];
        let mut x = Vec::new();

        let solver = GbcdSolver::new(
            GbcdConfig::default()
                .with_step_components(5)
                .with_random_set_size(2)
                .with_min_delta(1e-10)
                .with_trace(true),
        );
        let result = solver.solve(&op, &b, &mut x).unwrap();

        assert!(result.converged);
        assert!(result.iterations <= 2);
        assert!(result.trace[0].residual_inf_norm < 1e-10);
        for i in 0..5 {
            assert!((x[i] - b[i]).abs() < 1e-10);
        }
    }

    #[test]
    fn pool_exhaustion_truncates_working_set() {
        // More picks requested than coordinates exist.
        let op = DenseOperator::identity(3);
        let b = vec![1.0, 2.0, 3.0];
        let mut x = vec![0.0; 3];

        let solver = GbcdSolver::new(GbcdConfig::default().with_step_components(10));
        let result = solver.solve(&op, &b, &mut x).unwrap();

        assert!(result.converged);
        assert_eq!(x, b);
    }

    #[test]
    fn non_positive_diagonal_pool_is_resampled() {
        // Only coordinates 4 and 5 can ever be picked; a pool of one mostly
        // lands on the others.
        let op = DenseOperator::new(DMatrix::from_diagonal(&nalgebra::DVector::from_vec(vec![
            0.0, -1.0, 0.0, 0.0, 2.0, 3.0,
        ])));
        let b = vec![1.0, 1.0, 1.0, 1.0, 4.0, 6.0];
        let mut x = Vec::new();

        let solver = GbcdSolver::new(
            GbcdConfig::default()
                .with_step_components(2)
                .with_random_set_size(1),
        );
        let result = solver.solve(&op, &b, &mut x).unwrap();

        assert!(result.converged);
        assert_eq!(&x[..4], &[0.0; 4]);
        assert!((x[4] - 2.0).abs() < 1e-12);
        assert!((x[5] - 2.0).abs() < 1e-12);
    }

    #[test]
    fn non_positive_diagonal_is_never_selected() {
        let op = DenseOperator::new(dmatrix![0.0, 0.0, 0.0; 0.0, 2.0, 0.0; 0.0, 0.0, 4.0]);
        let b = vec![5.0, 2.0, 8.0];
        let mut x = vec![0.0; 3];

        let solver = GbcdSolver::new(
            GbcdConfig::default()
                .with_step_components(3)
                .with_random_set_size(3),
        );
        let result = solver.solve(&op, &b, &mut x).unwrap();

        assert!(result.converged);
        assert_eq!(x, vec![0.0, 1.0, 2.0]);
    }

    #[test]
    fn small_spd_system() {
        let a = dmatrix![4.0, 1.0, 0.0; 1.0, 3.0, 1.0; 0.0, 1.0, 2.0];
        let op = DenseOperator::new(a.clone());
        let b = vec![1.0, 2.0, 3.0];
        let mut x = vec![0.0; 3];

        let solver = GbcdSolver::new(
            GbcdConfig::default()
                .with_step_components(2)
                .with_random_set_size(3)
                .with_min_delta(1e-12),
        );
        let result = solver.solve(&op, &b, &mut x).unwrap();
        assert!(result.converged);

        let expected = a.lu().solve(&nalgebra::DVector::from_vec(b)).unwrap();
        for i in 0..3 {
            assert!(
                (x[i] - expected[i]).abs() < 1e-8,
                "x[{}] = {}, expected {}",
                i,
                x[i],
                expected[i]
            );
        }
    }

    #[test]
    fn wrong_sized_guess_is_reset() {
        let op = DenseOperator::identity(2);
        let mut x = vec![5.0; 7];
        GbcdSolver::default()
            .solve(&op, &[1.0, 1.0], &mut x)
            .unwrap();
        assert_eq!(x.len(), 2);
        assert!((x[0] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn rhs_dimension_mismatch() {
        let op = DenseOperator::identity(3);
        let mut x = Vec::new();
        let result = GbcdSolver::default().solve(&op, &[1.0, 2.0], &mut x);
        assert!(matches!(result, Err(Error::DimensionMismatch { .. })));
    }

    #[test]
    fn non_square_operator_rejected() {
        let op = DenseOperator::new(DMatrix::zeros(2, 3));
        let mut x = Vec::new();
        let result = GbcdSolver::default().solve(&op, &[1.0, 2.0], &mut x);
        assert!(matches!(result, Err(Error::NotSquare { rows: 2, cols: 3 })));
    }

    #[test]
    fn zero_step_components_rejected() {
        let op = DenseOperator::identity(2);
        let mut x = Vec::new();
        let solver = GbcdSolver::new(GbcdConfig::default().with_step_components(0));
        let result = solver.solve(&op, &[1.0, 2.0], &mut x);
        assert!(matches!(result, Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn quadratic_objective_at_solution() {
        let op = DenseOperator::new(dmatrix![2.0, 0.0; 0.0, 4.0]);
        let b = [2.0, 4.0];
        // Minimizer x = A⁻¹b = [1, 1], objective -½ bᵀA⁻¹b = -3
        let f = quadratic_objective(&op, &b, &[1.0, 1.0]).unwrap();
        assert!((f + 3.0).abs() < 1e-12);
    }
}
