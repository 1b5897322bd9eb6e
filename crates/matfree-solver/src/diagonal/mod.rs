//! Diagonal approximation of a symmetric matrix.
//!
//! Looks for a diagonal `D` with `A - diag D` positive semidefinite, so that
//! `xᵀ D x <= xᵀ A x` for every x, while keeping the largest eigenvalue of
//! `A - diag D` (the worst-case error of the bound) small. The maximum eigenvalue is replaced by the smooth log-sum-exp bound of
//! [`DiagonalApproxProblem`], and the smoothing level epsilon is shrunk
//! geometrically between successive inner optimizations:
//!
//! ```text
//! ε ← ε_start
//! repeat:
//!     ε ← ε · shrink
//!     D ← argmin_D  ε ln Σ exp(λ_i(A - diag D) / ε) + ½‖D‖²   (from D_prev)
//!     reject D if f is not finite or λ_min(A - diag D) < 0
//! until Δf < min_f_delta or ‖ΔD‖∞ < min_sol_delta
//! ```

mod problem;

pub use problem::DiagonalApproxProblem;

use matfree_core::{Error, Result};
use nalgebra::{DMatrix, DVector};

use crate::optimize::{LineSearchConfig, LineSearchOptimizer};

/// Diagonal approximation configuration.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DiagonalApproxConfig {
    /// Smoothing level before the first shrink.
    pub epsilon_start: f64,
    /// Factor applied to epsilon at the start of every outer iteration.
    pub epsilon_shrink_factor: f64,
    /// Stop once the objective improves by less than this.
    pub min_f_delta: f64,
    /// Stop once the diagonal moves by less than this (infinity norm).
    pub min_sol_delta: f64,
    /// Maximum number of outer (epsilon) iterations.
    pub max_epsilon_iterations: usize,
    /// Inner optimizer settings.
    pub optimizer: LineSearchConfig,
}

impl Default for DiagonalApproxConfig {
    fn default() -> Self {
        Self {
            epsilon_start: 1.0,
            epsilon_shrink_factor: 0.5,
            min_f_delta: 1e-6,
            min_sol_delta: 1e-6,
            max_epsilon_iterations: 20,
            optimizer: LineSearchConfig::default(),
        }
    }
}

impl DiagonalApproxConfig {
    /// Set the initial smoothing level.
    pub fn with_epsilon_start(mut self, epsilon_start: f64) -> Self {
        self.epsilon_start = epsilon_start;
        self
    }

    /// Set the epsilon shrink factor.
    pub fn with_shrink_factor(mut self, factor: f64) -> Self {
        self.epsilon_shrink_factor = factor;
        self
    }

    /// Set the maximum number of outer iterations.
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_epsilon_iterations = max_iterations;
        self
    }

    /// Set the inner optimizer configuration.
    pub fn with_optimizer(mut self, optimizer: LineSearchConfig) -> Self {
        self.optimizer = optimizer;
        self
    }

    fn validate(&self) -> Result<()> {
        if self.epsilon_start.is_nan() || self.epsilon_start <= 0.0 {
            return Err(Error::InvalidArgument(format!(
                "epsilon_start must be positive, got {}",
                self.epsilon_start
            )));
        }
        let shrink = self.epsilon_shrink_factor;
        if shrink.is_nan() || shrink <= 0.0 || shrink >= 1.0 {
            return Err(Error::InvalidArgument(format!(
                "epsilon_shrink_factor must be in (0, 1), got {}",
                shrink
            )));
        }
        Ok(())
    }
}

/// Why the outer loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum StopReason {
    /// Objective or diagonal change fell below its threshold.
    Converged,
    /// The inner objective became non-finite; the last good diagonal was kept.
    NumericalBreakdown,
    /// `max_epsilon_iterations` outer iterations ran.
    IterationLimit,
}

/// Summary of a diagonal approximation run.
#[derive(Debug, Clone)]
pub struct ApproxReport {
    /// Outer iterations performed, including rejected ones.
    pub outer_iterations: usize,
    /// Objective of the last accepted diagonal (infinite if none was accepted).
    pub objective: f64,
    /// Smoothing level of the last outer iteration.
    pub epsilon: f64,
    /// Why the loop stopped.
    pub stop_reason: StopReason,
    /// Candidates rejected because `A - diag D` had a negative eigenvalue.
    pub rejected: usize,
}

/// Diagonal approximation solver.
#[derive(Debug, Clone, Default)]
pub struct DiagonalMatrixApprox {
    config: DiagonalApproxConfig,
}

impl DiagonalMatrixApprox {
    /// Create a solver with the given configuration.
    pub fn new(config: DiagonalApproxConfig) -> Self {
        Self { config }
    }

    /// Get the configuration.
    pub fn config(&self) -> &DiagonalApproxConfig {
        &self.config
    }

    /// Approximate the symmetric matrix `a` by a diagonal.
    ///
    /// `d` is the starting guess and receives the result; it is reset to
    /// zeros if its length does not match `a`. Numerical trouble never
    /// produces an error: `d` always holds the last accepted diagonal.
    pub fn approx(&self, a: &DMatrix<f64>, d: &mut DVector<f64>) -> Result<ApproxReport> {
        let cfg = &self.config;
        if !a.is_square() {
            return Err(Error::NotSquare {
                rows: a.nrows(),
                cols: a.ncols(),
            });
        }
        cfg.validate()?;

        let n = a.nrows();
        if d.len() != n {
            *d = DVector::zeros(n);
        }

        let optimizer = LineSearchOptimizer::new(cfg.optimizer.clone());
        let mut epsilon = cfg.epsilon_start;
        let mut f_prev = f64::INFINITY;
        let mut report = ApproxReport {
            outer_iterations: 0,
            objective: f64::INFINITY,
            epsilon,
            stop_reason: StopReason::IterationLimit,
            rejected: 0,
        };

        for iteration in 0..cfg.max_epsilon_iterations {
            epsilon *= cfg.epsilon_shrink_factor;
            report.outer_iterations = iteration + 1;
            report.epsilon = epsilon;

            let d_prev = d.clone();
            let mut problem = DiagonalApproxProblem::new(a, d_prev.clone(), epsilon);
            let inner = optimizer.optimize(&mut problem);
            let f = inner.objective;

            log::trace!(
                "diagonal approx iteration {}: eps = {:.3e}, f = {:.6e}, inner steps = {}",
                iteration,
                epsilon,
                f,
                inner.iterations
            );

            if !f.is_finite() {
                log::warn!(
                    "diagonal approximation broke down at eps = {:.3e}; keeping previous diagonal",
                    epsilon
                );
                report.stop_reason = StopReason::NumericalBreakdown;
                break;
            }

            match problem.smallest_eigenvalue() {
                Some(lambda_min) if lambda_min >= 0.0 => {}
                lambda_min => {
                    log::warn!(
                        "rejecting diagonal candidate at eps = {:.3e} (smallest eigenvalue: {:?})",
                        epsilon,
                        lambda_min
                    );
                    report.rejected += 1;
                    continue;
                }
            }

            let candidate = problem.into_diagonal();
            let change = (&candidate - &d_prev).amax();
            *d = candidate;

            let improvement = f_prev - f;
            f_prev = f;
            report.objective = f;

            if improvement < cfg.min_f_delta || change < cfg.min_sol_delta {
                report.stop_reason = StopReason::Converged;
                break;
            }
        }

        log::debug!(
            "diagonal approx: n = {}, {} outer iterations ({} rejected), f = {:.6e}, {:?}",
            n,
            report.outer_iterations,
            report.rejected,
            report.objective,
            report.stop_reason
        );

        Ok(report)
    }
}
