//! First-order line-search optimizer.
//!
//! Steepest descent with Armijo backtracking. The optimizer only talks to a
//! problem through the [`Objective`] trait: it reads and writes the current
//! parameters, asks for the objective value, and asks for the gradient.
//! The gradient is always requested at the iterate whose objective was
//! evaluated last, so problems may cache work between the two calls.

use nalgebra::DVector;

/// A differentiable problem driven by [`LineSearchOptimizer`].
pub trait Objective {
    /// Current iterate.
    fn parameters(&self) -> &DVector<f64>;

    /// Mutable access to the current iterate.
    fn parameters_mut(&mut self) -> &mut DVector<f64>;

    /// Objective value at the current iterate.
    fn compute_objective(&mut self) -> f64;

    /// Gradient at the current iterate, written into `gradient`.
    ///
    /// Only called right after [`Objective::compute_objective`] on the same
    /// parameters.
    fn compute_gradient(&mut self, gradient: &mut DVector<f64>);
}

/// Line-search optimizer configuration.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LineSearchConfig {
    /// Maximum number of descent steps.
    pub max_iterations: usize,
    /// Stop once the gradient 2-norm falls below this value.
    pub min_gradient_norm: f64,
    /// Give up backtracking once the step length falls below this value.
    pub min_step: f64,
    /// Step length tried on the first iteration.
    pub initial_step: f64,
    /// Sufficient-decrease constant of the Armijo condition.
    pub armijo: f64,
    /// Factor applied to the step on each backtrack (0 < backtrack < 1).
    pub backtrack: f64,
}

impl Default for LineSearchConfig {
    fn default() -> Self {
        Self {
            max_iterations: 500,
            min_gradient_norm: 1e-9,
            min_step: 1e-14,
            initial_step: 1.0,
            armijo: 1e-4,
            backtrack: 0.5,
        }
    }
}

impl LineSearchConfig {
    /// Set the maximum number of descent steps.
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Set the gradient-norm stopping threshold.
    pub fn with_min_gradient_norm(mut self, min_gradient_norm: f64) -> Self {
        self.min_gradient_norm = min_gradient_norm;
        self
    }
}

/// Outcome of an optimization run.
#[derive(Debug, Clone)]
pub struct OptimizeReport {
    /// Number of accepted descent steps.
    pub iterations: usize,
    /// Objective value at the final iterate.
    pub objective: f64,
    /// Final gradient 2-norm (infinite if the objective was never finite).
    pub gradient_norm: f64,
    /// Whether a stopping criterion other than the iteration cap was met.
    pub converged: bool,
}

/// Steepest descent with backtracking line search.
#[derive(Debug, Clone, Default)]
pub struct LineSearchOptimizer {
    config: LineSearchConfig,
}

impl LineSearchOptimizer {
    /// Create an optimizer with the given configuration.
    pub fn new(config: LineSearchConfig) -> Self {
        Self { config }
    }

    /// Get the configuration.
    pub fn config(&self) -> &LineSearchConfig {
        &self.config
    }

    /// Minimize `problem` starting from its current parameters.
    ///
    /// On return the problem's parameters hold the best iterate found and
    /// its last objective evaluation was at those parameters. A non-finite
    /// objective at the starting point stops immediately.
    pub fn optimize(&self, problem: &mut dyn Objective) -> OptimizeReport {
        let cfg = &self.config;
        let n = problem.parameters().len();

        let mut f = problem.compute_objective();
        if !f.is_finite() {
            return OptimizeReport {
                iterations: 0,
                objective: f,
                gradient_norm: f64::INFINITY,
                converged: false,
            };
        }

        let mut gradient = DVector::zeros(n);
        problem.compute_gradient(&mut gradient);
        let mut step = cfg.initial_step;

        for iteration in 0..cfg.max_iterations {
            let grad_norm_sq = gradient.norm_squared();
            if grad_norm_sq.sqrt() < cfg.min_gradient_norm {
                return OptimizeReport {
                    iterations: iteration,
                    objective: f,
                    gradient_norm: grad_norm_sq.sqrt(),
                    converged: true,
                };
            }

            let start = problem.parameters().clone();
            let mut accepted = None;

            while step >= cfg.min_step {
                problem.parameters_mut().copy_from(&start);
                problem.parameters_mut().axpy(-step, &gradient, 1.0);

                let f_trial = problem.compute_objective();
                if f_trial.is_finite() && f_trial <= f - cfg.armijo * step * grad_norm_sq {
                    accepted = Some(f_trial);
                    break;
                }
                step *= cfg.backtrack;
            }

            let Some(f_new) = accepted else {
                // No step length gives sufficient decrease: stationary to
                // working precision. Restore the last iterate.
                problem.parameters_mut().copy_from(&start);
                let f_restored = problem.compute_objective();
                log::trace!(
                    "line search stalled at iteration {} (f = {:.6e})",
                    iteration,
                    f_restored
                );
                return OptimizeReport {
                    iterations: iteration,
                    objective: f_restored,
                    gradient_norm: grad_norm_sq.sqrt(),
                    converged: true,
                };
            };

            f = f_new;
            problem.compute_gradient(&mut gradient);
            // Let the step grow back after a successful backtrack.
            step = (step / cfg.backtrack).min(cfg.initial_step.max(step));
        }

        OptimizeReport {
            iterations: cfg.max_iterations,
            objective: f,
            gradient_norm: gradient.norm(),
            converged: false,
        }
    }
}
