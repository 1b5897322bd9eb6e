//! Integration tests for the diagonal approximation.

use matfree_solver::{
    DiagonalApproxConfig, DiagonalApproxProblem, DiagonalMatrixApprox, LineSearchOptimizer,
    Objective, StopReason,
};
use nalgebra::{DMatrix, DVector};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn smallest_eigenvalue(m: &DMatrix<f64>) -> f64 {
    m.clone().symmetric_eigenvalues().min()
}

#[test]
fn test_random_diagonal_matrix_matched() {
    // Diagonals summing to slightly more than one are feasible and are
    // recovered up to their excess over one.
    let mut rng = StdRng::seed_from_u64(2024);
    let values: Vec<f64> = (0..2).map(|_| rng.random_range(0.51..0.53)).collect();
    let a = DMatrix::from_diagonal(&DVector::from_vec(values.clone()));
    let mut d = DVector::zeros(2);

    let report = DiagonalMatrixApprox::new(DiagonalApproxConfig::default().with_max_iterations(20))
        .approx(&a, &mut d)
        .unwrap();

    assert!(report.outer_iterations <= 20);
    assert_ne!(report.stop_reason, StopReason::NumericalBreakdown);
    let error: f64 = values.iter().zip(d.iter()).map(|(v, di)| (v - di).abs()).sum();
    assert!(error < 0.1, "diagonal error {}", error);
}

#[test]
fn test_result_bounds_bilinear_form() {
    let a = DMatrix::from_row_slice(
        3,
        3,
        &[
            2.0, 0.3, 0.1, //
            0.3, 1.5, 0.2, //
            0.1, 0.2, 1.0,
        ],
    );
    let mut d = DVector::zeros(3);
    let report = DiagonalMatrixApprox::default().approx(&a, &mut d).unwrap();

    assert!(d.iter().all(|v| v.is_finite()));
    assert!(report.outer_iterations <= 20);
    // xᵀ D x <= xᵀ A x for all x
    let shifted = &a - DMatrix::from_diagonal(&d);
    assert!(smallest_eigenvalue(&shifted) >= -1e-12);
}

#[test]
fn test_warm_start_is_kept_when_every_candidate_fails() {
    let a = DMatrix::from_diagonal(&DVector::from_vec(vec![0.05, 0.1, 0.05]));
    let start = DVector::from_vec(vec![0.01, 0.02, 0.01]);
    let mut d = start.clone();

    let report = DiagonalMatrixApprox::new(DiagonalApproxConfig::default().with_max_iterations(3))
        .approx(&a, &mut d)
        .unwrap();

    assert_eq!(d, start);
    assert_eq!(report.rejected, 3);
}

#[test]
fn test_subproblem_with_optimizer() {
    let a = DMatrix::from_row_slice(2, 2, &[1.0, 0.2, 0.2, 0.8]);
    let mut problem = DiagonalApproxProblem::new(&a, DVector::zeros(2), 0.1);

    let initial = problem.compute_objective();
    let report = LineSearchOptimizer::default().optimize(&mut problem);

    assert!(report.objective <= initial);
    assert!(report.converged);
    // Stationary points put unit total weight on the diagonal
    assert!((problem.diagonal().sum() - 1.0).abs() < 1e-6);
    assert!(problem.smallest_eigenvalue().is_some());
}

#[test]
fn test_non_finite_objective_keeps_warm_start() {
    let a = DMatrix::from_element(2, 2, f64::MAX);
    let start = DVector::from_vec(vec![0.1, 0.2]);
    let mut d = start.clone();

    let report = DiagonalMatrixApprox::default().approx(&a, &mut d).unwrap();

    assert_eq!(report.stop_reason, StopReason::NumericalBreakdown);
    assert_eq!(report.outer_iterations, 1);
    assert_eq!(report.rejected, 0);
    assert_eq!(d, start);
}

#[test]
fn test_unit_interval_diagonal_matrices() {
    // Entries in [0, 1): the result is always finite and certified, and a
    // diagonal with trace below one admits no certified candidate at all.
    for seed in 0..5 {
        let mut rng = StdRng::seed_from_u64(seed);
        let values: Vec<f64> = (0..2).map(|_| rng.random::<f64>()).collect();
        let a = DMatrix::from_diagonal(&DVector::from_vec(values.clone()));
        let mut d = DVector::zeros(2);

        let report =
            DiagonalMatrixApprox::new(DiagonalApproxConfig::default().with_max_iterations(20))
                .approx(&a, &mut d)
                .unwrap();

        assert!(report.outer_iterations <= 20);
        assert!(d.iter().all(|v| v.is_finite()), "seed {}: {}", seed, d);
        let shifted = &a - DMatrix::from_diagonal(&d);
        assert!(smallest_eigenvalue(&shifted) >= -1e-12, "seed {}", seed);
        if values.iter().sum::<f64>() < 1.0 {
            assert_eq!(d, DVector::zeros(2), "seed {}", seed);
            assert_eq!(report.rejected, report.outer_iterations);
        }
    }
}
