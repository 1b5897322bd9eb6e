//! Matrix-free solvers for matfree.
//!
//! # Solvers
//!
//! - [`EvArnoldi`] - dominant eigenpairs of a symmetric [`ImplicitOperator`]
//! - [`GbcdSolver`] - greedy block coordinate descent for `A x = b` with
//!   `A` symmetric positive definite, through [`PartialImplicitOperator`]
//! - [`DiagonalMatrixApprox`] - diagonal bound on the bilinear form of a
//!   dense symmetric matrix
//!
//! The diagonal approximation drives the generic [`LineSearchOptimizer`] in
//! [`optimize`], which works on anything implementing [`Objective`].
//!
//! # Example
//!
//! ```
//! use matfree_solver::{ArnoldiConfig, DenseOperator, EvArnoldi};
//! use nalgebra::DMatrix;
//!
//! let op = DenseOperator::new(DMatrix::from_diagonal_element(4, 4, 2.0));
//! let result = EvArnoldi::new(ArnoldiConfig::default()).solve(&op, 1).unwrap();
//! assert!((result.eigenvalues[0] - 2.0).abs() < 1e-10);
//! ```

pub mod arnoldi;
pub mod diagonal;
pub mod gbcd;
pub mod optimize;

pub use arnoldi::{ArnoldiConfig, EigenResult, EvArnoldi};
pub use diagonal::{
    ApproxReport, DiagonalApproxConfig, DiagonalApproxProblem, DiagonalMatrixApprox, StopReason,
};
pub use gbcd::{GbcdConfig, GbcdResult, GbcdSolver, IterationRecord, quadratic_objective};
pub use matfree_core::{
    CovarianceOperator, DenseOperator, Error, ImplicitOperator, PartialImplicitOperator, Result,
    SparseOperator, SparseRow, SparseRowOperator,
};
pub use optimize::{LineSearchConfig, LineSearchOptimizer, Objective, OptimizeReport};
