//! Error types for operator construction and solver preconditions.

use thiserror::Error;

/// Errors raised when an operator or solver call is given malformed input.
///
/// Only structural problems are reported here. Numerical trouble inside a
/// solver (stagnation, loss of definiteness, non-finite objectives) is
/// handled by the solver itself and shows up in its result, never as an
/// `Error`.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// A vector length did not match the operator dimension it is used with.
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// The operator must be square for this computation.
    #[error("Operator is not square ({rows}x{cols})")]
    NotSquare { rows: usize, cols: usize },

    /// An index set referenced a row or column outside the operator.
    #[error("Index {index} out of bounds for dimension {dim}")]
    IndexOutOfBounds { index: usize, dim: usize },

    /// A solver argument was outside its valid range.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The operator could not be assembled from its raw parts.
    #[error("Operator construction failed: {0}")]
    OperatorConstruction(String),
}

/// Result type for operator and solver calls.
pub type Result<T> = std::result::Result<T, Error>;
