//! Error types for the optimizer.

use serde::Serialize;
use thiserror::Error;

/// Coarse classification surfaced to callers in the response envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorKind {
    InvalidInput,
    UnknownAlgorithm,
    InfeasibleProblem,
    SolverError,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorKind::InvalidInput => "InvalidInput",
            ErrorKind::UnknownAlgorithm => "UnknownAlgorithm",
            ErrorKind::InfeasibleProblem => "InfeasibleProblem",
            ErrorKind::SolverError => "SolverError",
        };
        f.write_str(name)
    }
}

/// Errors that can occur while validating or optimizing a cutting plan.
///
/// Running out of time is not an error: strategies return their best
/// layout with `is_optimal = false` instead.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OptimizeError {
    /// Non-positive dimensions, zero quantity or a malformed request.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The requested algorithm name is not known.
    #[error("unknown algorithm '{0}', expected one of: milp, simple, fast, improved, smart")]
    UnknownAlgorithm(String),

    /// No layout exists, e.g. a piece exceeds the stock in every allowed orientation.
    #[error("infeasible problem: {0}")]
    InfeasibleProblem(String),

    /// The exact solver backend failed. Retryable with a heuristic.
    #[error("solver error: {0}")]
    SolverError(String),
}

impl OptimizeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            OptimizeError::InvalidInput(_) => ErrorKind::InvalidInput,
            OptimizeError::UnknownAlgorithm(_) => ErrorKind::UnknownAlgorithm,
            OptimizeError::InfeasibleProblem(_) => ErrorKind::InfeasibleProblem,
            OptimizeError::SolverError(_) => ErrorKind::SolverError,
        }
    }

    pub fn invalid(msg: impl Into<String>) -> Self {
        OptimizeError::InvalidInput(msg.into())
    }
}

/// Result type for optimizer operations.
pub type Result<T> = std::result::Result<T, OptimizeError>;
