use thiserror::Error;

/// Errors reported by the linear-program model and its engines.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LpError {
    #[error("Invalid linear program: {0}")]
    InvalidProblem(String),
    #[error("Unknown LP method '{0}', expected one of {{GLPK, OCTAVE, SCIPY}}")]
    UnknownMethod(String),
    #[error("Linear program is infeasible")]
    Infeasible,
    #[error("Linear program is unbounded")]
    Unbounded,
    #[error("Iteration limit reached after {iterations} iterations")]
    IterationLimit { iterations: usize },
    #[error("Basis matrix became singular")]
    SingularBasis,
    #[error("Numerical failure: {0}")]
    NumericalFailure(String),
    #[error("Octave session is closed")]
    SessionClosed,
}

/// Result type for LP operations.
pub type LpResult<T> = Result<T, LpError>;
