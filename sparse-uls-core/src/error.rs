use sparse_uls_lp::LpError;
use thiserror::Error;

use crate::solution::Convergence;

/// Errors raised by the underdetermined system solvers.
///
/// Shape and norm checks fail before any numerical work is done. Optimizer
/// non-convergence is not an error by itself; it is reported on the returned
/// [`crate::Solution`] and only becomes [`UlsError::NotConverged`] when the
/// caller asks for it with [`crate::Solution::into_converged`].
#[derive(Error, Debug, Clone, PartialEq)]
pub enum UlsError {
    #[error("Invalid shape: {0}")]
    InvalidShape(String),
    #[error("System must be underdetermined (m < n), got m = {rows}, n = {cols}")]
    Underdetermined { rows: usize, cols: usize },
    #[error("Norm parameter p must be finite and in the supported range, got {0}")]
    InvalidNorm(f64),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Matrix A is rank deficient: numerical rank {rank} with {rows} rows")]
    RankDeficient { rank: usize, rows: usize },
    #[error("Optimizer error: {0}")]
    Optimizer(String),
    #[error("{method} did not converge: {convergence}")]
    NotConverged {
        method: String,
        convergence: Convergence,
    },
    #[error(transparent)]
    LinearProgram(#[from] LpError),
    #[error("Invalid configuration: {0}")]
    Config(String),
    #[error("I/O error: {0}")]
    Io(String),
}

impl From<argmin::core::Error> for UlsError {
    fn from(e: argmin::core::Error) -> Self {
        UlsError::Optimizer(e.to_string())
    }
}

pub type UlsResult<T> = Result<T, UlsError>;
