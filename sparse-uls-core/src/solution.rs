extern crate nalgebra as na;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{UlsError, UlsResult};

/// How the optimizer behind a solution terminated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Convergence {
    /// Stopping criteria met
    Converged,
    /// Iteration budget exhausted before the stopping criteria were met
    IterationLimit,
    /// The optimizer could not make further progress; the best iterate is kept
    Stalled { reason: String },
}

impl fmt::Display for Convergence {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Convergence::Converged => write!(f, "converged"),
            Convergence::IterationLimit => write!(f, "iteration limit reached"),
            Convergence::Stalled { reason } => write!(f, "stalled ({})", reason),
        }
    }
}

/// Result of one of the solving strategies.
///
/// `objective` is the value of whatever the strategy minimized: `‖x‖_p^p` for
/// [`crate::solve`], the final penalized objective for
/// [`crate::solve_homopoly`] and `‖x‖_1` for [`crate::solve_l1`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Solution {
    pub x: na::DVector<f64>,
    pub objective: f64,
    pub iterations: usize,
    pub convergence: Convergence,
}

impl Solution {
    pub fn is_converged(&self) -> bool {
        self.convergence == Convergence::Converged
    }

    /// Euclidean norm of `A x - b`.
    pub fn residual_norm(&self, a: &na::DMatrix<f64>, b: &na::DVector<f64>) -> f64 {
        (a * &self.x - b).norm()
    }

    /// Turns a non-converged report into [`UlsError::NotConverged`].
    ///
    /// # Example
    ///
    /// ```rust
    /// # use nalgebra as na;
    /// # use sparse_uls_core::solve;
    /// let a = na::DMatrix::from_row_slice(1, 3, &[1.0, 1.0, 1.0]);
    /// let b = na::DVector::from_vec(vec![1.0]);
    /// let x = solve(&a, &b, 2.0).and_then(|s| s.into_converged("solve")).map(|s| s.x);
    /// assert!(x.is_ok());
    /// ```
    pub fn into_converged(self, method: &str) -> UlsResult<Self> {
        if self.is_converged() {
            Ok(self)
        } else {
            Err(UlsError::NotConverged {
                method: method.to_string(),
                convergence: self.convergence,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(convergence: Convergence) -> Solution {
        Solution {
            x: na::DVector::from_vec(vec![1.0, 0.0]),
            objective: 1.0,
            iterations: 3,
            convergence,
        }
    }

    #[test]
    fn test_into_converged_passes_converged() {
        assert!(report(Convergence::Converged).into_converged("test").is_ok());
    }

    #[test]
    fn test_into_converged_surfaces_flag() {
        let err = report(Convergence::IterationLimit)
            .into_converged("solve")
            .unwrap_err();
        assert_eq!(
            err,
            UlsError::NotConverged {
                method: "solve".to_string(),
                convergence: Convergence::IterationLimit
            }
        );
        assert!(err.to_string().contains("iteration limit"));
    }

    #[test]
    fn test_residual_norm() {
        let a = na::DMatrix::from_row_slice(1, 2, &[1.0, 1.0]);
        let b = na::DVector::from_vec(vec![3.0]);
        assert!((report(Convergence::Converged).residual_norm(&a, &b) - 2.0).abs() < 1e-12);
    }
}
