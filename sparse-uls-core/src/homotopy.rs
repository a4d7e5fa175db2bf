//! Penalized least-squares homotopy solver.
//!
//! `solve_homopoly` minimizes
//!
//! ```text
//! f_λ(x) = Σ (A x - b)_i² + λ Σ |x_j|^p
//! ∇f_λ(x) = 2 Aᵀ (A x - b) + λ p sign(x) |x|^(p-1),   sign(0) := 0
//! ```
//!
//! over the full x with L-BFGS, starting from `x = 0`. The constraint is only
//! penalized, never enforced. λ starts at 1 and shrinks geometrically, each
//! stage warm started from the previous minimizer, so the final iterate
//! approaches the minimum-p-norm point of the feasible set.
extern crate nalgebra as na;

use crate::config::SolverConfig;
use crate::error::UlsResult;
use crate::optimize::{minimize_lbfgs, LbfgsOptions, Penalty, SmoothObjective};
use crate::solution::{Convergence, Solution};
use crate::timing::{time_fn, TimingTracker};
use crate::utils::{validate_norm, validate_system};

/// Default norm parameter of [`solve_homopoly`].
pub const DEFAULT_HOMOPOLY_P: f64 = 2.0;

/// Smallest supported norm parameter; below it the penalty gradient is
/// unbounded near zero.
pub const MIN_HOMOPOLY_P: f64 = 1.0;

struct PenalizedLeastSquares<'a> {
    a: &'a na::DMatrix<f64>,
    b: &'a na::DVector<f64>,
    lambda: f64,
    penalty: Penalty,
}

impl SmoothObjective for PenalizedLeastSquares<'_> {
    fn value(&self, x: &na::DVector<f64>) -> f64 {
        (self.a * x - self.b).norm_squared() + self.lambda * self.penalty.value(x)
    }

    fn gradient(&self, x: &na::DVector<f64>) -> na::DVector<f64> {
        let residual = self.a * x - self.b;
        self.a.tr_mul(&residual) * 2.0 + self.penalty.gradient(x) * self.lambda
    }
}

/// Penalized relaxation of `min ‖x‖_p^p s.t. A x = b`.
///
/// Same shape checks as [`crate::solve`]; `p < 1` is rejected with
/// [`crate::UlsError::InvalidNorm`]. The returned `objective` is `f_λ` at the
/// last (smallest) λ of the schedule.
///
/// # Example
///
/// ```rust
/// # use nalgebra as na;
/// # use sparse_uls_core::solve_homopoly;
/// let a = na::DMatrix::from_row_slice(1, 3, &[1.0, 1.0, 1.0]);
/// let b = na::DVector::from_vec(vec![1.0]);
///
/// let solution = solve_homopoly(&a, &b, 2.0).unwrap();
/// for v in solution.x.iter() {
///     assert!((v - 1.0 / 3.0).abs() < 1e-6);
/// }
/// ```
pub fn solve_homopoly(a: &na::DMatrix<f64>, b: &na::DVector<f64>, p: f64) -> UlsResult<Solution> {
    solve_homopoly_with_config(a, b, p, &SolverConfig::default())
}

/// [`solve_homopoly`] with explicit settings.
pub fn solve_homopoly_with_config(
    a: &na::DMatrix<f64>,
    b: &na::DVector<f64>,
    p: f64,
    config: &SolverConfig,
) -> UlsResult<Solution> {
    let mut timing = TimingTracker::new();
    solve_homopoly_timed(a, b, p, config, &mut timing)
}

pub(crate) fn solve_homopoly_timed(
    a: &na::DMatrix<f64>,
    b: &na::DVector<f64>,
    p: f64,
    config: &SolverConfig,
    timing: &mut TimingTracker,
) -> UlsResult<Solution> {
    time_fn(timing, "validate", || {
        validate_system(a, b)?;
        validate_norm(p, MIN_HOMOPOLY_P)?;
        config.validate()
    })?;

    let options = LbfgsOptions::from(config);
    let mut x = na::DVector::<f64>::zeros(a.ncols());
    let mut value = b.norm_squared();
    let mut iterations = 0;
    let mut convergence = Convergence::Converged;

    for lambda in config.homotopy_schedule() {
        let objective = PenalizedLeastSquares {
            a,
            b,
            lambda,
            penalty: Penalty::Exact { p },
        };
        let minimum = time_fn(timing, "homotopy_stage", || {
            minimize_lbfgs(&objective, x.clone(), &options)
        })?;
        log::debug!(
            "[Homotopy] lambda = {:.1e}: f = {:.3e} after {} iterations, {}",
            lambda,
            minimum.value,
            minimum.iterations,
            minimum.convergence
        );
        x = minimum.x;
        value = minimum.value;
        iterations += minimum.iterations;
        convergence = minimum.convergence;
    }

    if convergence != Convergence::Converged {
        log::warn!("[Homotopy] p = {}: {}", p, convergence);
    }
    Ok(Solution {
        x,
        objective: value,
        iterations: iterations as usize,
        convergence,
    })
}
