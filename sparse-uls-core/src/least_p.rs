//! Null-space least-p-norm solver.
//!
//! `solve` parameterizes every solution of `A x = b` as `x_p + Q2 z` and
//! minimizes `‖x_p + Q2 z‖_p^p` over `z` with L-BFGS, so the constraint holds
//! to factorization accuracy whatever the optimizer does.
//!
//! For `p > 1` the objective is differentiable and minimized directly. For
//! `p <= 1` it is not differentiable where a component vanishes; it is
//! minimized through the smoothed penalty `Σ (x_i² + eps²)^(p/2)` with `eps`
//! shrinking between warm-started stages, followed by support reduction.
extern crate nalgebra as na;

use crate::config::SolverConfig;
use crate::error::{UlsError, UlsResult};
use crate::nullspace::{decompose, orthogonal_complement, NullSpaceDecomposition};
use crate::optimize::{minimize_lbfgs, LbfgsOptions, Penalty, SmoothObjective};
use crate::solution::{Convergence, Solution};
use crate::timing::{time_fn, TimingTracker};
use crate::utils::{lp_norm_pow, validate_norm, validate_system};

/// Default norm parameter of [`solve`].
pub const DEFAULT_SOLVE_P: f64 = 1.0;

/// `z ↦ Σ φ((x_p + Q2 z)_i)`
struct NullSpaceObjective<'a> {
    decomposition: &'a NullSpaceDecomposition,
    penalty: Penalty,
}

impl SmoothObjective for NullSpaceObjective<'_> {
    fn value(&self, z: &na::DVector<f64>) -> f64 {
        self.penalty.value(&self.decomposition.point(z))
    }

    fn gradient(&self, z: &na::DVector<f64>) -> na::DVector<f64> {
        let x = self.decomposition.point(z);
        self.decomposition.q2.tr_mul(&self.penalty.gradient(&x))
    }
}

/// Minimizes `‖x_p + Q2 z‖_p^p` over the null-space coordinates `z`.
///
/// Starts from `z = 0`, i.e. from the minimum-norm solution. The returned
/// objective is the exact `Σ |x_i|^p` even when a smoothed penalty was
/// minimized.
pub fn least_p(
    decomposition: &NullSpaceDecomposition,
    p: f64,
    config: &SolverConfig,
) -> UlsResult<Solution> {
    validate_norm(p, 0.0)?;
    let options = LbfgsOptions::from(config);
    let z0 = na::DVector::<f64>::zeros(decomposition.nullity());

    let (z, iterations, convergence) = if p > 1.0 {
        let objective = NullSpaceObjective {
            decomposition,
            penalty: Penalty::Exact { p },
        };
        let minimum = minimize_lbfgs(&objective, z0, &options)?;
        log::debug!(
            "[LeastP] p = {}: {} iterations, {}",
            p,
            minimum.iterations,
            minimum.convergence
        );
        (minimum.x, minimum.iterations, minimum.convergence)
    } else {
        let scale = decomposition.x_particular.amax().max(1.0);
        let mut z = z0;
        let mut iterations = 0;
        let mut convergence = Convergence::Converged;
        for eps in config.smoothing_schedule(scale) {
            let objective = NullSpaceObjective {
                decomposition,
                penalty: Penalty::Smoothed { p, eps },
            };
            let minimum = minimize_lbfgs(&objective, z, &options)?;
            log::debug!(
                "[LeastP] p = {}, eps = {:.1e}: {} iterations, {}",
                p,
                eps,
                minimum.iterations,
                minimum.convergence
            );
            z = minimum.x;
            iterations += minimum.iterations;
            convergence = minimum.convergence;
        }
        (z, iterations, convergence)
    };

    let x = decomposition.point(&z);
    Ok(Solution {
        objective: lp_norm_pow(&x, p),
        x,
        iterations: iterations as usize,
        convergence,
    })
}

/// Result of [`reduce_support`].
#[derive(Debug, Clone)]
pub struct ReducedSupport {
    pub x: na::DVector<f64>,
    /// Number of components driven to zero by moving along the null space
    pub steps: usize,
}

/// Moves a feasible `x` to a solution with at most `rank(A)` non-zeros
/// without increasing `‖x‖_p^p` (`p <= 1`).
///
/// While the support `S` is larger than the number of rows, a direction `d`
/// with `A_S d = 0` exists. `‖x + t d‖_p^p` is concave in `t` as long as no
/// component changes sign, so one of the two nearest zero crossings is at
/// least as good as `x`. The better one is taken and the crossing component
/// set to exactly zero. Components below `tolerance * max(‖x‖_∞, 1)` count as
/// zero. `A x = b` is restored on the final support by a minimum-norm
/// correction.
pub fn reduce_support(
    a: &na::DMatrix<f64>,
    b: &na::DVector<f64>,
    x: &na::DVector<f64>,
    p: f64,
    tolerance: f64,
) -> UlsResult<ReducedSupport> {
    let (m, n) = a.shape();
    let threshold = tolerance * x.amax().max(1.0);
    let mut x = x.clone();
    let initial_support = x.iter().filter(|v| v.abs() > threshold).count();
    let mut steps = 0;

    loop {
        x.apply(|v| {
            if v.abs() <= threshold {
                *v = 0.0;
            }
        });
        let support: Vec<usize> = (0..n).filter(|&i| x[i] != 0.0).collect();
        if support.len() <= m {
            break;
        }

        let a_s = a.select_columns(support.iter());
        let directions = orthogonal_complement(&a_s.transpose());
        if directions.ncols() == 0 {
            break;
        }
        let d = directions.column(0);

        // Nearest zero crossing on either side
        let mut forward: Option<(f64, usize)> = None;
        let mut backward: Option<(f64, usize)> = None;
        for (k, &i) in support.iter().enumerate() {
            if d[k].abs() <= 1e-12 {
                continue;
            }
            let t = -x[i] / d[k];
            if t > 0.0 && forward.map_or(true, |(best, _)| t < best) {
                forward = Some((t, k));
            } else if t < 0.0 && backward.map_or(true, |(best, _)| t > best) {
                backward = Some((t, k));
            }
        }

        let moved = |t: f64| {
            let mut y = x.clone();
            for (k, &i) in support.iter().enumerate() {
                y[i] += t * d[k];
            }
            y
        };
        let (t, hit) = match (forward, backward) {
            (Some(f), Some(bw)) => {
                if lp_norm_pow(&moved(bw.0), p) < lp_norm_pow(&moved(f.0), p) {
                    bw
                } else {
                    f
                }
            }
            (Some(f), None) => f,
            (None, Some(bw)) => bw,
            (None, None) => break,
        };

        x = moved(t);
        x[support[hit]] = 0.0;
        steps += 1;
    }

    // Restore A x = b on the final support
    let support: Vec<usize> = (0..n).filter(|&i| x[i] != 0.0).collect();
    let residual = b - a * &x;
    if !support.is_empty() && residual.norm() > 0.0 {
        let a_s = a.select_columns(support.iter());
        let correction = a_s
            .svd(true, true)
            .solve(&residual, 1e-12)
            .map_err(|e| UlsError::Optimizer(format!("Support correction failed: {}", e)))?;
        for (k, &i) in support.iter().enumerate() {
            x[i] += correction[k];
        }
    }

    log::debug!(
        "[LeastP] support reduced from {} to {} in {} steps",
        initial_support,
        support.len(),
        steps
    );
    Ok(ReducedSupport { x, steps })
}

/// Minimum `‖x‖_p^p` solution of the underdetermined system `A x = b`.
///
/// Rejects `m >= n` with [`UlsError::Underdetermined`], `p <= 0` with
/// [`UlsError::InvalidNorm`] and linearly dependent rows with
/// [`UlsError::RankDeficient`], all before any optimization. For `p <= 1` the
/// result is additionally reduced to at most `m` non-zeros.
///
/// # Arguments
///
/// * `a` - The m×n system matrix, m < n
/// * `b` - The right-hand side of length m
/// * `p` - Norm parameter, see [`DEFAULT_SOLVE_P`]
///
/// # Returns
///
/// A [`Solution`] with `x` satisfying `A x = b` to factorization accuracy and
/// the optimizer's convergence flag.
///
/// # Example
///
/// ```rust
/// # use nalgebra as na;
/// # use sparse_uls_core::solve;
/// let a = na::DMatrix::from_row_slice(1, 3, &[1.0, 1.0, 1.0]);
/// let b = na::DVector::from_vec(vec![1.0]);
///
/// let solution = solve(&a, &b, 1.0).unwrap();
/// assert!((solution.x.sum() - 1.0).abs() < 1e-9);
/// assert!(solution.x.iter().any(|v| v.abs() < 1e-9));
/// ```
pub fn solve(a: &na::DMatrix<f64>, b: &na::DVector<f64>, p: f64) -> UlsResult<Solution> {
    solve_with_config(a, b, p, &SolverConfig::default())
}

/// [`solve`] with explicit settings.
pub fn solve_with_config(
    a: &na::DMatrix<f64>,
    b: &na::DVector<f64>,
    p: f64,
    config: &SolverConfig,
) -> UlsResult<Solution> {
    let mut timing = TimingTracker::new();
    solve_timed(a, b, p, config, &mut timing)
}

pub(crate) fn solve_timed(
    a: &na::DMatrix<f64>,
    b: &na::DVector<f64>,
    p: f64,
    config: &SolverConfig,
    timing: &mut TimingTracker,
) -> UlsResult<Solution> {
    time_fn(timing, "validate", || {
        validate_system(a, b)?;
        validate_norm(p, 0.0)?;
        config.validate()
    })?;
    let decomposition = time_fn(timing, "factorize", || {
        decompose(a, b, config.rank_tolerance)
    })?;
    let mut solution = time_fn(timing, "least_p", || least_p(&decomposition, p, config))?;

    if p <= 1.0 && config.sparsify {
        let reduced = time_fn(timing, "support_reduction", || {
            reduce_support(a, b, &solution.x, p, config.support_tolerance)
        })?;
        solution.objective = lp_norm_pow(&reduced.x, p);
        solution.x = reduced.x;
    }

    if !solution.is_converged() {
        log::warn!("[LeastP] p = {}: {}", p, solution.convergence);
    }
    Ok(solution)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::{random_problem, support_size};

    fn ones_row() -> (na::DMatrix<f64>, na::DVector<f64>) {
        (
            na::DMatrix::from_row_slice(1, 3, &[1.0, 1.0, 1.0]),
            na::DVector::from_vec(vec![1.0]),
        )
    }

    #[test]
    fn test_p2_is_minimum_norm_solution() {
        let (a, b) = ones_row();
        let solution = solve(&a, &b, 2.0).unwrap();
        assert!(solution.is_converged());
        for v in solution.x.iter() {
            assert!((v - 1.0 / 3.0).abs() < 1e-8);
        }
    }

    #[test]
    fn test_p1_on_ones_row_is_a_vertex() {
        let (a, b) = ones_row();
        let solution = solve(&a, &b, 1.0).unwrap();
        assert!((solution.x.sum() - 1.0).abs() < 1e-9);
        assert_eq!(support_size(&solution.x, 1e-9), 1);
        assert!((solution.objective - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_reduce_support_keeps_feasibility_and_objective() {
        let (a, b) = ones_row();
        let x = na::DVector::from_vec(vec![0.2, 0.3, 0.5]);
        let reduced = reduce_support(&a, &b, &x, 1.0, 1e-9).unwrap();
        assert_eq!(reduced.steps, 2);
        assert_eq!(support_size(&reduced.x, 0.0), 1);
        assert!((reduced.x.sum() - 1.0).abs() < 1e-12);
        assert!(lp_norm_pow(&reduced.x, 1.0) <= 1.0 + 1e-12);
    }

    #[test]
    fn test_feasibility_for_several_norms() {
        let problem = random_problem(4, 10, 2, 3).unwrap();
        for p in [0.5, 1.0, 1.5, 2.0, 3.0] {
            let solution = solve(&problem.a, &problem.b, p).unwrap();
            assert_eq!(solution.x.len(), 10);
            assert!(solution.residual_norm(&problem.a, &problem.b) < 1e-8, "p = {}", p);
        }
    }

    #[test]
    fn test_sparsify_off_keeps_smoothed_minimizer() {
        let (a, b) = ones_row();
        let config = SolverConfig {
            sparsify: false,
            ..Default::default()
        };
        let solution = solve_with_config(&a, &b, 1.0, &config).unwrap();
        assert!((solution.x.sum() - 1.0).abs() < 1e-9);
        assert!(solution.x.iter().all(|v| *v > 0.0));
    }

    #[test]
    fn test_rejects_non_positive_norm() {
        let (a, b) = ones_row();
        assert_eq!(solve(&a, &b, 0.0).unwrap_err(), UlsError::InvalidNorm(0.0));
        assert!(matches!(solve(&a, &b, f64::NAN), Err(UlsError::InvalidNorm(_))));
    }

    #[test]
    fn test_records_timing_steps() {
        let (a, b) = ones_row();
        let mut timing = TimingTracker::new();
        solve_timed(&a, &b, 1.0, &SolverConfig::default(), &mut timing).unwrap();
        let steps: Vec<&str> = timing.records().iter().map(|r| r.step_name.as_str()).collect();
        assert_eq!(steps, vec!["validate", "factorize", "least_p", "support_reduction"]);
    }
}
