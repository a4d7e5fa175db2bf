//! L-BFGS driver on top of `argmin`, shared by the null-space and homotopy
//! solvers.
extern crate nalgebra as na;

use argmin::core::{CostFunction, Error, Executor, Gradient, State, TerminationReason};
use argmin::solver::linesearch::MoreThuenteLineSearch;
use argmin::solver::quasinewton::LBFGS;

use crate::config::SolverConfig;
use crate::error::UlsResult;
use crate::solution::Convergence;
use crate::utils::signed_power;

/// Iterations per `argmin` run. Longer budgets are split into several runs,
/// each warm started from the best point of the previous one, so a failing
/// line search only loses the progress of its own run.
const RESTART_INTERVAL: u64 = 200;

/// A differentiable objective in nalgebra terms.
pub(crate) trait SmoothObjective {
    fn value(&self, x: &na::DVector<f64>) -> f64;
    fn gradient(&self, x: &na::DVector<f64>) -> na::DVector<f64>;
}

/// Per-coordinate penalty `φ(x_i)` summed over a vector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Penalty {
    /// `|v|^p`, derivative `p sign(v) |v|^(p-1)` with `sign(0) := 0`
    Exact { p: f64 },
    /// `(v² + eps²)^(p/2)`, differentiable everywhere for `eps > 0`
    Smoothed { p: f64, eps: f64 },
}

impl Penalty {
    fn term(&self, v: f64) -> f64 {
        match *self {
            Penalty::Exact { p } => v.abs().powf(p),
            Penalty::Smoothed { p, eps } => (v * v + eps * eps).powf(p / 2.0),
        }
    }

    fn derivative(&self, v: f64) -> f64 {
        match *self {
            Penalty::Exact { p } => p * signed_power(v, p - 1.0),
            Penalty::Smoothed { p, eps } => p * v * (v * v + eps * eps).powf(p / 2.0 - 1.0),
        }
    }

    pub fn value(&self, x: &na::DVector<f64>) -> f64 {
        x.iter().map(|v| self.term(*v)).sum()
    }

    pub fn gradient(&self, x: &na::DVector<f64>) -> na::DVector<f64> {
        x.map(|v| self.derivative(v))
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct LbfgsOptions {
    pub memory: usize,
    pub max_iterations: u64,
    pub gradient_tolerance: f64,
    pub stall_tolerance: f64,
}

impl From<&SolverConfig> for LbfgsOptions {
    fn from(config: &SolverConfig) -> Self {
        LbfgsOptions {
            memory: config.lbfgs_memory,
            max_iterations: config.max_iterations,
            gradient_tolerance: config.gradient_tolerance,
            stall_tolerance: config.stall_tolerance,
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Minimum {
    pub x: na::DVector<f64>,
    pub value: f64,
    pub iterations: u64,
    pub convergence: Convergence,
}

struct ArgminProblem<'a, O> {
    objective: &'a O,
}

impl<O: SmoothObjective> CostFunction for ArgminProblem<'_, O> {
    type Param = Vec<f64>;
    type Output = f64;

    fn cost(&self, param: &Self::Param) -> Result<Self::Output, Error> {
        Ok(self.objective.value(&na::DVector::from_column_slice(param)))
    }
}

impl<O: SmoothObjective> Gradient for ArgminProblem<'_, O> {
    type Param = Vec<f64>;
    type Gradient = Vec<f64>;

    fn gradient(&self, param: &Self::Param) -> Result<Self::Gradient, Error> {
        let g = self.objective.gradient(&na::DVector::from_column_slice(param));
        Ok(g.iter().copied().collect())
    }
}

/// `‖∇f(x)‖_∞ <= tol * max(1, |f(x)|)`
fn is_stationary<O: SmoothObjective>(objective: &O, x: &na::DVector<f64>, tol: f64) -> bool {
    let g = objective.gradient(x);
    let g_max = g.iter().fold(0.0_f64, |m, v| m.max(v.abs()));
    g_max <= tol * objective.value(x).abs().max(1.0)
}

/// Minimizes `objective` from `x0` with L-BFGS and a More-Thuente line search.
///
/// Never fails on optimizer trouble: the best point found is returned with
/// a [`Convergence`] describing how the search ended. Errors are only
/// returned for invalid solver settings.
pub(crate) fn minimize_lbfgs<O: SmoothObjective>(
    objective: &O,
    x0: na::DVector<f64>,
    options: &LbfgsOptions,
) -> UlsResult<Minimum> {
    let mut x = x0;
    let mut iterations = 0u64;

    let convergence = loop {
        if is_stationary(objective, &x, options.gradient_tolerance) {
            break Convergence::Converged;
        }
        if iterations >= options.max_iterations {
            break Convergence::IterationLimit;
        }

        let budget = (options.max_iterations - iterations).min(RESTART_INTERVAL);
        let linesearch: MoreThuenteLineSearch<Vec<f64>, Vec<f64>, f64> =
            MoreThuenteLineSearch::new();
        let solver = LBFGS::new(linesearch, options.memory)
            .with_tolerance_grad(options.gradient_tolerance)?;
        let start: Vec<f64> = x.iter().copied().collect();

        let run = Executor::new(ArgminProblem { objective }, solver)
            .configure(|state| state.param(start).max_iters(budget))
            .run();

        match run {
            Ok(result) => {
                let state = result.state();
                iterations += state.get_iter();
                if let Some(best) = state.get_best_param() {
                    let candidate = na::DVector::from_column_slice(best);
                    if objective.value(&candidate) <= objective.value(&x) {
                        x = candidate;
                    }
                }
                match state.get_termination_reason() {
                    Some(TerminationReason::SolverConverged) => break Convergence::Converged,
                    Some(TerminationReason::MaxItersReached) => continue,
                    Some(other) => {
                        break Convergence::Stalled {
                            reason: format!("{:?}", other),
                        };
                    }
                    None => {
                        break Convergence::Stalled {
                            reason: "optimizer stopped without a termination reason".to_string(),
                        };
                    }
                }
            }
            Err(e) => {
                // The line search gives up when no descent is possible, which
                // also happens at points that are stationary to working precision
                log::trace!("[LBFGS] run failed after {} iterations: {}", iterations, e);
                if is_stationary(objective, &x, options.stall_tolerance) {
                    break Convergence::Converged;
                }
                break Convergence::Stalled {
                    reason: e.to_string(),
                };
            }
        }
    };

    let value = objective.value(&x);
    Ok(Minimum {
        x,
        value,
        iterations,
        convergence,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    /// ‖x - c‖²
    struct Quadratic {
        center: na::DVector<f64>,
    }

    impl SmoothObjective for Quadratic {
        fn value(&self, x: &na::DVector<f64>) -> f64 {
            (x - &self.center).norm_squared()
        }

        fn gradient(&self, x: &na::DVector<f64>) -> na::DVector<f64> {
            (x - &self.center) * 2.0
        }
    }

    fn options() -> LbfgsOptions {
        LbfgsOptions::from(&SolverConfig::default())
    }

    #[test]
    fn test_minimizes_quadratic() {
        let objective = Quadratic {
            center: na::DVector::from_vec(vec![1.0, -2.0, 3.0]),
        };
        let minimum = minimize_lbfgs(&objective, na::DVector::zeros(3), &options()).unwrap();
        assert_eq!(minimum.convergence, Convergence::Converged);
        assert!((&minimum.x - &objective.center).norm() < 1e-6);
    }

    #[test]
    fn test_stationary_start_skips_optimizer() {
        let objective = Quadratic {
            center: na::DVector::from_vec(vec![0.5, 0.5]),
        };
        let minimum = minimize_lbfgs(&objective, objective.center.clone(), &options()).unwrap();
        assert_eq!(minimum.iterations, 0);
        assert_eq!(minimum.convergence, Convergence::Converged);
    }

    #[test]
    fn test_zero_budget_reports_iteration_limit() {
        let objective = Quadratic {
            center: na::DVector::from_vec(vec![1.0]),
        };
        let options = LbfgsOptions {
            max_iterations: 0,
            ..options()
        };
        let minimum = minimize_lbfgs(&objective, na::DVector::zeros(1), &options).unwrap();
        assert_eq!(minimum.convergence, Convergence::IterationLimit);
        assert_eq!(minimum.x[0], 0.0);
    }

    #[test]
    fn test_exact_penalty_subgradient_at_zero() {
        let penalty = Penalty::Exact { p: 1.0 };
        let x = na::DVector::from_vec(vec![-2.0, 0.0, 3.0]);
        assert_eq!(penalty.value(&x), 5.0);
        assert_eq!(penalty.gradient(&x), na::DVector::from_vec(vec![-1.0, 0.0, 1.0]));
    }

    #[test]
    fn test_smoothed_penalty_gradient_matches_difference_quotient() {
        let penalty = Penalty::Smoothed { p: 1.0, eps: 0.1 };
        let x = na::DVector::from_vec(vec![0.3, -0.05]);
        let g = penalty.gradient(&x);
        let h = 1e-7;
        for i in 0..2 {
            let mut shifted = x.clone();
            shifted[i] += h;
            let fd = (penalty.value(&shifted) - penalty.value(&x)) / h;
            assert!((fd - g[i]).abs() < 1e-5);
        }
    }
}
