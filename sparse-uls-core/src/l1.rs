//! Exact L1 minimization through a linear program.
//!
//! With auxiliary variables `t` bounding `|x|` componentwise, `min ‖x‖_1
//! s.t. A x = b` becomes the LP over the extended vector `[x; t]`:
//!
//! ```text
//! minimize    Σ t_j
//! subject to   x - t <= 0          (rows 0..n)
//!             -x - t <= 0          (rows n..2n)
//!             [A | 0] [x; t] = b
//! ```
//!
//! with every extended variable free. The LP is handed to one of the engines
//! in `sparse_uls_lp`.
extern crate nalgebra as na;

use sparse_uls_lp::{LinearProgram, LinearProgramSolver, LpMethod};

use crate::config::SolverConfig;
use crate::error::UlsResult;
use crate::solution::{Convergence, Solution};
use crate::timing::{time_fn, TimingTracker};
use crate::utils::{lp_norm_pow, validate_system};

/// Builds the extended-variable LP for `min ‖x‖_1 s.t. A x = b`.
///
/// # Example
///
/// ```rust
/// # use nalgebra as na;
/// # use sparse_uls_core::l1::build_l1_program;
/// let a = na::DMatrix::from_row_slice(1, 2, &[1.0, 2.0]);
/// let b = na::DVector::from_vec(vec![3.0]);
/// let lp = build_l1_program(&a, &b);
/// assert_eq!(lp.num_variables(), 4);
/// assert_eq!(lp.c.as_slice(), &[0.0, 0.0, 1.0, 1.0]);
/// ```
pub fn build_l1_program(a: &na::DMatrix<f64>, b: &na::DVector<f64>) -> LinearProgram {
    let (m, n) = a.shape();

    let c = na::DVector::from_fn(2 * n, |i, _| if i < n { 0.0 } else { 1.0 });

    let mut a_ub = na::DMatrix::<f64>::zeros(2 * n, 2 * n);
    for j in 0..n {
        a_ub[(j, j)] = 1.0;
        a_ub[(j, n + j)] = -1.0;
        a_ub[(n + j, j)] = -1.0;
        a_ub[(n + j, n + j)] = -1.0;
    }
    let b_ub = na::DVector::<f64>::zeros(2 * n);

    let mut a_eq = na::DMatrix::<f64>::zeros(m, 2 * n);
    a_eq.columns_mut(0, n).copy_from(a);

    LinearProgram::new(c)
        .with_inequalities(a_ub, b_ub)
        .with_equalities(a_eq, b.clone())
}

/// Minimum `‖x‖_1` solution of `A x = b` through the LP engine `method`.
///
/// # Example
///
/// ```rust
/// # use nalgebra as na;
/// # use sparse_uls_core::solve_l1;
/// # use sparse_uls_lp::LpMethod;
/// let a = na::DMatrix::from_row_slice(1, 3, &[1.0, 2.0, 4.0]);
/// let b = na::DVector::from_vec(vec![4.0]);
///
/// let solution = solve_l1(&a, &b, LpMethod::Glpk).unwrap();
/// assert!((solution.x[2] - 1.0).abs() < 1e-9);
/// assert!((solution.objective - 1.0).abs() < 1e-9);
/// ```
pub fn solve_l1(a: &na::DMatrix<f64>, b: &na::DVector<f64>, method: LpMethod) -> UlsResult<Solution> {
    solve_l1_with_config(a, b, method, &SolverConfig::default())
}

/// [`solve_l1`] with the method given by name (`"GLPK"`, `"OCTAVE"` or
/// `"SCIPY"`, any case). An unknown name fails before anything is solved.
pub fn solve_l1_named(a: &na::DMatrix<f64>, b: &na::DVector<f64>, method: &str) -> UlsResult<Solution> {
    let method: LpMethod = method.parse()?;
    solve_l1(a, b, method)
}

/// [`solve_l1`] with explicit settings.
pub fn solve_l1_with_config(
    a: &na::DMatrix<f64>,
    b: &na::DVector<f64>,
    method: LpMethod,
    config: &SolverConfig,
) -> UlsResult<Solution> {
    let mut timing = TimingTracker::new();
    solve_l1_timed(a, b, method, config, &mut timing)
}

/// [`solve_l1`] on a caller-owned engine, e.g. a long-lived
/// [`sparse_uls_lp::OctaveSolver`].
pub fn solve_l1_with_solver(
    a: &na::DMatrix<f64>,
    b: &na::DVector<f64>,
    solver: &mut dyn LinearProgramSolver,
) -> UlsResult<Solution> {
    let mut timing = TimingTracker::new();
    validate_system(a, b)?;
    minimize_l1(a, b, solver, &mut timing)
}

pub(crate) fn solve_l1_timed(
    a: &na::DMatrix<f64>,
    b: &na::DVector<f64>,
    method: LpMethod,
    config: &SolverConfig,
    timing: &mut TimingTracker,
) -> UlsResult<Solution> {
    time_fn(timing, "validate", || {
        validate_system(a, b)?;
        config.validate()
    })?;
    let mut solver = method.create_solver(&config.lp);
    minimize_l1(a, b, solver.as_mut(), timing)
}

fn minimize_l1(
    a: &na::DMatrix<f64>,
    b: &na::DVector<f64>,
    solver: &mut dyn LinearProgramSolver,
    timing: &mut TimingTracker,
) -> UlsResult<Solution> {
    let n = a.ncols();
    let lp = time_fn(timing, "lp_build", || Ok(build_l1_program(a, b)))?;
    log::debug!(
        "[L1] solving {}x{} system with {} ({} LP variables)",
        a.nrows(),
        n,
        solver.name(),
        lp.num_variables()
    );
    let lp_solution = time_fn(timing, "lp_minimize", || Ok(solver.minimize(&lp)?))?;

    let x = lp_solution.x.rows(0, n).into_owned();
    log::debug!(
        "[L1] {} finished after {} iterations, LP objective {:.6e}",
        solver.name(),
        lp_solution.iterations,
        lp_solution.objective
    );
    Ok(Solution {
        objective: lp_norm_pow(&x, 1.0),
        x,
        iterations: lp_solution.iterations,
        convergence: Convergence::Converged,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::UlsError;
    use sparse_uls_lp::{LpError, LpSettings, OctaveSession, OctaveSolver};

    #[test]
    fn test_program_layout() {
        let a = na::DMatrix::from_row_slice(2, 3, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        let b = na::DVector::from_vec(vec![1.0, 2.0]);
        let lp = build_l1_program(&a, &b);

        let a_ub = lp.a_ub.as_ref().unwrap();
        assert_eq!(a_ub.shape(), (6, 6));
        // x_1 - t_1 <= 0 and -x_1 - t_1 <= 0
        assert_eq!(a_ub.row(1).iter().copied().collect::<Vec<_>>(), vec![0.0, 1.0, 0.0, 0.0, -1.0, 0.0]);
        assert_eq!(a_ub.row(4).iter().copied().collect::<Vec<_>>(), vec![0.0, -1.0, 0.0, 0.0, -1.0, 0.0]);
        assert_eq!(lp.b_ub.as_ref().unwrap(), &na::DVector::<f64>::zeros(6));

        let a_eq = lp.a_eq.as_ref().unwrap();
        assert_eq!(a_eq.columns(0, 3), a.columns(0, 3));
        assert_eq!(a_eq.columns(3, 3).norm(), 0.0);
        assert_eq!(lp.b_eq.as_ref().unwrap(), &b);
        assert!(lp.bounds.is_empty());
    }

    #[test]
    fn test_every_method_finds_the_sparse_vertex() {
        // min |x1| + |x2| + |x3| s.t. x1 + 2 x2 + 4 x3 = 4  ->  x = (0, 0, 1)
        let a = na::DMatrix::from_row_slice(1, 3, &[1.0, 2.0, 4.0]);
        let b = na::DVector::from_vec(vec![4.0]);
        for method in LpMethod::ALL {
            let solution = solve_l1(&a, &b, method).unwrap();
            assert_eq!(solution.x.len(), 3);
            assert!((solution.x[2] - 1.0).abs() < 1e-6, "{}", method);
            assert!((solution.objective - 1.0).abs() < 1e-6, "{}", method);
        }
    }

    #[test]
    fn test_unknown_method_fails_before_solving() {
        // A square system would be rejected by the solve; the name check comes first
        let a = na::DMatrix::<f64>::identity(2, 2);
        let b = na::DVector::<f64>::zeros(2);
        let err = solve_l1_named(&a, &b, "INVALID").unwrap_err();
        assert_eq!(err, UlsError::LinearProgram(LpError::UnknownMethod("INVALID".to_string())));
        let message = err.to_string();
        assert!(message.contains("GLPK") && message.contains("OCTAVE") && message.contains("SCIPY"));
    }

    #[test]
    fn test_caller_owned_session() {
        let a = na::DMatrix::from_row_slice(1, 3, &[1.0, 2.0, 4.0]);
        let b = na::DVector::from_vec(vec![4.0]);
        let mut solver = OctaveSolver::new(OctaveSession::open(LpSettings::default()));
        solve_l1_with_solver(&a, &b, &mut solver).unwrap();
        solve_l1_with_solver(&a, &b, &mut solver).unwrap();
        assert_eq!(solver.session().solves(), 2);

        solver.session_mut().close();
        let err = solve_l1_with_solver(&a, &b, &mut solver).unwrap_err();
        assert_eq!(err, UlsError::LinearProgram(LpError::SessionClosed));
    }
}
