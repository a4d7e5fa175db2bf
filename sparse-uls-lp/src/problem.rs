//! Linear program model shared by every engine.
//!
//! ```text
//! minimize    c^T x
//! subject to  A_ub x <= b_ub
//!             A_eq x  = b_eq
//!             lower <= x <= upper
//! ```
extern crate nalgebra as na;

use crate::error::{LpError, LpResult};

/// Box bound on a single variable. `None` means unbounded on that side.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Bound {
    /// Lower bound (None = -inf)
    pub lower: Option<f64>,
    /// Upper bound (None = +inf)
    pub upper: Option<f64>,
}

impl Bound {
    pub fn new(lower: Option<f64>, upper: Option<f64>) -> Self {
        Bound { lower, upper }
    }

    /// A free variable, unbounded in both directions.
    pub fn free() -> Self {
        Bound::default()
    }

    /// The usual `x >= 0` bound.
    pub fn non_negative() -> Self {
        Bound {
            lower: Some(0.0),
            upper: None,
        }
    }
}

/// A linear program in inequality/equality form with variable bounds.
///
/// Constraint blocks are optional; a program with neither block is only
/// bounded by its variable bounds. Variables without an explicit bound are
/// free.
///
/// # Example
///
/// ```rust
/// # use nalgebra as na;
/// # use sparse_uls_lp::problem::{Bound, LinearProgram};
/// // min -x1 - 2 x2  s.t.  x1 + x2 <= 4,  x >= 0
/// let lp = LinearProgram::new(na::DVector::from_vec(vec![-1.0, -2.0]))
///     .with_inequalities(
///         na::DMatrix::from_row_slice(1, 2, &[1.0, 1.0]),
///         na::DVector::from_vec(vec![4.0]),
///     )
///     .with_bounds(vec![Bound::non_negative(); 2]);
/// assert!(lp.validate().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct LinearProgram {
    pub c: na::DVector<f64>,
    pub a_ub: Option<na::DMatrix<f64>>,
    pub b_ub: Option<na::DVector<f64>>,
    pub a_eq: Option<na::DMatrix<f64>>,
    pub b_eq: Option<na::DVector<f64>>,
    /// Per-variable bounds; empty means every variable is free.
    pub bounds: Vec<Bound>,
}

impl LinearProgram {
    pub fn new(c: na::DVector<f64>) -> Self {
        LinearProgram {
            c,
            a_ub: None,
            b_ub: None,
            a_eq: None,
            b_eq: None,
            bounds: Vec::new(),
        }
    }

    pub fn with_inequalities(mut self, a_ub: na::DMatrix<f64>, b_ub: na::DVector<f64>) -> Self {
        self.a_ub = Some(a_ub);
        self.b_ub = Some(b_ub);
        self
    }

    pub fn with_equalities(mut self, a_eq: na::DMatrix<f64>, b_eq: na::DVector<f64>) -> Self {
        self.a_eq = Some(a_eq);
        self.b_eq = Some(b_eq);
        self
    }

    pub fn with_bounds(mut self, bounds: Vec<Bound>) -> Self {
        self.bounds = bounds;
        self
    }

    /// Number of decision variables.
    pub fn num_variables(&self) -> usize {
        self.c.len()
    }

    /// Bound of variable `j`, free when no bounds were given.
    pub fn bound(&self, j: usize) -> Bound {
        self.bounds.get(j).copied().unwrap_or_default()
    }

    /// Checks dimensions, finiteness and bound ordering.
    pub fn validate(&self) -> LpResult<()> {
        let n = self.num_variables();
        if n == 0 {
            return Err(LpError::InvalidProblem(
                "objective has no variables".to_string(),
            ));
        }
        if self.c.iter().any(|v| !v.is_finite()) {
            return Err(LpError::InvalidProblem(
                "objective contains non-finite values".to_string(),
            ));
        }
        check_block("inequality", n, self.a_ub.as_ref(), self.b_ub.as_ref())?;
        check_block("equality", n, self.a_eq.as_ref(), self.b_eq.as_ref())?;

        if !self.bounds.is_empty() && self.bounds.len() != n {
            return Err(LpError::InvalidProblem(format!(
                "expected {} bounds, got {}",
                n,
                self.bounds.len()
            )));
        }
        for (j, bound) in self.bounds.iter().enumerate() {
            let lower = bound.lower.unwrap_or(f64::NEG_INFINITY);
            let upper = bound.upper.unwrap_or(f64::INFINITY);
            if lower.is_nan() || upper.is_nan() || lower == f64::INFINITY || upper == f64::NEG_INFINITY {
                return Err(LpError::InvalidProblem(format!(
                    "bound of variable {} is not a valid interval",
                    j
                )));
            }
            if lower > upper {
                return Err(LpError::InvalidProblem(format!(
                    "bound of variable {} has lower {} > upper {}",
                    j, lower, upper
                )));
            }
        }
        Ok(())
    }
}

fn check_block(
    name: &str,
    n: usize,
    a: Option<&na::DMatrix<f64>>,
    b: Option<&na::DVector<f64>>,
) -> LpResult<()> {
    match (a, b) {
        (None, None) => Ok(()),
        (Some(a), Some(b)) => {
            if a.ncols() != n {
                return Err(LpError::InvalidProblem(format!(
                    "{} matrix has {} columns, expected {}",
                    name,
                    a.ncols(),
                    n
                )));
            }
            if a.nrows() != b.len() {
                return Err(LpError::InvalidProblem(format!(
                    "{} matrix has {} rows but right-hand side has {} entries",
                    name,
                    a.nrows(),
                    b.len()
                )));
            }
            if a.iter().chain(b.iter()).any(|v| !v.is_finite()) {
                return Err(LpError::InvalidProblem(format!(
                    "{} block contains non-finite values",
                    name
                )));
            }
            Ok(())
        }
        _ => Err(LpError::InvalidProblem(format!(
            "{} block needs both a matrix and a right-hand side",
            name
        ))),
    }
}

/// Optimal point returned by an engine.
#[derive(Debug, Clone)]
pub struct LpSolution {
    /// Optimal values of the original variables
    pub x: na::DVector<f64>,
    /// Objective value c^T x
    pub objective: f64,
    /// Simplex pivots or interior-point iterations used
    pub iterations: usize,
}
