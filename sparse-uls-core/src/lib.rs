//! sparse-uls-core
//!
//! Solvers for underdetermined linear systems `A x = b` (A is m×n with
//! m < n) that pick a sparse or minimum-norm solution out of the infinitely
//! many. Three independent strategies are provided:
//!
//! - [`solve`]: null-space parameterization `x = x_p + Q2 z` from a QR of
//!   `Aᵀ`, then L-BFGS over `z` on `‖x‖_p^p`. Exact constraint, any `p > 0`.
//! - [`solve_homopoly`]: penalized least squares `‖Ax - b‖² + λ‖x‖_p^p`
//!   minimized with L-BFGS along a shrinking λ schedule. The constraint is
//!   only approximately satisfied.
//! - [`solve_l1`]: `min ‖x‖_1 s.t. A x = b` as a linear program, solved by one
//!   of the engines in `sparse_uls_lp` (`GLPK`, `OCTAVE`, `SCIPY`).
//!
//! All entry points are synchronous functions of their inputs and return a
//! [`Solution`] carrying the optimizer's convergence flag.
//!
//! # Example
//!
//! ```rust
//! # use nalgebra as na;
//! use sparse_uls_core::{solve, solve_homopoly, solve_l1, LpMethod};
//!
//! let a = na::DMatrix::from_row_slice(2, 4, &[1.0, 0.0, 1.0, 2.0, 0.0, 1.0, 1.0, -1.0]);
//! let b = na::DVector::from_vec(vec![1.0, 1.0]);
//!
//! let sparse = solve(&a, &b, 1.0).unwrap();
//! let relaxed = solve_homopoly(&a, &b, 2.0).unwrap();
//! let exact = solve_l1(&a, &b, LpMethod::default()).unwrap();
//!
//! assert!(sparse.residual_norm(&a, &b) < 1e-8);
//! assert!(relaxed.residual_norm(&a, &b) < 1e-4);
//! assert!((sparse.objective - exact.objective).abs() < 1e-6);
//! ```
//!
//! # Features
//!
//! - `rayon` - Generate random test problems in parallel
//! - `accelerate` - Use the `accelerate` backend for the rank-revealing SVD
//! - `netlib` - Use the `netlib` backend for the rank-revealing SVD
//! - `openblas` - Use the `openblas` backend for the rank-revealing SVD

/// Solver settings
pub mod config;

/// Error types
pub mod error;

/// Penalized least-squares homotopy
pub mod homotopy;

/// L1 minimization through linear programming
pub mod l1;

/// Null-space least-p-norm minimization
pub mod least_p;

/// Particular solution and null-space basis
pub mod nullspace;

pub(crate) mod optimize;

/// Solution report
pub mod solution;

/// Stateful wrapper with timing
pub mod solver;

/// Timing utilities
pub mod timing;

/// Validation helpers and random problem generation
pub mod utils;

pub use config::SolverConfig;
pub use error::{UlsError, UlsResult};
pub use homotopy::{solve_homopoly, solve_homopoly_with_config, DEFAULT_HOMOPOLY_P};
pub use l1::{solve_l1, solve_l1_named, solve_l1_with_config, solve_l1_with_solver};
pub use least_p::{solve, solve_with_config, DEFAULT_SOLVE_P};
pub use solution::{Convergence, Solution};
pub use solver::UlsSolver;
pub use sparse_uls_lp::{LinearProgramSolver, LpMethod, LpSettings};
