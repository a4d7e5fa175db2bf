//! Linear-program back ends for the sparse underdetermined solver.
//!
//! A [`LinearProgram`] states `minimize c^T x` subject to inequality rows,
//! equality rows and per-variable bounds. It is lowered to the standard form
//! `A y = b, y >= 0` and handed to one of three engines selected through
//! [`LpMethod`]:
//!
//! - `GLPK`: dense two-phase tableau simplex ([`GlpkSolver`])
//! - `OCTAVE`: revised simplex run inside an explicitly managed
//!   [`OctaveSession`] ([`OctaveSolver`])
//! - `SCIPY`: Mehrotra predictor-corrector interior point ([`ScipySolver`])
//!
//! # Example
//!
//! ```rust
//! # use nalgebra as na;
//! use sparse_uls_lp::{Bound, LinearProgram, LpMethod, LpSettings};
//!
//! // min x1 + x2  s.t.  x1 + 2 x2 = 2,  x >= 0
//! let lp = LinearProgram::new(na::DVector::from_vec(vec![1.0, 1.0]))
//!     .with_equalities(
//!         na::DMatrix::from_row_slice(1, 2, &[1.0, 2.0]),
//!         na::DVector::from_vec(vec![2.0]),
//!     )
//!     .with_bounds(vec![Bound::non_negative(); 2]);
//!
//! let mut solver = LpMethod::Glpk.create_solver(&LpSettings::default());
//! let solution = solver.minimize(&lp).unwrap();
//! assert!((solution.objective - 1.0).abs() < 1e-9);
//! ```

pub mod engine;
pub mod error;
mod interior;
pub mod problem;
mod revised;
pub mod settings;
mod simplex;
pub mod standard;

pub use engine::{
    GlpkSolver, LinearProgramSolver, LpMethod, OctaveSession, OctaveSolver, ScipySolver,
};
pub use error::{LpError, LpResult};
pub use problem::{Bound, LinearProgram, LpSolution};
pub use settings::LpSettings;
pub use standard::StandardForm;
