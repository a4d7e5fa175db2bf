//! The pluggable LP back ends.
//!
//! Every engine implements [`LinearProgramSolver`]; [`LpMethod`] is the closed
//! set of engines a caller can select by name.
extern crate nalgebra as na;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{LpError, LpResult};
use crate::interior::interior_point;
use crate::problem::{LinearProgram, LpSolution};
use crate::revised::revised_simplex;
use crate::settings::LpSettings;
use crate::simplex::tableau_simplex;
use crate::standard::StandardForm;

/// Common contract of the LP engines:
/// `minimize c^T x s.t. A_ub x <= b_ub, A_eq x = b_eq, bounds`.
pub trait LinearProgramSolver {
    /// Short engine name used in logs.
    fn name(&self) -> &'static str;

    /// Solves `lp` to optimality or reports why it could not.
    fn minimize(&mut self, lp: &LinearProgram) -> LpResult<LpSolution>;
}

/// Selectable LP back end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LpMethod {
    /// Dense tableau simplex
    #[default]
    Glpk,
    /// Revised simplex behind an explicit session handle
    Octave,
    /// Primal-dual interior point
    Scipy,
}

impl LpMethod {
    pub const ALL: [LpMethod; 3] = [LpMethod::Glpk, LpMethod::Octave, LpMethod::Scipy];

    pub fn as_str(&self) -> &'static str {
        match self {
            LpMethod::Glpk => "GLPK",
            LpMethod::Octave => "OCTAVE",
            LpMethod::Scipy => "SCIPY",
        }
    }

    /// Builds a ready-to-use engine. The Octave engine gets a freshly opened
    /// session that is closed when the engine is dropped.
    pub fn create_solver(&self, settings: &LpSettings) -> Box<dyn LinearProgramSolver> {
        match self {
            LpMethod::Glpk => Box::new(GlpkSolver::new(settings.clone())),
            LpMethod::Octave => Box::new(OctaveSolver::new(OctaveSession::open(settings.clone()))),
            LpMethod::Scipy => Box::new(ScipySolver::new(settings.clone())),
        }
    }
}

impl fmt::Display for LpMethod {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for LpMethod {
    type Err = LpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "GLPK" => Ok(LpMethod::Glpk),
            "OCTAVE" => Ok(LpMethod::Octave),
            "SCIPY" => Ok(LpMethod::Scipy),
            _ => Err(LpError::UnknownMethod(s.to_string())),
        }
    }
}

/// Lowers `lp`, runs `engine` on the standard form and maps the result back.
fn solve_lowered<F>(name: &str, lp: &LinearProgram, engine: F) -> LpResult<LpSolution>
where
    F: FnOnce(&StandardForm) -> LpResult<(na::DVector<f64>, usize)>,
{
    let sf = StandardForm::from_program(lp)?;
    log::debug!(
        "[{}] standard form with {} rows and {} columns",
        name,
        sf.num_rows(),
        sf.num_cols()
    );
    let (y, iterations) = engine(&sf).inspect_err(|e| log::debug!("[{}] solve failed: {}", name, e))?;
    let x = sf.recover(&y);
    let objective = sf.c.dot(&y) + sf.objective_offset;
    Ok(LpSolution {
        x,
        objective,
        iterations,
    })
}

/// Dense two-phase tableau simplex.
#[derive(Debug, Clone, Default)]
pub struct GlpkSolver {
    settings: LpSettings,
}

impl GlpkSolver {
    pub fn new(settings: LpSettings) -> Self {
        GlpkSolver { settings }
    }
}

impl LinearProgramSolver for GlpkSolver {
    fn name(&self) -> &'static str {
        "Glpk"
    }

    fn minimize(&mut self, lp: &LinearProgram) -> LpResult<LpSolution> {
        solve_lowered(self.name(), lp, |sf| {
            tableau_simplex(sf, &self.settings).map(|o| (o.y, o.iterations))
        })
    }
}

/// Explicitly owned handle on the revised-simplex engine.
///
/// A session is opened with [`OctaveSession::open`] and stays usable until
/// [`OctaveSession::close`] is called or the session is dropped. Solving on a
/// closed session fails with [`LpError::SessionClosed`].
///
/// # Example
///
/// ```rust
/// # use nalgebra as na;
/// # use sparse_uls_lp::{LinearProgram, LpError, LpSettings, OctaveSession};
/// let mut session = OctaveSession::open(LpSettings::default());
/// let lp = LinearProgram::new(na::DVector::from_vec(vec![1.0]))
///     .with_equalities(
///         na::DMatrix::from_row_slice(1, 1, &[1.0]),
///         na::DVector::from_vec(vec![2.0]),
///     );
/// assert!((session.minimize(&lp).unwrap().x[0] - 2.0).abs() < 1e-9);
/// session.close();
/// assert_eq!(session.minimize(&lp).unwrap_err(), LpError::SessionClosed);
/// ```
#[derive(Debug)]
pub struct OctaveSession {
    settings: LpSettings,
    open: bool,
    solves: usize,
}

impl OctaveSession {
    pub fn open(settings: LpSettings) -> Self {
        log::debug!("[Octave] session opened");
        OctaveSession {
            settings,
            open: true,
            solves: 0,
        }
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Number of programs this session has solved.
    pub fn solves(&self) -> usize {
        self.solves
    }

    pub fn settings(&self) -> &LpSettings {
        &self.settings
    }

    pub fn close(&mut self) {
        if self.open {
            log::debug!("[Octave] session closed after {} solves", self.solves);
            self.open = false;
        }
    }

    pub fn minimize(&mut self, lp: &LinearProgram) -> LpResult<LpSolution> {
        if !self.open {
            return Err(LpError::SessionClosed);
        }
        let settings = &self.settings;
        let solution = solve_lowered("Octave", lp, |sf| {
            revised_simplex(sf, settings).map(|o| (o.y, o.iterations))
        })?;
        self.solves += 1;
        Ok(solution)
    }
}

impl Drop for OctaveSession {
    fn drop(&mut self) {
        self.close();
    }
}

/// Adapter running LPs through an owned [`OctaveSession`].
#[derive(Debug)]
pub struct OctaveSolver {
    session: OctaveSession,
}

impl OctaveSolver {
    pub fn new(session: OctaveSession) -> Self {
        OctaveSolver { session }
    }

    pub fn session(&self) -> &OctaveSession {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut OctaveSession {
        &mut self.session
    }

    /// Hands the session back to the caller, still open.
    pub fn into_session(self) -> OctaveSession {
        self.session
    }
}

impl LinearProgramSolver for OctaveSolver {
    fn name(&self) -> &'static str {
        "Octave"
    }

    fn minimize(&mut self, lp: &LinearProgram) -> LpResult<LpSolution> {
        self.session.minimize(lp)
    }
}

/// Primal-dual interior-point engine.
#[derive(Debug, Clone, Default)]
pub struct ScipySolver {
    settings: LpSettings,
}

impl ScipySolver {
    pub fn new(settings: LpSettings) -> Self {
        ScipySolver { settings }
    }
}

impl LinearProgramSolver for ScipySolver {
    fn name(&self) -> &'static str {
        "Scipy"
    }

    fn minimize(&mut self, lp: &LinearProgram) -> LpResult<LpSolution> {
        solve_lowered(self.name(), lp, |sf| {
            interior_point(sf, &self.settings).map(|o| (o.y, o.iterations))
        })
    }
}
