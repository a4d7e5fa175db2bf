//! Two-phase dense tableau primal simplex.
//!
//! Phase 1 starts from an all-artificial basis and minimizes the sum of the
//! artificials. Artificials left in the basis at zero level are pivoted out
//! afterwards; when that is impossible their row is a combination of the
//! others and is dropped. Phase 2 then minimizes the true objective over the
//! structural columns only.
//!
//! Pricing is Dantzig's most negative reduced cost until a run of degenerate
//! pivots is seen, after which Bland's rule takes over for the rest of the
//! phase so the method cannot cycle.
extern crate nalgebra as na;

use crate::error::{LpError, LpResult};
use crate::settings::LpSettings;
use crate::standard::StandardForm;

pub(crate) struct SimplexOutcome {
    pub y: na::DVector<f64>,
    pub iterations: usize,
}

struct Tableau {
    /// (rows + 1) x (structural + artificial + 1); last row is the
    /// reduced-cost row, last column the right-hand side
    t: na::DMatrix<f64>,
    basis: Vec<usize>,
    n_real: usize,
}

impl Tableau {
    fn new(sf: &StandardForm) -> Self {
        let rows = sf.num_rows();
        let n_real = sf.num_cols();
        let last = n_real + rows;
        let mut t = na::DMatrix::<f64>::zeros(rows + 1, last + 1);

        for i in 0..rows {
            for j in 0..n_real {
                t[(i, j)] = sf.a[(i, j)];
            }
            t[(i, n_real + i)] = 1.0;
            t[(i, last)] = sf.b[i];
        }
        // Phase 1 reduced costs: d_j = -sum_i a_ij, objective value sum_i b_i
        for j in 0..n_real {
            t[(rows, j)] = -(0..rows).map(|i| sf.a[(i, j)]).sum::<f64>();
        }
        t[(rows, last)] = -sf.b.sum();

        Tableau {
            t,
            basis: (n_real..n_real + rows).collect(),
            n_real,
        }
    }

    fn obj_row(&self) -> usize {
        self.t.nrows() - 1
    }

    fn rhs_col(&self) -> usize {
        self.t.ncols() - 1
    }

    fn pivot(&mut self, row: usize, col: usize) {
        let ncols = self.t.ncols();
        let piv = self.t[(row, col)];
        for j in 0..ncols {
            self.t[(row, j)] /= piv;
        }
        for i in 0..self.t.nrows() {
            if i == row {
                continue;
            }
            let factor = self.t[(i, col)];
            if factor == 0.0 {
                continue;
            }
            for j in 0..ncols {
                let v = self.t[(row, j)];
                self.t[(i, j)] -= factor * v;
            }
        }
        // Round-off must not produce negative basic values
        let rhs = self.rhs_col();
        for i in 0..self.obj_row() {
            if self.t[(i, rhs)] < 0.0 {
                self.t[(i, rhs)] = 0.0;
            }
        }
        self.basis[row] = col;
    }

    fn run_phase(
        &mut self,
        settings: &LpSettings,
        iterations: &mut usize,
    ) -> LpResult<()> {
        let mut degenerate_streak = 0;
        let mut bland = false;
        loop {
            let obj = self.obj_row();
            let rhs = self.rhs_col();

            let entering = if bland {
                (0..self.n_real).find(|&j| self.t[(obj, j)] < -settings.tolerance)
            } else {
                let mut best: Option<(usize, f64)> = None;
                for j in 0..self.n_real {
                    let d = self.t[(obj, j)];
                    if d < -settings.tolerance && best.map_or(true, |(_, b)| d < b) {
                        best = Some((j, d));
                    }
                }
                best.map(|(j, _)| j)
            };
            let Some(q) = entering else {
                return Ok(());
            };

            if *iterations >= settings.max_iterations {
                return Err(LpError::IterationLimit {
                    iterations: *iterations,
                });
            }

            let mut leaving: Option<(usize, f64)> = None;
            for i in 0..obj {
                let aiq = self.t[(i, q)];
                if aiq <= settings.pivot_tolerance {
                    continue;
                }
                let ratio = self.t[(i, rhs)] / aiq;
                leaving = match leaving {
                    None => Some((i, ratio)),
                    Some((r, best)) => {
                        let tie = (ratio - best).abs() <= 1e-12 * (1.0 + best.abs());
                        if (ratio < best && !tie) || (tie && self.basis[i] < self.basis[r]) {
                            Some((i, ratio))
                        } else {
                            Some((r, best))
                        }
                    }
                };
            }
            let Some((r, step)) = leaving else {
                return Err(LpError::Unbounded);
            };

            if step <= settings.tolerance {
                degenerate_streak += 1;
                if !bland && degenerate_streak > settings.bland_after_degenerate {
                    log::debug!("[Glpk] switching to Bland's rule after {} degenerate pivots", degenerate_streak);
                    bland = true;
                }
            } else {
                degenerate_streak = 0;
            }

            self.pivot(r, q);
            *iterations += 1;
        }
    }

    /// Pivots zero-level artificials out of the basis and drops rows that
    /// turn out to be redundant.
    fn expel_artificials(&mut self, settings: &LpSettings) {
        let mut i = 0;
        while i < self.basis.len() {
            if self.basis[i] < self.n_real {
                i += 1;
                continue;
            }
            let candidate = (0..self.n_real).find(|&j| self.t[(i, j)].abs() > settings.pivot_tolerance);
            match candidate {
                Some(j) => {
                    self.pivot(i, j);
                    i += 1;
                }
                None => {
                    log::debug!("[Glpk] dropping redundant constraint row {}", i);
                    self.t = self.t.clone().remove_row(i);
                    self.basis.remove(i);
                }
            }
        }
    }

    fn install_objective(&mut self, c: &na::DVector<f64>) {
        let obj = self.obj_row();
        let ncols = self.t.ncols();
        for j in 0..ncols {
            self.t[(obj, j)] = if j < self.n_real { c[j] } else { 0.0 };
        }
        for i in 0..self.basis.len() {
            let k = self.basis[i];
            let ck = if k < self.n_real { c[k] } else { 0.0 };
            if ck == 0.0 {
                continue;
            }
            for j in 0..ncols {
                let v = self.t[(i, j)];
                self.t[(obj, j)] -= ck * v;
            }
        }
    }

    fn primal(&self) -> na::DVector<f64> {
        let rhs = self.rhs_col();
        let mut y = na::DVector::<f64>::zeros(self.n_real);
        for (i, &k) in self.basis.iter().enumerate() {
            if k < self.n_real {
                y[k] = self.t[(i, rhs)];
            }
        }
        y
    }
}

/// Solves the standard-form program with the two-phase tableau method.
pub(crate) fn tableau_simplex(sf: &StandardForm, settings: &LpSettings) -> LpResult<SimplexOutcome> {
    let mut tableau = Tableau::new(sf);
    let mut iterations = 0;

    tableau.run_phase(settings, &mut iterations)?;
    let infeasibility = -tableau.t[(tableau.obj_row(), tableau.rhs_col())];
    let scale = 1.0 + sf.b.iter().fold(0.0_f64, |m, v| m.max(v.abs()));
    if infeasibility > settings.tolerance.sqrt() * scale {
        log::debug!("[Glpk] phase 1 ended with infeasibility {:e}", infeasibility);
        return Err(LpError::Infeasible);
    }
    log::debug!("[Glpk] phase 1 finished after {} pivots", iterations);

    tableau.expel_artificials(settings);
    tableau.install_objective(&sf.c);
    tableau.run_phase(settings, &mut iterations)?;
    log::debug!("[Glpk] phase 2 finished after {} pivots", iterations);

    Ok(SimplexOutcome {
        y: tableau.primal(),
        iterations,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::problem::{Bound, LinearProgram};

    fn lowered(lp: &LinearProgram) -> StandardForm {
        StandardForm::from_program(lp).unwrap()
    }

    #[test]
    fn test_tableau_finds_vertex() {
        // min -x1 - 2 x2  s.t.  x1 + x2 <= 4,  x1 + 3 x2 <= 6,  x >= 0
        let lp = LinearProgram::new(na::DVector::from_vec(vec![-1.0, -2.0]))
            .with_inequalities(
                na::DMatrix::from_row_slice(2, 2, &[1.0, 1.0, 1.0, 3.0]),
                na::DVector::from_vec(vec![4.0, 6.0]),
            )
            .with_bounds(vec![Bound::non_negative(); 2]);
        let sf = lowered(&lp);
        let outcome = tableau_simplex(&sf, &LpSettings::default()).unwrap();
        let x = sf.recover(&outcome.y);
        assert!((x[0] - 3.0).abs() < 1e-9);
        assert!((x[1] - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_tableau_drops_redundant_row() {
        let lp = LinearProgram::new(na::DVector::from_vec(vec![1.0, 2.0, 3.0]))
            .with_equalities(
                na::DMatrix::from_row_slice(2, 3, &[1.0, 1.0, 1.0, 2.0, 2.0, 2.0]),
                na::DVector::from_vec(vec![1.0, 2.0]),
            )
            .with_bounds(vec![Bound::non_negative(); 3]);
        let sf = lowered(&lp);
        let outcome = tableau_simplex(&sf, &LpSettings::default()).unwrap();
        let x = sf.recover(&outcome.y);
        assert!((x[0] - 1.0).abs() < 1e-9);
        assert!(x[1].abs() < 1e-9 && x[2].abs() < 1e-9);
    }

    #[test]
    fn test_tableau_iteration_limit() {
        let lp = LinearProgram::new(na::DVector::from_vec(vec![-1.0, -2.0]))
            .with_inequalities(
                na::DMatrix::from_row_slice(2, 2, &[1.0, 1.0, 1.0, 3.0]),
                na::DVector::from_vec(vec![4.0, 6.0]),
            )
            .with_bounds(vec![Bound::non_negative(); 2]);
        let settings = LpSettings {
            max_iterations: 0,
            ..Default::default()
        };
        let err = tableau_simplex(&lowered(&lp), &settings).err();
        assert_eq!(err, Some(LpError::IterationLimit { iterations: 0 }));
    }
}
