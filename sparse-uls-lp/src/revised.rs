//! Two-phase revised simplex with an explicit basis inverse.
//!
//! The inverse is updated in product form after every pivot and rebuilt from
//! scratch every `refactor_interval` pivots to keep round-off in check.
//! Pricing always uses Bland's rule.
extern crate nalgebra as na;

use crate::error::{LpError, LpResult};
use crate::settings::LpSettings;
use crate::simplex::SimplexOutcome;
use crate::standard::StandardForm;

struct RevisedSimplex {
    /// [A | I]: structural columns followed by one artificial per row
    a: na::DMatrix<f64>,
    b: na::DVector<f64>,
    n_real: usize,
    basis: Vec<usize>,
    binv: na::DMatrix<f64>,
    x_b: na::DVector<f64>,
    since_refactor: usize,
}

impl RevisedSimplex {
    fn new(sf: &StandardForm) -> Self {
        let rows = sf.num_rows();
        let n_real = sf.num_cols();
        let mut a = na::DMatrix::<f64>::zeros(rows, n_real + rows);
        a.columns_mut(0, n_real).copy_from(&sf.a);
        for i in 0..rows {
            a[(i, n_real + i)] = 1.0;
        }
        RevisedSimplex {
            a,
            b: sf.b.clone(),
            n_real,
            basis: (n_real..n_real + rows).collect(),
            binv: na::DMatrix::identity(rows, rows),
            x_b: sf.b.clone(),
            since_refactor: 0,
        }
    }

    fn refactor(&mut self) -> LpResult<()> {
        self.since_refactor = 0;
        if self.basis.is_empty() {
            self.binv = na::DMatrix::zeros(0, 0);
            self.x_b = na::DVector::zeros(0);
            return Ok(());
        }
        let b_mat = self.a.select_columns(self.basis.iter());
        let binv = b_mat.try_inverse().ok_or(LpError::SingularBasis)?;
        self.x_b = (&binv * &self.b).map(|v| v.max(0.0));
        self.binv = binv;
        Ok(())
    }

    fn is_basic(&self) -> Vec<bool> {
        let mut flags = vec![false; self.a.ncols()];
        for &k in &self.basis {
            flags[k] = true;
        }
        flags
    }

    fn pivot(&mut self, r: usize, q: usize, u: &na::DVector<f64>) {
        let theta = self.x_b[r] / u[r];
        for i in 0..self.x_b.len() {
            if i != r {
                self.x_b[i] = (self.x_b[i] - theta * u[i]).max(0.0);
            }
        }
        self.x_b[r] = theta.max(0.0);

        let rows = self.binv.nrows();
        let piv = u[r];
        for j in 0..rows {
            self.binv[(r, j)] /= piv;
        }
        for i in 0..rows {
            if i == r || u[i] == 0.0 {
                continue;
            }
            let factor = u[i];
            for j in 0..rows {
                let v = self.binv[(r, j)];
                self.binv[(i, j)] -= factor * v;
            }
        }
        self.basis[r] = q;
        self.since_refactor += 1;
    }

    fn run_phase(
        &mut self,
        cost: &na::DVector<f64>,
        settings: &LpSettings,
        iterations: &mut usize,
    ) -> LpResult<()> {
        loop {
            if self.since_refactor >= settings.refactor_interval {
                self.refactor()?;
            }

            let c_b = na::DVector::from_iterator(
                self.basis.len(),
                self.basis.iter().map(|&k| cost[k]),
            );
            let duals = self.binv.tr_mul(&c_b);
            let basic = self.is_basic();
            let entering = (0..self.n_real).find(|&j| {
                !basic[j] && cost[j] - self.a.column(j).dot(&duals) < -settings.tolerance
            });
            let Some(q) = entering else {
                return Ok(());
            };

            if *iterations >= settings.max_iterations {
                return Err(LpError::IterationLimit {
                    iterations: *iterations,
                });
            }

            let u = &self.binv * self.a.column(q);
            let mut leaving: Option<(usize, f64)> = None;
            for i in 0..u.len() {
                if u[i] <= settings.pivot_tolerance {
                    continue;
                }
                let ratio = self.x_b[i] / u[i];
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
            let Some((r, _)) = leaving else {
                return Err(LpError::Unbounded);
            };

            self.pivot(r, q, &u);
            *iterations += 1;
        }
    }

    /// Replaces basic artificials by structural columns, or drops the
    /// constraint row they stand for when it is redundant.
    fn expel_artificials(&mut self, settings: &LpSettings) -> LpResult<()> {
        let mut pos = 0;
        while pos < self.basis.len() {
            let k = self.basis[pos];
            if k < self.n_real {
                pos += 1;
                continue;
            }
            let w = self.binv.row(pos).transpose();
            let basic = self.is_basic();
            let candidate = (0..self.n_real).find(|&j| {
                !basic[j] && w.dot(&self.a.column(j)).abs() > settings.pivot_tolerance
            });
            match candidate {
                Some(j) => {
                    let u = &self.binv * self.a.column(j);
                    self.pivot(pos, j, &u);
                    pos += 1;
                }
                None => {
                    // The artificial column is a unit vector; its row is the
                    // constraint being dropped.
                    let row = self.a.column(k).iamax();
                    log::debug!("[Octave] dropping redundant constraint row {}", row);
                    self.a = self.a.clone().remove_row(row);
                    self.b = self.b.clone().remove_row(row);
                    self.basis.remove(pos);
                    self.refactor()?;
                }
            }
        }
        Ok(())
    }

    fn primal(&self) -> na::DVector<f64> {
        let mut y = na::DVector::<f64>::zeros(self.n_real);
        for (i, &k) in self.basis.iter().enumerate() {
            if k < self.n_real {
                y[k] = self.x_b[i];
            }
        }
        y
    }
}

/// Solves the standard-form program with the two-phase revised method.
pub(crate) fn revised_simplex(sf: &StandardForm, settings: &LpSettings) -> LpResult<SimplexOutcome> {
    let mut solver = RevisedSimplex::new(sf);
    let rows = sf.num_rows();
    let n_real = sf.num_cols();
    let mut iterations = 0;

    let mut phase1_cost = na::DVector::<f64>::zeros(n_real + rows);
    phase1_cost.rows_mut(n_real, rows).fill(1.0);
    solver.run_phase(&phase1_cost, settings, &mut iterations)?;

    let infeasibility: f64 = solver
        .basis
        .iter()
        .zip(solver.x_b.iter())
        .filter(|(k, _)| **k >= n_real)
        .map(|(_, v)| *v)
        .sum();
    let scale = 1.0 + sf.b.iter().fold(0.0_f64, |m, v| m.max(v.abs()));
    if infeasibility > settings.tolerance.sqrt() * scale {
        log::debug!("[Octave] phase 1 ended with infeasibility {:e}", infeasibility);
        return Err(LpError::Infeasible);
    }

    solver.expel_artificials(settings)?;
    solver.refactor()?;

    let mut phase2_cost = na::DVector::<f64>::zeros(n_real + rows);
    phase2_cost.rows_mut(0, n_real).copy_from(&sf.c);
    solver.run_phase(&phase2_cost, settings, &mut iterations)?;
    solver.refactor()?;
    log::debug!("[Octave] revised simplex finished after {} pivots", iterations);

    Ok(SimplexOutcome {
        y: solver.primal(),
        iterations,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::problem::{Bound, LinearProgram};

    #[test]
    fn test_revised_matches_known_vertex() {
        let lp = LinearProgram::new(na::DVector::from_vec(vec![-1.0, -2.0]))
            .with_inequalities(
                na::DMatrix::from_row_slice(2, 2, &[1.0, 1.0, 1.0, 3.0]),
                na::DVector::from_vec(vec![4.0, 6.0]),
            )
            .with_bounds(vec![Bound::non_negative(); 2]);
        let sf = StandardForm::from_program(&lp).unwrap();
        let outcome = revised_simplex(&sf, &LpSettings::default()).unwrap();
        let x = sf.recover(&outcome.y);
        assert!((x[0] - 3.0).abs() < 1e-9);
        assert!((x[1] - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_revised_survives_frequent_refactorization() {
        let lp = LinearProgram::new(na::DVector::from_vec(vec![1.0, 2.0, 3.0]))
            .with_equalities(
                na::DMatrix::from_row_slice(2, 3, &[1.0, 1.0, 1.0, 2.0, 2.0, 2.0]),
                na::DVector::from_vec(vec![1.0, 2.0]),
            )
            .with_bounds(vec![Bound::non_negative(); 3]);
        let sf = StandardForm::from_program(&lp).unwrap();
        let settings = LpSettings {
            refactor_interval: 1,
            ..Default::default()
        };
        let outcome = revised_simplex(&sf, &settings).unwrap();
        let x = sf.recover(&outcome.y);
        assert!((x[0] - 1.0).abs() < 1e-9);
    }
}
