//! Lowering of a [`LinearProgram`] to the standard form every engine solves:
//!
//! ```text
//! minimize    c^T y + offset
//! subject to  A y = b,  b >= 0
//!             y >= 0
//! ```
//!
//! Variables with a finite lower bound are shifted, variables with only an
//! upper bound are mirrored, free variables are split into a positive and a
//! negative part. Finite upper bounds and inequality rows receive slack
//! columns.
extern crate nalgebra as na;

use crate::error::{LpError, LpResult};
use crate::problem::LinearProgram;

/// How an original variable is rebuilt from standard-form columns:
/// `x_j = offset + sum(coef * y[col])`.
#[derive(Debug, Clone)]
struct VariableMap {
    offset: f64,
    columns: Vec<(usize, f64)>,
}

#[derive(Debug, Clone)]
pub struct StandardForm {
    pub a: na::DMatrix<f64>,
    pub b: na::DVector<f64>,
    pub c: na::DVector<f64>,
    /// Constant term picked up by shifting variables
    pub objective_offset: f64,
    /// (positive, negative) column pairs of split free variables
    pub split_pairs: Vec<(usize, usize)>,
    maps: Vec<VariableMap>,
}

impl StandardForm {
    /// Lowers a validated linear program.
    pub fn from_program(lp: &LinearProgram) -> LpResult<Self> {
        lp.validate()?;
        let n = lp.num_variables();

        let mut maps = Vec::with_capacity(n);
        let mut split_pairs = Vec::new();
        let mut upper_rows: Vec<(usize, f64)> = Vec::new();
        let mut ncols = 0;

        for j in 0..n {
            let bound = lp.bound(j);
            // Infinite bounds are the same as missing ones
            let lower = bound.lower.filter(|v| v.is_finite());
            let upper = bound.upper.filter(|v| v.is_finite());
            match (lower, upper) {
                (Some(lower), upper) => {
                    let col = ncols;
                    ncols += 1;
                    maps.push(VariableMap {
                        offset: lower,
                        columns: vec![(col, 1.0)],
                    });
                    if let Some(upper) = upper {
                        upper_rows.push((col, upper - lower));
                    }
                }
                (None, Some(upper)) => {
                    let col = ncols;
                    ncols += 1;
                    maps.push(VariableMap {
                        offset: upper,
                        columns: vec![(col, -1.0)],
                    });
                }
                (None, None) => {
                    let pos = ncols;
                    let neg = ncols + 1;
                    ncols += 2;
                    maps.push(VariableMap {
                        offset: 0.0,
                        columns: vec![(pos, 1.0), (neg, -1.0)],
                    });
                    split_pairs.push((pos, neg));
                }
            }
        }

        let n_ub = lp.a_ub.as_ref().map_or(0, |a| a.nrows());
        let n_eq = lp.a_eq.as_ref().map_or(0, |a| a.nrows());
        let n_box = upper_rows.len();
        let rows = n_ub + n_eq + n_box;
        let total_cols = ncols + n_ub + n_box;

        let mut a = na::DMatrix::<f64>::zeros(rows, total_cols);
        let mut b = na::DVector::<f64>::zeros(rows);

        if let (Some(a_ub), Some(b_ub)) = (lp.a_ub.as_ref(), lp.b_ub.as_ref()) {
            for i in 0..n_ub {
                b[i] = substitute_row(&mut a, i, a_ub, i, b_ub[i], &maps);
                a[(i, ncols + i)] = 1.0;
            }
        }
        if let (Some(a_eq), Some(b_eq)) = (lp.a_eq.as_ref(), lp.b_eq.as_ref()) {
            for i in 0..n_eq {
                b[n_ub + i] = substitute_row(&mut a, n_ub + i, a_eq, i, b_eq[i], &maps);
            }
        }
        for (k, &(col, width)) in upper_rows.iter().enumerate() {
            let r = n_ub + n_eq + k;
            a[(r, col)] = 1.0;
            a[(r, ncols + n_ub + k)] = 1.0;
            b[r] = width;
        }

        let mut c = na::DVector::<f64>::zeros(total_cols);
        let mut objective_offset = 0.0;
        for (j, map) in maps.iter().enumerate() {
            let cj = lp.c[j];
            objective_offset += cj * map.offset;
            for &(col, coef) in &map.columns {
                c[col] += cj * coef;
            }
        }

        for i in 0..rows {
            if b[i] < 0.0 {
                b[i] = -b[i];
                let mut row = a.row_mut(i);
                row.neg_mut();
            }
        }

        Ok(StandardForm {
            a,
            b,
            c,
            objective_offset,
            split_pairs,
            maps,
        })
    }

    pub fn num_rows(&self) -> usize {
        self.a.nrows()
    }

    pub fn num_cols(&self) -> usize {
        self.a.ncols()
    }

    /// Maps a standard-form point back to the original variables.
    pub fn recover(&self, y: &na::DVector<f64>) -> na::DVector<f64> {
        na::DVector::from_iterator(
            self.maps.len(),
            self.maps.iter().map(|map| {
                map.columns
                    .iter()
                    .fold(map.offset, |acc, &(col, coef)| acc + coef * y[col])
            }),
        )
    }
}

/// Writes `a_src[src_row] * x` in terms of the standard-form columns into
/// `dest[dest_row]` and returns the right-hand side corrected for offsets.
fn substitute_row(
    dest: &mut na::DMatrix<f64>,
    dest_row: usize,
    a_src: &na::DMatrix<f64>,
    src_row: usize,
    rhs: f64,
    maps: &[VariableMap],
) -> f64 {
    let mut rhs = rhs;
    for (j, map) in maps.iter().enumerate() {
        let aij = a_src[(src_row, j)];
        if aij == 0.0 {
            continue;
        }
        rhs -= aij * map.offset;
        for &(col, coef) in &map.columns {
            dest[(dest_row, col)] += aij * coef;
        }
    }
    rhs
}

/// Drops equality rows that are linear combinations of earlier rows.
///
/// Rows are orthogonalized in order (modified Gram-Schmidt). A dependent row
/// whose right-hand side disagrees with the same combination of earlier
/// right-hand sides makes the system inconsistent.
pub fn remove_dependent_rows(
    a: &na::DMatrix<f64>,
    b: &na::DVector<f64>,
    tolerance: f64,
) -> LpResult<(na::DMatrix<f64>, na::DVector<f64>)> {
    let mut basis: Vec<(na::DVector<f64>, f64)> = Vec::new();
    let mut keep = Vec::with_capacity(a.nrows());

    for i in 0..a.nrows() {
        let row = a.row(i).transpose();
        let row_norm = row.norm();
        let mut residual = row.clone();
        let mut rhs_residual = b[i];
        for (q, beta) in &basis {
            let proj = q.dot(&residual);
            residual.axpy(-proj, q, 1.0);
            rhs_residual -= proj * beta;
        }
        let residual_norm = residual.norm();
        if residual_norm > tolerance * row_norm.max(1.0) {
            basis.push((residual / residual_norm, rhs_residual / residual_norm));
            keep.push(i);
        } else if rhs_residual.abs() > tolerance.sqrt() * (1.0 + b[i].abs()) {
            log::debug!(
                "[Presolve] row {} is dependent with inconsistent right-hand side ({:e})",
                i,
                rhs_residual
            );
            return Err(LpError::Infeasible);
        } else {
            log::debug!("[Presolve] dropping dependent row {}", i);
        }
    }

    let a_kept = a.select_rows(keep.iter());
    let b_kept = b.select_rows(keep.iter());
    Ok((a_kept, b_kept))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::problem::{Bound, LinearProgram};

    #[test]
    fn test_free_variable_is_split() {
        let lp = LinearProgram::new(na::DVector::from_vec(vec![1.0]))
            .with_equalities(
                na::DMatrix::from_row_slice(1, 1, &[2.0]),
                na::DVector::from_vec(vec![-4.0]),
            );
        let sf = StandardForm::from_program(&lp).unwrap();
        assert_eq!(sf.num_cols(), 2);
        assert_eq!(sf.split_pairs, vec![(0, 1)]);
        // Row is negated so the right-hand side is non-negative
        assert_eq!(sf.b[0], 4.0);
        assert_eq!(sf.a[(0, 0)], -2.0);
        assert_eq!(sf.a[(0, 1)], 2.0);

        let x = sf.recover(&na::DVector::from_vec(vec![0.0, 2.0]));
        assert_eq!(x[0], -2.0);
    }

    #[test]
    fn test_boxed_variable_gets_shift_and_upper_row() {
        let lp = LinearProgram::new(na::DVector::from_vec(vec![3.0]))
            .with_inequalities(
                na::DMatrix::from_row_slice(1, 1, &[1.0]),
                na::DVector::from_vec(vec![5.0]),
            )
            .with_bounds(vec![Bound::new(Some(1.0), Some(4.0))]);
        let sf = StandardForm::from_program(&lp).unwrap();
        // y, ub slack, box slack
        assert_eq!(sf.num_cols(), 3);
        assert_eq!(sf.num_rows(), 2);
        assert_eq!(sf.b[0], 4.0);
        assert_eq!(sf.b[1], 3.0);
        assert_eq!(sf.objective_offset, 3.0);

        let x = sf.recover(&na::DVector::from_vec(vec![2.0, 0.0, 0.0]));
        assert_eq!(x[0], 3.0);
    }

    #[test]
    fn test_upper_only_variable_is_mirrored() {
        let lp = LinearProgram::new(na::DVector::from_vec(vec![1.0]))
            .with_bounds(vec![Bound::new(None, Some(2.0))]);
        let sf = StandardForm::from_program(&lp).unwrap();
        assert_eq!(sf.c[0], -1.0);
        assert_eq!(sf.objective_offset, 2.0);
        let x = sf.recover(&na::DVector::from_vec(vec![0.5]));
        assert_eq!(x[0], 1.5);
    }

    #[test]
    fn test_offset_objective_matches_original_objective() {
        let lp = LinearProgram::new(na::DVector::from_vec(vec![2.0, -1.0, 3.0]))
            .with_bounds(vec![
                Bound::new(Some(1.0), Some(4.0)),
                Bound::new(None, Some(2.0)),
                Bound::free(),
            ]);
        let sf = StandardForm::from_program(&lp).unwrap();
        let y = na::DVector::from_fn(sf.num_cols(), |j, _| 0.5 + j as f64);
        let x = sf.recover(&y);
        assert!((sf.c.dot(&y) + sf.objective_offset - lp.c.dot(&x)).abs() < 1e-12);
    }

    #[test]
    fn test_remove_dependent_rows() {
        let a = na::DMatrix::from_row_slice(3, 3, &[1.0, 1.0, 1.0, 2.0, 2.0, 2.0, 1.0, 0.0, 0.0]);
        let b = na::DVector::from_vec(vec![1.0, 2.0, 0.5]);
        let (a_kept, b_kept) = remove_dependent_rows(&a, &b, 1e-10).unwrap();
        assert_eq!(a_kept.nrows(), 2);
        assert_eq!(b_kept[1], 0.5);

        let b_bad = na::DVector::from_vec(vec![1.0, 3.0, 0.5]);
        assert_eq!(
            remove_dependent_rows(&a, &b_bad, 1e-10).unwrap_err(),
            LpError::Infeasible
        );
    }
}
