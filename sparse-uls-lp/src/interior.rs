//! Mehrotra predictor-corrector primal-dual interior-point method.
//!
//! Works on the standard form with every split free variable merged back into
//! a single free column (`N` the non-negative columns, `F` the free ones):
//!
//! ```text
//! min c^T x   s.t.  A x = b,        x_N >= 0
//! max b^T l   s.t.  A^T l + s = c,  s_N >= 0,  s_F = 0
//! ```
//!
//! Each iteration factors the regularized augmented system
//!
//! ```text
//! [ -H   A^T   ] [dx]   [ -r_c + X^-1 r_xs ]     H_N = S X^-1,  H_F = rho
//! [  A   delta ] [dl] = [ -r_b             ]
//! ```
//!
//! once and solves it twice (affine predictor and centering corrector). Free
//! columns carry no complementarity pair, so they cannot drift off to
//! infinity the way the two halves of a split variable do. The proximal terms
//! `rho` and `delta` vanish with the step, so they do not move the solution.
//!
//! Iterates that grow past a data-relative threshold are tested for a Farkas
//! certificate (`A^T y <= 0` on `N`, `A^T y = 0` on `F`, `b^T y > 0`: the
//! program is infeasible) or a primal ray (`A d = 0`, `d_N >= 0`, `c^T d < 0`:
//! the program is unbounded).
extern crate nalgebra as na;

use crate::error::{LpError, LpResult};
use crate::settings::LpSettings;
use crate::standard::{remove_dependent_rows, StandardForm};

/// Size of an iterate, relative to the data, past which certificates are checked
const DIVERGENCE_THRESHOLD: f64 = 1e10;
/// Relative accuracy a normalized ray needs to count as a certificate
const CERTIFICATE_TOLERANCE: f64 = 1e-6;

pub(crate) struct InteriorOutcome {
    pub y: na::DVector<f64>,
    pub iterations: usize,
}

/// The standard form with each `(positive, negative)` split pair collapsed
/// into one free column.
struct MergedForm {
    a: na::DMatrix<f64>,
    b: na::DVector<f64>,
    c: na::DVector<f64>,
    free: Vec<bool>,
    /// Standard-form column behind each merged column
    source: Vec<usize>,
    /// Negative half of the split pair for free merged columns
    negative: Vec<Option<usize>>,
    standard_cols: usize,
}

impl MergedForm {
    fn new(sf: &StandardForm) -> Self {
        let cols = sf.num_cols();
        let mut negative_of = vec![None; cols];
        let mut is_negative_half = vec![false; cols];
        for &(pos, neg) in &sf.split_pairs {
            negative_of[pos] = Some(neg);
            is_negative_half[neg] = true;
        }
        let source: Vec<usize> = (0..cols).filter(|&j| !is_negative_half[j]).collect();
        let negative: Vec<Option<usize>> = source.iter().map(|&j| negative_of[j]).collect();
        MergedForm {
            a: sf.a.select_columns(source.iter()),
            b: sf.b.clone(),
            c: sf.c.select_rows(source.iter()),
            free: negative.iter().map(Option::is_some).collect(),
            source,
            negative,
            standard_cols: cols,
        }
    }

    /// Maps a merged point back to the non-negative standard-form columns.
    fn expand(&self, x: &na::DVector<f64>) -> na::DVector<f64> {
        let mut y = na::DVector::<f64>::zeros(self.standard_cols);
        for (k, &j) in self.source.iter().enumerate() {
            match self.negative[k] {
                Some(neg) => {
                    y[j] = x[k].max(0.0);
                    y[neg] = (-x[k]).max(0.0);
                }
                None => y[j] = x[k].max(0.0),
            }
        }
        y
    }
}

struct NewtonStep {
    dx: na::DVector<f64>,
    dl: na::DVector<f64>,
    ds: na::DVector<f64>,
}

/// Largest alpha in (0, inf] with `v + alpha dv >= 0` on the non-negative
/// columns.
fn step_to_boundary(v: &na::DVector<f64>, dv: &na::DVector<f64>, free: &[bool]) -> f64 {
    v.iter()
        .zip(dv.iter())
        .zip(free)
        .filter(|((_, d), f)| !**f && **d < 0.0)
        .map(|((x, d), _)| -x / d)
        .fold(f64::INFINITY, f64::min)
}

/// Average `x_j s_j` over the non-negative columns.
fn complementarity(x: &na::DVector<f64>, s: &na::DVector<f64>, free: &[bool]) -> f64 {
    let (sum, count) = x
        .iter()
        .zip(s.iter())
        .zip(free)
        .filter(|(_, f)| !**f)
        .fold((0.0, 0usize), |(sum, count), ((x, s), _)| (sum + x * s, count + 1));
    if count == 0 { 0.0 } else { sum / count as f64 }
}

/// Checks `x` for a primal ray and `l` for a Farkas certificate, both after
/// normalizing to unit max-norm.
fn certificate(
    a: &na::DMatrix<f64>,
    b: &na::DVector<f64>,
    c: &na::DVector<f64>,
    free: &[bool],
    x: &na::DVector<f64>,
    l: &na::DVector<f64>,
) -> Option<LpError> {
    let l_max = l.amax();
    if l_max.is_finite() && l_max > 0.0 {
        let y = l / l_max;
        let by = b.dot(&y);
        if by > 0.0 {
            let aty = a.tr_mul(&y);
            let violation = aty
                .iter()
                .zip(free)
                .map(|(v, f)| if *f { v.abs() } else { v.max(0.0) })
                .fold(0.0_f64, f64::max);
            if violation <= CERTIFICATE_TOLERANCE * by {
                return Some(LpError::Infeasible);
            }
        }
    }

    let x_max = x.amax();
    if x_max.is_finite() && x_max > 0.0 {
        let d = x / x_max;
        let cd = c.dot(&d);
        if cd < 0.0 {
            let residual = (a * &d).amax();
            let negative = d
                .iter()
                .zip(free)
                .filter(|(_, f)| !**f)
                .map(|(v, _)| (-v).max(0.0))
                .fold(0.0_f64, f64::max);
            if residual.max(negative) <= CERTIFICATE_TOLERANCE * -cd {
                return Some(LpError::Unbounded);
            }
        }
    }
    None
}

/// LU factors of the augmented system at the current iterate.
fn factor_augmented(
    a: &na::DMatrix<f64>,
    x: &na::DVector<f64>,
    s: &na::DVector<f64>,
    free: &[bool],
    regularization: f64,
) -> LpResult<na::LU<f64, na::Dyn, na::Dyn>> {
    let (m, n) = a.shape();
    let mut reg = regularization.max(f64::EPSILON) * a.amax().max(1.0);
    for _ in 0..8 {
        let mut k = na::DMatrix::<f64>::zeros(n + m, n + m);
        for j in 0..n {
            k[(j, j)] = if free[j] { -reg } else { -s[j] / x[j] };
        }
        k.view_mut((0, n), (n, m)).copy_from(&a.transpose());
        k.view_mut((n, 0), (m, n)).copy_from(a);
        for i in 0..m {
            k[(n + i, n + i)] = reg;
        }
        let lu = k.lu();
        if lu.is_invertible() {
            return Ok(lu);
        }
        reg *= 100.0;
    }
    Err(LpError::NumericalFailure(
        "augmented system is singular".to_string(),
    ))
}

fn solve_newton(
    lu: &na::LU<f64, na::Dyn, na::Dyn>,
    x: &na::DVector<f64>,
    s: &na::DVector<f64>,
    free: &[bool],
    r_b: &na::DVector<f64>,
    r_c: &na::DVector<f64>,
    r_xs: &na::DVector<f64>,
) -> LpResult<NewtonStep> {
    let n = x.len();
    let m = r_b.len();
    let mut rhs = na::DVector::<f64>::zeros(n + m);
    for j in 0..n {
        rhs[j] = if free[j] { -r_c[j] } else { -r_c[j] + r_xs[j] / x[j] };
    }
    for i in 0..m {
        rhs[n + i] = -r_b[i];
    }
    let solution = lu.solve(&rhs).ok_or_else(|| {
        LpError::NumericalFailure("augmented system solve failed".to_string())
    })?;

    let dx = solution.rows(0, n).into_owned();
    let dl = solution.rows(n, m).into_owned();
    // S dx + X ds = -r_xs on the non-negative columns, s_F stays 0
    let ds = na::DVector::from_fn(n, |j, _| {
        if free[j] { 0.0 } else { (-r_xs[j] - s[j] * dx[j]) / x[j] }
    });
    Ok(NewtonStep { dx, dl, ds })
}

/// Cholesky of `A A^T`, with a growing diagonal shift if needed.
fn gram_cholesky(a: &na::DMatrix<f64>, regularization: f64) -> LpResult<na::Cholesky<f64, na::Dyn>> {
    let gram = a * a.transpose();
    let diag_max = gram.diagonal().iter().fold(1.0_f64, |m, v| m.max(v.abs()));
    let mut delta = regularization.max(1e-14) * diag_max;
    for _ in 0..8 {
        let mut shifted = gram.clone();
        for i in 0..shifted.nrows() {
            shifted[(i, i)] += delta;
        }
        if let Some(chol) = shifted.cholesky() {
            return Ok(chol);
        }
        delta *= 100.0;
    }
    Err(LpError::NumericalFailure(
        "constraint matrix has no usable Gram factorization".to_string(),
    ))
}

/// Mehrotra's starting point heuristic, applied to the non-negative columns.
fn starting_point(
    a: &na::DMatrix<f64>,
    b: &na::DVector<f64>,
    c: &na::DVector<f64>,
    free: &[bool],
    settings: &LpSettings,
) -> LpResult<(na::DVector<f64>, na::DVector<f64>, na::DVector<f64>)> {
    let chol = gram_cholesky(a, settings.ipm_regularization)?;
    let mut x = a.tr_mul(&chol.solve(b));
    let l = chol.solve(&(a * c));
    let mut s = c - a.tr_mul(&l);
    for (j, is_free) in free.iter().enumerate() {
        if *is_free {
            s[j] = 0.0;
        }
    }
    if free.iter().all(|f| *f) {
        return Ok((x, l, s));
    }

    let nonneg_min = |v: &na::DVector<f64>| {
        v.iter()
            .zip(free)
            .filter(|(_, f)| !**f)
            .map(|(v, _)| *v)
            .fold(f64::INFINITY, f64::min)
    };
    let shift_x = (-1.5 * nonneg_min(&x)).max(0.0);
    let shift_s = (-1.5 * nonneg_min(&s)).max(0.0);
    for j in (0..x.len()).filter(|&j| !free[j]) {
        x[j] += shift_x;
        s[j] += shift_s;
    }

    let (mut xs, mut x_sum, mut s_sum) = (0.0, 0.0, 0.0);
    for j in (0..x.len()).filter(|&j| !free[j]) {
        xs += x[j] * s[j];
        x_sum += x[j];
        s_sum += s[j];
    }
    let center_x = 0.5 * xs / s_sum;
    let center_s = 0.5 * xs / x_sum;
    let (center_x, center_s) = if center_x.is_finite() && center_s.is_finite() && xs > 0.0 {
        (center_x, center_s)
    } else {
        (1.0, 1.0)
    };
    // Strictly interior start
    let floor = 1e-2;
    for j in (0..x.len()).filter(|&j| !free[j]) {
        x[j] = (x[j] + center_x).max(floor);
        s[j] = (s[j] + center_s).max(floor);
    }
    Ok((x, l, s))
}

/// Solves the standard-form program with the primal-dual interior point.
pub(crate) fn interior_point(sf: &StandardForm, settings: &LpSettings) -> LpResult<InteriorOutcome> {
    let merged = MergedForm::new(sf);
    let (a, b) = remove_dependent_rows(&merged.a, &merged.b, 1e-10)?;
    let c = &merged.c;
    let free = merged.free.as_slice();
    let n = a.ncols();

    if a.nrows() == 0 {
        // Nothing couples the columns: bounded iff free columns cost nothing
        // and no non-negative column has a negative cost
        let unbounded = c
            .iter()
            .zip(free)
            .any(|(cj, f)| if *f { *cj != 0.0 } else { *cj < 0.0 });
        if unbounded {
            return Err(LpError::Unbounded);
        }
        return Ok(InteriorOutcome {
            y: merged.expand(&na::DVector::zeros(n)),
            iterations: 0,
        });
    }
    log::debug!(
        "[Scipy] {} rows, {} columns ({} free)",
        a.nrows(),
        n,
        free.iter().filter(|f| **f).count()
    );

    let (mut x, mut l, mut s) = starting_point(&a, &b, c, free, settings)?;
    let b_scale = 1.0 + b.norm();
    let c_scale = 1.0 + c.norm();
    let x_limit = DIVERGENCE_THRESHOLD * (1.0 + b.amax());
    let l_limit = DIVERGENCE_THRESHOLD * (1.0 + c.amax());

    for iteration in 0..settings.ipm_max_iterations {
        if x.amax() > x_limit || l.amax() > l_limit {
            if let Some(status) = certificate(&a, &b, c, free, &x, &l) {
                log::debug!("[Scipy] {} detected at iteration {}", status, iteration);
                return Err(status);
            }
        }

        let r_b = &a * &x - &b;
        let r_c = a.tr_mul(&l) + &s - c;
        let mu = complementarity(&x, &s, free);

        let primal_obj = c.dot(&x);
        let dual_obj = b.dot(&l);
        let primal_res = r_b.norm() / b_scale;
        let dual_res = r_c.norm() / c_scale;
        let gap = (primal_obj - dual_obj).abs() / (1.0 + primal_obj.abs());
        log::trace!(
            "[Scipy] iter {}: pres={:.2e} dres={:.2e} gap={:.2e} mu={:.2e}",
            iteration,
            primal_res,
            dual_res,
            gap,
            mu
        );
        if primal_res < settings.ipm_tolerance
            && dual_res < settings.ipm_tolerance
            && gap < settings.ipm_tolerance
        {
            log::debug!("[Scipy] converged after {} iterations", iteration);
            return Ok(InteriorOutcome {
                y: merged.expand(&x),
                iterations: iteration,
            });
        }

        let lu = factor_augmented(&a, &x, &s, free, settings.ipm_regularization)
            .map_err(|e| certificate(&a, &b, c, free, &x, &l).unwrap_or(e))?;

        // Predictor
        let r_xs = na::DVector::from_fn(n, |j, _| if free[j] { 0.0 } else { x[j] * s[j] });
        let affine = solve_newton(&lu, &x, &s, free, &r_b, &r_c, &r_xs)?;
        let alpha_p = step_to_boundary(&x, &affine.dx, free).min(1.0);
        let alpha_d = step_to_boundary(&s, &affine.ds, free).min(1.0);
        let mu_affine = complementarity(
            &(&x + &affine.dx * alpha_p),
            &(&s + &affine.ds * alpha_d),
            free,
        );
        let sigma = if mu > 0.0 {
            (mu_affine / mu).clamp(0.0, 1.0).powi(3)
        } else {
            0.0
        };

        // Corrector
        let r_xs = na::DVector::from_fn(n, |j, _| {
            if free[j] {
                0.0
            } else {
                r_xs[j] + affine.dx[j] * affine.ds[j] - sigma * mu
            }
        });
        let step = solve_newton(&lu, &x, &s, free, &r_b, &r_c, &r_xs)?;
        let alpha_p = (settings.ipm_step_fraction * step_to_boundary(&x, &step.dx, free)).min(1.0);
        let alpha_d = (settings.ipm_step_fraction * step_to_boundary(&s, &step.ds, free)).min(1.0);

        let x_next = &x + &step.dx * alpha_p;
        let l_next = &l + &step.dl * alpha_d;
        let s_next = &s + &step.ds * alpha_d;
        if x_next
            .iter()
            .chain(l_next.iter())
            .chain(s_next.iter())
            .any(|v| !v.is_finite())
        {
            // A step that overflows points along the diverging direction
            return Err(certificate(&a, &b, c, free, &step.dx, &step.dl).unwrap_or_else(|| {
                LpError::NumericalFailure(format!("non-finite iterate at iteration {}", iteration))
            }));
        }
        x = x_next;
        l = l_next;
        s = s_next;
    }

    Err(LpError::IterationLimit {
        iterations: settings.ipm_max_iterations,
    })
}
