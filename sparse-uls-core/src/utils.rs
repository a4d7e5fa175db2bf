extern crate nalgebra as na;

use rand::prelude::*;
use rand_distr::StandardNormal;
#[cfg(feature = "rayon")]
use rayon::prelude::*;

use crate::error::{UlsError, UlsResult};

/// Checks the shape invariants shared by every entry point.
///
/// `A` needs at least one row, `b` one entry per row of `A`, strictly more
/// columns than rows, and finite entries everywhere. Nothing numerical happens
/// before these checks pass.
pub fn validate_system(a: &na::DMatrix<f64>, b: &na::DVector<f64>) -> UlsResult<()> {
    let (m, n) = a.shape();
    if m == 0 || n == 0 {
        return Err(UlsError::InvalidShape(format!(
            "A must have at least one row and one column, got {}x{}",
            m, n
        )));
    }
    if b.len() != m {
        return Err(UlsError::InvalidShape(format!(
            "b must have one entry per row of A: A is {}x{}, b has length {}",
            m,
            n,
            b.len()
        )));
    }
    if m >= n {
        return Err(UlsError::Underdetermined { rows: m, cols: n });
    }
    if a.iter().any(|v| !v.is_finite()) {
        return Err(UlsError::InvalidInput("A contains non-finite entries".to_string()));
    }
    if b.iter().any(|v| !v.is_finite()) {
        return Err(UlsError::InvalidInput("b contains non-finite entries".to_string()));
    }
    Ok(())
}

/// Checks `p` is finite and at least `min_p` (exclusive when `min_p` is 0).
pub fn validate_norm(p: f64, min_p: f64) -> UlsResult<()> {
    let in_range = if min_p == 0.0 { p > 0.0 } else { p >= min_p };
    if p.is_finite() && in_range {
        Ok(())
    } else {
        Err(UlsError::InvalidNorm(p))
    }
}

/// `‖x‖_p^p = Σ |x_i|^p`.
pub fn lp_norm_pow(x: &na::DVector<f64>, p: f64) -> f64 {
    x.iter().map(|v| v.abs().powf(p)).sum()
}

/// `sign(v) |v|^e` with `sign(0) := 0`, so the subgradient used at zero is 0.
pub fn signed_power(v: f64, e: f64) -> f64 {
    if v == 0.0 {
        0.0
    } else {
        v.signum() * v.abs().powf(e)
    }
}

/// Number of entries with `|x_i| > tol`.
pub fn support_size(x: &na::DVector<f64>, tol: f64) -> usize {
    x.iter().filter(|v| v.abs() > tol).count()
}

/// A random underdetermined system with a known sparse solution.
#[derive(Debug, Clone)]
pub struct GeneratedProblem {
    pub a: na::DMatrix<f64>,
    pub b: na::DVector<f64>,
    pub x_true: na::DVector<f64>,
}

fn unit_gaussian_column(m: usize, seed: u64) -> Vec<f64> {
    let mut rng = rand::rngs::SmallRng::seed_from_u64(seed);
    let mut values: Vec<f64> = (0..m).map(|_| rng.sample(StandardNormal)).collect();
    let norm = values.iter().map(|x| x * x).sum::<f64>().sqrt();
    if norm > 0.0 {
        values.iter_mut().for_each(|x| *x /= norm);
    }
    values
}

/// Generates `A` (m×n) with unit-norm standard normal columns, a `k`-sparse
/// `x_true` with standard normal non-zeros, and `b = A x_true`.
///
/// Column `j` is drawn from its own generator seeded with `seed + j + 1`, so
/// the output does not depend on whether the `rayon` feature is enabled.
///
/// # Example
///
/// ```rust
/// # use sparse_uls_core::utils::random_problem;
/// let problem = random_problem(3, 6, 2, 42).unwrap();
/// assert_eq!(problem.a.shape(), (3, 6));
/// assert_eq!(problem.x_true.iter().filter(|v| **v != 0.0).count(), 2);
/// ```
pub fn random_problem(m: usize, n: usize, k: usize, seed: u64) -> UlsResult<GeneratedProblem> {
    if m == 0 || n == 0 {
        return Err(UlsError::InvalidShape(format!(
            "Problem needs at least one row and one column, got {}x{}",
            m, n
        )));
    }
    if k > n {
        return Err(UlsError::InvalidInput(format!(
            "Cannot place {} non-zeros in a vector of length {}",
            k, n
        )));
    }

    let column_seed = |j: usize| seed.wrapping_add(j as u64 + 1);

    #[cfg(feature = "rayon")]
    let columns: Vec<Vec<f64>> = (0..n)
        .into_par_iter()
        .map(|j| unit_gaussian_column(m, column_seed(j)))
        .collect();

    #[cfg(not(feature = "rayon"))]
    let columns: Vec<Vec<f64>> = (0..n)
        .map(|j| unit_gaussian_column(m, column_seed(j)))
        .collect();

    let mut a = na::DMatrix::<f64>::zeros(m, n);
    for (j, column) in columns.into_iter().enumerate() {
        a.column_mut(j).copy_from_slice(&column);
    }

    let mut rng = rand::rngs::SmallRng::seed_from_u64(seed);
    let mut x_true = na::DVector::<f64>::zeros(n);
    let indices = rand::seq::index::sample(&mut rng, n, k).into_vec();
    for idx in indices {
        // A zero draw would silently shrink the support
        let mut value: f64 = rng.sample(StandardNormal);
        while value == 0.0 {
            value = rng.sample(StandardNormal);
        }
        x_true[idx] = value;
    }

    let b = &a * &x_true;
    Ok(GeneratedProblem { a, b, x_true })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_system_order_of_checks() {
        let square = na::DMatrix::<f64>::identity(5, 5);
        let b = na::DVector::<f64>::zeros(5);
        assert_eq!(
            validate_system(&square, &b),
            Err(UlsError::Underdetermined { rows: 5, cols: 5 })
        );

        let wide = na::DMatrix::<f64>::zeros(2, 4);
        let short_b = na::DVector::<f64>::zeros(3);
        assert!(matches!(validate_system(&wide, &short_b), Err(UlsError::InvalidShape(_))));

        let empty = na::DMatrix::<f64>::zeros(0, 4);
        let empty_b = na::DVector::<f64>::zeros(0);
        assert!(matches!(validate_system(&empty, &empty_b), Err(UlsError::InvalidShape(_))));
    }

    #[test]
    fn test_validate_system_rejects_nan() {
        let mut a = na::DMatrix::<f64>::zeros(1, 3);
        a[(0, 1)] = f64::NAN;
        let b = na::DVector::from_vec(vec![1.0]);
        assert!(matches!(validate_system(&a, &b), Err(UlsError::InvalidInput(_))));
    }

    #[test]
    fn test_validate_norm() {
        assert!(validate_norm(0.5, 0.0).is_ok());
        assert!(validate_norm(0.0, 0.0).is_err());
        assert!(validate_norm(f64::INFINITY, 0.0).is_err());
        assert!(validate_norm(1.0, 1.0).is_ok());
        assert_eq!(validate_norm(0.5, 1.0), Err(UlsError::InvalidNorm(0.5)));
    }

    #[test]
    fn test_signed_power_is_zero_at_zero() {
        assert_eq!(signed_power(0.0, 0.0), 0.0);
        assert_eq!(signed_power(-2.0, 2.0), -4.0);
        assert_eq!(signed_power(3.0, 0.0), 1.0);
    }

    #[test]
    fn test_random_problem_is_reproducible() {
        let first = random_problem(4, 10, 3, 7).unwrap();
        let second = random_problem(4, 10, 3, 7).unwrap();
        assert_eq!(first.a, second.a);
        assert_eq!(first.x_true, second.x_true);
        assert_eq!(support_size(&first.x_true, 0.0), 3);
        for j in 0..10 {
            assert!((first.a.column(j).norm() - 1.0).abs() < 1e-12);
        }
        assert!((&first.a * &first.x_true - &first.b).norm() < 1e-12);
    }

    #[test]
    fn test_random_problem_rejects_dense_support() {
        assert!(random_problem(2, 3, 4, 0).is_err());
    }
}
