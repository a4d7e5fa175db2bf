//! Particular solution and orthonormal null-space basis of an underdetermined
//! system.
//!
//! For `A` (m×n, full row rank) the QR factorization `Aᵀ = Q R` splits
//! `Q = [Q1 | Q2]`: `Q1` spans the row space of `A`, `Q2` its null space. Every
//! solution of `A x = b` is `x_p + Q2 z` with the minimum-norm particular
//! solution `x_p = Q1 R⁻ᵀ b`.
extern crate nalgebra as na;

use serde::{Deserialize, Serialize};

use crate::error::{UlsError, UlsResult};
use crate::utils::validate_system;

/// Output of [`decompose`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NullSpaceDecomposition {
    /// Minimum-norm solution of `A x = b`
    pub x_particular: na::DVector<f64>,
    /// n×(n−m) orthonormal basis of the null space of `A`
    pub q2: na::DMatrix<f64>,
    /// Numerical rank of `A`
    pub rank: usize,
}

impl NullSpaceDecomposition {
    /// Dimension of the null space, `n - m`.
    pub fn nullity(&self) -> usize {
        self.q2.ncols()
    }

    /// `x_p + Q2 z`.
    pub fn point(&self, z: &na::DVector<f64>) -> na::DVector<f64> {
        &self.x_particular + &self.q2 * z
    }
}

/// Orthonormal basis of the orthogonal complement of the column space of
/// `basis`.
///
/// For a c×r input with r < c this returns c×(c−r) orthonormal columns, each
/// orthogonal to every column of `basis`. The full orthogonal factor of a
/// Householder QR is recovered by applying `Qᵀ` to the identity.
/// Rank-deficient inputs still give valid (but fewer than possible)
/// complement vectors.
///
/// # Example
///
/// ```rust
/// # use nalgebra as na;
/// # use sparse_uls_core::nullspace::orthogonal_complement;
/// let v = na::DMatrix::from_column_slice(3, 1, &[1.0, 1.0, 1.0]);
/// let w = orthogonal_complement(&v);
/// assert_eq!(w.shape(), (3, 2));
/// assert!((v.transpose() * &w).norm() < 1e-12);
/// ```
pub fn orthogonal_complement(basis: &na::DMatrix<f64>) -> na::DMatrix<f64> {
    let (c, r) = basis.shape();
    if r == 0 {
        return na::DMatrix::identity(c, c);
    }
    if r >= c {
        return na::DMatrix::zeros(c, 0);
    }
    let qr = basis.clone().qr();
    let mut q_t = na::DMatrix::<f64>::identity(c, c);
    qr.q_tr_mul(&mut q_t);
    q_t.transpose().columns(r, c - r).into_owned()
}

#[cfg(any(feature = "accelerate", feature = "openblas", feature = "netlib"))]
fn singular_values(a: &na::DMatrix<f64>) -> na::DVector<f64> {
    // LAPACK SVD when a backend is available, nalgebra's otherwise
    match nalgebra_lapack::SVD::new(a.clone()) {
        Some(svd) => svd.singular_values,
        None => a.singular_values(),
    }
}

#[cfg(not(any(feature = "accelerate", feature = "openblas", feature = "netlib")))]
fn singular_values(a: &na::DMatrix<f64>) -> na::DVector<f64> {
    a.singular_values()
}

/// Number of singular values of `a` above `tol`.
///
/// The default cutoff is `max(m, n) * eps * sigma_max`.
pub fn numerical_rank(a: &na::DMatrix<f64>, tol: Option<f64>) -> usize {
    if a.is_empty() {
        return 0;
    }
    let sv = singular_values(a);
    let sigma_max = sv.iter().fold(0.0_f64, |m, v| m.max(*v));
    let cutoff = tol.unwrap_or_else(|| a.nrows().max(a.ncols()) as f64 * f64::EPSILON * sigma_max);
    sv.iter().filter(|s| **s > cutoff).count()
}

/// Computes `x_p` and `Q2` for `A x = b`.
///
/// Fails with [`UlsError::RankDeficient`] when the rows of `A` are not
/// linearly independent, since the null space would then be larger than
/// `n - m`.
pub fn decompose(
    a: &na::DMatrix<f64>,
    b: &na::DVector<f64>,
    rank_tolerance: Option<f64>,
) -> UlsResult<NullSpaceDecomposition> {
    validate_system(a, b)?;
    let (m, n) = a.shape();

    let rank = numerical_rank(a, rank_tolerance);
    if rank < m {
        log::debug!("[NullSpace] rank {} below row count {}", rank, m);
        return Err(UlsError::RankDeficient { rank, rows: m });
    }

    let qr = a.transpose().qr();
    let r = qr.r();
    let mut q_t = na::DMatrix::<f64>::identity(n, n);
    qr.q_tr_mul(&mut q_t);
    let q = q_t.transpose();

    // Rᵀ y = b, then x_p = Q1 y
    let y = r
        .transpose()
        .solve_lower_triangular(b)
        .ok_or(UlsError::RankDeficient { rank, rows: m })?;
    let x_particular = q.columns(0, m) * y;
    let q2 = q.columns(m, n - m).into_owned();

    log::debug!(
        "[NullSpace] {}x{} system, rank {}, null space dimension {}",
        m,
        n,
        rank,
        n - m
    );
    Ok(NullSpaceDecomposition {
        x_particular,
        q2,
        rank,
    })
}
