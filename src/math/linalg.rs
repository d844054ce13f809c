//! Dense symmetric-positive-definite solves for the fit core.
//!
//! The minimizer repeatedly solves damped normal equations
//! `(JᵀJ + λI) δ = -Jᵀr`, and the covariance extraction inverts `JᵀJ` once at
//! the converged parameters. Both matrices are symmetric positive definite
//! when the fit is well posed, so Cholesky factorization is the right tool:
//! it is fast for the small parameter counts involved and its failure doubles
//! as the positive-definiteness check the error handling relies on.

use nalgebra::{DMatrix, DVector};

/// Solve `A x = b` for symmetric positive definite `A`.
///
/// Returns `None` if the factorization fails (not positive definite) or the
/// solution is non-finite.
pub fn solve_spd(a: &DMatrix<f64>, b: &DVector<f64>) -> Option<DVector<f64>> {
    let chol = a.clone().cholesky()?;
    let x = chol.solve(b);
    if x.iter().all(|v| v.is_finite()) {
        Some(x)
    } else {
        None
    }
}

/// Invert a symmetric positive definite matrix.
///
/// Returns `None` if the factorization fails or the inverse is non-finite.
pub fn invert_spd(a: &DMatrix<f64>) -> Option<DMatrix<f64>> {
    let chol = a.clone().cholesky()?;
    let inv = chol.inverse();
    if inv.iter().all(|v| v.is_finite()) {
        Some(inv)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn solve_spd_simple_system() {
        // [[4, 2], [2, 2]] x = [8, 5] has solution x = [1.5, 1.0].
        let a = DMatrix::from_row_slice(2, 2, &[4.0, 2.0, 2.0, 2.0]);
        let b = DVector::from_row_slice(&[8.0, 5.0]);
        let x = solve_spd(&a, &b).unwrap();
        assert!((x[0] - 1.5).abs() < 1e-12);
        assert!((x[1] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn solve_spd_rejects_indefinite_matrix() {
        let a = DMatrix::from_row_slice(2, 2, &[-1.0, 0.0, 0.0, 1.0]);
        let b = DVector::from_row_slice(&[1.0, 1.0]);
        assert!(solve_spd(&a, &b).is_none());
    }

    #[test]
    fn invert_spd_roundtrip() {
        let a = DMatrix::from_row_slice(2, 2, &[3.0, 1.0, 1.0, 2.0]);
        let inv = invert_spd(&a).unwrap();
        let eye = &a * &inv;
        assert!((eye[(0, 0)] - 1.0).abs() < 1e-12);
        assert!((eye[(1, 1)] - 1.0).abs() < 1e-12);
        assert!(eye[(0, 1)].abs() < 1e-12);
    }
}
