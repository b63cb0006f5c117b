//! # Covariance Matrix Calculations
//!
//! This module provides functions for calculating and manipulating covariance
//! matrices from Jacobian matrices in nonlinear least-squares optimization.

use ndarray::{Array1, Array2};

use crate::error::{FitError, Result};
use crate::utils::matrix_convert::ndarray_to_nalgebra;

/// Calculate the unscaled covariance matrix from a Jacobian matrix.
///
/// For weighted residuals r = (f - y) / sigma, the covariance of the
/// parameter estimate is
///   covar = inv(J^T * J)
/// which is what the solver reports before any reduced chi-square scaling.
///
/// Computed from the SVD J = U S V^T as V S^-2 V^T. The Jacobian must have
/// full column rank: a singular value below `eps * max(m, n) * s_max`
/// (numerical rank test) yields `FitError::SingularMatrix`.
pub fn covariance_from_jacobian(jacobian: &Array2<f64>) -> Result<Array2<f64>> {
    let (m, n) = jacobian.dim();
    if n == 0 {
        return Err(FitError::DimensionMismatch(
            "Jacobian has no parameter columns".to_string(),
        ));
    }
    if m < n || jacobian.iter().any(|v| !v.is_finite()) {
        return Err(FitError::SingularMatrix);
    }

    let svd = ndarray_to_nalgebra(jacobian).svd(false, true);
    let v_t = svd.v_t.ok_or(FitError::SingularMatrix)?;
    let s = &svd.singular_values;

    let s_max = s.iter().cloned().fold(0.0, f64::max);
    let tol = f64::EPSILON * m.max(n) as f64 * s_max;
    if s.len() < n || s_max == 0.0 || s.iter().any(|&sv| sv <= tol) {
        return Err(FitError::SingularMatrix);
    }

    // V S^-2 V^T, with v_t rows being the right singular vectors
    let mut covar = Array2::zeros((n, n));
    for i in 0..n {
        for j in i..n {
            let mut acc = 0.0;
            for k in 0..s.len() {
                acc += v_t[(k, i)] * v_t[(k, j)] / (s[k] * s[k]);
            }
            covar[[i, j]] = acc;
            covar[[j, i]] = acc;
        }
    }

    Ok(covar)
}

/// Calculate correlation matrix from covariance matrix.
///
/// The correlation matrix is calculated as:
///   correl[i,j] = covar[i,j] / sqrt(covar[i,i] * covar[j,j])
///
/// This normalizes the covariance matrix so that diagonal elements are 1.0,
/// and off-diagonal elements represent correlation coefficients between -1 and 1.
/// Scaling the covariance by any positive factor leaves it unchanged.
pub fn correlation_matrix(covar: &Array2<f64>) -> Array2<f64> {
    let n = covar.nrows();
    let mut correl = Array2::zeros((n, n));

    for i in 0..n {
        for j in 0..n {
            if i == j {
                correl[[i, j]] = 1.0;
            } else {
                let denom = (covar[[i, i]] * covar[[j, j]]).sqrt();
                if denom > 0.0 {
                    correl[[i, j]] = covar[[i, j]] / denom;
                }
            }
        }
    }

    correl
}

/// Extract standard errors from the covariance matrix.
///
/// Standard errors are the square roots of the diagonal elements
/// of the covariance matrix.
pub fn standard_errors_from_covariance(covar: &Array2<f64>) -> Array1<f64> {
    covar.diag().mapv(|v| if v > 0.0 { v.sqrt() } else { 0.0 })
}
