//! # Uncertainty Calculation
//!
//! This module provides functionality for calculating uncertainties in parameter
//! estimates from nonlinear regression results. It includes:
//!
//! - Covariance matrix estimation from Jacobian matrices
//! - Standard errors and the parameter correlation matrix
//! - Chi-square and reduced chi-square goodness-of-fit statistics

mod covariance;

pub use covariance::{
    correlation_matrix, covariance_from_jacobian, standard_errors_from_covariance,
};

use ndarray::{Array1, Array2, Zip};

use crate::error::{FitError, Result};

/// Chi-square of predictions against data with per-point uncertainties.
///
/// chi2 = Σ ((y_i - f_i) / sigma_i)²
pub fn chi_square(y: &Array1<f64>, predicted: &Array1<f64>, sigma: &Array1<f64>) -> f64 {
    let mut total = 0.0;
    Zip::from(y)
        .and(predicted)
        .and(sigma)
        .for_each(|&yi, &fi, &si| total += ((yi - fi) / si).powi(2));
    total
}

/// Calculator for the goodness-of-fit statistics that scale parameter
/// uncertainties.
#[derive(Debug, Clone)]
pub struct UncertaintyCalculator {
    /// Degrees of freedom (n_points - n_parameters)
    pub nfree: usize,
    /// Chi-square value at minimum
    pub chisqr: f64,
    /// Reduced chi-square (chi^2 / nfree)
    pub redchi: f64,
}

impl UncertaintyCalculator {
    /// Create a new UncertaintyCalculator.
    ///
    /// Fails with `FitError::Underdetermined` when there are no degrees of
    /// freedom left (`ndata <= nparams`).
    pub fn new(ndata: usize, nparams: usize, chisqr: f64) -> Result<Self> {
        if ndata <= nparams {
            return Err(FitError::Underdetermined {
                samples: ndata,
                parameters: nparams,
            });
        }
        let nfree = ndata - nparams;

        Ok(Self {
            nfree,
            chisqr,
            redchi: chisqr / nfree as f64,
        })
    }

    /// Standard errors from an unscaled covariance, multiplied by
    /// sqrt(reduced chi-square).
    pub fn scaled_standard_errors(&self, covar: &Array2<f64>) -> Array1<f64> {
        standard_errors_from_covariance(covar) * self.redchi.sqrt()
    }
}
