//! Finite difference methods for numerical differentiation.
//!
//! This module provides functions for computing Jacobians of residual
//! problems and of vector functions, with respect to either the parameters
//! or the independent variable.

use crate::error::{FitError, Result};
use crate::problem::Problem;
use ndarray::{Array1, Array2, Zip};

/// Default step size for finite differences.
pub(crate) const DEFAULT_EPSILON: f64 = 1e-8;

/// Step for perturbing a value of the given magnitude.
pub(crate) fn step_size(value: f64, eps: f64) -> f64 {
    if value.abs() > eps {
        value.abs() * eps
    } else {
        eps
    }
}

/// Compute the Jacobian matrix using forward finite differences.
///
/// The Jacobian is the matrix of partial derivatives of the residuals with
/// respect to the parameters: J[i,j] = ∂residual[i]/∂param[j].
///
/// # Arguments
///
/// * `problem` - The problem to evaluate
/// * `params` - The parameter values at which to evaluate the Jacobian
/// * `epsilon` - The relative step size for finite differences (optional)
pub fn jacobian(
    problem: &dyn Problem,
    params: &Array1<f64>,
    epsilon: Option<f64>,
) -> Result<Array2<f64>> {
    let eps = epsilon.unwrap_or(DEFAULT_EPSILON);
    let n_params = params.len();
    let n_residuals = problem.residual_count();

    let residuals = problem.eval(params)?;
    if residuals.len() != n_residuals {
        return Err(FitError::DimensionMismatch(format!(
            "Expected {} residuals, got {}",
            n_residuals,
            residuals.len()
        )));
    }

    let mut jac = Array2::zeros((n_residuals, n_params));
    for j in 0..n_params {
        let mut params_perturbed = params.clone();
        let eps_j = step_size(params[j], eps);
        params_perturbed[j] += eps_j;

        let residuals_perturbed = problem.eval(&params_perturbed)?;
        Zip::from(jac.column_mut(j))
            .and(&residuals_perturbed)
            .and(&residuals)
            .for_each(|d, &rp, &r| *d = (rp - r) / eps_j);
    }

    Ok(jac)
}

/// Forward-difference Jacobian of a vector function of the parameters,
/// J[i,j] = ∂f_i/∂p_j.
///
/// `f0` is `f(params)`, reused as the base point of every column.
pub fn forward_jacobian<F>(f: F, params: &Array1<f64>, f0: &Array1<f64>) -> Array2<f64>
where
    F: Fn(&Array1<f64>) -> Array1<f64>,
{
    let mut jac = Array2::zeros((f0.len(), params.len()));
    for j in 0..params.len() {
        let mut perturbed = params.clone();
        let eps_j = step_size(params[j], DEFAULT_EPSILON);
        perturbed[j] += eps_j;

        let f1 = f(&perturbed);
        Zip::from(jac.column_mut(j))
            .and(&f1)
            .and(f0)
            .for_each(|d, &a, &b| *d = (a - b) / eps_j);
    }
    jac
}

/// Element-wise derivative of a broadcasting function, d_i = ∂f_i/∂x_i, by
/// central differences.
///
/// `f` must map each x_i independently (as a model does over its
/// independent variable), so the whole vector is shifted at once and the
/// cost is two calls regardless of the number of samples.
pub fn elementwise_derivative<F>(f: F, x: &Array1<f64>) -> Array1<f64>
where
    F: Fn(&Array1<f64>) -> Array1<f64>,
{
    // Optimal central-difference step scales with cbrt(machine epsilon)
    let h = x.mapv(|v| f64::EPSILON.cbrt() * v.abs().max(1.0));
    let forward = f(&(x + &h));
    let backward = f(&(x - &h));

    let mut deriv = Array1::zeros(x.len());
    Zip::from(&mut deriv)
        .and(&forward)
        .and(&backward)
        .and(&h)
        .for_each(|d, &fw, &bw, &hi| *d = (fw - bw) / (2.0 * hi));
    deriv
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    fn cubic(x: &Array1<f64>, p: &Array1<f64>) -> Array1<f64> {
        x.mapv(|v| p[0] * v.powi(3) + p[1] * v)
    }

    #[test]
    fn test_forward_jacobian() {
        let x = array![0.5, 1.0, 2.0];
        let p = array![2.0, -1.0];
        let f0 = cubic(&x, &p);
        let jac = forward_jacobian(|q| cubic(&x, q), &p, &f0);

        assert_eq!(jac.shape(), &[3, 2]);
        for i in 0..3 {
            assert_relative_eq!(jac[[i, 0]], x[i].powi(3), epsilon = 1e-6);
            assert_relative_eq!(jac[[i, 1]], x[i], epsilon = 1e-6);
        }
    }

    #[test]
    fn test_elementwise_derivative() {
        let x = array![-2.0, 0.0, 0.5, 10.0];
        let p = array![2.0, -1.0];
        let d = elementwise_derivative(|xs| cubic(xs, &p), &x);

        for i in 0..x.len() {
            let exact = 6.0 * x[i].powi(2) - 1.0;
            assert_relative_eq!(d[i], exact, epsilon = 1e-6, max_relative = 1e-7);
        }
    }

    #[test]
    fn test_step_size() {
        assert_eq!(step_size(0.0, 1e-8), 1e-8);
        assert_relative_eq!(step_size(-100.0, 1e-8), 1e-6);
    }
}
