//! Parallel finite differences.
//!
//! Jacobian columns are independent, so they are computed with Rayon when a
//! single model evaluation is expensive enough to be worth the threads.

use ndarray::{Array1, Array2};
use rayon::prelude::*;

use super::finite_difference::{step_size, DEFAULT_EPSILON};
use crate::error::{FitError, Result};
use crate::problem::Problem;

/// Compute the Jacobian matrix using forward finite differences in parallel.
///
/// Same result as [`jacobian`](super::finite_difference::jacobian), with each
/// column evaluated on the Rayon thread pool.
pub fn jacobian_parallel(
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

    let columns: Result<Vec<Array1<f64>>> = (0..n_params)
        .into_par_iter()
        .map(|j| {
            let mut params_perturbed = params.clone();
            let eps_j = step_size(params[j], eps);
            params_perturbed[j] += eps_j;

            let residuals_perturbed = problem.eval(&params_perturbed)?;
            Ok((&residuals_perturbed - &residuals) / eps_j)
        })
        .collect();

    let mut jac = Array2::zeros((n_residuals, n_params));
    for (j, column) in columns?.into_iter().enumerate() {
        jac.column_mut(j).assign(&column);
    }

    Ok(jac)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::problem::CurveProblem;
    use crate::utils::finite_difference::jacobian;
    use approx::assert_relative_eq;
    use ndarray::array;

    fn exp_decay(x: &Array1<f64>, p: &Array1<f64>) -> Array1<f64> {
        x.mapv(|v| p[0] * (-p[1] * v).exp() + p[2])
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let x = Array1::linspace(0.0, 5.0, 40);
        let y = exp_decay(&x, &array![3.0, 0.7, 0.2]);
        let sigma = Array1::ones(40);
        let problem = CurveProblem::new(&exp_decay, &x, &y, &sigma, 3);

        let p = array![2.5, 0.5, 0.0];
        let seq = jacobian(&problem, &p, None).unwrap();
        let par = jacobian_parallel(&problem, &p, None).unwrap();

        assert_eq!(seq.shape(), par.shape());
        for (a, b) in seq.iter().zip(par.iter()) {
            assert_relative_eq!(*a, *b, epsilon = 1e-12);
        }
    }
}
