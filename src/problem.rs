//! Problem definition trait and the curve-fitting residual adapter.
//!
//! This module defines the `Problem` trait, which represents a nonlinear
//! least squares problem to be solved with the Levenberg-Marquardt algorithm,
//! and `CurveProblem`, which turns a model plus weighted data into one.

use ndarray::{Array1, Array2};

use crate::error::{FitError, Result};
use crate::model::Model;

/// A trait representing a nonlinear least squares problem.
///
/// This trait defines the interface for problems that can be solved using
/// the Levenberg-Marquardt algorithm.
pub trait Problem: Sync {
    /// Evaluate the residuals at the given parameters.
    ///
    /// # Arguments
    ///
    /// * `params` - The parameter values at which to evaluate the residuals
    ///
    /// # Returns
    ///
    /// * A vector of residuals, or an error if the evaluation fails
    fn eval(&self, params: &Array1<f64>) -> Result<Array1<f64>>;

    /// Get the number of parameters in the problem.
    fn parameter_count(&self) -> usize;

    /// Get the number of residuals in the problem.
    fn residual_count(&self) -> usize;

    /// Evaluate the Jacobian matrix at the given parameters.
    ///
    /// The Jacobian is the matrix of partial derivatives of the residuals with respect
    /// to the parameters. The default implementation uses forward finite differences.
    fn jacobian(&self, params: &Array1<f64>) -> Result<Array2<f64>>
    where
        Self: Sized,
    {
        crate::utils::finite_difference::jacobian(self, params, None)
    }

    /// Check if this problem provides a custom Jacobian implementation.
    ///
    /// If this returns true, the optimizer will use the `jacobian` method
    /// provided by the problem. If false, the optimizer is free to pick its own
    /// finite-difference scheme (for instance a parallel one).
    fn has_custom_jacobian(&self) -> bool {
        false
    }

    /// Evaluate the sum of squared residuals at the given parameters.
    fn eval_cost(&self, params: &Array1<f64>) -> Result<f64> {
        let residuals = self.eval(params)?;
        Ok(residuals.iter().map(|r| r.powi(2)).sum())
    }
}

/// Weighted residuals of a model against `(x, y, sigma_y)` data.
///
/// residual_i = (f(x_i; p) - y_i) / sigma_i
///
/// The sum of squares of these residuals is the chi-square of the fit.
pub struct CurveProblem<'a, M: Model + ?Sized> {
    model: &'a M,
    x: &'a Array1<f64>,
    y: &'a Array1<f64>,
    sigma: &'a Array1<f64>,
    n_params: usize,
}

impl<'a, M: Model + ?Sized> CurveProblem<'a, M> {
    /// Create the residual adapter. `n_params` is the length of the
    /// parameter vector the model reads.
    pub fn new(
        model: &'a M,
        x: &'a Array1<f64>,
        y: &'a Array1<f64>,
        sigma: &'a Array1<f64>,
        n_params: usize,
    ) -> Self {
        Self {
            model,
            x,
            y,
            sigma,
            n_params,
        }
    }
}

impl<'a, M: Model + ?Sized> Problem for CurveProblem<'a, M> {
    fn eval(&self, params: &Array1<f64>) -> Result<Array1<f64>> {
        let predicted = self.model.eval(self.x, params);
        if predicted.len() != self.y.len() {
            return Err(FitError::FunctionEvaluation(format!(
                "model '{}' returned {} values for {} x values",
                self.model.name(),
                predicted.len(),
                self.x.len()
            )));
        }
        Ok((&predicted - self.y) / self.sigma)
    }

    fn parameter_count(&self) -> usize {
        self.n_params
    }

    fn residual_count(&self) -> usize {
        self.y.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    fn line(x: &Array1<f64>, p: &Array1<f64>) -> Array1<f64> {
        x.mapv(|v| p[0] * v + p[1])
    }

    #[test]
    fn test_curve_problem_residuals() {
        let x = array![1.0, 2.0, 3.0];
        let y = array![2.0, 4.0, 6.0];
        let sigma = array![1.0, 2.0, 0.5];
        let problem = CurveProblem::new(&line, &x, &y, &sigma, 2);

        assert_eq!(problem.parameter_count(), 2);
        assert_eq!(problem.residual_count(), 3);

        let r = problem.eval(&array![2.0, 0.0]).unwrap();
        for v in r.iter() {
            assert_relative_eq!(*v, 0.0, epsilon = 1e-12);
        }

        // f = x, so residual = (x - 2x) / sigma
        let r = problem.eval(&array![1.0, 0.0]).unwrap();
        assert_relative_eq!(r[0], -1.0, epsilon = 1e-12);
        assert_relative_eq!(r[1], -1.0, epsilon = 1e-12);
        assert_relative_eq!(r[2], -6.0, epsilon = 1e-12);

        assert_relative_eq!(problem.eval_cost(&array![1.0, 0.0]).unwrap(), 38.0, epsilon = 1e-12);
    }

    #[test]
    fn test_curve_problem_jacobian() {
        let x = array![1.0, 2.0, 3.0];
        let y = array![0.0, 0.0, 0.0];
        let sigma = array![1.0, 1.0, 2.0];
        let problem = CurveProblem::new(&line, &x, &y, &sigma, 2);

        let jac = problem.jacobian(&array![1.5, -0.5]).unwrap();
        assert_eq!(jac.shape(), &[3, 2]);
        for i in 0..3 {
            assert_relative_eq!(jac[[i, 0]], x[i] / sigma[i], epsilon = 1e-6);
            assert_relative_eq!(jac[[i, 1]], 1.0 / sigma[i], epsilon = 1e-6);
        }
    }

    #[test]
    fn test_wrong_output_length() {
        let short = |_x: &Array1<f64>, _p: &Array1<f64>| array![1.0];
        let x = array![1.0, 2.0];
        let y = array![1.0, 2.0];
        let sigma = array![1.0, 1.0];
        let problem = CurveProblem::new(&short, &x, &y, &sigma, 1);

        match problem.eval(&array![1.0]) {
            Err(FitError::FunctionEvaluation(_)) => (),
            other => panic!("Expected FunctionEvaluation, got {:?}", other),
        }
    }
}
