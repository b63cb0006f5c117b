//! Implementation of the Levenberg-Marquardt algorithm.
//!
//! This module contains the core implementation of the Levenberg-Marquardt algorithm
//! for nonlinear least-squares optimization.

use nalgebra::DMatrix;
use ndarray::{Array1, Array2};
use std::fmt;

use crate::error::{FitError, Result};
use crate::problem::Problem;
use crate::utils::finite_difference;
use crate::utils::matrix_convert::{nalgebra_vec_to_ndarray, ndarray_to_nalgebra, ndarray_vec_to_nalgebra};
use crate::utils::parallel::jacobian_parallel;

use super::config::{DiffMethod, LmConfig};
use super::convergence::{ConvergenceCriteria, ConvergenceStatus};

/// Lower bound on the Marquardt scaling of a parameter, so that parameters the
/// residuals do not depend on still get a positive damping term.
const DAMPING_FLOOR: f64 = 1e-12;

/// Result of the Levenberg-Marquardt optimization.
#[derive(Debug, Clone)]
pub struct LmResult {
    /// Optimized parameter values
    pub params: Array1<f64>,

    /// Residuals at the solution
    pub residuals: Array1<f64>,

    /// Sum of squared residuals
    pub cost: f64,

    /// Number of accepted iterations
    pub iterations: usize,

    /// Number of function evaluations
    pub func_evals: usize,

    /// Why the iteration stopped
    pub status: ConvergenceStatus,

    /// Whether the optimization succeeded
    pub success: bool,

    /// A message describing the result
    pub message: String,

    /// The Jacobian matrix at the solution (if requested)
    pub jacobian: Option<Array2<f64>>,
}

impl fmt::Display for LmResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Optimization Result:")?;
        writeln!(f, "  Success: {}", self.success)?;
        writeln!(f, "  Message: {}", self.message)?;
        writeln!(f, "  Cost: {:.6e}", self.cost)?;
        writeln!(f, "  Iterations: {}", self.iterations)?;
        writeln!(f, "  Function evaluations: {}", self.func_evals)?;
        writeln!(f, "  Parameters: {}", self.params)?;
        Ok(())
    }
}

/// The Levenberg-Marquardt optimizer.
#[derive(Debug, Clone, Default)]
pub struct LevenbergMarquardt {
    /// Configuration options
    config: LmConfig,
}

impl LevenbergMarquardt {
    /// Create a new Levenberg-Marquardt optimizer with default configuration.
    pub fn new() -> Self {
        Self {
            config: LmConfig::default(),
        }
    }

    /// Create a new Levenberg-Marquardt optimizer with the given configuration.
    pub fn with_config(config: LmConfig) -> Self {
        Self { config }
    }

    /// The active configuration.
    pub fn config(&self) -> &LmConfig {
        &self.config
    }

    /// Set the maximum number of iterations.
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.config.max_iterations = max_iterations;
        self
    }

    /// Set the tolerance for change in residual norm.
    pub fn with_ftol(mut self, ftol: f64) -> Self {
        self.config.ftol = ftol;
        self
    }

    /// Set the tolerance for change in parameter values.
    pub fn with_xtol(mut self, xtol: f64) -> Self {
        self.config.xtol = xtol;
        self
    }

    /// Set the tolerance for gradient norm.
    pub fn with_gtol(mut self, gtol: f64) -> Self {
        self.config.gtol = gtol;
        self
    }

    /// Set the initial value for the damping parameter.
    pub fn with_lambda(mut self, lambda: f64) -> Self {
        self.config.initial_lambda = lambda;
        self
    }

    /// Set the method used for calculating the Jacobian.
    pub fn with_differentiation_method(mut self, method: DiffMethod) -> Self {
        self.config.diff_method = method;
        self
    }

    /// Compute finite-difference Jacobians in parallel.
    pub fn with_parallel_jacobian(mut self, parallel: bool) -> Self {
        self.config.parallel_jacobian = parallel;
        self
    }

    /// Set whether to calculate and return the Jacobian at the solution.
    pub fn with_calc_jacobian(mut self, calc_jacobian: bool) -> Self {
        self.config.calc_jacobian = calc_jacobian;
        self
    }

    fn criteria(&self) -> ConvergenceCriteria {
        ConvergenceCriteria::new(
            self.config.xtol,
            self.config.ftol,
            self.config.gtol,
            self.config.max_iterations,
        )
    }

    /// Minimize the sum of squared residuals for the given problem.
    ///
    /// Errors are returned only for malformed problems (wrong parameter count,
    /// non-finite residuals at the starting point). Failing to converge is
    /// reported through `LmResult::success` and `LmResult::status`, with
    /// `params` holding the best point found.
    ///
    /// # Arguments
    ///
    /// * `problem` - The problem to solve
    /// * `initial_params` - Initial guess for the parameter values
    pub fn minimize<P: Problem>(&self, problem: &P, initial_params: Array1<f64>) -> Result<LmResult> {
        let n_params = problem.parameter_count();
        if initial_params.len() != n_params {
            return Err(FitError::DimensionMismatch(format!(
                "Expected {} parameters, got {}",
                n_params,
                initial_params.len()
            )));
        }

        let criteria = self.criteria();
        let mut params = initial_params;
        let mut lambda = self.config.initial_lambda;

        let mut residuals = problem.eval(&params)?;
        let mut func_evals = 1;
        let mut cost = sum_of_squares(&residuals);
        if !cost.is_finite() {
            return Err(FitError::FunctionEvaluation(
                "non-finite residuals at the initial parameters".to_string(),
            ));
        }

        let mut iterations = 0;
        let status = loop {
            if cost == 0.0 {
                break ConvergenceStatus::FunctionValueConvergence;
            }

            let jacobian = self.jacobian(problem, &params)?;
            func_evals += n_params;

            // Gradient of 0.5 * |r|^2 is J^T r
            let gradient = jacobian.t().dot(&residuals);
            if criteria.check_gradient(&gradient) == ConvergenceStatus::GradientConvergence {
                break ConvergenceStatus::GradientConvergence;
            }

            let jtj = jacobian.t().dot(&jacobian);

            let outcome = loop {
                let step = match solve_damped(&jtj, &gradient, lambda) {
                    Some(step) => step,
                    None => {
                        lambda *= self.config.lambda_up_factor;
                        if lambda > self.config.max_lambda {
                            break ConvergenceStatus::NumericalError;
                        }
                        continue;
                    }
                };

                let new_params = &params + &step;
                let new_residuals = problem.eval(&new_params)?;
                func_evals += 1;
                let new_cost = sum_of_squares(&new_residuals);

                if new_cost.is_finite() && new_cost < cost {
                    iterations += 1;
                    let status = criteria.check(&params, &new_params, cost, new_cost, iterations);
                    tracing::debug!(iterations, cost = new_cost, lambda, "lm step accepted");

                    params = new_params;
                    residuals = new_residuals;
                    cost = new_cost;
                    lambda = (lambda * self.config.lambda_down_factor).max(self.config.min_lambda);
                    break status;
                }

                // Rejected: a vanishing step means no nearby point is better
                if criteria.small_step(&params, &step) {
                    break ConvergenceStatus::ParameterConvergence;
                }
                lambda *= self.config.lambda_up_factor;
                tracing::debug!(lambda, "lm step rejected");
                if lambda > self.config.max_lambda {
                    break ConvergenceStatus::NumericalError;
                }
            };

            if outcome.is_terminated() {
                break outcome;
            }
        };

        let jacobian = if self.config.calc_jacobian {
            Some(self.jacobian(problem, &params)?)
        } else {
            None
        };

        Ok(LmResult {
            params,
            residuals,
            cost,
            iterations,
            func_evals,
            status,
            success: status.is_converged(),
            message: status.description().to_string(),
            jacobian,
        })
    }

    fn jacobian<P: Problem>(&self, problem: &P, params: &Array1<f64>) -> Result<Array2<f64>> {
        if self.config.diff_method == DiffMethod::Analytical || problem.has_custom_jacobian() {
            problem.jacobian(params)
        } else if self.config.parallel_jacobian {
            jacobian_parallel(problem, params, None)
        } else {
            finite_difference::jacobian(problem, params, None)
        }
    }
}

fn sum_of_squares(v: &Array1<f64>) -> f64 {
    v.iter().map(|r| r * r).sum()
}

/// Solve the damped normal equations (JᵀJ + λ·D) δ = -Jᵀr.
///
/// D is the diagonal of JᵀJ floored at `DAMPING_FLOOR` (Marquardt scaling).
/// Returns `None` when the system is not positive definite or the step is not
/// finite; the caller then raises λ.
pub(crate) fn solve_damped(jtj: &Array2<f64>, gradient: &Array1<f64>, lambda: f64) -> Option<Array1<f64>> {
    let n = jtj.nrows();
    let mut a: DMatrix<f64> = ndarray_to_nalgebra(jtj);
    for i in 0..n {
        a[(i, i)] += lambda * jtj[[i, i]].max(DAMPING_FLOOR);
    }
    let rhs = -ndarray_vec_to_nalgebra(gradient);

    let step = a.cholesky()?.solve(&rhs);
    if step.iter().all(|v| v.is_finite()) {
        Some(nalgebra_vec_to_ndarray(&step))
    } else {
        None
    }
}
