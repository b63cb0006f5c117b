//! Orthogonal-distance regression.
//!
//! The solver treats the parameters β and one correction δ_i per sample as
//! unknowns and minimizes
//!
//! S(β, δ) = Σ we_i (f(x_i + δ_i; β) - y_i)² + Σ wd_i δ_i²
//!
//! with damped Gauss-Newton steps. The normal matrix has a dense P×P β-block
//! and a diagonal δ-block, so each step eliminates δ through the Schur
//! complement and only factors a P×P system.

use nalgebra::DMatrix;
use ndarray::{Array1, Array2, Axis, Zip};
use std::fmt;

use crate::error::{FitError, Result};
use crate::lm::convergence::l2_norm;
use crate::uncertainty::covariance_from_jacobian;
use crate::utils::finite_difference::{elementwise_derivative, forward_jacobian};
use crate::utils::matrix_convert::{nalgebra_vec_to_ndarray, ndarray_to_nalgebra, ndarray_vec_to_nalgebra};

use super::config::OdrConfig;

const DAMPING_FLOOR: f64 = 1e-12;

/// A model in the solver's calling order: parameters first, x second.
pub trait OdrFunction: Sync {
    /// Evaluates the model at every x value.
    fn call(&self, beta: &Array1<f64>, x: &Array1<f64>) -> Array1<f64>;
}

impl<F> OdrFunction for F
where
    F: Fn(&Array1<f64>, &Array1<f64>) -> Array1<f64> + Sync,
{
    fn call(&self, beta: &Array1<f64>, x: &Array1<f64>) -> Array1<f64> {
        self(beta, x)
    }
}

/// Samples and their weights. `we` weights the y residuals and `wd` the x
/// corrections; both are inverse variances.
#[derive(Debug, Clone)]
pub struct OdrData {
    pub x: Array1<f64>,
    pub y: Array1<f64>,
    pub we: Array1<f64>,
    pub wd: Array1<f64>,
}

impl OdrData {
    /// Data with unit uncertainty on both axes.
    pub fn new(x: Array1<f64>, y: Array1<f64>) -> Result<Self> {
        let n = x.len();
        Self::with_uncertainties(x, y, &Array1::ones(n), &Array1::ones(n))
    }

    /// Data with per-sample standard deviations, turned into weights
    /// `1 / err²`.
    pub fn with_uncertainties(
        x: Array1<f64>,
        y: Array1<f64>,
        x_err: &Array1<f64>,
        y_err: &Array1<f64>,
    ) -> Result<Self> {
        let n = x.len();
        if n == 0 || y.is_empty() {
            return Err(FitError::EmptyData);
        }
        for (what, len) in [("y", y.len()), ("x_err", x_err.len()), ("y_err", y_err.len())] {
            if len != n {
                return Err(FitError::ShapeMismatch {
                    what,
                    expected: n,
                    actual: len,
                });
            }
        }
        if x_err.iter().chain(y_err.iter()).any(|e| !(e.is_finite() && *e > 0.0)) {
            return Err(FitError::InvalidInput(
                "uncertainties must be positive and finite".to_string(),
            ));
        }

        Ok(Self {
            x,
            y,
            we: y_err.mapv(|e| 1.0 / (e * e)),
            wd: x_err.mapv(|e| 1.0 / (e * e)),
        })
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        self.x.len()
    }

    /// Always false for validated data.
    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }
}

/// Why the orthogonal-distance iteration stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Relative reduction of the sum of squares fell below `sstol`.
    SumOfSquaresConvergence,

    /// Relative change of (β, δ) fell below `partol`.
    ParameterConvergence,

    /// Both of the above held on the same step.
    BothConverged,

    /// `max_iterations` steps were taken without converging.
    IterationLimit,

    /// The damping grew past `max_lambda` without finding a better point.
    NumericalError,
}

impl StopReason {
    /// Every stop reason except the iteration limit counts as convergence.
    pub fn is_converged(&self) -> bool {
        !matches!(self, StopReason::IterationLimit)
    }

    pub fn description(&self) -> &'static str {
        match self {
            StopReason::SumOfSquaresConvergence => "Sum of squares convergence",
            StopReason::ParameterConvergence => "Parameter convergence",
            StopReason::BothConverged => "Both sum of squares and parameter convergence",
            StopReason::IterationLimit => "Iteration limit reached",
            StopReason::NumericalError => "Numerical error: damping limit exceeded",
        }
    }
}

/// Result of an orthogonal-distance fit.
#[derive(Debug, Clone)]
pub struct OdrResult {
    /// Estimated parameters
    pub beta: Array1<f64>,

    /// Estimated x corrections
    pub delta: Array1<f64>,

    /// y residuals f(x + δ; β) - y
    pub eps: Array1<f64>,

    /// Weighted sum of squares at the solution
    pub sum_square: f64,

    /// Contribution of the x corrections to `sum_square`
    pub sum_square_delta: f64,

    /// Contribution of the y residuals to `sum_square`
    pub sum_square_eps: f64,

    /// Residual variance, `sum_square / (N - P)`
    pub res_var: f64,

    /// Unscaled covariance of β, `None` when it is rank-deficient
    pub cov_beta: Option<Array2<f64>>,

    /// Standard errors of β, `sqrt(diag(cov_beta) * res_var)`
    pub sd_beta: Option<Array1<f64>>,

    pub iterations: usize,
    pub func_evals: usize,
    pub stop_reason: StopReason,
}

impl fmt::Display for OdrResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "ODR Result:")?;
        writeln!(f, "  Stop reason: {}", self.stop_reason.description())?;
        writeln!(f, "  Sum of squares: {:.6e}", self.sum_square)?;
        writeln!(f, "  Residual variance: {:.6e}", self.res_var)?;
        writeln!(f, "  Iterations: {}", self.iterations)?;
        writeln!(f, "  Beta: {}", self.beta)?;
        if let Some(sd) = &self.sd_beta {
            writeln!(f, "  Beta std error: {}", sd)?;
        }
        Ok(())
    }
}

/// Residual vectors and cost at one (β, δ).
struct Evaluation {
    predicted: Array1<f64>,
    eps_w: Array1<f64>,
    delta_w: Array1<f64>,
    cost: f64,
}

/// Derivative blocks of the weighted residuals at one (β, δ).
struct Linearization {
    /// sqrt(we) ∂f/∂β, N×P
    j_beta: Array2<f64>,
    /// sqrt(we) ∂f/∂x, one entry per sample
    g_x: Array1<f64>,
    /// Diagonal of the δ-block of JᵀJ, `g_x² + wd`
    d_block: Array1<f64>,
}

/// The orthogonal-distance regression solver.
#[derive(Debug, Clone, Default)]
pub struct OrthogonalDistance {
    config: OdrConfig,
}

impl OrthogonalDistance {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: OdrConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &OdrConfig {
        &self.config
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.config.max_iterations = max_iterations;
        self
    }

    pub fn with_sstol(mut self, sstol: f64) -> Self {
        self.config.sstol = sstol;
        self
    }

    pub fn with_partol(mut self, partol: f64) -> Self {
        self.config.partol = partol;
        self
    }

    /// Fit `func` to `data` starting from `beta0` with all corrections at 0.
    ///
    /// Returns an error for malformed input (empty parameters, fewer samples
    /// than parameters, wrong model output length, non-finite starting
    /// cost). Failing to converge is reported through `stop_reason`.
    pub fn fit<F: OdrFunction + ?Sized>(
        &self,
        func: &F,
        data: &OdrData,
        beta0: Array1<f64>,
    ) -> Result<OdrResult> {
        let n = data.len();
        let p = beta0.len();
        if p == 0 {
            return Err(FitError::InvalidInput("no parameters to fit".to_string()));
        }
        if n <= p {
            return Err(FitError::Underdetermined {
                samples: n,
                parameters: p,
            });
        }

        let sqrt_we = data.we.mapv(f64::sqrt);
        let sqrt_wd = data.wd.mapv(f64::sqrt);

        let mut beta = beta0;
        let mut delta = Array1::<f64>::zeros(n);
        let mut lambda = self.config.initial_lambda;

        let mut current = evaluate(func, data, &sqrt_we, &sqrt_wd, &beta, &delta)?;
        let mut func_evals = 1;
        if !current.cost.is_finite() {
            return Err(FitError::FunctionEvaluation(
                "non-finite residuals at the initial parameters".to_string(),
            ));
        }

        let mut iterations = 0;
        let stop_reason = loop {
            if current.cost == 0.0 {
                break StopReason::SumOfSquaresConvergence;
            }

            let lin = linearize(func, data, &sqrt_we, &beta, &delta, &current.predicted);
            func_evals += p + 2;

            let g_beta = lin.j_beta.t().dot(&current.eps_w);
            let g_delta = &lin.g_x * &current.eps_w + &sqrt_wd * &current.delta_w;
            let a_block = lin.j_beta.t().dot(&lin.j_beta);

            let outcome = loop {
                let (d_beta, d_delta) = match solve_schur(
                    &lin.j_beta,
                    &lin.g_x,
                    &a_block,
                    &lin.d_block,
                    &g_beta,
                    &g_delta,
                    lambda,
                ) {
                    Some(step) => step,
                    None => {
                        lambda *= self.config.lambda_up_factor;
                        if lambda > self.config.max_lambda {
                            break Some(StopReason::NumericalError);
                        }
                        continue;
                    }
                };

                let new_beta = &beta + &d_beta;
                let new_delta = &delta + &d_delta;
                let trial = evaluate(func, data, &sqrt_we, &sqrt_wd, &new_beta, &new_delta)?;
                func_evals += 1;

                let step_norm = (l2_norm(&d_beta).powi(2) + l2_norm(&d_delta).powi(2)).sqrt();
                let norm = (l2_norm(&beta).powi(2) + l2_norm(&delta).powi(2)).sqrt();
                let small_step = step_norm <= self.config.partol * (norm + self.config.partol);

                if trial.cost.is_finite() && trial.cost < current.cost {
                    iterations += 1;
                    let small_reduction =
                        current.cost - trial.cost <= self.config.sstol * current.cost;
                    tracing::debug!(iterations, cost = trial.cost, lambda, "odr step accepted");

                    beta = new_beta;
                    delta = new_delta;
                    current = trial;
                    lambda = (lambda * self.config.lambda_down_factor).max(self.config.min_lambda);

                    break match (small_reduction, small_step) {
                        (true, true) => Some(StopReason::BothConverged),
                        (true, false) => Some(StopReason::SumOfSquaresConvergence),
                        (false, true) => Some(StopReason::ParameterConvergence),
                        (false, false) if iterations >= self.config.max_iterations => {
                            Some(StopReason::IterationLimit)
                        }
                        (false, false) => None,
                    };
                }

                if small_step {
                    break Some(StopReason::ParameterConvergence);
                }
                lambda *= self.config.lambda_up_factor;
                tracing::debug!(lambda, "odr step rejected");
                if lambda > self.config.max_lambda {
                    break Some(StopReason::NumericalError);
                }
            };

            if let Some(reason) = outcome {
                break reason;
            }
        };

        // Covariance of β with δ eliminated at the solution: the reduced
        // normal matrix is Jᵀ diag(wd / D) J.
        let lin = linearize(func, data, &sqrt_we, &beta, &delta, &current.predicted);
        func_evals += p + 2;
        let row_scale = Zip::from(&sqrt_wd)
            .and(&lin.d_block)
            .map_collect(|&s, &d| s / d.sqrt());
        let reduced = &lin.j_beta * &row_scale.view().insert_axis(Axis(1));
        let cov_beta = match covariance_from_jacobian(&reduced) {
            Ok(cov) => Some(cov),
            Err(FitError::SingularMatrix) => None,
            Err(err) => return Err(err),
        };

        let res_var = current.cost / (n - p) as f64;
        let sd_beta = cov_beta
            .as_ref()
            .map(|cov| cov.diag().mapv(|v| (v * res_var).sqrt()));

        let sum_square_eps = current.eps_w.iter().map(|e| e * e).sum();
        let sum_square_delta = current.delta_w.iter().map(|d| d * d).sum();

        Ok(OdrResult {
            eps: &current.predicted - &data.y,
            beta,
            delta,
            sum_square: current.cost,
            sum_square_delta,
            sum_square_eps,
            res_var,
            cov_beta,
            sd_beta,
            iterations,
            func_evals,
            stop_reason,
        })
    }
}

fn evaluate<F: OdrFunction + ?Sized>(
    func: &F,
    data: &OdrData,
    sqrt_we: &Array1<f64>,
    sqrt_wd: &Array1<f64>,
    beta: &Array1<f64>,
    delta: &Array1<f64>,
) -> Result<Evaluation> {
    let shifted = &data.x + delta;
    let predicted = func.call(beta, &shifted);
    if predicted.len() != data.len() {
        return Err(FitError::FunctionEvaluation(format!(
            "model returned {} values for {} x values",
            predicted.len(),
            data.len()
        )));
    }

    let eps_w = sqrt_we * &(&predicted - &data.y);
    let delta_w = sqrt_wd * delta;
    let cost = eps_w.iter().chain(delta_w.iter()).map(|r| r * r).sum();

    Ok(Evaluation {
        predicted,
        eps_w,
        delta_w,
        cost,
    })
}

fn linearize<F: OdrFunction + ?Sized>(
    func: &F,
    data: &OdrData,
    sqrt_we: &Array1<f64>,
    beta: &Array1<f64>,
    delta: &Array1<f64>,
    predicted: &Array1<f64>,
) -> Linearization {
    let shifted = &data.x + delta;
    let jac = forward_jacobian(|b| func.call(b, &shifted), beta, predicted);
    let dfdx = elementwise_derivative(|xv| func.call(beta, xv), &shifted);

    let j_beta = &jac * &sqrt_we.view().insert_axis(Axis(1));
    let g_x = sqrt_we * &dfdx;
    let d_block = Zip::from(&g_x)
        .and(&data.wd)
        .map_collect(|&g, &w| g * g + w);

    Linearization {
        j_beta,
        g_x,
        d_block,
    }
}

/// Solve the damped normal equations of the (β, δ) system by eliminating the
/// diagonal δ-block.
///
/// With A = JᵀJ, G = diag(g_x) and D the δ-block diagonal, both damped as
/// `M_ii + λ·max(M_ii, floor)`:
///
/// (A' - Jᵀ G² D'⁻¹ J) Δβ = -g_β + Jᵀ G D'⁻¹ g_δ
/// Δδ = D'⁻¹ (-g_δ - G J Δβ)
pub(crate) fn solve_schur(
    j_beta: &Array2<f64>,
    g_x: &Array1<f64>,
    a_block: &Array2<f64>,
    d_block: &Array1<f64>,
    g_beta: &Array1<f64>,
    g_delta: &Array1<f64>,
    lambda: f64,
) -> Option<(Array1<f64>, Array1<f64>)> {
    let p = a_block.nrows();
    let d_damped = d_block.mapv(|d| d + lambda * d.max(DAMPING_FLOOR));

    let coupling = Zip::from(g_x).and(&d_damped).map_collect(|&g, &d| g * g / d);
    let weighted = j_beta * &coupling.view().insert_axis(Axis(1));
    let schur = a_block - &j_beta.t().dot(&weighted);

    let mut s: DMatrix<f64> = ndarray_to_nalgebra(&schur);
    for k in 0..p {
        s[(k, k)] += lambda * a_block[[k, k]].max(DAMPING_FLOOR);
    }

    let folded = Zip::from(g_x)
        .and(g_delta)
        .and(&d_damped)
        .map_collect(|&g, &gd, &d| g * gd / d);
    let rhs = j_beta.t().dot(&folded) - g_beta;

    let d_beta = s.cholesky()?.solve(&ndarray_vec_to_nalgebra(&rhs));
    let d_beta = nalgebra_vec_to_ndarray(&d_beta);

    let j_step = j_beta.dot(&d_beta);
    let d_delta = Zip::from(g_delta)
        .and(g_x)
        .and(&j_step)
        .and(&d_damped)
        .map_collect(|&gd, &g, &js, &d| (-gd - g * js) / d);

    if d_beta.iter().chain(d_delta.iter()).all(|v| v.is_finite()) {
        Some((d_beta, d_delta))
    } else {
        None
    }
}
