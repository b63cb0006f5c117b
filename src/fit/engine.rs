//! The fitting session: data, model, parameters and the two fit strategies.

use ndarray::{Array1, Array2};

use crate::error::{FitError, Result};
use crate::lm::{LevenbergMarquardt, LmConfig};
use crate::model::Model;
use crate::odr::{OdrConfig, OdrData, OdrFunction, OrthogonalDistance};
use crate::problem::CurveProblem;
use crate::uncertainty::{chi_square, correlation_matrix, covariance_from_jacobian, UncertaintyCalculator};

use super::diagnostics::{FitDiagnostics, FitMethod, FitReport, FitState, FitSummary};
use super::options::FitOptions;

/// Presents an x-first [`Model`] in the parameters-first order the
/// orthogonal-distance solver calls.
struct ParamsFirst<'a, M: Model + ?Sized>(&'a M);

impl<M: Model + ?Sized> OdrFunction for ParamsFirst<'_, M> {
    fn call(&self, beta: &Array1<f64>, x: &Array1<f64>) -> Array1<f64> {
        self.0.eval(x, beta)
    }
}

/// A curve-fitting session.
///
/// Holds immutable data and a model, plus the parameter vector that each
/// fit call moves from its current value to the new estimate. A second fit
/// starts from the result of the first; [`reset`](Self::reset) goes back to
/// the initial guess.
///
/// # Examples
///
/// ```
/// use curvefit_rs::fit::{FitEngine, FitOptions};
/// use ndarray::{array, Array1};
///
/// fn line(x: &Array1<f64>, p: &Array1<f64>) -> Array1<f64> {
///     x.mapv(|v| p[0] * v + p[1])
/// }
///
/// let x = array![0.0, 1.0, 2.0, 3.0, 4.0];
/// let y = array![1.0, 3.0, 5.0, 7.0, 9.0];
/// let options = FitOptions::default().with_verbose(false);
/// let mut engine = FitEngine::with_options(x, y, array![1.0, 0.0], line, options).unwrap();
///
/// assert!(engine.fit_leastsq().unwrap());
/// assert!((engine.parameter_at(0).unwrap() - 2.0).abs() < 1e-6);
/// assert!((engine.parameter_at(1).unwrap() - 1.0).abs() < 1e-6);
/// ```
#[derive(Debug, Clone)]
pub struct FitEngine<M: Model> {
    x: Array1<f64>,
    y: Array1<f64>,
    x_err: Array1<f64>,
    y_err: Array1<f64>,
    y_err_given: bool,
    model: M,
    initial_params: Array1<f64>,
    params: Array1<f64>,
    state: FitState,
    eval_grid: Array1<f64>,
    verbose: bool,
    lm: LmConfig,
    odr: OdrConfig,
}

impl<M: Model> FitEngine<M> {
    /// Engine with unit uncertainties and default options.
    pub fn new(x: Array1<f64>, y: Array1<f64>, p0: Array1<f64>, model: M) -> Result<Self> {
        Self::with_options(x, y, p0, model, FitOptions::default())
    }

    /// Engine with explicit options.
    ///
    /// Fails with `EmptyData` when x or y is empty, `ShapeMismatch` when y or
    /// a supplied uncertainty differs in length from x or when p0 differs
    /// from the model's declared [`parameter_count`](Model::parameter_count),
    /// and `InvalidInput` for an empty initial guess, non-finite data or
    /// non-positive uncertainties.
    pub fn with_options(
        x: Array1<f64>,
        y: Array1<f64>,
        p0: Array1<f64>,
        model: M,
        options: FitOptions,
    ) -> Result<Self> {
        if x.is_empty() || y.is_empty() {
            return Err(FitError::EmptyData);
        }
        let n = x.len();
        check_length("y", n, y.len())?;
        if p0.is_empty() {
            return Err(FitError::InvalidInput(
                "initial parameter vector is empty".to_string(),
            ));
        }
        if let Some(expected) = model.parameter_count() {
            check_length("p0", expected, p0.len())?;
        }
        if x.iter().chain(y.iter()).any(|v| !v.is_finite()) {
            return Err(FitError::InvalidInput(
                "x and y must be finite".to_string(),
            ));
        }
        if options.eval_points == 0 {
            return Err(FitError::InvalidInput(
                "evaluation grid needs at least one point".to_string(),
            ));
        }

        let y_err_given = options.y_err.is_some();
        let x_err = uncertainty("x_err", options.x_err, n)?;
        let y_err = uncertainty("y_err", options.y_err, n)?;

        let (lo, hi) = x
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
        let eval_grid = Array1::linspace(lo, hi, options.eval_points);

        Ok(Self {
            x,
            y,
            x_err,
            y_err,
            y_err_given,
            model,
            initial_params: p0.clone(),
            params: p0,
            state: FitState::Unfitted,
            eval_grid,
            verbose: options.verbose,
            lm: options.lm,
            odr: options.odr,
        })
    }

    /// Ordinary least squares on `(f(x; p) - y) / y_err`, starting from the
    /// current parameters.
    ///
    /// Returns `Ok(true)` when the solver converged and a covariance could
    /// be estimated. On `Ok(false)` the parameters hold the solver's best
    /// estimate and no diagnostics are kept.
    pub fn fit_leastsq(&mut self) -> Result<bool> {
        self.check_determined()?;

        let result = {
            let problem = CurveProblem::new(&self.model, &self.x, &self.y, &self.y_err, self.params.len());
            let mut config = self.lm.clone();
            config.calc_jacobian = true;
            LevenbergMarquardt::with_config(config).minimize(&problem, self.params.clone())?
        };
        self.params = result.params;

        let covariance = match (result.success, &result.jacobian) {
            (true, Some(jacobian)) => estimated(covariance_from_jacobian(jacobian))?,
            _ => None,
        };

        match covariance {
            Some(covariance) => {
                let diagnostics = self.build_diagnostics(
                    FitMethod::LeastSquares,
                    covariance,
                    None,
                    result.iterations,
                    result.func_evals,
                    result.message,
                )?;
                Ok(self.converged(diagnostics))
            }
            None => Ok(self.failed(FitMethod::LeastSquares, &result.message)),
        }
    }

    /// Orthogonal-distance regression weighting y residuals by `1/y_err²`
    /// and x corrections by `1/x_err²`, starting from the current
    /// parameters.
    ///
    /// Reaching the iteration limit counts as non-convergence; every other
    /// stop reason counts as convergence when a covariance is available.
    pub fn fit_odr(&mut self) -> Result<bool> {
        self.check_determined()?;

        let data = OdrData::with_uncertainties(self.x.clone(), self.y.clone(), &self.x_err, &self.y_err)?;
        let result = OrthogonalDistance::with_config(self.odr.clone()).fit(
            &ParamsFirst(&self.model),
            &data,
            self.params.clone(),
        )?;
        self.params = result.beta;

        let message = result.stop_reason.description().to_string();
        match (result.stop_reason.is_converged(), result.cov_beta, result.sd_beta) {
            (true, Some(covariance), Some(standard_errors)) => {
                let diagnostics = self.build_diagnostics(
                    FitMethod::Odr,
                    covariance,
                    Some(standard_errors),
                    result.iterations,
                    result.func_evals,
                    message,
                )?;
                Ok(self.converged(diagnostics))
            }
            _ => Ok(self.failed(FitMethod::Odr, &message)),
        }
    }

    /// Model at the current parameters, on `query` or on the evaluation grid.
    ///
    /// Before any fit this evaluates at the initial guess.
    ///
    /// # Panics
    ///
    /// Whatever the model itself panics on. This is not length-checked: a
    /// model returning the wrong number of values is only reported as an
    /// error by the fit calls.
    pub fn evaluate(&self, query: Option<&Array1<f64>>) -> Array1<f64> {
        match query {
            Some(x) => self.model.eval(x, &self.params),
            None => self.model.eval(&self.eval_grid, &self.params),
        }
    }

    /// The i-th current parameter.
    pub fn parameter_at(&self, index: usize) -> Result<f64> {
        self.params.get(index).copied().ok_or(FitError::IndexOutOfRange {
            index,
            len: self.params.len(),
        })
    }

    /// Number of fitted parameters.
    pub fn parameter_count(&self) -> usize {
        self.params.len()
    }

    /// Unweighted `y - f(x; p)` at the current parameters.
    ///
    /// # Panics
    ///
    /// If the model returns a different number of values than there are
    /// samples. [`fit_leastsq`](Self::fit_leastsq) and
    /// [`fit_odr`](Self::fit_odr) report the same mistake as
    /// `FitError::FunctionEvaluation`.
    pub fn residuals(&self) -> Array1<f64> {
        &self.y - &self.model.eval(&self.x, &self.params)
    }

    /// Restore the initial guess and drop any diagnostics.
    pub fn reset(&mut self) {
        self.params = self.initial_params.clone();
        self.state = FitState::Unfitted;
    }

    /// Sample positions.
    pub fn x(&self) -> &Array1<f64> {
        &self.x
    }

    /// Sample values.
    pub fn y(&self) -> &Array1<f64> {
        &self.y
    }

    /// Uncertainty of x, all ones unless supplied.
    pub fn x_err(&self) -> &Array1<f64> {
        &self.x_err
    }

    /// Uncertainty of y, all ones unless supplied.
    pub fn y_err(&self) -> &Array1<f64> {
        &self.y_err
    }

    /// True when y uncertainties were supplied rather than defaulted.
    pub fn has_y_err(&self) -> bool {
        self.y_err_given
    }

    /// Current parameters: the initial guess, or the latest estimate.
    pub fn params(&self) -> &Array1<f64> {
        &self.params
    }

    /// The guess the engine was built with.
    pub fn initial_params(&self) -> &Array1<f64> {
        &self.initial_params
    }

    /// Evenly spaced points from min(x) to max(x), used by
    /// [`evaluate`](Self::evaluate) without a query.
    pub fn eval_grid(&self) -> &Array1<f64> {
        &self.eval_grid
    }

    /// The fitted model.
    pub fn model(&self) -> &M {
        &self.model
    }

    /// Diagnostics of the last fit, if it converged.
    pub fn diagnostics(&self) -> Option<&FitDiagnostics> {
        match &self.state {
            FitState::Converged(d) => Some(d),
            _ => None,
        }
    }

    /// True when the last fit converged.
    pub fn is_fitted(&self) -> bool {
        matches!(self.state, FitState::Converged(_))
    }

    /// Turn printing of the summary after each fit on or off.
    pub fn set_verbose(&mut self, verbose: bool) {
        self.verbose = verbose;
    }

    /// The printed fit summary.
    pub fn summary(&self) -> FitSummary<'_> {
        FitSummary {
            model: self.model.name(),
            params: &self.params,
            state: &self.state,
        }
    }

    /// Evaluation grid and the model on it, for plotting.
    pub fn curve(&self) -> (&Array1<f64>, Array1<f64>) {
        (&self.eval_grid, self.evaluate(None))
    }

    /// Serializable snapshot of the engine and its last fit.
    pub fn report(&self) -> FitReport<'_> {
        FitReport {
            model: self.model.name(),
            samples: self.x.len(),
            initial_params: &self.initial_params,
            params: &self.params,
            converged: self.is_fitted(),
            diagnostics: self.diagnostics(),
        }
    }

    fn check_determined(&self) -> Result<()> {
        if self.x.len() <= self.params.len() {
            return Err(FitError::Underdetermined {
                samples: self.x.len(),
                parameters: self.params.len(),
            });
        }
        Ok(())
    }

    fn build_diagnostics(
        &self,
        method: FitMethod,
        covariance: Array2<f64>,
        standard_errors: Option<Array1<f64>>,
        iterations: usize,
        function_evals: usize,
        message: String,
    ) -> Result<FitDiagnostics> {
        let predicted = self.model.eval(&self.x, &self.params);
        let chisqr = chi_square(&self.y, &predicted, &self.y_err);
        let calc = UncertaintyCalculator::new(self.x.len(), self.params.len(), chisqr)?;

        let standard_errors = match standard_errors {
            Some(se) => se,
            None => calc.scaled_standard_errors(&covariance),
        };
        let correlation = correlation_matrix(&covariance);

        Ok(FitDiagnostics {
            method,
            covariance,
            standard_errors,
            correlation,
            chi_square: calc.chisqr,
            degrees_of_freedom: calc.nfree,
            reduced_chi_square: calc.redchi,
            converged: true,
            iterations,
            function_evals,
            message,
        })
    }

    fn converged(&mut self, diagnostics: FitDiagnostics) -> bool {
        tracing::info!(
            model = self.model.name(),
            method = %diagnostics.method,
            iterations = diagnostics.iterations,
            reduced_chi_square = diagnostics.reduced_chi_square,
            "fit converged"
        );
        self.state = FitState::Converged(diagnostics);
        if self.verbose {
            println!("{}", self.summary());
        }
        true
    }

    fn failed(&mut self, method: FitMethod, message: &str) -> bool {
        tracing::warn!(model = self.model.name(), %method, message, "fit did not converge");
        self.state = FitState::Failed;
        if self.verbose {
            println!("{}", self.summary());
        }
        false
    }
}

fn check_length(what: &'static str, expected: usize, actual: usize) -> Result<()> {
    if expected != actual {
        return Err(FitError::ShapeMismatch {
            what,
            expected,
            actual,
        });
    }
    Ok(())
}

fn uncertainty(what: &'static str, err: Option<Array1<f64>>, n: usize) -> Result<Array1<f64>> {
    let err = match err {
        Some(err) => err,
        None => return Ok(Array1::ones(n)),
    };
    check_length(what, n, err.len())?;
    if err.iter().any(|e| !(e.is_finite() && *e > 0.0)) {
        return Err(FitError::InvalidInput(format!(
            "{} must be positive and finite",
            what
        )));
    }
    Ok(err)
}

/// A rank-deficient covariance is a non-convergence, not an error.
fn estimated(covariance: Result<Array2<f64>>) -> Result<Option<Array2<f64>>> {
    match covariance {
        Ok(cov) => Ok(Some(cov)),
        Err(FitError::SingularMatrix) => Ok(None),
        Err(err) => Err(err),
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

    fn quiet() -> FitOptions {
        FitOptions::default().with_verbose(false)
    }

    #[test]
    fn test_eval_grid_spans_data() {
        let engine = FitEngine::with_options(
            array![3.0, -1.0, 2.0],
            array![0.0, 0.0, 0.0],
            array![1.0, 0.0],
            line,
            quiet().with_eval_points(5),
        )
        .unwrap();

        assert_eq!(engine.eval_grid(), &array![-1.0, 0.0, 1.0, 2.0, 3.0]);
        let (grid, values) = engine.curve();
        assert_eq!(grid.len(), 5);
        assert_eq!(values, grid.mapv(|v| v));
    }

    #[test]
    fn test_uncertainty_validation() {
        let result = FitEngine::with_options(
            array![1.0, 2.0],
            array![1.0, 2.0],
            array![1.0],
            line,
            quiet().with_y_err(array![1.0, 2.0, 3.0]),
        );
        match result {
            Err(FitError::ShapeMismatch { what: "y_err", .. }) => (),
            other => panic!("Expected ShapeMismatch, got {:?}", other.map(|_| ())),
        }

        let result = FitEngine::with_options(
            array![1.0, 2.0],
            array![1.0, 2.0],
            array![1.0],
            line,
            quiet().with_x_err(array![1.0, -2.0]),
        );
        assert!(matches!(result, Err(FitError::InvalidInput(_))));

        let result = FitEngine::with_options(array![1.0], array![1.0], Array1::zeros(0), line, quiet());
        assert!(matches!(result, Err(FitError::InvalidInput(_))));
    }

    #[test]
    fn test_weighted_fit_standard_errors() {
        let x = array![0.0, 1.0, 2.0, 3.0, 4.0, 5.0];
        let y = array![0.9, 3.2, 4.8, 7.1, 9.0, 11.1];
        let sigma = Array1::from_elem(6, 0.5);
        let mut engine =
            FitEngine::with_options(x.clone(), y, array![1.0, 0.0], line, quiet().with_y_err(sigma)).unwrap();

        assert!(engine.fit_leastsq().unwrap());
        let d = engine.diagnostics().unwrap();
        assert_eq!(d.method, FitMethod::LeastSquares);
        assert_eq!(d.degrees_of_freedom, 4);

        // Unscaled covariance of a straight line is sigma² (XᵀX)⁻¹
        let n = x.len() as f64;
        let sx = x.sum();
        let sxx = x.mapv(|v| v * v).sum();
        let det = n * sxx - sx * sx;
        assert_relative_eq!(d.covariance[[0, 0]], 0.25 * n / det, epsilon = 1e-6);
        assert_relative_eq!(d.covariance[[1, 1]], 0.25 * sxx / det, epsilon = 1e-6);

        let expected_se = (d.covariance[[0, 0]] * d.reduced_chi_square).sqrt();
        assert_relative_eq!(d.standard_errors[0], expected_se, epsilon = 1e-12);
        assert_relative_eq!(d.chi_square, d.reduced_chi_square * 4.0, epsilon = 1e-12);
    }

    #[test]
    fn test_reset_restores_initial_guess() {
        let x = array![0.0, 1.0, 2.0, 3.0];
        let y = array![1.0, 3.0, 5.0, 7.0];
        let mut engine = FitEngine::with_options(x, y, array![0.5, 0.5], line, quiet()).unwrap();

        assert!(engine.fit_leastsq().unwrap());
        assert!(engine.is_fitted());
        assert_relative_eq!(engine.params()[0], 2.0, epsilon = 1e-6);

        engine.reset();
        assert!(!engine.is_fitted());
        assert_eq!(engine.params(), &array![0.5, 0.5]);
        assert!(engine.diagnostics().is_none());
    }

    #[test]
    fn test_initial_guess_length_checked_against_model() {
        let result = FitEngine::with_options(
            array![-1.0, 0.0, 1.0, 2.0],
            array![1.0, 9.0, 1.0, 0.5],
            array![1.0, 0.2],
            crate::models::DoubleSlitModel,
            quiet(),
        );
        match result {
            Err(FitError::ShapeMismatch {
                what: "p0",
                expected: 3,
                actual: 2,
            }) => (),
            other => panic!("Expected ShapeMismatch, got {:?}", other.map(|_| ())),
        }

        // Plain functions declare no count, so any non-empty guess is taken
        assert!(FitEngine::with_options(array![0.0, 1.0], array![0.0, 1.0], array![1.0], line, quiet()).is_ok());
    }

    #[test]
    #[should_panic]
    fn test_residuals_panic_on_wrong_model_length() {
        let short = |_: &Array1<f64>, p: &Array1<f64>| array![p[0], p[0]];
        let engine = FitEngine::with_options(array![0.0, 1.0, 2.0], array![0.0, 1.0, 2.0], array![1.0], short, quiet())
            .unwrap();
        let _ = engine.residuals();
    }

    #[test]
    fn test_fit_reports_wrong_model_length() {
        let short = |_: &Array1<f64>, p: &Array1<f64>| array![p[0], p[0]];
        let mut engine =
            FitEngine::with_options(array![0.0, 1.0, 2.0], array![0.0, 1.0, 2.0], array![1.0], short, quiet())
                .unwrap();
        assert!(matches!(engine.fit_leastsq(), Err(FitError::FunctionEvaluation(_))));
    }

    #[test]
    fn test_params_first_adapter() {
        let adapter = ParamsFirst(&line);
        let out = adapter.call(&array![2.0, 1.0], &array![0.0, 1.0, 2.0]);
        assert_eq!(out, array![1.0, 3.0, 5.0]);
    }
}
