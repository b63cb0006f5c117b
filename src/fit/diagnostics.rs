//! Fit statistics, the printed summary and the serializable report.

use ndarray::{Array1, Array2, Axis};
use serde::Serialize;
use std::fmt;

use crate::error::Result;

/// Strategy that produced a fit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FitMethod {
    /// y-weighted nonlinear least squares (Levenberg-Marquardt)
    LeastSquares,

    /// Orthogonal-distance regression with errors in x and y
    Odr,
}

impl fmt::Display for FitMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FitMethod::LeastSquares => write!(f, "leastsq"),
            FitMethod::Odr => write!(f, "odr"),
        }
    }
}

/// Statistics of a converged fit.
///
/// `covariance` is the unscaled covariance returned by the solver. The
/// standard errors are already scaled: by sqrt(reduced chi-square) for
/// least squares, by the residual variance for ODR.
#[derive(Debug, Clone, Serialize)]
pub struct FitDiagnostics {
    pub method: FitMethod,
    pub covariance: Array2<f64>,
    pub standard_errors: Array1<f64>,
    pub correlation: Array2<f64>,
    pub chi_square: f64,
    pub degrees_of_freedom: usize,
    pub reduced_chi_square: f64,
    pub converged: bool,
    pub iterations: usize,
    pub function_evals: usize,
    pub message: String,
}

impl FitDiagnostics {
    /// Covariance consistent with `standard_errors`:
    /// `correlation[i][j] * se[i] * se[j]`.
    pub fn scaled_covariance(&self) -> Array2<f64> {
        let se = &self.standard_errors;
        let rows = &self.correlation * &se.view().insert_axis(Axis(1));
        &rows * &se.view().insert_axis(Axis(0))
    }
}

/// Where an engine stands after its most recent fit call.
#[derive(Debug, Clone)]
pub(crate) enum FitState {
    Unfitted,
    Converged(FitDiagnostics),
    Failed,
}

/// Human-readable fit summary, rendered through `Display`.
pub struct FitSummary<'a> {
    pub(crate) model: &'a str,
    pub(crate) params: &'a Array1<f64>,
    pub(crate) state: &'a FitState,
}

impl fmt::Display for FitSummary<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.state {
            FitState::Converged(d) => {
                writeln!(f)?;
                writeln!(f, "--- FIT ON FUNCTION {} ---", self.model)?;
                writeln!(f)?;
                writeln!(f, "Fit parameters are {}", self.params)?;
                writeln!(f, "Fit errors are {}", d.standard_errors)?;
                writeln!(f, "Fit covariance")?;
                writeln!(f, "{}", d.covariance)?;
                writeln!(f, "Fit correlation matrix")?;
                writeln!(f, "{}", d.correlation)?;
                writeln!(f, "Reduced chi2 is {}", d.reduced_chi_square)?;
                writeln!(f)
            }
            FitState::Failed => {
                writeln!(f)?;
                writeln!(f, " --- FIT DID NOT CONVERGE ---")
            }
            FitState::Unfitted => {
                writeln!(f)?;
                writeln!(f, "--- FUNCTION {} (not fitted) ---", self.model)?;
                writeln!(f)?;
                writeln!(f, "Parameters are {}", self.params)
            }
        }
    }
}

/// Serializable snapshot of an engine: model name, parameters and, when
/// the last fit converged, its diagnostics.
#[derive(Debug, Serialize)]
pub struct FitReport<'a> {
    pub model: &'a str,
    pub samples: usize,
    pub initial_params: &'a Array1<f64>,
    pub params: &'a Array1<f64>,
    pub converged: bool,
    pub diagnostics: Option<&'a FitDiagnostics>,
}

impl FitReport<'_> {
    /// Pretty-printed JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    fn diagnostics() -> FitDiagnostics {
        FitDiagnostics {
            method: FitMethod::LeastSquares,
            covariance: array![[4.0, 1.0], [1.0, 1.0]],
            standard_errors: array![4.0, 2.0],
            correlation: array![[1.0, 0.5], [0.5, 1.0]],
            chi_square: 12.0,
            degrees_of_freedom: 3,
            reduced_chi_square: 4.0,
            converged: true,
            iterations: 5,
            function_evals: 17,
            message: "Converged: small gradient".to_string(),
        }
    }

    #[test]
    fn test_scaled_covariance() {
        let scaled = diagnostics().scaled_covariance();
        assert_relative_eq!(scaled[[0, 0]], 16.0);
        assert_relative_eq!(scaled[[0, 1]], 4.0);
        assert_relative_eq!(scaled[[1, 0]], 4.0);
        assert_relative_eq!(scaled[[1, 1]], 4.0);
    }

    #[test]
    fn test_summary_layout() {
        let params = array![1.0, 2.0];
        let state = FitState::Converged(diagnostics());
        let text = FitSummary {
            model: "line",
            params: &params,
            state: &state,
        }
        .to_string();

        let order = [
            "--- FIT ON FUNCTION line ---",
            "Fit parameters are",
            "Fit errors are",
            "Fit covariance",
            "Fit correlation matrix",
            "Reduced chi2 is 4",
        ];
        let mut last = 0;
        for needle in order {
            let pos = text[last..]
                .find(needle)
                .unwrap_or_else(|| panic!("missing {:?} in {}", needle, text));
            last += pos + needle.len();
        }

        let failed = FitSummary {
            model: "line",
            params: &params,
            state: &FitState::Failed,
        }
        .to_string();
        assert_eq!(failed, "\n --- FIT DID NOT CONVERGE ---\n");
    }

    #[test]
    fn test_report_json() {
        let params = array![1.0, 2.0];
        let diag = diagnostics();
        let report = FitReport {
            model: "line",
            samples: 5,
            initial_params: &params,
            params: &params,
            converged: true,
            diagnostics: Some(&diag),
        };
        let json = report.to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["model"], "line");
        assert_eq!(value["diagnostics"]["method"], "least_squares");
        assert_eq!(value["diagnostics"]["degrees_of_freedom"], 3);
    }
}
