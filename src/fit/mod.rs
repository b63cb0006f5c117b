//! Curve fitting sessions.
//!
//! [`FitEngine`] stores the data, the model and the current parameters, and
//! runs either ordinary least squares ([`FitEngine::fit_leastsq`]) or
//! orthogonal-distance regression ([`FitEngine::fit_odr`]). After a
//! converged fit it holds the covariance, standard errors, correlation
//! matrix and reduced chi-square of the estimate.
//!
//! [`lsq_fit`] and [`odr_fit`] build an engine and fit it in one call.

mod diagnostics;
mod eager;
mod engine;
mod options;

pub use diagnostics::{FitDiagnostics, FitMethod, FitReport, FitSummary};
pub use eager::{lsq_fit, odr_fit};
pub use engine::FitEngine;
pub use options::FitOptions;
