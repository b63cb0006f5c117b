//! Constructors that fit before returning.

use ndarray::Array1;

use crate::error::Result;
use crate::model::Model;

use super::engine::FitEngine;
use super::options::FitOptions;

/// Build an engine and run [`FitEngine::fit_leastsq`] on it.
///
/// Check [`FitEngine::is_fitted`] on the returned engine before trusting its
/// diagnostics.
pub fn lsq_fit<M: Model>(
    x: Array1<f64>,
    y: Array1<f64>,
    p0: Array1<f64>,
    model: M,
    options: FitOptions,
) -> Result<FitEngine<M>> {
    let mut engine = FitEngine::with_options(x, y, p0, model, options)?;
    engine.fit_leastsq()?;
    Ok(engine)
}

/// Build an engine and run [`FitEngine::fit_odr`] on it.
pub fn odr_fit<M: Model>(
    x: Array1<f64>,
    y: Array1<f64>,
    p0: Array1<f64>,
    model: M,
    options: FitOptions,
) -> Result<FitEngine<M>> {
    let mut engine = FitEngine::with_options(x, y, p0, model, options)?;
    engine.fit_odr()?;
    Ok(engine)
}
