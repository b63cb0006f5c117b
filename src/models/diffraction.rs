//! Diffraction patterns.

use crate::model::Model;
use ndarray::Array1;

/// Unnormalized sinc, `sin(u) / u`, with `sinc(0) = 1`.
pub fn sinc(u: f64) -> f64 {
    if u.abs() < 1e-8 {
        // sin(u)/u = 1 - u²/6 + O(u⁴)
        1.0 - u * u / 6.0
    } else {
        u.sin() / u
    }
}

/// Young's double slit: a single-slit envelope modulating two-slit fringes.
///
/// I(x) = a * (sinc(b * x) * cos(c * x))²
///
/// Parameters are `[a, b, c]`: peak intensity, envelope frequency (slit
/// width) and fringe frequency (slit separation).
#[derive(Debug, Clone, Copy, Default)]
pub struct DoubleSlitModel;

impl DoubleSlitModel {
    pub fn new() -> Self {
        Self
    }
}

impl Model for DoubleSlitModel {
    fn eval(&self, x: &Array1<f64>, params: &Array1<f64>) -> Array1<f64> {
        let (a, b, c) = (params[0], params[1], params[2]);
        x.mapv(|v| a * (sinc(b * v) * (c * v).cos()).powi(2))
    }

    fn name(&self) -> &str {
        "double_slit"
    }

    fn parameter_count(&self) -> Option<usize> {
        Some(3)
    }
}
