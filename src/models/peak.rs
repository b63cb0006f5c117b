//! Peak models for fitting data.
//!
//! Gaussian and Lorentzian line shapes, as used in spectroscopy and
//! diffraction.

use crate::model::Model;
use ndarray::Array1;

/// A Gaussian peak model.
///
/// f(x) = amplitude * exp(-(x - center)² / (2 * sigma²)) + baseline
///
/// Parameters are `[amplitude, center, sigma]`, followed by `baseline` when
/// the model is built with one.
#[derive(Debug, Clone, Copy)]
pub struct GaussianModel {
    with_baseline: bool,
}

impl GaussianModel {
    pub fn new(with_baseline: bool) -> Self {
        Self { with_baseline }
    }

    /// Moment-based starting guess: peak height, y-weighted mean and spread.
    pub fn guess(&self, x: &Array1<f64>, y: &Array1<f64>) -> Array1<f64> {
        let baseline = y.iter().cloned().fold(f64::INFINITY, f64::min);
        let baseline = if self.with_baseline && baseline.is_finite() {
            baseline
        } else {
            0.0
        };
        let heights = y.mapv(|v| (v - baseline).max(0.0));
        let total = heights.sum();
        let amplitude = heights.iter().cloned().fold(0.0, f64::max);

        let (center, sigma) = if total > 0.0 {
            let center = x.iter().zip(heights.iter()).map(|(a, w)| a * w).sum::<f64>() / total;
            let var = x
                .iter()
                .zip(heights.iter())
                .map(|(a, w)| w * (a - center).powi(2))
                .sum::<f64>()
                / total;
            (center, var.sqrt().max(f64::EPSILON))
        } else {
            (0.0, 1.0)
        };

        let mut p = vec![amplitude, center, sigma];
        if self.with_baseline {
            p.push(baseline);
        }
        Array1::from_vec(p)
    }
}

impl Model for GaussianModel {
    fn eval(&self, x: &Array1<f64>, params: &Array1<f64>) -> Array1<f64> {
        let (amplitude, center, sigma) = (params[0], params[1], params[2]);
        let baseline = if self.with_baseline { params[3] } else { 0.0 };
        x.mapv(|v| amplitude * (-(v - center).powi(2) / (2.0 * sigma * sigma)).exp() + baseline)
    }

    fn name(&self) -> &str {
        "gaussian"
    }

    fn parameter_count(&self) -> Option<usize> {
        Some(if self.with_baseline { 4 } else { 3 })
    }
}

/// A Lorentzian (Cauchy) peak model.
///
/// f(x) = amplitude * gamma² / ((x - center)² + gamma²) + baseline
///
/// Parameters are `[amplitude, center, gamma]`, plus `baseline` if enabled.
#[derive(Debug, Clone, Copy)]
pub struct LorentzianModel {
    with_baseline: bool,
}

impl LorentzianModel {
    pub fn new(with_baseline: bool) -> Self {
        Self { with_baseline }
    }
}

impl Model for LorentzianModel {
    fn eval(&self, x: &Array1<f64>, params: &Array1<f64>) -> Array1<f64> {
        let (amplitude, center, gamma) = (params[0], params[1], params[2]);
        let baseline = if self.with_baseline { params[3] } else { 0.0 };
        let g2 = gamma * gamma;
        x.mapv(|v| amplitude * g2 / ((v - center).powi(2) + g2) + baseline)
    }

    fn name(&self) -> &str {
        "lorentzian"
    }

    fn parameter_count(&self) -> Option<usize> {
        Some(if self.with_baseline { 4 } else { 3 })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn test_parameter_counts() {
        assert_eq!(GaussianModel::new(true).parameter_count(), Some(4));
        assert_eq!(GaussianModel::new(false).parameter_count(), Some(3));
        assert_eq!(LorentzianModel::new(true).parameter_count(), Some(4));
    }

    #[test]
    fn test_gaussian_peak_value() {
        let model = GaussianModel::new(true);
        let y = model.eval(&array![2.0, 3.0], &array![5.0, 2.0, 0.5, 1.0]);
        assert_relative_eq!(y[0], 6.0, epsilon = 1e-12);
        assert_relative_eq!(y[1], 5.0 * (-2.0f64).exp() + 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_gaussian_guess() {
        let model = GaussianModel::new(false);
        let x = Array1::linspace(-5.0, 5.0, 201);
        let y = model.eval(&x, &array![3.0, 0.5, 1.2]);
        let p = model.guess(&x, &y);
        assert_relative_eq!(p[0], 3.0, epsilon = 1e-2);
        assert_relative_eq!(p[1], 0.5, epsilon = 1e-2);
        assert_relative_eq!(p[2], 1.2, epsilon = 5e-2);
    }

    #[test]
    fn test_lorentzian_half_width() {
        let model = LorentzianModel::new(false);
        let y = model.eval(&array![1.0, 3.0], &array![4.0, 1.0, 2.0]);
        assert_relative_eq!(y[0], 4.0, epsilon = 1e-12);
        assert_relative_eq!(y[1], 2.0, epsilon = 1e-12);
    }
}
