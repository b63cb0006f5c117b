//! Polynomial models.

use crate::model::Model;
use ndarray::Array1;

/// A straight line, `y = slope * x + intercept`.
///
/// Parameters are `[slope, intercept]`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LinearModel;

impl LinearModel {
    pub fn new() -> Self {
        Self
    }

    /// Closed-form ordinary least-squares estimate, useful as a starting guess.
    ///
    /// Returns `[0, mean(y)]` when all x values coincide.
    pub fn guess(x: &Array1<f64>, y: &Array1<f64>) -> Array1<f64> {
        let n = x.len().min(y.len()) as f64;
        if n == 0.0 {
            return Array1::zeros(2);
        }
        let mean_x = x.sum() / n;
        let mean_y = y.sum() / n;
        let sxx: f64 = x.iter().map(|v| (v - mean_x).powi(2)).sum();
        let sxy: f64 = x
            .iter()
            .zip(y.iter())
            .map(|(xv, yv)| (xv - mean_x) * (yv - mean_y))
            .sum();

        if sxx == 0.0 {
            return Array1::from_vec(vec![0.0, mean_y]);
        }
        let slope = sxy / sxx;
        Array1::from_vec(vec![slope, mean_y - slope * mean_x])
    }
}

impl Model for LinearModel {
    fn eval(&self, x: &Array1<f64>, params: &Array1<f64>) -> Array1<f64> {
        let (slope, intercept) = (params[0], params[1]);
        x.mapv(|v| slope * v + intercept)
    }

    fn name(&self) -> &str {
        "linear"
    }

    fn parameter_count(&self) -> Option<usize> {
        Some(2)
    }
}

/// A polynomial of fixed degree, `y = c0 + c1*x + ... + cd*x^d`.
///
/// Parameters are the `degree + 1` coefficients in ascending order.
#[derive(Debug, Clone)]
pub struct PolynomialModel {
    degree: usize,
    name: String,
}

impl PolynomialModel {
    pub fn new(degree: usize) -> Self {
        Self {
            degree,
            name: format!("polynomial{}", degree),
        }
    }

    pub fn degree(&self) -> usize {
        self.degree
    }
}

impl Model for PolynomialModel {
    fn eval(&self, x: &Array1<f64>, params: &Array1<f64>) -> Array1<f64> {
        // Horner's scheme, highest coefficient first
        let n = (self.degree + 1).min(params.len());
        x.mapv(|v| (0..n).rev().fold(0.0, |acc, k| acc * v + params[k]))
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn parameter_count(&self) -> Option<usize> {
        Some(self.degree + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn test_linear_eval() {
        let y = LinearModel.eval(&array![0.0, 1.0, 2.0], &array![2.0, -1.0]);
        assert_eq!(y, array![-1.0, 1.0, 3.0]);
    }

    #[test]
    fn test_linear_guess() {
        let x = array![0.0, 1.0, 2.0, 3.0];
        let y = x.mapv(|v| 3.0 * v - 2.0);
        let p = LinearModel::guess(&x, &y);
        assert_relative_eq!(p[0], 3.0, epsilon = 1e-12);
        assert_relative_eq!(p[1], -2.0, epsilon = 1e-12);

        let flat = LinearModel::guess(&array![1.0, 1.0], &array![2.0, 4.0]);
        assert_eq!(flat, array![0.0, 3.0]);
    }

    #[test]
    fn test_polynomial_eval() {
        let quad = PolynomialModel::new(2);
        assert_eq!(quad.parameter_count(), Some(3));
        assert_eq!(quad.name(), "polynomial2");

        // 1 - 3x + 2x^2
        let y = quad.eval(&array![-1.0, 0.0, 2.0], &array![1.0, -3.0, 2.0]);
        assert_eq!(y, array![6.0, 1.0, 3.0]);
    }
}
