//! Synthetic datasets with Gaussian noise, for demos and tests.

use ndarray::Array1;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};

use crate::error::{FitError, Result};
use crate::model::Model;

/// Add independent zero-mean Gaussian noise with standard deviation `sigma`
/// to every value.
pub fn add_noise<R: Rng + ?Sized>(values: &Array1<f64>, sigma: f64, rng: &mut R) -> Result<Array1<f64>> {
    if sigma == 0.0 {
        return Ok(values.clone());
    }
    let normal = Normal::new(0.0, sigma)
        .map_err(|e| FitError::InvalidInput(format!("noise level {}: {}", sigma, e)))?;
    Ok(values.mapv(|v| v + normal.sample(rng)))
}

/// Model values at `x` plus Gaussian noise, reproducible from `seed`.
pub fn noisy_samples<M: Model + ?Sized>(
    model: &M,
    params: &Array1<f64>,
    x: &Array1<f64>,
    sigma: f64,
    seed: u64,
) -> Result<Array1<f64>> {
    let mut rng = StdRng::seed_from_u64(seed);
    add_noise(&model.eval(x, params), sigma, &mut rng)
}
