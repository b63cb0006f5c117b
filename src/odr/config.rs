//! Configuration options for orthogonal-distance regression.

/// Configuration options for the orthogonal-distance solver.
#[derive(Debug, Clone)]
pub struct OdrConfig {
    /// Maximum number of accepted iterations. Default: 50
    pub max_iterations: usize,

    /// Tolerance for relative reduction of the weighted sum of squares.
    /// Default: sqrt(machine epsilon)
    pub sstol: f64,

    /// Tolerance for relative change of the combined (β, δ) vector.
    /// Default: machine epsilon^(2/3)
    pub partol: f64,

    /// Initial value for the damping parameter. Default: 1e-3
    pub initial_lambda: f64,

    /// Factor by which to increase lambda. Default: 10.0
    pub lambda_up_factor: f64,

    /// Factor by which to decrease lambda. Default: 0.1
    pub lambda_down_factor: f64,

    /// Minimum value for lambda. Default: 1e-10
    pub min_lambda: f64,

    /// Maximum value for lambda. Default: 1e10
    pub max_lambda: f64,
}

impl Default for OdrConfig {
    fn default() -> Self {
        Self {
            max_iterations: 50,
            sstol: f64::EPSILON.sqrt(),
            partol: f64::EPSILON.powf(2.0 / 3.0),
            initial_lambda: 1e-3,
            lambda_up_factor: 10.0,
            lambda_down_factor: 0.1,
            min_lambda: 1e-10,
            max_lambda: 1e10,
        }
    }
}
