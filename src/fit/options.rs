//! Construction options for [`FitEngine`](super::FitEngine).

use ndarray::Array1;

use crate::lm::LmConfig;
use crate::odr::OdrConfig;

/// Options accepted by [`FitEngine::with_options`](super::FitEngine::with_options).
#[derive(Debug, Clone)]
pub struct FitOptions {
    /// Per-sample uncertainty of x. Default: all ones
    pub x_err: Option<Array1<f64>>,

    /// Per-sample uncertainty of y. Default: all ones
    pub y_err: Option<Array1<f64>>,

    /// Print the fit summary to stdout after each fit. Default: true
    pub verbose: bool,

    /// Number of points in the default evaluation grid. Default: 1000
    pub eval_points: usize,

    /// Least-squares solver settings
    pub lm: LmConfig,

    /// Orthogonal-distance solver settings
    pub odr: OdrConfig,
}

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            x_err: None,
            y_err: None,
            verbose: true,
            eval_points: 1000,
            lm: LmConfig::default(),
            odr: OdrConfig::default(),
        }
    }
}

impl FitOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_x_err(mut self, x_err: Array1<f64>) -> Self {
        self.x_err = Some(x_err);
        self
    }

    pub fn with_y_err(mut self, y_err: Array1<f64>) -> Self {
        self.y_err = Some(y_err);
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn with_eval_points(mut self, eval_points: usize) -> Self {
        self.eval_points = eval_points;
        self
    }

    pub fn with_lm_config(mut self, lm: LmConfig) -> Self {
        self.lm = lm;
        self
    }

    pub fn with_odr_config(mut self, odr: OdrConfig) -> Self {
        self.odr = odr;
        self
    }
}
