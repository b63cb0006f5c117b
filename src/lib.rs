//! # curvefit-rs
//!
//! `curvefit-rs` fits parametric models to experimental data and reports the
//! fitted parameters with their uncertainties.
//!
//! The library provides:
//! - [`FitEngine`], a fitting session that runs either nonlinear least squares
//!   (Levenberg-Marquardt) or orthogonal-distance regression
//! - Parameter covariance, standard errors, correlation matrix and reduced
//!   chi-square after every converged fit
//! - A [`Model`] trait implemented by any plain function
//!   `fn(&Array1<f64>, &Array1<f64>) -> Array1<f64>`, plus a few built-in models
//! - Loading of column data files, synthetic data and plotting
//!
//! ## Basic Usage
//!
//! ```
//! use curvefit_rs::{lsq_fit, FitOptions};
//! use ndarray::{array, Array1};
//!
//! fn line(x: &Array1<f64>, p: &Array1<f64>) -> Array1<f64> {
//!     x.mapv(|v| p[0] * v + p[1])
//! }
//!
//! let x = array![0.0, 1.0, 2.0, 3.0, 4.0];
//! let y = array![1.0, 2.0, 3.0, 4.0, 5.0];
//! let fit = lsq_fit(x, y, array![1.0, 1.0], line, FitOptions::default().with_verbose(false)).unwrap();
//!
//! assert!(fit.is_fitted());
//! let diagnostics = fit.diagnostics().unwrap();
//! assert!(diagnostics.reduced_chi_square < 1e-12);
//! ```

pub mod error;
pub mod fit;
pub mod io;
pub mod lm;
pub mod model;
pub mod models;
pub mod odr;
pub mod problem;
pub mod synthetic;
pub mod uncertainty;
pub mod utils;

#[cfg(feature = "plot")]
pub mod plot;

// Re-exports for convenience
pub use error::{FitError, Result};
pub use fit::{lsq_fit, odr_fit, FitDiagnostics, FitEngine, FitMethod, FitOptions};
pub use lm::LevenbergMarquardt;
pub use model::{Model, NamedModel};
pub use odr::OrthogonalDistance;
pub use problem::Problem;

/// Version of the library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
