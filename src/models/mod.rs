//! Built-in model implementations for common fitting problems.
//!
//! These are conveniences: any function with the signature
//! `fn(&Array1<f64>, &Array1<f64>) -> Array1<f64>` is already a
//! [`Model`](crate::model::Model).

mod diffraction;
mod peak;
mod polynomial;

pub use diffraction::{sinc, DoubleSlitModel};
pub use peak::{GaussianModel, LorentzianModel};
pub use polynomial::{LinearModel, PolynomialModel};
