//! Utility functions and helpers for the curvefit-rs library.

pub mod finite_difference;
pub mod matrix_convert;
pub mod parallel;

pub use finite_difference::{elementwise_derivative, forward_jacobian, jacobian};
pub use matrix_convert::{nalgebra_vec_to_ndarray, ndarray_to_nalgebra, ndarray_vec_to_nalgebra};
pub use parallel::jacobian_parallel;
