//! Orthogonal-distance regression.
//!
//! Fits a model when both x and y carry measurement uncertainty. It drives
//! the `fit_odr` strategy of [`FitEngine`](crate::fit::FitEngine).

pub mod algorithm;
pub mod config;

pub use algorithm::{OdrData, OdrFunction, OdrResult, OrthogonalDistance, StopReason};
pub use config::OdrConfig;
