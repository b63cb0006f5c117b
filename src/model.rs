//! Model trait and closure adapters.
//!
//! A model is a pure function `f(x, params) -> y` evaluated element-wise over a
//! vector of x values. It is the only interface between the fitting machinery
//! and caller-supplied physics: the fit never inspects the model beyond
//! evaluating it.

use ndarray::Array1;

/// A parametric model `y = f(x; p)` that can be fit to data.
///
/// `eval` must broadcast over `x`, returning one prediction per x value, and
/// must read the parameters positionally. Models must be `Sync` so Jacobian
/// columns can be computed in parallel.
pub trait Model: Sync {
    /// Evaluates the model at every x value using the given parameters.
    fn eval(&self, x: &Array1<f64>, params: &Array1<f64>) -> Array1<f64>;

    /// Identifying name shown in fit summaries.
    fn name(&self) -> &str;

    /// Length of the parameter vector the model reads, when it is fixed.
    ///
    /// An engine rejects an initial guess of any other length. `None`
    /// skips the check.
    fn parameter_count(&self) -> Option<usize> {
        None
    }
}

/// Any plain function or closure with the model signature is a model.
///
/// The name is the function's item name, e.g. `young` for `fn young(..)`.
impl<F> Model for F
where
    F: Fn(&Array1<f64>, &Array1<f64>) -> Array1<f64> + Sync,
{
    fn eval(&self, x: &Array1<f64>, params: &Array1<f64>) -> Array1<f64> {
        self(x, params)
    }

    fn name(&self) -> &str {
        short_type_name(std::any::type_name::<F>())
    }
}

/// Strips the module path from a function's type name. Closures keep their
/// full path since the last segment alone is not informative.
fn short_type_name(full: &str) -> &str {
    match full.rsplit("::").next() {
        Some(last) if !last.starts_with('{') && !last.is_empty() => last,
        _ => full,
    }
}

/// A closure paired with an explicit display name.
///
/// # Examples
///
/// ```
/// use curvefit_rs::model::{Model, NamedModel};
/// use ndarray::{array, Array1};
///
/// let line = NamedModel::new("line", |x: &Array1<f64>, p: &Array1<f64>| {
///     x.mapv(|v| p[0] * v + p[1])
/// });
/// assert_eq!(line.name(), "line");
/// assert_eq!(line.eval(&array![1.0, 2.0], &array![2.0, 1.0]), array![3.0, 5.0]);
/// ```
pub struct NamedModel<F> {
    name: String,
    func: F,
    n_params: Option<usize>,
}

impl<F> NamedModel<F>
where
    F: Fn(&Array1<f64>, &Array1<f64>) -> Array1<f64> + Sync,
{
    /// Wrap `func` under the given name.
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
            n_params: None,
        }
    }

    /// Declare how many parameters `func` reads.
    pub fn with_parameter_count(mut self, n_params: usize) -> Self {
        self.n_params = Some(n_params);
        self
    }
}

impl<F> Model for NamedModel<F>
where
    F: Fn(&Array1<f64>, &Array1<f64>) -> Array1<f64> + Sync,
{
    fn eval(&self, x: &Array1<f64>, params: &Array1<f64>) -> Array1<f64> {
        (self.func)(x, params)
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn parameter_count(&self) -> Option<usize> {
        self.n_params
    }
}
