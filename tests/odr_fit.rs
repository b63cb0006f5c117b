//! Orthogonal-distance regression through the FitEngine and directly.

use approx::assert_relative_eq;
use curvefit_rs::fit::{odr_fit, FitEngine, FitMethod, FitOptions};
use curvefit_rs::odr::{OdrConfig, OdrData, OrthogonalDistance, StopReason};
use curvefit_rs::synthetic::noisy_samples;
use curvefit_rs::FitError;
use ndarray::{array, Array1};

fn line(x: &Array1<f64>, p: &Array1<f64>) -> Array1<f64> {
    x.mapv(|v| p[0] * v + p[1])
}

fn decay(x: &Array1<f64>, p: &Array1<f64>) -> Array1<f64> {
    x.mapv(|v| p[0] * (-p[1] * v).exp())
}

fn quiet() -> FitOptions {
    FitOptions::default().with_verbose(false)
}

#[test]
fn test_odr_with_errors_on_both_axes() {
    let x = Array1::linspace(0.0, 4.0, 25);
    let y = noisy_samples(&decay, &array![5.0, 0.8], &x, 0.05, 11).unwrap();
    let options = quiet()
        .with_x_err(Array1::from_elem(25, 0.02))
        .with_y_err(Array1::from_elem(25, 0.05));

    let engine = odr_fit(x, y, array![3.0, 0.5], decay, options).unwrap();
    assert!(engine.is_fitted());

    let d = engine.diagnostics().unwrap();
    assert_eq!(d.method, FitMethod::Odr);
    assert_eq!(d.degrees_of_freedom, 23);
    assert_relative_eq!(engine.params()[0], 5.0, epsilon = 0.15);
    assert_relative_eq!(engine.params()[1], 0.8, epsilon = 0.05);
    for i in 0..2 {
        assert!(d.standard_errors[i] > 0.0);
        assert_relative_eq!(d.correlation[[i, i]], 1.0, epsilon = 1e-12);
    }
    assert_relative_eq!(d.covariance[[0, 1]], d.covariance[[1, 0]], epsilon = 1e-12);
}

#[test]
fn test_odr_matches_leastsq_for_exact_x() {
    let x = array![0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0];
    let y = array![1.2, 2.8, 5.1, 7.2, 8.7, 11.1, 13.2, 14.8];
    let options = quiet().with_x_err(Array1::from_elem(8, 1e-6));

    let mut lsq = FitEngine::with_options(x.clone(), y.clone(), array![1.0, 0.0], line, options.clone()).unwrap();
    let mut odr = FitEngine::with_options(x, y, array![1.0, 0.0], line, options).unwrap();
    assert!(lsq.fit_leastsq().unwrap());
    assert!(odr.fit_odr().unwrap());

    let (dl, dodr) = (lsq.diagnostics().unwrap(), odr.diagnostics().unwrap());
    for i in 0..2 {
        assert_relative_eq!(odr.params()[i], lsq.params()[i], epsilon = 1e-6, max_relative = 1e-6);
        assert_relative_eq!(dodr.standard_errors[i], dl.standard_errors[i], max_relative = 1e-4);
    }
}

#[test]
fn test_odr_iteration_limit_is_non_convergence() {
    let x = Array1::linspace(0.0, 5.0, 30);
    let y = decay(&x, &array![4.0, 1.3]);
    let options = quiet().with_odr_config(OdrConfig {
        max_iterations: 1,
        ..OdrConfig::default()
    });

    let mut engine = FitEngine::with_options(x, y, array![1.0, 0.1], decay, options).unwrap();
    assert!(!engine.fit_odr().unwrap());
    assert!(engine.diagnostics().is_none());
    assert_ne!(engine.params(), &array![1.0, 0.1]);
    assert_eq!(engine.summary().to_string(), "\n --- FIT DID NOT CONVERGE ---\n");
}

#[test]
fn test_odr_after_leastsq_refines() {
    let x = Array1::linspace(-2.0, 2.0, 21);
    let y = noisy_samples(&line, &array![1.5, -0.5], &x, 0.1, 3).unwrap();
    let mut engine = FitEngine::with_options(x, y, array![1.0, 0.0], line, quiet()).unwrap();

    assert!(engine.fit_leastsq().unwrap());
    let lsq_params = engine.params().clone();
    assert!(engine.fit_odr().unwrap());

    // Unit errors on both axes shrink the slope's leverage, not its sign
    assert_eq!(engine.diagnostics().unwrap().method, FitMethod::Odr);
    assert!(engine.params()[0] > 0.0);
    assert!((engine.params()[0] - lsq_params[0]).abs() < 0.5);
}

#[test]
fn test_solver_reports_corrections() {
    let x = array![0.0, 1.0, 2.0, 3.0, 4.0, 5.0];
    let y = array![0.1, 1.9, 4.2, 5.8, 8.1, 9.9];
    let data = OdrData::new(x.clone(), y.clone()).unwrap();

    let result = OrthogonalDistance::new()
        .fit(&|b: &Array1<f64>, x: &Array1<f64>| x.mapv(|v| b[0] * v + b[1]), &data, array![1.0, 0.0])
        .unwrap();

    assert!(result.stop_reason.is_converged());
    assert_ne!(result.stop_reason, StopReason::IterationLimit);
    assert_eq!(result.delta.len(), 6);
    assert_relative_eq!(
        result.sum_square,
        result.sum_square_eps + result.sum_square_delta,
        max_relative = 1e-12
    );
    assert_relative_eq!(result.res_var, result.sum_square / 4.0, max_relative = 1e-12);
    assert!(result.sd_beta.is_some());
}

#[test]
fn test_odr_rejects_bad_uncertainties() {
    let result = FitEngine::with_options(
        array![0.0, 1.0, 2.0],
        array![0.0, 1.0, 2.0],
        array![1.0, 0.0],
        line,
        quiet().with_x_err(array![0.1, 0.0, 0.1]),
    );
    assert!(matches!(result, Err(FitError::InvalidInput(_))));

    assert!(matches!(
        OdrData::with_uncertainties(array![1.0, 2.0], array![1.0, 2.0], &array![1.0], &array![1.0, 1.0]),
        Err(FitError::ShapeMismatch { what: "x_err", .. })
    ));
}
