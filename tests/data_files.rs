//! Data file loading feeding a double-slit fit.

use approx::assert_relative_eq;
use curvefit_rs::fit::{FitEngine, FitOptions};
use curvefit_rs::io::{load_columns, Dataset};
use curvefit_rs::models::DoubleSlitModel;
use curvefit_rs::synthetic::noisy_samples;
use curvefit_rs::FitError;
use ndarray::{array, Array1};
use std::fmt::Write as _;
use std::path::PathBuf;

fn temp_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("curvefit-{}-{}", std::process::id(), name))
}

#[test]
fn test_double_slit_from_file() {
    let p_true = array![10.0, 0.15, 0.7];
    let x = Array1::linspace(-40.0, 40.0, 161);
    let y = noisy_samples(&DoubleSlitModel, &p_true, &x, 0.2, 42).unwrap();

    let mut text = String::from("# x  intensity  sigma\n");
    for (xi, yi) in x.iter().zip(y.iter()) {
        writeln!(text, "{}, {}, 0.2", xi, yi).unwrap();
    }
    let path = temp_path("double_slit.csv");
    std::fs::write(&path, text).unwrap();

    let data = Dataset::load(&path).unwrap();
    std::fs::remove_file(&path).ok();
    assert_eq!(data.len(), 161);
    assert_eq!(data.x, x);
    assert_eq!(data.y, y);
    assert!(data.x_err.is_none());

    let options = FitOptions::default()
        .with_verbose(false)
        .with_y_err(data.y_err.clone().unwrap());
    let mut engine = FitEngine::with_options(data.x, data.y, array![9.0, 0.14, 0.71], DoubleSlitModel, options).unwrap();
    assert!(engine.fit_leastsq().unwrap());

    for i in 0..3 {
        assert_relative_eq!(engine.params()[i], p_true[i], max_relative = 0.02);
    }
    let d = engine.diagnostics().unwrap();
    assert_eq!(d.degrees_of_freedom, 158);
    assert!(d.reduced_chi_square > 0.6 && d.reduced_chi_square < 1.5, "{}", d.reduced_chi_square);
    assert!(engine.summary().to_string().contains("--- FIT ON FUNCTION double_slit ---"));
}

#[test]
fn test_four_column_file() {
    let path = temp_path("four.txt");
    std::fs::write(&path, "1 2 0.1 0.01\n2 4 0.1 0.01\n3 6.1 0.1 0.01 % trailing note\n").unwrap();

    let columns = load_columns(&path).unwrap();
    let data = Dataset::from_columns(&columns).unwrap();
    std::fs::remove_file(&path).ok();

    assert_eq!(columns.dim(), (4, 3));
    assert_eq!(data.y, array![2.0, 4.0, 6.1]);
    assert_eq!(data.y_err, Some(array![0.1, 0.1, 0.1]));
    assert_eq!(data.x_err, Some(array![0.01, 0.01, 0.01]));
}

#[test]
fn test_missing_file_is_io_error() {
    match Dataset::load(temp_path("does-not-exist.dat")) {
        Err(FitError::Io(_)) => (),
        other => panic!("Expected Io error, got {:?}", other),
    }
}
