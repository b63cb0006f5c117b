//! curvefit CLI

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use curvefit_rs::fit::{FitEngine, FitOptions};
use curvefit_rs::io::Dataset;
use curvefit_rs::lm::LmConfig;
use curvefit_rs::model::Model;
use curvefit_rs::models::{DoubleSlitModel, GaussianModel, LinearModel, LorentzianModel, PolynomialModel};
use curvefit_rs::odr::OdrConfig;
use curvefit_rs::plot::{plot_fit, PlotStyle};
use curvefit_rs::synthetic::noisy_samples;
use ndarray::{array, Array1};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "curvefit")]
#[command(about = "Fit a model to two-column data and plot the result")]
#[command(version)]
struct Cli {
    /// Log verbosity level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    log_level: tracing::Level,

    /// Data file with columns x, y[, y_err[, x_err]]. Synthetic double-slit
    /// data is generated when omitted.
    input: Option<PathBuf>,

    /// Model to fit
    #[arg(short, long, value_enum, default_value_t = ModelKind::DoubleSlit)]
    model: ModelKind,

    /// Polynomial degree (with `--model polynomial`)
    #[arg(long, default_value = "2")]
    degree: usize,

    /// Initial parameters, comma separated. Defaults depend on the model.
    #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
    p0: Option<Vec<f64>>,

    /// Fitting strategy
    #[arg(long, value_enum, default_value_t = Method::Leastsq)]
    method: Method,

    /// Maximum solver iterations
    #[arg(long)]
    max_iterations: Option<usize>,

    /// Figure path; the extension picks the format (svg, png, bmp, jpg)
    #[arg(short, long, default_value = "fit.svg")]
    output: PathBuf,

    /// Skip the figure
    #[arg(long)]
    no_plot: bool,

    /// Print the fit report as JSON instead of the text summary
    #[arg(long)]
    json: bool,

    #[arg(long, default_value = "x")]
    x_label: String,

    #[arg(long, default_value = "y")]
    y_label: String,

    /// x axis limits, `lo,hi`
    #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
    xlim: Option<Vec<f64>>,

    /// y axis limits, `lo,hi`
    #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
    ylim: Option<Vec<f64>>,

    /// Noise level of the synthetic data
    #[arg(long, default_value = "0.2")]
    noise: f64,

    /// RNG seed of the synthetic data
    #[arg(long, default_value = "42")]
    seed: u64,
}

#[derive(Clone, Copy, ValueEnum)]
enum ModelKind {
    DoubleSlit,
    Linear,
    Polynomial,
    Gaussian,
    Lorentzian,
}

#[derive(Clone, Copy, ValueEnum)]
enum Method {
    Leastsq,
    Odr,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt().with_max_level(cli.log_level).with_target(false).init();

    let data = match &cli.input {
        Some(path) => Dataset::load(path).with_context(|| format!("loading {}", path.display()))?,
        None => synthetic_double_slit(cli.noise, cli.seed)?,
    };
    tracing::info!(samples = data.len(), "data loaded");

    let p0 = cli.p0.clone().map(Array1::from_vec);
    match cli.model {
        ModelKind::DoubleSlit => run(&cli, data, DoubleSlitModel::new(), p0.unwrap_or_else(|| array![1.0, 0.2, 0.7])),
        ModelKind::Linear => {
            let p0 = p0.unwrap_or_else(|| LinearModel::guess(&data.x, &data.y));
            run(&cli, data, LinearModel::new(), p0)
        }
        ModelKind::Polynomial => {
            let model = PolynomialModel::new(cli.degree);
            let p0 = p0.unwrap_or_else(|| Array1::zeros(cli.degree + 1));
            run(&cli, data, model, p0)
        }
        ModelKind::Gaussian => {
            let model = GaussianModel::new(true);
            let p0 = p0.unwrap_or_else(|| model.guess(&data.x, &data.y));
            run(&cli, data, model, p0)
        }
        ModelKind::Lorentzian => {
            let model = LorentzianModel::new(true);
            let p0 = p0.unwrap_or_else(|| GaussianModel::new(true).guess(&data.x, &data.y));
            run(&cli, data, model, p0)
        }
    }
}

/// Double-slit pattern over [-40, 40] with Gaussian noise.
fn synthetic_double_slit(noise: f64, seed: u64) -> Result<Dataset> {
    let x = Array1::linspace(-40.0, 40.0, 161);
    let y = noisy_samples(&DoubleSlitModel::new(), &array![10.0, 0.15, 0.7], &x, noise, seed)?;
    let y_err = (noise > 0.0).then(|| Array1::from_elem(x.len(), noise));
    Ok(Dataset {
        x,
        y,
        y_err,
        x_err: None,
    })
}

/// Axis limits given as `lo,hi`.
fn limits(flag: &str, values: Option<&[f64]>) -> Result<Option<(f64, f64)>> {
    match values {
        None => Ok(None),
        Some(&[lo, hi]) if lo < hi => Ok(Some((lo, hi))),
        Some(&[lo, hi]) => bail!("--{} needs lo < hi, got {},{}", flag, lo, hi),
        Some(other) => bail!("--{} takes two values `lo,hi`, got {}", flag, other.len()),
    }
}

fn run<M: Model>(cli: &Cli, data: Dataset, model: M, p0: Array1<f64>) -> Result<()> {
    let mut lm = LmConfig::default();
    let mut odr = OdrConfig::default();
    if let Some(max) = cli.max_iterations {
        lm.max_iterations = max;
        odr.max_iterations = max;
    }

    let mut options = FitOptions::default()
        .with_verbose(!cli.json)
        .with_lm_config(lm)
        .with_odr_config(odr);
    if let Some(y_err) = data.y_err {
        options = options.with_y_err(y_err);
    }
    if let Some(x_err) = data.x_err {
        options = options.with_x_err(x_err);
    }

    let mut engine = FitEngine::with_options(data.x, data.y, p0, model, options)?;
    let converged = match cli.method {
        Method::Leastsq => engine.fit_leastsq()?,
        Method::Odr => engine.fit_odr()?,
    };

    if cli.json {
        println!("{}", engine.report().to_json()?);
    }

    if !cli.no_plot {
        let mut style = PlotStyle::default().with_labels(cli.x_label.as_str(), cli.y_label.as_str());
        if let Some((lo, hi)) = limits("xlim", cli.xlim.as_deref())? {
            style = style.with_x_range(lo, hi);
        }
        if let Some((lo, hi)) = limits("ylim", cli.ylim.as_deref())? {
            style = style.with_y_range(lo, hi);
        }
        plot_fit(&engine, &cli.output, &style)?;
    }

    if !converged {
        bail!("fit did not converge");
    }
    Ok(())
}
