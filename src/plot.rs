//! Rendering data and fitted curve to an image file.
//!
//! The output format follows the file extension: `svg` renders a vector
//! image, `png`, `bmp` and `jpg` render a bitmap.

use plotters::coord::Shift;
use plotters::drawing::DrawingAreaErrorKind;
use plotters::prelude::*;
use std::path::Path;

use crate::error::{FitError, Result};
use crate::fit::FitEngine;
use crate::model::Model;

/// Figure size, labels and axis limits.
#[derive(Debug, Clone)]
pub struct PlotStyle {
    pub width: u32,
    pub height: u32,
    pub x_label: String,
    pub y_label: String,
    /// Fixed x limits; derived from the data when `None`
    pub x_range: Option<(f64, f64)>,
    /// Fixed y limits; derived from the data and curve when `None`
    pub y_range: Option<(f64, f64)>,
    pub data_label: String,
    pub fit_label: String,
    pub marker_size: u32,
    pub line_width: u32,
}

impl Default for PlotStyle {
    fn default() -> Self {
        Self {
            width: 800,
            height: 600,
            x_label: "x".to_string(),
            y_label: "y".to_string(),
            x_range: None,
            y_range: None,
            data_label: "Data".to_string(),
            fit_label: "Fit".to_string(),
            marker_size: 4,
            line_width: 2,
        }
    }
}

impl PlotStyle {
    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn with_labels(mut self, x_label: impl Into<String>, y_label: impl Into<String>) -> Self {
        self.x_label = x_label.into();
        self.y_label = y_label.into();
        self
    }

    pub fn with_x_range(mut self, lo: f64, hi: f64) -> Self {
        self.x_range = Some((lo, hi));
        self
    }

    pub fn with_y_range(mut self, lo: f64, hi: f64) -> Self {
        self.y_range = Some((lo, hi));
        self
    }
}

/// Everything the chart needs, computed before any drawing.
struct Figure {
    points: Vec<(f64, f64)>,
    y_err: Option<Vec<f64>>,
    curve: Vec<(f64, f64)>,
    x_range: (f64, f64),
    y_range: (f64, f64),
}

impl Figure {
    fn new<M: Model>(engine: &FitEngine<M>, style: &PlotStyle) -> Self {
        let points: Vec<(f64, f64)> = engine.x().iter().copied().zip(engine.y().iter().copied()).collect();
        let y_err = engine.has_y_err().then(|| engine.y_err().to_vec());
        let (grid, values) = engine.curve();
        let curve: Vec<(f64, f64)> = grid
            .iter()
            .copied()
            .zip(values.iter().copied())
            .filter(|(_, y)| y.is_finite())
            .collect();

        let x_range = style
            .x_range
            .unwrap_or_else(|| padded(points.iter().map(|p| p.0)));
        let y_range = style.y_range.unwrap_or_else(|| {
            let errs = y_err.clone().unwrap_or_else(|| vec![0.0; points.len()]);
            let data = points
                .iter()
                .zip(errs.iter())
                .flat_map(|(&(_, y), &e)| [y - e, y + e]);
            padded(data.chain(curve.iter().map(|p| p.1)))
        });

        Self {
            points,
            y_err,
            curve,
            x_range,
            y_range,
        }
    }
}

/// Bounds of the values widened by 5% on each side.
fn padded(values: impl Iterator<Item = f64>) -> (f64, f64) {
    let (lo, hi) = values
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
    if !lo.is_finite() {
        return (0.0, 1.0);
    }
    if hi <= lo {
        return (lo - 0.5, hi + 0.5);
    }
    let pad = 0.05 * (hi - lo);
    (lo - pad, hi + pad)
}

/// Draw the data and the fitted curve of `engine` to `path`.
pub fn plot_fit<M: Model, P: AsRef<Path>>(engine: &FitEngine<M>, path: P, style: &PlotStyle) -> Result<()> {
    let path = path.as_ref();
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    let figure = Figure::new(engine, style);
    let size = (style.width, style.height);

    match extension.as_str() {
        "svg" => {
            let root = SVGBackend::new(path, size).into_drawing_area();
            draw(root, &figure, style).map_err(|e| FitError::Plot(e.to_string()))?;
        }
        "png" | "bmp" | "jpg" | "jpeg" => {
            let root = BitMapBackend::new(path, size).into_drawing_area();
            draw(root, &figure, style).map_err(|e| FitError::Plot(e.to_string()))?;
        }
        other => return Err(FitError::UnsupportedFormat(other.to_string())),
    }

    tracing::info!(path = %path.display(), "figure saved");
    Ok(())
}

fn draw<DB: DrawingBackend>(
    root: DrawingArea<DB, Shift>,
    figure: &Figure,
    style: &PlotStyle,
) -> std::result::Result<(), DrawingAreaErrorKind<DB::ErrorType>> {
    root.fill(&WHITE)?;

    let (x0, x1) = figure.x_range;
    let (y0, y1) = figure.y_range;
    let mut chart = ChartBuilder::on(&root)
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(50)
        .build_cartesian_2d(x0..x1, y0..y1)?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .disable_y_mesh()
        .x_desc(style.x_label.as_str())
        .y_desc(style.y_label.as_str())
        .draw()?;

    if let Some(errors) = &figure.y_err {
        chart.draw_series(
            figure
                .points
                .iter()
                .zip(errors.iter())
                .map(|(&(x, y), &e)| ErrorBar::new_vertical(x, y - e, y, y + e, BLACK.stroke_width(1), 6)),
        )?;
    }

    let marker = style.marker_size;
    chart
        .draw_series(
            figure
                .points
                .iter()
                .map(|&(x, y)| Circle::new((x, y), marker, BLUE.filled())),
        )?
        .label(style.data_label.as_str())
        .legend(move |(x, y)| Circle::new((x + 10, y), marker, BLUE.filled()));

    chart
        .draw_series(LineSeries::new(
            figure.curve.iter().copied(),
            RED.stroke_width(style.line_width),
        ))?
        .label(style.fit_label.as_str())
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], RED.stroke_width(2)));

    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::UpperRight)
        .background_style(TRANSPARENT)
        .border_style(TRANSPARENT)
        .draw()?;

    root.present()?;
    Ok(())
}
