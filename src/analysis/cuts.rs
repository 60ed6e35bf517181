use polars::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::PrismError;
use crate::fitter::peak_fit::{PeakFit, PeakFitSettings, fit_peaks};
use crate::histoer::histogram::Histogram;
use crate::reduction::event_data::EventColumn;

/// Rows with `variable` strictly inside `center +- half_width`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Window {
    pub variable: String,
    pub center: f64,
    pub half_width: f64,
}

impl Window {
    pub fn new(variable: impl Into<String>, center: f64, half_width: f64) -> Self {
        Self {
            variable: variable.into(),
            center,
            half_width,
        }
    }

    fn expr(&self) -> Expr {
        col(self.variable.as_str())
            .gt(lit(self.center - self.half_width))
            .and(col(self.variable.as_str()).lt(lit(self.center + self.half_width)))
    }
}

pub(crate) fn check_columns<'a>(
    df: &DataFrame,
    names: impl IntoIterator<Item = &'a str>,
) -> Result<(), PrismError> {
    for name in names {
        if df.column(name).is_err() {
            return Err(PrismError::UnknownVariable(name.to_owned()));
        }
    }
    Ok(())
}

pub(crate) fn column_values(df: &DataFrame, name: &str) -> Result<Vec<f64>, PrismError> {
    let column = df
        .column(name)
        .map_err(|_| PrismError::UnknownVariable(name.to_owned()))?;
    Ok(column.f64()?.into_no_null_iter().collect())
}

/// Rows of `df` inside every window
pub fn select(df: &DataFrame, windows: &[Window]) -> Result<DataFrame, PrismError> {
    check_columns(df, windows.iter().map(|w| w.variable.as_str()))?;

    let mut lf = df.clone().lazy();
    for window in windows {
        lf = lf.filter(window.expr());
    }
    Ok(lf.collect()?)
}

#[derive(Debug, Clone, PartialEq)]
pub struct Cut1d {
    pub variable: String,
    pub bin_centers: Vec<f64>,
    pub counts: Vec<f64>,
    pub fit: PeakFit,
}

/// Intensity-weighted histogram of `variable` over the rows inside
/// `windows`, peak-fit with the resolution settings. Bin edges follow
/// `arange(min, max, bin_size)` over `bin_range`, or over the selected data
/// when no range is given.
pub fn cut_1d(
    df: &DataFrame,
    variable: &str,
    bin_size: f64,
    windows: &[Window],
    threshold: Option<f64>,
    bin_range: Option<(f64, f64)>,
) -> Result<Cut1d, PrismError> {
    check_columns(df, [variable, EventColumn::Intensity.name()])?;

    let data = select(df, windows)?;
    let values = column_values(&data, variable)?;
    let intensities = column_values(&data, EventColumn::Intensity.name())?;

    let (min, max) = bin_range.unwrap_or_else(|| {
        values
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(min, max), &v| (min.min(v), max.max(v)))
    });

    let mut histogram = Histogram::from_arange(min, max, bin_size);
    for (&value, &intensity) in values.iter().zip(&intensities) {
        histogram.fill(value, intensity);
    }

    let bin_centers = histogram.get_bin_centers();
    let settings = PeakFitSettings::resolution(threshold, bin_centers.len());
    let fit = match fit_peaks(&bin_centers, &histogram.bins, &settings) {
        Ok(fit) => fit,
        Err(e) => {
            let windows: Vec<String> = windows
                .iter()
                .map(|w| format!("{}={}", w.variable, w.center))
                .collect();
            log::warn!("Fit Failed for {}", windows.join(" "));
            if bin_range.is_some() {
                log::warn!("Please check if your bin range is large enough!");
            }
            return Err(PrismError::Fit(e));
        }
    };

    Ok(Cut1d {
        variable: variable.to_owned(),
        bin_centers,
        counts: histogram.bins,
        fit,
    })
}

/// Scatter points of a slice, sorted by ascending intensity so the
/// strongest points are drawn last.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Cut2d {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub intensity: Vec<f64>,
}

pub fn cut_2d(df: &DataFrame, x_variable: &str, y_variable: &str, window: &Window) -> Result<Cut2d, PrismError> {
    check_columns(df, [x_variable, y_variable, EventColumn::Intensity.name()])?;

    let data = select(df, std::slice::from_ref(window))?;
    let x = column_values(&data, x_variable)?;
    let y = column_values(&data, y_variable)?;
    let intensity = column_values(&data, EventColumn::Intensity.name())?;

    let mut order: Vec<usize> = (0..intensity.len()).collect();
    order.sort_by(|&a, &b| intensity[a].total_cmp(&intensity[b]));

    Ok(Cut2d {
        x: order.iter().map(|&i| x[i]).collect(),
        y: order.iter().map(|&i| y[i]).collect(),
        intensity: order.iter().map(|&i| intensity[i]).collect(),
    })
}
