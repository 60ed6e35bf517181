use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};

use crate::analysis::cuts::{Window, check_columns, column_values, cut_1d};
use crate::error::{Diagnostic, PrismError};
use crate::instrument::geometry::arange;
use crate::reduction::event_data::EventColumn;

/// Resolution of `target_variable` as a function of `sweep_variable`, with a
/// third variable held inside `fixed`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolutionSettings {
    pub sweep_variable: String,
    pub step_size: f64,
    pub target_variable: String,
    pub bin_size: f64,
    pub fixed: Window,
    #[serde(default)]
    pub threshold: Option<f64>,
    #[serde(default)]
    pub bin_range: Option<(f64, f64)>,
    #[serde(default)]
    pub sweep_range: Option<(f64, f64)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResolutionPoint {
    pub x: f64,
    pub fwhm: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    Point(ResolutionPoint),
    /// Nothing to fit, the slice is empty or flat
    NoPeak { step: f64 },
    Skipped(Diagnostic),
}

/// Lazily evaluated sweep. Steps are independent, so the sequence can be
/// walked as many times as needed.
pub struct ResolutionSweep<'a> {
    df: &'a DataFrame,
    settings: ResolutionSettings,
    steps: Vec<f64>,
}

impl<'a> ResolutionSweep<'a> {
    pub fn new(df: &'a DataFrame, settings: ResolutionSettings) -> Result<Self, PrismError> {
        check_columns(
            df,
            [
                settings.sweep_variable.as_str(),
                settings.target_variable.as_str(),
                settings.fixed.variable.as_str(),
                EventColumn::Intensity.name(),
            ],
        )?;
        if let Some(threshold) = settings.threshold.filter(|t| !t.is_finite()) {
            return Err(PrismError::InvalidThreshold(threshold));
        }

        let (start, stop) = match settings.sweep_range {
            Some(range) => range,
            None => column_values(df, &settings.sweep_variable)?
                .iter()
                .fold((f64::INFINITY, f64::NEG_INFINITY), |(min, max), &v| {
                    (min.min(v), max.max(v))
                }),
        };
        let steps = arange(start, stop, settings.step_size);

        Ok(Self {
            df,
            settings,
            steps,
        })
    }

    pub fn steps(&self) -> &[f64] {
        &self.steps
    }

    pub fn settings(&self) -> &ResolutionSettings {
        &self.settings
    }

    /// Cuts the target variable at one sweep value and reports the FWHM of
    /// its single peak
    pub fn evaluate(&self, step: f64) -> Result<StepOutcome, PrismError> {
        let settings = &self.settings;
        let windows = [
            settings.fixed.clone(),
            Window::new(settings.sweep_variable.as_str(), step, settings.step_size / 2.0),
        ];

        let cut = match cut_1d(
            self.df,
            &settings.target_variable,
            settings.bin_size,
            &windows,
            settings.threshold,
            settings.bin_range,
        ) {
            Ok(cut) => cut,
            Err(PrismError::Fit(e)) => {
                let diagnostic = Diagnostic::FitConvergenceFailure {
                    context: format!(
                        "{} at {} = {step}, {} = {}",
                        settings.target_variable,
                        settings.sweep_variable,
                        settings.fixed.variable,
                        settings.fixed.center
                    ),
                    reason: e.to_string(),
                };
                diagnostic.log();
                return Ok(StepOutcome::Skipped(diagnostic));
            }
            Err(e) => return Err(e),
        };

        let outcome = match cut.fit.components() {
            [] => StepOutcome::NoPeak { step },
            [peak] => StepOutcome::Point(ResolutionPoint {
                x: step,
                fwhm: peak.fwhm.value,
            }),
            components => {
                let diagnostic = Diagnostic::AmbiguousResolutionFit {
                    step,
                    components: components.len(),
                };
                diagnostic.log();
                StepOutcome::Skipped(diagnostic)
            }
        };

        Ok(outcome)
    }

    pub fn outcomes(&self) -> impl Iterator<Item = Result<StepOutcome, PrismError>> + '_ {
        self.steps.iter().map(move |&step| self.evaluate(step))
    }

    /// Resolved points only
    pub fn points(&self) -> impl Iterator<Item = ResolutionPoint> + '_ {
        self.outcomes().filter_map(|outcome| match outcome {
            Ok(StepOutcome::Point(point)) => Some(point),
            Ok(_) => None,
            Err(e) => {
                log::error!("Resolution step failed: {e}");
                None
            }
        })
    }

    /// Walks every step, stopping at the first hard error
    pub fn curve(&self) -> Result<ResolutionCurve, PrismError> {
        let mut points = Vec::new();
        for outcome in self.outcomes() {
            if let StepOutcome::Point(point) = outcome? {
                points.push(point);
            }
        }

        Ok(ResolutionCurve {
            sweep_variable: self.settings.sweep_variable.clone(),
            target_variable: self.settings.target_variable.clone(),
            points,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolutionCurve {
    pub sweep_variable: String,
    pub target_variable: String,
    pub points: Vec<ResolutionPoint>,
}

impl ResolutionCurve {
    /// Drops the point nearest to each of `xs`, one point per request
    pub fn without_points(&self, xs: &[f64]) -> Self {
        let mut points = self.points.clone();

        for &x in xs {
            let nearest = points
                .iter()
                .enumerate()
                .fold(None, |best: Option<(usize, f64)>, (index, point)| {
                    let distance = (point.x - x).abs();
                    match best {
                        Some((_, best_distance)) if best_distance <= distance => best,
                        _ => Some((index, distance)),
                    }
                });
            if let Some((index, _)) = nearest {
                points.remove(index);
            }
        }

        Self {
            sweep_variable: self.sweep_variable.clone(),
            target_variable: self.target_variable.clone(),
            points,
        }
    }
}
