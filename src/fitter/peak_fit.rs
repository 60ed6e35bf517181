use std::fmt::Display;

use crate::fitter::models::gaussian::{CompositeModel, GaussianComponent, GaussianFitter, GaussianSeed};
use crate::fitter::peak_finder::{PeakFindingSettings, Prominence};

#[derive(Debug, Clone, PartialEq)]
pub enum FitError {
    LengthMismatch { x: usize, y: usize },
    NotEnoughPoints { points: usize, components: usize },
    NonFiniteData,
    Model(String),
    /// Solver termination reason
    NoConvergence(String),
}

impl Display for FitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FitError::LengthMismatch { x, y } => {
                write!(f, "x and y data must have the same length ({x} != {y})")
            }
            FitError::NotEnoughPoints { points, components } => write!(
                f,
                "{points} points are not enough to fit {components} gaussian components"
            ),
            FitError::Model(e) => write!(f, "Failed to build the gaussian model: {e}"),
            FitError::NonFiniteData => write!(f, "The data to fit contains NaN or infinite values"),
            FitError::NoConvergence(reason) => {
                write!(f, "The least-squares fit did not converge: {reason}")
            }
        }
    }
}

impl std::error::Error for FitError {}

#[derive(Debug, Clone, PartialEq)]
pub struct PeakFitSettings {
    pub peaks: PeakFindingSettings,
    pub sigma_seed: f64,
}

impl PeakFitSettings {
    /// Calibration histograms: peaks above a tenth of the maximum, at least
    /// 50 pixels apart, seeded with a 1 cm width.
    pub fn calibration() -> Self {
        Self {
            peaks: PeakFindingSettings::new(Prominence::FractionOfMax(0.1), 50),
            sigma_seed: 0.01,
        }
    }

    /// Cuts through the reduced data. Peaks are kept a sixth of the cut apart.
    pub fn resolution(threshold: Option<f64>, bins: usize) -> Self {
        let prominence = match threshold {
            Some(threshold) => Prominence::Absolute(threshold),
            None => Prominence::None,
        };
        Self {
            peaks: PeakFindingSettings::new(prominence, (bins / 6).max(1)),
            sigma_seed: 0.1,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PeakFit {
    pub model: CompositeModel,
    pub best_fit: Vec<f64>,
}

impl PeakFit {
    pub fn components(&self) -> &[GaussianComponent] {
        &self.model.components
    }
}

/// Detects peaks in `y` and fits one Gaussian per peak, all at once.
/// No peaks gives an empty model and a flat zero curve.
pub fn fit_peaks(x: &[f64], y: &[f64], settings: &PeakFitSettings) -> Result<PeakFit, FitError> {
    let fitter = GaussianFitter::new(x, y)?;

    let seeds: Vec<GaussianSeed> = settings
        .peaks
        .find_peaks(y)
        .into_iter()
        .map(|index| GaussianSeed {
            center: x[index],
            amplitude: y[index],
            sigma: settings.sigma_seed,
        })
        .collect();

    log::debug!("Fitting {} gaussian(s) to {} points", seeds.len(), x.len());

    let model = CompositeModel::new(fitter.fit(&seeds)?);
    let best_fit = model.curve(x);

    Ok(PeakFit { model, best_fit })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn detector_positions() -> Vec<f64> {
        (0..1024)
            .map(|i| -0.45 + 0.9 / 1024.0 * (i as f64 + 0.5))
            .collect()
    }

    fn gaussian(x: f64, amplitude: f64, center: f64, sigma: f64) -> f64 {
        amplitude * (-((x - center).powi(2)) / (2.0 * sigma * sigma)).exp()
    }

    #[test]
    fn test_calibration_fit_two_peaks() {
        let x = detector_positions();
        let y: Vec<f64> = x
            .iter()
            .map(|&x| gaussian(x, 100.0, -0.2, 0.012) + gaussian(x, 60.0, 0.15, 0.015))
            .collect();

        let fit = fit_peaks(&x, &y, &PeakFitSettings::calibration()).unwrap();
        let components = fit.components();

        assert_eq!(components.len(), 2);
        assert_abs_diff_eq!(components[0].center.value, -0.2, epsilon = 1e-6);
        assert_abs_diff_eq!(components[0].sigma.value, 0.012, epsilon = 1e-6);
        assert_abs_diff_eq!(components[1].center.value, 0.15, epsilon = 1e-6);
        assert_abs_diff_eq!(components[1].amplitude.value, 60.0, epsilon = 1e-4);

        for (fitted, data) in fit.best_fit.iter().zip(&y) {
            assert_abs_diff_eq!(*fitted, *data, epsilon = 1e-4);
        }
    }

    #[test]
    fn test_no_peaks_gives_flat_fit() {
        let x = detector_positions();
        let y = vec![0.0; x.len()];

        let fit = fit_peaks(&x, &y, &PeakFitSettings::calibration()).unwrap();
        assert!(fit.components().is_empty());
        assert_eq!(fit.best_fit, vec![0.0; x.len()]);
    }

    #[test]
    fn test_resolution_settings() {
        let settings = PeakFitSettings::resolution(Some(2.5), 80);
        assert_eq!(settings.peaks.min_distance, 13);
        assert_eq!(settings.peaks.prominence, Prominence::Absolute(2.5));
        assert_eq!(settings.sigma_seed, 0.1);

        let tiny = PeakFitSettings::resolution(None, 3);
        assert_eq!(tiny.peaks.min_distance, 1);
        assert_eq!(tiny.peaks.prominence, Prominence::None);
    }
}
