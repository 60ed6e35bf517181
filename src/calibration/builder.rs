use std::path::{Path, PathBuf};

use nalgebra::{DMatrix, DVector};
use rayon::prelude::*;

use crate::calibration::matrix::CalibrationMatrix;
use crate::error::{Diagnostic, PrismError};
use crate::fitter::peak_fit::{PeakFitSettings, fit_peaks};
use crate::instrument::geometry::{DETECTOR_PIXELS, DetectorRow, Instrument, format_energy};
use crate::io::psd::{PsdError, read_tube_events, tube_file_name};
use crate::util::progress::progress_bar;

// Calibration runs only illuminate the first angular channel
const CALIBRATION_CHANNEL: u32 = 1;

#[derive(Debug, Clone)]
pub struct Calibration {
    pub matrix: CalibrationMatrix,
    pub diagnostics: Vec<Diagnostic>,
}

pub struct CalibrationBuilder<'a> {
    instrument: &'a Instrument,
    folder: PathBuf,
    show_progress: bool,
}

impl<'a> CalibrationBuilder<'a> {
    pub fn new(instrument: &'a Instrument, folder: impl Into<PathBuf>) -> Self {
        Self {
            instrument,
            folder: folder.into(),
            show_progress: false,
        }
    }

    pub fn show_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    /// Fits every calibration energy and normalizes the result. Energies that
    /// cannot be fit keep an all-zero column and are reported in
    /// `Calibration::diagnostics`.
    pub fn build(&self) -> Result<Calibration, PrismError> {
        let calibration_dir = self.instrument.data_path(&self.folder);
        if !calibration_dir.is_dir() {
            return Err(PrismError::MissingDataFolder(calibration_dir));
        }

        let energies = self.instrument.calibration_energies();
        log::info!(
            "Calibrating {} energies from {}",
            energies.len(),
            calibration_dir.display()
        );

        let progress = progress_bar(energies.len(), "Calibrating", self.show_progress);
        let fits: Vec<Result<Vec<f64>, Diagnostic>> = energies
            .par_iter()
            .map(|&energy| {
                let fit = self.fit_energy(&calibration_dir, energy);
                progress.inc(1);
                fit
            })
            .collect();
        progress.finish_and_clear();

        let mut raw = DMatrix::zeros(DETECTOR_PIXELS, energies.len());
        let mut diagnostics = Vec::new();
        for (column, fit) in fits.into_iter().enumerate() {
            match fit {
                Ok(curve) => raw.set_column(column, &DVector::from_vec(curve)),
                Err(diagnostic) => {
                    diagnostic.log();
                    diagnostics.push(diagnostic);
                }
            }
        }

        let matrix = CalibrationMatrix::from_fits(energies, raw)?;
        log::info!(
            "Calibration finished with {} skipped energies",
            diagnostics.len()
        );

        Ok(Calibration {
            matrix,
            diagnostics,
        })
    }

    // Fit curve of one calibration energy, zeroed behind the baffles
    fn fit_energy(&self, calibration_dir: &Path, energy: f64) -> Result<Vec<f64>, Diagnostic> {
        let run_folder = self.instrument.calibration_run_folder(calibration_dir, energy);
        if !run_folder.is_dir() {
            return Err(Diagnostic::MissingGeometryFolder {
                energy,
                path: run_folder,
            });
        }

        let mut histogram = self.instrument.detector_histogram();
        // the top row is one tube short, there is no ReuterStokes2_7
        for row in DetectorRow::ALL {
            for tube in 1..=row.tube_count() {
                let path = run_folder.join(tube_file_name(row.number(), tube, CALIBRATION_CHANNEL));
                match read_tube_events(&path, self.instrument.header_offset()) {
                    Ok(events) => histogram.fill_all(&events),
                    Err(PsdError::Missing(path)) => {
                        log::debug!("No events recorded in {}", path.display());
                    }
                    Err(e) => {
                        return Err(Diagnostic::MalformedEventFile {
                            run: run_folder.clone(),
                            file: path,
                            reason: e.to_string(),
                        });
                    }
                }
            }
        }

        let outside = histogram.underflow + histogram.overflow;
        if outside > 0.0 {
            log::debug!(
                "Ef = {} meV: intensity {outside} fell outside the detector",
                format_energy(energy)
            );
        }

        let positions = histogram.get_bin_centers();
        let fit = fit_peaks(&positions, &histogram.bins, &PeakFitSettings::calibration())
            .map_err(|e| Diagnostic::FitConvergenceFailure {
                context: format!("Ef = {} meV", format_energy(energy)),
                reason: e.to_string(),
            })?;
        log::debug!(
            "Ef = {} meV: {} peak(s)",
            format_energy(energy),
            fit.components().len()
        );

        Ok(positions
            .iter()
            .zip(fit.best_fit)
            .map(|(&position, value)| {
                if self.instrument.in_baffle(position) || value < 0.0 {
                    0.0
                } else {
                    value
                }
            })
            .collect())
    }
}
