use std::path::{Path, PathBuf};

use polars::prelude::DataFrame;
use rayon::prelude::*;

use crate::calibration::matrix::CalibrationMatrix;
use crate::error::{Diagnostic, PrismError};
use crate::instrument::geometry::{CHANNEL_SPACING, DetectorRow, Instrument};
use crate::io::psd::{PsdError, read_tube_events, tube_file_name};
use crate::io::run_params::{RunParameterError, RunParameters};
use crate::reduction::event_data::ReducedEvents;
use crate::util::progress::progress_bar;

#[derive(Debug, Clone, Default)]
pub struct Reduction {
    pub events: ReducedEvents,
    pub diagnostics: Vec<Diagnostic>,
}

impl Reduction {
    pub fn to_dataframe(&self) -> Result<DataFrame, PrismError> {
        self.events.to_dataframe()
    }
}

enum RunOutcome {
    Reduced(ReducedEvents),
    Skipped(Diagnostic),
}

/// Turns raw tube events into physical coordinates by pushing every tube
/// histogram through the calibration matrix.
pub struct EventReducer<'a> {
    instrument: &'a Instrument,
    calibration: &'a CalibrationMatrix,
    show_progress: bool,
}

impl<'a> EventReducer<'a> {
    pub fn new(instrument: &'a Instrument, calibration: &'a CalibrationMatrix) -> Self {
        Self {
            instrument,
            calibration,
            show_progress: false,
        }
    }

    pub fn show_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    /// Reduces every run folder below `<path_base>/<folder>`, in name order.
    pub fn reduce(&self, folder: impl AsRef<Path>) -> Result<Reduction, PrismError> {
        let data_dir = self.instrument.data_path(folder);
        if !data_dir.is_dir() {
            return Err(PrismError::MissingDataFolder(data_dir));
        }

        let mut entries: Vec<PathBuf> = std::fs::read_dir(&data_dir)?
            .map(|entry| entry.map(|entry| entry.path()))
            .collect::<Result<_, _>>()?;
        entries.sort();

        let runs: Vec<PathBuf> = entries
            .into_iter()
            .filter(|path| {
                if path.is_dir() {
                    true
                } else {
                    log::warn!("{} is not a folder!", path.display());
                    false
                }
            })
            .collect();

        log::info!("Reducing {} runs from {}", runs.len(), data_dir.display());

        let progress = progress_bar(runs.len(), "Runs read", self.show_progress);
        let outcomes = runs
            .par_iter()
            .map(|run| {
                let outcome = self.reduce_run(run);
                progress.inc(1);
                outcome
            })
            .collect::<Result<Vec<RunOutcome>, PrismError>>()?;
        progress.finish_and_clear();

        let mut reduction = Reduction::default();
        for outcome in outcomes {
            match outcome {
                RunOutcome::Reduced(events) => reduction.events.append(events),
                RunOutcome::Skipped(diagnostic) => {
                    diagnostic.log();
                    reduction.diagnostics.push(diagnostic);
                }
            }
        }

        log::info!(
            "Reduced {} events, skipped {} runs",
            reduction.events.len(),
            reduction.diagnostics.len()
        );

        Ok(reduction)
    }

    fn reduce_run(&self, run: &Path) -> Result<RunOutcome, PrismError> {
        let params = match RunParameters::from_run_folder(run) {
            Ok(params) => params,
            Err(RunParameterError::Missing(_)) => {
                return Ok(RunOutcome::Skipped(Diagnostic::MissingParameterFile {
                    run: run.to_path_buf(),
                }));
            }
            Err(e) => {
                return Ok(RunOutcome::Skipped(Diagnostic::IncompleteRunParameters {
                    run: run.to_path_buf(),
                    reason: e.to_string(),
                }));
            }
        };

        let mut events = ReducedEvents::default();
        for row in DetectorRow::ALL {
            for channel in 1..=self.instrument.angular_channels() {
                for (index, offset) in self.instrument.tube_angular_offsets(row).iter().enumerate() {
                    let path = run.join(tube_file_name(row.number(), index as u32 + 1, channel));
                    let tube_events = match read_tube_events(&path, self.instrument.header_offset()) {
                        Ok(tube_events) => tube_events,
                        Err(PsdError::Missing(_)) => continue,
                        Err(e) => {
                            return Ok(RunOutcome::Skipped(Diagnostic::MalformedEventFile {
                                run: run.to_path_buf(),
                                file: path,
                                reason: e.to_string(),
                            }));
                        }
                    };

                    // each channel is rotated 7.5 deg further than the last
                    let two_theta =
                        params.two_theta_base - offset + (channel - 1) as f64 * CHANNEL_SPACING;

                    let mut histogram = self.instrument.detector_histogram();
                    histogram.fill_all(&tube_events);
                    let reprojected = self.calibration.reproject(&histogram.bins)?;

                    events.push_tube(&params, two_theta, self.calibration.energies(), &reprojected);
                }
            }
        }

        Ok(RunOutcome::Reduced(events))
    }
}
