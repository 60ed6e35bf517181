use std::error::Error;
use std::fmt::Display;
use std::path::PathBuf;

use polars::error::PolarsError;

use crate::fitter::peak_fit::FitError;
use crate::instrument::geometry::GeometryError;

#[derive(Debug)]
pub enum PrismError {
    Geometry(GeometryError),
    File(std::io::Error),
    DataFrame(PolarsError),
    Config(serde_yaml::Error),
    Fit(FitError),
    MissingDataFolder(PathBuf),
    UnknownVariable(String),
    InvalidThreshold(f64),
    CalibrationShape { rows: usize, columns: usize },
    HistogramLength { expected: usize, found: usize },
}

impl From<GeometryError> for PrismError {
    fn from(err: GeometryError) -> PrismError {
        PrismError::Geometry(err)
    }
}

impl From<std::io::Error> for PrismError {
    fn from(err: std::io::Error) -> PrismError {
        PrismError::File(err)
    }
}

impl From<PolarsError> for PrismError {
    fn from(err: PolarsError) -> PrismError {
        PrismError::DataFrame(err)
    }
}

impl From<serde_yaml::Error> for PrismError {
    fn from(err: serde_yaml::Error) -> PrismError {
        PrismError::Config(err)
    }
}

impl From<FitError> for PrismError {
    fn from(err: FitError) -> PrismError {
        PrismError::Fit(err)
    }
}

impl Display for PrismError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PrismError::Geometry(x) => write!(f, "Instrument geometry error: {x}"),
            PrismError::File(x) => write!(f, "File I/O error: {x}"),
            PrismError::DataFrame(x) => write!(f, "Error using polars: {x}"),
            PrismError::Config(x) => write!(f, "Could not parse the settings file: {x}"),
            PrismError::Fit(x) => write!(f, "Peak fit failed: {x}"),
            PrismError::MissingDataFolder(path) => {
                write!(f, "Data folder {} does not exist", path.display())
            }
            PrismError::UnknownVariable(name) => write!(
                f,
                "'{name}' is not a column of the reduced data. Use one of Ei, Ef, Two Theta, Sample Angle, E, ki, kf, Qx, Qy, Intensity"
            ),
            PrismError::InvalidThreshold(threshold) => write!(
                f,
                "Peak prominence threshold {threshold} is not a finite number"
            ),
            PrismError::CalibrationShape { rows, columns } => write!(
                f,
                "Calibration weights are {rows}x{columns}, which does not match the detector pixels and calibration energies"
            ),
            PrismError::HistogramLength { expected, found } => write!(
                f,
                "Histogram has {found} bins but the calibration expects {expected}"
            ),
        }
    }
}

impl Error for PrismError {}

/// Recoverable per-unit failures. The unit (an energy, a run, a sweep step)
/// is skipped and the pipeline carries on.
#[derive(Debug, Clone, PartialEq)]
pub enum Diagnostic {
    MissingGeometryFolder { energy: f64, path: PathBuf },
    MissingParameterFile { run: PathBuf },
    IncompleteRunParameters { run: PathBuf, reason: String },
    MalformedEventFile { run: PathBuf, file: PathBuf, reason: String },
    FitConvergenceFailure { context: String, reason: String },
    AmbiguousResolutionFit { step: f64, components: usize },
}

impl Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Diagnostic::MissingGeometryFolder { energy, path } => write!(
                f,
                "No calibration data for Ef = {energy} meV, {} does not exist",
                path.display()
            ),
            Diagnostic::MissingParameterFile { run } => write!(
                f,
                "Skipping {}: no parameter file",
                run.display()
            ),
            Diagnostic::IncompleteRunParameters { run, reason } => write!(
                f,
                "Something went wrong defining Ei, Two Theta, and the Sample Angle for {}: {reason}",
                run.display()
            ),
            Diagnostic::MalformedEventFile { run, file, reason } => write!(
                f,
                "Skipping {}: {} is malformed: {reason}",
                run.display(),
                file.display()
            ),
            Diagnostic::FitConvergenceFailure { context, reason } => {
                write!(f, "Fit failed for {context}: {reason}")
            }
            Diagnostic::AmbiguousResolutionFit { step, components } => write!(
                f,
                "Found {components} peaks at {step}, the resolution is ambiguous. Try a different threshold"
            ),
        }
    }
}

impl Diagnostic {
    pub fn log(&self) {
        log::warn!("{self}");
    }
}
