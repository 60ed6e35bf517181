#![warn(clippy::all, rust_2018_idioms)]

//! Calibration and data reduction for prismatic-analyzer neutron spectrometer
//! simulations.
//!
//! Raw McStas ReuterStokes tube events are histogrammed along the tube and
//! fit per calibration energy ([`calibration`]), then every measured tube is
//! pushed through the resulting calibration matrix to get energy transfer,
//! momentum transfer and intensity per final energy ([`reduction`]). The
//! reduced table can be sliced and used for resolution sweeps ([`analysis`]).

pub mod analysis;
pub mod calibration;
pub mod config;
pub mod error;
pub mod fitter;
pub mod histoer;
pub mod instrument;
pub mod io;
pub mod reduction;
pub mod util;

pub use calibration::builder::{Calibration, CalibrationBuilder};
pub use calibration::matrix::CalibrationMatrix;
pub use config::PipelineSettings;
pub use error::{Diagnostic, PrismError};
pub use instrument::geometry::{Instrument, InstrumentKind};
pub use reduction::reducer::{EventReducer, Reduction};
