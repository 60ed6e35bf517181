use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::path::{Path, PathBuf};

use crate::histoer::histogram::Histogram;

// The ReuterStokes tubes have an active length of 0.9 m read out as 1024 pixels
pub const DETECTOR_PIXELS: usize = 1024;
pub const DETECTOR_HALF_LENGTH: f64 = 0.45; // m
pub const CHANNEL_SPACING: f64 = 7.5; // deg between angular channels

// Tube offsets (deg) relative to the center of an angular channel
const BOTTOM_ROW_OFFSETS: [f64; 7] = [-3.33, -2.22, -1.11, 0.0, 1.11, 2.22, 3.33];
const TOP_ROW_OFFSETS: [f64; 6] = [-2.775, -1.665, -0.555, 0.555, 1.665, 2.775];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GeometryError {
    UnsupportedDesign { stations: u32, mosaic: u32 },
    UnknownKind(String),
}

impl Display for GeometryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GeometryError::UnsupportedDesign { stations, mosaic } => write!(
                f,
                "No instrument design for {stations} stations with a mosaic of {mosaic}'! Please pick 5, 8, or 10 stations and a mosaic of 30, 60, or 120"
            ),
            GeometryError::UnknownKind(kind) => write!(
                f,
                "Instrument type '{kind}' not recognized! Please specify as 'full' or 'toy model'"
            ),
        }
    }
}

impl std::error::Error for GeometryError {}

/// Which simulation the raw data came from. The toy model only has one
/// angular channel and tags its calibration folders differently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum InstrumentKind {
    #[default]
    Full,
    ToyModel,
}

impl InstrumentKind {
    pub fn angular_channels(&self) -> u32 {
        match self {
            InstrumentKind::Full => 8,
            InstrumentKind::ToyModel => 1,
        }
    }
}

impl TryFrom<String> for InstrumentKind {
    type Error = GeometryError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<InstrumentKind> for String {
    fn from(value: InstrumentKind) -> Self {
        match value {
            InstrumentKind::Full => "full".to_owned(),
            InstrumentKind::ToyModel => "toy model".to_owned(),
        }
    }
}

impl std::str::FromStr for InstrumentKind {
    type Err = GeometryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "full" | "FULL" | "MANTA" => Ok(InstrumentKind::Full),
            "toy model" | "Toy Model" | "Toy_Model" | "toy_model" => Ok(InstrumentKind::ToyModel),
            other => Err(GeometryError::UnknownKind(other.to_owned())),
        }
    }
}

/// The two rows of detector tubes behind every angular channel. The top row
/// sits in the gaps of the bottom row, so each has its own angular offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DetectorRow {
    Bottom,
    Top,
}

impl DetectorRow {
    pub const ALL: [DetectorRow; 2] = [DetectorRow::Bottom, DetectorRow::Top];

    /// Row number used in the McStas file names
    pub fn number(&self) -> u32 {
        match self {
            DetectorRow::Bottom => 1,
            DetectorRow::Top => 2,
        }
    }

    pub fn tube_offsets(&self) -> &'static [f64] {
        match self {
            DetectorRow::Bottom => &BOTTOM_ROW_OFFSETS,
            DetectorRow::Top => &TOP_ROW_OFFSETS,
        }
    }

    pub fn tube_count(&self) -> u32 {
        self.tube_offsets().len() as u32
    }
}

// Bragg energy sweep used to build the prismatic calibration energies
struct EnergySweep {
    start: f64,
    stop: f64,
    step: f64,
    excluded: &'static [f64],
    extra: &'static [f64],
}

const STANDARD_SWEEP: (f64, f64, f64) = (-0.08, 0.13, 0.04);
const WIDE_SWEEP: (f64, f64, f64) = (-0.2, 0.21, 0.04);

/// Immutable description of one analyzer design, keyed by station count and
/// mosaic. Everything here is a lookup; nothing is measured.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instrument {
    pub stations: u32,
    pub mosaic: u32,
    #[serde(default)]
    pub kind: InstrumentKind,
    #[serde(default)]
    pub path_base: PathBuf,
}

impl Instrument {
    pub fn new(
        stations: u32,
        mosaic: u32,
        kind: InstrumentKind,
        path_base: impl Into<PathBuf>,
    ) -> Result<Self, GeometryError> {
        let instrument = Instrument {
            stations,
            mosaic,
            kind,
            path_base: path_base.into(),
        };
        instrument.validate()?;
        Ok(instrument)
    }

    /// Checks that the station/mosaic pair is one of the simulated designs.
    /// Needed after deserializing, where `new` is bypassed.
    pub fn validate(&self) -> Result<(), GeometryError> {
        match (self.stations, self.mosaic) {
            (5 | 8 | 10, 30 | 60 | 120) => Ok(()),
            (stations, mosaic) => Err(GeometryError::UnsupportedDesign { stations, mosaic }),
        }
    }

    pub fn data_path(&self, folder: impl AsRef<Path>) -> PathBuf {
        self.path_base.join(folder)
    }

    /// Bragg energies (meV) of the analyzers
    pub fn station_energies(&self) -> &'static [f64] {
        match self.stations {
            5 => &[3.2, 3.6, 4.0, 4.4, 4.8],
            10 => &[3.2, 3.4, 3.6, 3.8, 4.0, 4.2, 4.4, 4.6, 4.8, 5.0],
            _ => &[3.21, 3.38, 3.58, 3.8, 4.05, 4.33, 4.64, 5.01],
        }
    }

    fn energy_sweep(&self) -> EnergySweep {
        let (start, stop, step) = STANDARD_SWEEP;
        let mut sweep = EnergySweep {
            start,
            stop,
            step,
            excluded: &[],
            extra: &[],
        };
        match (self.stations, self.mosaic) {
            (5, 60) => sweep.extra = &[3.08, 3.48, 3.88, 4.28, 4.56, 4.68],
            (5, 120) => {
                // Larger mosaic stretches events further along the energy axis
                (sweep.start, sweep.stop, sweep.step) = WIDE_SWEEP;
                sweep.excluded = &[3.0, 3.04, 3.08];
                sweep.extra = &[5.04];
            }
            (8, 60) => sweep.extra = &[4.52, 4.89],
            (8, 120) => sweep.extra = &[4.84, 4.88, 4.49, 4.21, 5.17, 5.21, 5.25, 4.53, 4.8],
            (10, 120) => sweep.extra = &[5.16, 5.20, 5.24],
            _ => {}
        }
        sweep
    }

    /// Every final energy the prismatic analysis distributes intensity over.
    /// Sorted ascending, unique at 3-decimal precision.
    pub fn calibration_energies(&self) -> Vec<f64> {
        let sweep = self.energy_sweep();
        let offsets = arange(sweep.start, sweep.stop, sweep.step);

        let mut energies: Vec<f64> = self
            .station_energies()
            .iter()
            .flat_map(|base| offsets.iter().map(move |del_e| round_to(base + del_e, 3)))
            .filter(|energy| !sweep.excluded.contains(energy))
            .chain(sweep.extra.iter().copied())
            .collect();

        energies.sort_by(f64::total_cmp);
        energies.dedup();
        energies
    }

    /// Dead zones between the analyzer strips, as (lower, upper) detector
    /// positions in meters. Positions strictly inside are masked.
    pub fn baffle_regions(&self) -> Vec<(f64, f64)> {
        let strips: &[(f64, f64)] = match (self.stations, self.mosaic) {
            (5, 30) => &[(0.115, 0.265), (0.315, 0.45), (0.5, 0.62), (0.675, 0.79)],
            (5, 60) => &[(0.12, 0.255), (0.32, 0.44), (0.505, 0.615), (0.675, 0.785)],
            (5, 120) => &[(0.145, 0.23), (0.34, 0.425), (0.525, 0.605), (0.705, 0.77)],
            (8, 30) => &[
                (0.115, 0.165),
                (0.22, 0.27),
                (0.325, 0.37),
                (0.435, 0.48),
                (0.53, 0.585),
                (0.635, 0.69),
                (0.745, 0.805),
            ],
            (8, 60) => &[
                (0.115, 0.165),
                (0.22, 0.27),
                (0.325, 0.37),
                (0.435, 0.47),
                (0.535, 0.58),
                (0.64, 0.685),
                (0.75, 0.8),
            ],
            (8, 120) => &[
                (0.115, 0.17),
                (0.22, 0.275),
                (0.33, 0.375),
                (0.435, 0.48),
                (0.535, 0.59),
                (0.64, 0.69),
                (0.75, 0.81),
            ],
            (10, 30) => &[
                (0.07, 0.125),
                (0.175, 0.22),
                (0.275, 0.315),
                (0.36, 0.405),
                (0.45, 0.49),
                (0.535, 0.575),
                (0.62, 0.655),
                (0.70, 0.735),
                (0.785, 0.815),
            ],
            (10, 60) => &[
                (0.075, 0.125),
                (0.175, 0.22),
                (0.275, 0.305),
                (0.37, 0.405),
                (0.46, 0.49),
                (0.55, 0.575),
                (0.625, 0.655),
                (0.71, 0.74),
                (0.79, 0.815),
            ],
            (10, 120) => &[
                (0.065, 0.13),
                (0.175, 0.235),
                (0.27, 0.33),
                (0.365, 0.42),
                (0.45, 0.505),
                (0.535, 0.59),
                (0.62, 0.67),
                (0.705, 0.76),
                (0.78, 0.835),
            ],
            _ => &[],
        };

        // tables are measured from the bottom of the tube, shift to the tube center
        strips
            .iter()
            .map(|(low, high)| (low - DETECTOR_HALF_LENGTH, high - DETECTOR_HALF_LENGTH))
            .collect()
    }

    pub fn in_baffle(&self, position: f64) -> bool {
        self.baffle_regions()
            .iter()
            .any(|&(low, high)| position > low && position < high)
    }

    /// Number of header lines before the events start in a ReuterStokes file
    pub fn header_offset(&self) -> usize {
        if self.stations == 10 { 49 } else { 46 }
    }

    pub fn tube_angular_offsets(&self, row: DetectorRow) -> &'static [f64] {
        row.tube_offsets()
    }

    pub fn angular_channels(&self) -> u32 {
        self.kind.angular_channels()
    }

    /// Run folder holding the calibration measurement at `energy`
    pub fn calibration_run_folder(&self, calibration_dir: &Path, energy: f64) -> PathBuf {
        let energy = format_energy(energy);
        let name = match self.kind {
            InstrumentKind::Full => format!("Ei-{energy}"),
            InstrumentKind::ToyModel => format!("Ei-{energy}TwoTh15psi0"),
        };
        calibration_dir.join(name)
    }

    pub fn detector_histogram(&self) -> Histogram {
        detector_histogram()
    }
}

/// Empty histogram with the pixel layout shared by calibration and reduction
pub fn detector_histogram() -> Histogram {
    Histogram::new(DETECTOR_PIXELS, (-DETECTOR_HALF_LENGTH, DETECTOR_HALF_LENGTH))
}

/// Rounds to `decimals` places, ties to even
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    (value * scale).round_ties_even() / scale
}

/// Values `start + i * step` strictly below `stop`
pub fn arange(start: f64, stop: f64, step: f64) -> Vec<f64> {
    if step <= 0.0 || stop <= start {
        return Vec::new();
    }
    let count = ((stop - start) / step).ceil() as usize;
    (0..count).map(|i| start + i as f64 * step).collect()
}

// Folder names were written by the simulation scripts, so whole energies keep
// their trailing ".0"
pub fn format_energy(energy: f64) -> String {
    let formatted = format!("{energy}");
    if formatted.contains('.') || formatted.contains('e') || !energy.is_finite() {
        formatted
    } else {
        format!("{formatted}.0")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn instrument(stations: u32, mosaic: u32) -> Instrument {
        Instrument::new(stations, mosaic, InstrumentKind::Full, "").unwrap()
    }

    #[test]
    fn test_eight_station_calibration_energies() {
        let energies = instrument(8, 60).calibration_energies();

        let mut expected = vec![4.52, 4.89];
        for base in [3.21, 3.38, 3.58, 3.8, 4.05, 4.33, 4.64, 5.01] {
            for step in 0..6 {
                expected.push(round_to(base - 0.08 + step as f64 * 0.04, 3));
            }
        }
        expected.sort_by(f64::total_cmp);
        expected.dedup();

        assert_eq!(energies, expected);
        assert!(energies.contains(&3.21));
        assert!(energies.contains(&5.13));
    }

    #[test]
    fn test_calibration_energies_sorted_and_unique() {
        for stations in [5, 8, 10] {
            for mosaic in [30, 60, 120] {
                let energies = instrument(stations, mosaic).calibration_energies();
                assert!(!energies.is_empty());
                for pair in energies.windows(2) {
                    assert!(
                        round_to(pair[0], 3) < round_to(pair[1], 3),
                        "{stations}/{mosaic}: {} then {}",
                        pair[0],
                        pair[1]
                    );
                }
            }
        }
    }

    #[test]
    fn test_wide_sweep_exclusions() {
        let energies = instrument(5, 120).calibration_energies();
        assert!(!energies.contains(&3.0));
        assert!(!energies.contains(&3.04));
        assert!(!energies.contains(&3.08));
        assert!(energies.contains(&3.12));
        assert_eq!(energies.iter().filter(|&&e| e == 5.04).count(), 1);
        assert_eq!(energies.last().copied(), Some(5.04));
    }

    #[test]
    fn test_unsupported_design_is_rejected() {
        let err = Instrument::new(7, 60, InstrumentKind::Full, "").unwrap_err();
        assert_eq!(
            err,
            GeometryError::UnsupportedDesign {
                stations: 7,
                mosaic: 60
            }
        );
        assert!(Instrument::new(8, 45, InstrumentKind::Full, "").is_err());
    }

    #[test]
    fn test_baffle_regions() {
        let inst = instrument(8, 60);
        let baffles = inst.baffle_regions();
        assert_eq!(baffles.len(), 7);
        assert_abs_diff_eq!(baffles[0].0, -0.335, epsilon = 1e-12);
        assert_abs_diff_eq!(baffles[0].1, -0.285, epsilon = 1e-12);

        assert!(inst.in_baffle(-0.31));
        // between the first two baffles, (-0.335, -0.285) and (-0.23, -0.18)
        assert!(!inst.in_baffle(-0.25));
        assert!(inst.in_baffle(-0.2));
        assert!(!inst.in_baffle(baffles[0].0));
    }

    #[test]
    fn test_header_offset_and_channels() {
        assert_eq!(instrument(10, 60).header_offset(), 49);
        assert_eq!(instrument(8, 60).header_offset(), 46);
        assert_eq!(instrument(5, 30).header_offset(), 46);

        let toy = Instrument::new(8, 60, InstrumentKind::ToyModel, "").unwrap();
        assert_eq!(toy.angular_channels(), 1);
        assert_eq!(instrument(8, 60).angular_channels(), 8);
    }

    #[test]
    fn test_calibration_folder_names() {
        let full = instrument(8, 60);
        let toy = Instrument::new(8, 60, InstrumentKind::ToyModel, "/data").unwrap();
        let dir = Path::new("/data/calibration");

        assert_eq!(
            full.calibration_run_folder(dir, 3.21),
            dir.join("Ei-3.21")
        );
        assert_eq!(full.calibration_run_folder(dir, 4.0), dir.join("Ei-4.0"));
        assert_eq!(
            toy.calibration_run_folder(dir, 4.05),
            dir.join("Ei-4.05TwoTh15psi0")
        );
    }

    #[test]
    fn test_kind_spellings() {
        assert_eq!("MANTA".parse::<InstrumentKind>(), Ok(InstrumentKind::Full));
        assert_eq!(
            "Toy_Model".parse::<InstrumentKind>(),
            Ok(InstrumentKind::ToyModel)
        );
        assert!("prototype".parse::<InstrumentKind>().is_err());
    }

    #[test]
    fn test_tube_offsets() {
        let inst = instrument(8, 60);
        assert_eq!(inst.tube_angular_offsets(DetectorRow::Bottom).len(), 7);
        assert_eq!(inst.tube_angular_offsets(DetectorRow::Top).len(), 6);
        assert_eq!(DetectorRow::Top.number(), 2);
    }

    #[test]
    fn test_round_to_ties_even() {
        assert_eq!(round_to(2.5, 0), 2.0);
        assert_eq!(round_to(3.5, 0), 4.0);
        assert_eq!(round_to(0.125, 2), 0.12);
        assert_eq!(round_to(-0.375, 2), -0.38);
        assert_eq!(round_to(3.2100000000000004, 3), 3.21);
    }
}
