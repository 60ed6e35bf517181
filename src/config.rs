use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::analysis::resolution::ResolutionSettings;
use crate::error::PrismError;
use crate::instrument::geometry::{Instrument, InstrumentKind};

/// Everything one pipeline run needs, usually read from a YAML file.
/// Folders are relative to `instrument.path_base`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    pub instrument: Instrument,
    pub calibration_folder: PathBuf,
    pub data_folder: PathBuf,
    pub show_progress: bool,
    pub resolution: Option<ResolutionSettings>,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        PipelineSettings {
            instrument: Instrument {
                stations: 8,
                mosaic: 60,
                kind: InstrumentKind::Full,
                path_base: PathBuf::from("."),
            },
            calibration_folder: PathBuf::from("calibration"),
            data_folder: PathBuf::from("data"),
            show_progress: true,
            resolution: None,
        }
    }
}

impl PipelineSettings {
    pub fn from_yaml(contents: &str) -> Result<Self, PrismError> {
        let settings: Self = serde_yaml::from_str(contents)?;
        settings.instrument.validate()?;
        Ok(settings)
    }

    pub fn load(path: &Path) -> Result<Self, PrismError> {
        let mut file = File::open(path)?;
        let mut contents = String::new();
        file.read_to_string(&mut contents)?;
        Self::from_yaml(&contents)
    }

    pub fn save(&self, path: &Path) -> Result<(), PrismError> {
        let file = File::create(path)?;
        serde_yaml::to_writer(file, self)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_fill_missing_fields() {
        let settings = PipelineSettings::from_yaml("data_folder: runs\n").unwrap();
        assert_eq!(settings.data_folder, PathBuf::from("runs"));
        assert_eq!(settings.instrument.stations, 8);
        assert_eq!(settings.instrument.mosaic, 60);
        assert!(settings.resolution.is_none());
    }

    #[test]
    fn test_full_settings() {
        let yaml = r#"
instrument:
  stations: 10
  mosaic: 120
  kind: toy model
  path_base: /sims/manta
calibration_folder: calib
data_folder: sample
show_progress: false
resolution:
  sweep_variable: Qx
  step_size: 0.1
  target_variable: E
  bin_size: 0.05
  fixed:
    variable: Qy
    center: 0.0
    half_width: 0.05
  threshold: 2.5
  bin_range: [-1.0, 1.0]
"#;
        let settings = PipelineSettings::from_yaml(yaml).unwrap();
        assert_eq!(settings.instrument.kind, InstrumentKind::ToyModel);
        assert_eq!(
            settings.instrument.data_path(&settings.data_folder),
            PathBuf::from("/sims/manta/sample")
        );

        let resolution = settings.resolution.unwrap();
        assert_eq!(resolution.fixed.variable, "Qy");
        assert_eq!(resolution.threshold, Some(2.5));
        assert_eq!(resolution.bin_range, Some((-1.0, 1.0)));
        assert_eq!(resolution.sweep_range, None);
    }

    #[test]
    fn test_rejects_unknown_designs() {
        let yaml = "instrument:\n  stations: 6\n  mosaic: 60\n";
        assert!(matches!(
            PipelineSettings::from_yaml(yaml),
            Err(PrismError::Geometry(_))
        ));

        let yaml = "instrument:\n  stations: 8\n  mosaic: 60\n  kind: prototype\n";
        assert!(matches!(
            PipelineSettings::from_yaml(yaml),
            Err(PrismError::Config(_))
        ));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.yaml");

        let settings = PipelineSettings::default();
        settings.save(&path).unwrap();
        assert_eq!(PipelineSettings::load(&path).unwrap(), settings);
    }
}
