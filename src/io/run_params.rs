use std::fmt::Display;
use std::path::{Path, PathBuf};

/// McStas writes this monitor file for every run, even when no neutron hits
/// the tubes, so it is where the run parameters are read from.
pub const PARAMETER_FILE: &str = "psd_tube1_1a.dat";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunParameters {
    pub incident_energy: f64, // meV
    pub two_theta_base: f64,  // deg
    pub sample_angle: f64,    // deg
}

#[derive(Debug)]
pub enum RunParameterError {
    Missing(PathBuf),
    File(std::io::Error),
    Incomplete { missing: Vec<&'static str> },
    Value { name: String, value: String },
}

impl Display for RunParameterError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunParameterError::Missing(path) => {
                write!(f, "Parameter file {} does not exist", path.display())
            }
            RunParameterError::File(x) => write!(f, "Parameter file had an IO error: {x}"),
            RunParameterError::Incomplete { missing } => write!(
                f,
                "Could not find {} in the parameter file",
                missing.join(", ")
            ),
            RunParameterError::Value { name, value } => {
                write!(f, "Parameter {name} has a non-numeric value '{value}'")
            }
        }
    }
}

impl std::error::Error for RunParameterError {}

impl From<std::io::Error> for RunParameterError {
    fn from(value: std::io::Error) -> Self {
        RunParameterError::File(value)
    }
}

impl RunParameters {
    /// Reads `Ei`, `TwoTh` and `psi` from the parameter file of a run folder
    pub fn from_run_folder(run_folder: &Path) -> Result<Self, RunParameterError> {
        let path = run_folder.join(PARAMETER_FILE);
        let contents = match std::fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(RunParameterError::Missing(path));
            }
            Err(e) => return Err(e.into()),
        };

        Self::parse(&contents)
    }

    /// Scans `# Param: name=value` lines until all three parameters are known
    pub fn parse(contents: &str) -> Result<Self, RunParameterError> {
        let mut incident_energy = None;
        let mut two_theta_base = None;
        let mut sample_angle = None;

        for line in contents.lines() {
            let tokens: Vec<&str> = line.split_whitespace().collect();
            if tokens.len() < 3 || tokens[1] != "Param:" {
                continue;
            }

            let Some((name, value)) = tokens[2].split_once('=') else {
                continue;
            };

            let slot = match name {
                "Ei" => &mut incident_energy,
                "TwoTh" => &mut two_theta_base,
                "psi" => &mut sample_angle,
                _ => continue,
            };

            *slot = Some(value.parse::<f64>().map_err(|_| RunParameterError::Value {
                name: name.to_owned(),
                value: value.to_owned(),
            })?);

            if incident_energy.is_some() && two_theta_base.is_some() && sample_angle.is_some() {
                break;
            }
        }

        match (incident_energy, two_theta_base, sample_angle) {
            (Some(incident_energy), Some(two_theta_base), Some(sample_angle)) => Ok(RunParameters {
                incident_energy,
                two_theta_base,
                sample_angle,
            }),
            _ => {
                let missing = [
                    ("Ei", incident_energy),
                    ("TwoTh", two_theta_base),
                    ("psi", sample_angle),
                ]
                .iter()
                .filter(|(_, value)| value.is_none())
                .map(|(name, _)| *name)
                .collect();
                Err(RunParameterError::Incomplete { missing })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PARAMETERS: &str = "# Format: McStas with text headers
# Instrument-source: 'MANTA.instr'
# Param: Ei=5.5
# Param: TwoTh=30
# Param: psi=-12.5
# Param: Ei=99
";

    #[test]
    fn test_parse_parameters() {
        let params = RunParameters::parse(PARAMETERS).unwrap();
        assert_eq!(
            params,
            RunParameters {
                incident_energy: 5.5,
                two_theta_base: 30.0,
                sample_angle: -12.5,
            }
        );
    }

    #[test]
    fn test_missing_psi() {
        let contents = "# Param: Ei=5.5\n\n# Param: TwoTh=30\n# Param:\n";
        match RunParameters::parse(contents) {
            Err(RunParameterError::Incomplete { missing }) => assert_eq!(missing, vec!["psi"]),
            other => panic!("expected incomplete parameters, got {other:?}"),
        }
    }

    #[test]
    fn test_bad_value() {
        assert!(matches!(
            RunParameters::parse("# Param: Ei=fast\n"),
            Err(RunParameterError::Value { .. })
        ));
    }

    #[test]
    fn test_from_run_folder() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            RunParameters::from_run_folder(dir.path()),
            Err(RunParameterError::Missing(_))
        ));

        std::fs::write(dir.path().join(PARAMETER_FILE), PARAMETERS).unwrap();
        let params = RunParameters::from_run_folder(dir.path()).unwrap();
        assert_eq!(params.two_theta_base, 30.0);
    }
}
