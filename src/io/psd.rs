use std::fmt::Display;
use std::num::ParseFloatError;
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub enum PsdError {
    Missing(PathBuf),
    File(std::io::Error),
    Columns { line: usize },
    Value { line: usize, source: ParseFloatError },
}

impl Display for PsdError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PsdError::Missing(path) => write!(f, "Tube file {} does not exist", path.display()),
            PsdError::File(x) => write!(f, "Tube file had an IO error: {x}"),
            PsdError::Columns { line } => {
                write!(f, "Tube file line {line} has fewer than 3 columns")
            }
            PsdError::Value { line, source } => {
                write!(f, "Tube file line {line} could not be parsed: {source}")
            }
        }
    }
}

impl std::error::Error for PsdError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PsdError::File(x) => Some(x),
            PsdError::Value { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<std::io::Error> for PsdError {
    fn from(value: std::io::Error) -> Self {
        PsdError::File(value)
    }
}

/// File name McStas gives a ReuterStokes tube
pub fn tube_file_name(row: u32, tube: u32, channel: u32) -> String {
    format!("ReuterStokes{row}_{tube}_{channel}.psd")
}

/// Reads the (position, intensity) events of one tube. The first
/// `header_offset` lines are skipped; each event line starts with the
/// intensity and carries the vertical position in its third column.
/// Events without positive intensity are dropped.
pub fn read_tube_events(path: &Path, header_offset: usize) -> Result<Vec<(f64, f64)>, PsdError> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(PsdError::Missing(path.to_path_buf()));
        }
        Err(e) => return Err(e.into()),
    };

    parse_tube_events(&contents, header_offset)
}

pub fn parse_tube_events(contents: &str, header_offset: usize) -> Result<Vec<(f64, f64)>, PsdError> {
    let mut events = Vec::new();

    for (index, line) in contents.lines().enumerate().skip(header_offset) {
        let line_number = index + 1;
        let mut columns = line.split_whitespace();

        let Some(intensity) = columns.next() else {
            continue;
        };
        let intensity: f64 = intensity.parse().map_err(|source| PsdError::Value {
            line: line_number,
            source,
        })?;
        if intensity <= 0.0 {
            continue;
        }

        let position: f64 = columns
            .nth(1)
            .ok_or(PsdError::Columns { line: line_number })?
            .parse()
            .map_err(|source| PsdError::Value {
                line: line_number,
                source,
            })?;

        events.push((position, intensity));
    }

    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const HEADER: &str = "# Format: McStas event list\n# type: array_2d\n";

    #[test]
    fn test_parse_skips_header_blank_and_empty_events() {
        let contents = format!(
            "{HEADER}1.5 0.01 -0.2 0.3\n\n0 0.02 0.1 0.0\n-2.0 0.0 0.3 0.0\n2.5e-3 0.0 0.25 1.0\n"
        );

        let events = parse_tube_events(&contents, 2).unwrap();
        assert_eq!(events, vec![(-0.2, 1.5), (0.25, 2.5e-3)]);
    }

    #[test]
    fn test_parse_reports_bad_line() {
        let contents = format!("{HEADER}1.0 0.0 0.1\nabc 0.0 0.1\n");
        match parse_tube_events(&contents, 2) {
            Err(PsdError::Value { line, .. }) => assert_eq!(line, 4),
            other => panic!("expected a parse error, got {other:?}"),
        }

        let short = format!("{HEADER}1.0 0.0\n");
        assert!(matches!(
            parse_tube_events(&short, 2),
            Err(PsdError::Columns { line: 3 })
        ));
    }

    #[test]
    fn test_read_missing_and_present_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(tube_file_name(1, 3, 2));
        assert_eq!(
            path.file_name().unwrap().to_str().unwrap(),
            "ReuterStokes1_3_2.psd"
        );

        assert!(matches!(
            read_tube_events(&path, 2),
            Err(PsdError::Missing(_))
        ));

        let mut file = std::fs::File::create(&path).unwrap();
        write!(file, "{HEADER}4.0 0.0 0.125 0.0\n").unwrap();
        assert_eq!(read_tube_events(&path, 2).unwrap(), vec![(0.125, 4.0)]);
    }
}
