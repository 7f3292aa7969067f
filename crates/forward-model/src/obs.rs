use std::fs;
use std::path::Path;

use crate::errors::{FormatError, Result};
use crate::geometry::{Direction, Geometry};

/// One system's response sub-record: `direction_id N r_1 ... r_N`.
#[derive(Debug, Clone, PartialEq)]
pub struct SystemResponse {
    pub direction: Direction,
    pub values: Vec<f64>,
}

/// One flight-path observation point: geometry plus `R` system responses.
#[derive(Debug, Clone, PartialEq)]
pub struct ObservationPoint {
    pub geometry: Geometry,
    pub systems: Vec<SystemResponse>,
}

impl ObservationPoint {
    /// Total number of response data points across all systems, in the
    /// fixed observation order the core concatenates predicted responses
    /// against (spec §4.3).
    pub fn n_data(&self) -> usize {
        self.systems.iter().map(|s| s.values.len()).sum()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObservationFile {
    pub points: Vec<ObservationPoint>,
}

impl ObservationFile {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .map_err(|source| FormatError::Io { path: path.to_path_buf(), source })?;
        Self::parse(&text, path)
    }

    fn parse(text: &str, path: &Path) -> Result<Self> {
        let mut tokens = Tokenizer::new(text);
        let mut points = Vec::new();
        let mut line = 1usize;

        while tokens.has_next() {
            let mut fields = [0.0f64; Geometry::FIELD_COUNT];
            for slot in &mut fields {
                *slot = tokens.next_f64(path, &mut line)?;
            }
            let geometry = Geometry::from_fields(&fields);

            let n_systems = tokens.next_usize(path, &mut line)?;
            let mut systems = Vec::with_capacity(n_systems);
            for _ in 0..n_systems {
                let direction_id = tokens.next_i64(path, &mut line)?;
                let direction = Direction::from_id(direction_id)
                    .ok_or(FormatError::UnknownDirection(direction_id))?;
                let n = tokens.next_usize(path, &mut line)?;
                let mut values = Vec::with_capacity(n);
                for _ in 0..n {
                    values.push(tokens.next_f64(path, &mut line)?);
                }
                systems.push(SystemResponse { direction, values });
            }
            points.push(ObservationPoint { geometry, systems });
        }

        Ok(Self { points })
    }

    /// Total number of response data points across the whole survey.
    pub fn n_data(&self) -> usize {
        self.points.iter().map(ObservationPoint::n_data).sum()
    }
}

/// A minimal whitespace tokenizer that tracks a coarse line count for error
/// messages; the format has no quoting or escaping so this is sufficient.
struct Tokenizer<'a> {
    rest: std::str::SplitWhitespace<'a>,
}

impl<'a> Tokenizer<'a> {
    fn new(text: &'a str) -> Self {
        Self { rest: text.split_whitespace() }
    }

    fn has_next(&mut self) -> bool {
        let mut clone = self.rest.clone();
        clone.next().is_some()
    }

    fn next_token(&mut self, path: &Path, line: &mut usize) -> Result<&'a str> {
        self.rest.next().ok_or_else(|| FormatError::Parse {
            path: path.to_path_buf(),
            line: *line,
            message: "unexpected end of file".to_string(),
        })
    }

    fn next_f64(&mut self, path: &Path, line: &mut usize) -> Result<f64> {
        let tok = self.next_token(path, line)?;
        *line += 1;
        tok.parse::<f64>().map_err(|e| FormatError::Parse {
            path: path.to_path_buf(),
            line: *line,
            message: format!("expected a float, got '{tok}': {e}"),
        })
    }

    fn next_i64(&mut self, path: &Path, line: &mut usize) -> Result<i64> {
        let tok = self.next_token(path, line)?;
        *line += 1;
        tok.parse::<i64>().map_err(|e| FormatError::Parse {
            path: path.to_path_buf(),
            line: *line,
            message: format!("expected an integer, got '{tok}': {e}"),
        })
    }

    fn next_usize(&mut self, path: &Path, line: &mut usize) -> Result<usize> {
        let v = self.next_i64(path, line)?;
        usize::try_from(v).map_err(|_| FormatError::Parse {
            path: path.to_path_buf(),
            line: *line,
            message: format!("expected a non-negative count, got {v}"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_single_point_two_systems() {
        let text = "\
            1.0 0.0 0.0 0.0 0.0 0.0 -1.0 0.0 0.0 0.0\n\
            2\n\
            2 2 1.0 2.0\n\
            0 1 3.0\n\
        ";
        let obs = ObservationFile::parse(text, Path::new("t.obs")).unwrap();
        assert_eq!(obs.points.len(), 1);
        let p = &obs.points[0];
        assert_eq!(p.geometry.tx_height, 1.0);
        assert_eq!(p.systems.len(), 2);
        assert_eq!(p.systems[0].direction, Direction::Z);
        assert_eq!(p.systems[0].values, vec![1.0, 2.0]);
        assert_eq!(p.systems[1].direction, Direction::X);
        assert_eq!(p.systems[1].values, vec![3.0]);
        assert_eq!(obs.n_data(), 3);
    }

    #[test]
    fn unknown_direction_id_is_rejected() {
        let text = "0 0 0 0 0 0 0 0 0 0\n1\n7 1 1.0\n";
        let err = ObservationFile::parse(text, Path::new("t.obs")).unwrap_err();
        assert!(matches!(err, FormatError::UnknownDirection(7)));
    }
}
