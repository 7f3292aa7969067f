use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use crate::errors::{FormatError, Result};

/// A dense `rows x columns` log-conductivity image plus the total depth it
/// spans (spec §6). Row-major: `data[r * columns + c]`.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageFile {
    pub rows: usize,
    pub columns: usize,
    pub depth: f64,
    pub data: Vec<f64>,
}

impl ImageFile {
    pub fn new(rows: usize, columns: usize, depth: f64, data: Vec<f64>) -> Self {
        assert_eq!(data.len(), rows * columns);
        Self { rows, columns, depth, data }
    }

    pub fn constant(rows: usize, columns: usize, depth: f64, value: f64) -> Self {
        Self::new(rows, columns, depth, vec![value; rows * columns])
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .map_err(|source| FormatError::Io { path: path.to_path_buf(), source })?;
        Self::parse(&text, path)
    }

    fn parse(text: &str, path: &Path) -> Result<Self> {
        let mut lines = text.lines();
        let header = lines.next().ok_or_else(|| FormatError::Parse {
            path: path.to_path_buf(),
            line: 1,
            message: "empty image file".to_string(),
        })?;
        let mut header_fields = header.split_whitespace();
        let parse_err = |field: &str, line: usize| FormatError::Parse {
            path: path.to_path_buf(),
            line,
            message: format!("bad header field '{field}'"),
        };
        let rows: usize = header_fields
            .next()
            .ok_or_else(|| parse_err(header, 1))?
            .parse()
            .map_err(|_| parse_err(header, 1))?;
        let columns: usize = header_fields
            .next()
            .ok_or_else(|| parse_err(header, 1))?
            .parse()
            .map_err(|_| parse_err(header, 1))?;
        let depth: f64 = header_fields
            .next()
            .ok_or_else(|| parse_err(header, 1))?
            .parse()
            .map_err(|_| parse_err(header, 1))?;

        let mut data = Vec::with_capacity(rows * columns);
        for tok in lines.flat_map(str::split_whitespace) {
            data.push(tok.parse::<f64>().map_err(|_| FormatError::Parse {
                path: path.to_path_buf(),
                line: 2,
                message: format!("bad data value '{tok}'"),
            })?);
        }
        if data.len() != rows * columns {
            return Err(FormatError::Parse {
                path: path.to_path_buf(),
                line: 2,
                message: format!(
                    "expected {} values ({rows}x{columns}), found {}",
                    rows * columns,
                    data.len()
                ),
            });
        }
        Ok(Self { rows, columns, depth, data })
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let mut out = String::new();
        let _ = writeln!(out, "{} {} {}", self.rows, self.columns, self.depth);
        for row in self.data.chunks(self.columns) {
            let line = row.iter().map(|v| format!("{v:.10e}")).collect::<Vec<_>>().join(" ");
            out.push_str(&line);
            out.push('\n');
        }
        fs::write(path, out).map_err(|source| FormatError::Io { path: path.to_path_buf(), source })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrips_through_text() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("img.txt");
        let img = ImageFile::new(2, 3, 200.0, vec![0.1, 0.2, 0.3, 0.4, 0.5, 0.6]);
        img.save(&path).unwrap();
        let reloaded = ImageFile::load(&path).unwrap();
        assert_eq!(img.rows, reloaded.rows);
        assert_eq!(img.columns, reloaded.columns);
        assert_eq!(img.depth, reloaded.depth);
        for (a, b) in img.data.iter().zip(reloaded.data.iter()) {
            assert!((a - b).abs() < 1e-9);
        }
    }

    #[test]
    fn rejects_wrong_value_count() {
        let text = "2 2 10.0\n1.0 2.0 3.0\n";
        let err = ImageFile::parse(text, Path::new("t.img")).unwrap_err();
        assert!(matches!(err, FormatError::Parse { .. }));
    }
}
