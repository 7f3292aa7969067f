use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::errors::{FormatError, Result};

/// One time-gate window; `centre()` is what the forward model evaluates
/// against (spec §6: "window list gives per-window (t_low, t_high) pairs
/// whose midpoints are centre-times").
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Window {
    pub t_low: f64,
    pub t_high: f64,
}

impl Window {
    pub fn centre(&self) -> f64 {
        0.5 * (self.t_low + self.t_high)
    }
}

/// A parsed `Section Begin ... Section End` block: bare `Key = Value` (or
/// `Key Value`) pairs, plus a nested `WindowTimes` sub-block when present.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Section {
    pub fields: HashMap<String, String>,
}

impl Section {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(|v| v.parse().ok())
    }
}

/// STM forward-model descriptor: `Transmitter`, `Receiver`, and
/// `ForwardModelling` blocks, the latter carrying the window list (spec
/// §6). Matches the `Section Begin` / `Section End` text convention common
/// to AEM system-description files.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StmDescriptor {
    pub transmitter: Section,
    pub receiver: Section,
    pub forward_modelling: Section,
    pub windows: Vec<Window>,
}

impl StmDescriptor {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .map_err(|source| FormatError::Io { path: path.to_path_buf(), source })?;
        Self::parse(&text, path)
    }

    fn parse(text: &str, path: &Path) -> Result<Self> {
        let mut transmitter = None;
        let mut receiver = None;
        let mut forward_modelling = None;
        let mut windows = Vec::new();

        let mut lines = text.lines().enumerate().peekable();
        while let Some((line_no, raw)) = lines.next() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some(name) = line.strip_suffix("Begin").map(str::trim) else { continue };

            match name {
                "Transmitter" => {
                    transmitter = Some(parse_block(&mut lines, "Transmitter", path)?);
                }
                "Receiver" => {
                    receiver = Some(parse_block(&mut lines, "Receiver", path)?);
                }
                "ForwardModelling" => {
                    let (section, parsed_windows) =
                        parse_forward_modelling_block(&mut lines, path)?;
                    forward_modelling = Some(section);
                    windows = parsed_windows;
                }
                other => {
                    return Err(FormatError::Parse {
                        path: path.to_path_buf(),
                        line: line_no + 1,
                        message: format!("unknown section '{other}'"),
                    });
                }
            }
        }

        Ok(Self {
            transmitter: transmitter.ok_or(FormatError::MissingSection("Transmitter"))?,
            receiver: receiver.ok_or(FormatError::MissingSection("Receiver"))?,
            forward_modelling: forward_modelling
                .ok_or(FormatError::MissingSection("ForwardModelling"))?,
            windows,
        })
    }
}

type Lines<'a> = std::iter::Peekable<std::iter::Enumerate<std::str::Lines<'a>>>;

fn parse_block(lines: &mut Lines, name: &'static str, path: &Path) -> Result<Section> {
    let mut section = Section::default();
    for (line_no, raw) in lines.by_ref() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if line == format!("{name} End") {
            return Ok(section);
        }
        let (key, value) = split_key_value(line, path, line_no)?;
        section.fields.insert(key, value);
    }
    Err(FormatError::Parse {
        path: path.to_path_buf(),
        line: 0,
        message: format!("section '{name}' is missing its 'End' terminator"),
    })
}

fn parse_forward_modelling_block(
    lines: &mut Lines,
    path: &Path,
) -> Result<(Section, Vec<Window>)> {
    let mut section = Section::default();
    let mut windows = Vec::new();
    for (line_no, raw) in lines.by_ref() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if line == "ForwardModelling End" {
            return Ok((section, windows));
        }
        if let Some(name) = line.strip_suffix("Begin").map(str::trim) {
            if name == "WindowTimes" {
                windows = parse_window_times(lines, path)?;
                continue;
            }
        }
        let (key, value) = split_key_value(line, path, line_no)?;
        section.fields.insert(key, value);
    }
    Err(FormatError::Parse {
        path: path.to_path_buf(),
        line: 0,
        message: "section 'ForwardModelling' is missing its 'End' terminator".to_string(),
    })
}

fn parse_window_times(lines: &mut Lines, path: &Path) -> Result<Vec<Window>> {
    let mut windows = Vec::new();
    for (line_no, raw) in lines.by_ref() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if line == "WindowTimes End" {
            return Ok(windows);
        }
        let mut fields = line.split_whitespace();
        let parse_f64 = |tok: Option<&str>| -> Result<f64> {
            tok.and_then(|t| t.parse().ok()).ok_or_else(|| FormatError::Parse {
                path: path.to_path_buf(),
                line: line_no + 1,
                message: format!("bad window time row '{line}'"),
            })
        };
        let t_low = parse_f64(fields.next())?;
        let t_high = parse_f64(fields.next())?;
        windows.push(Window { t_low, t_high });
    }
    Err(FormatError::Parse {
        path: path.to_path_buf(),
        line: 0,
        message: "section 'WindowTimes' is missing its 'End' terminator".to_string(),
    })
}

fn split_key_value(line: &str, path: &Path, line_no: usize) -> Result<(String, String)> {
    let line = line.trim_start_matches('\u{feff}');
    let (key, value) = if let Some((k, v)) = line.split_once('=') {
        (k.trim(), v.trim())
    } else {
        line.split_once(char::is_whitespace)
            .map(|(k, v)| (k.trim(), v.trim()))
            .ok_or_else(|| FormatError::Parse {
                path: path.to_path_buf(),
                line: line_no + 1,
                message: format!("expected 'key value' or 'key = value', got '{line}'"),
            })?
    };
    Ok((key.to_string(), value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
Transmitter Begin
    NumberOfTurns = 1
    PeakCurrent = 1.0
Transmitter End

Receiver Begin
    NumberOfWindows = 2
Receiver End

ForwardModelling Begin
    ModellingLoopRadius = 1.0
    WindowTimes Begin
        1.0e-6 2.0e-6
        2.0e-6 4.0e-6
    WindowTimes End
ForwardModelling End
";

    #[test]
    fn parses_sections_and_windows() {
        let stm = StmDescriptor::parse(SAMPLE, Path::new("t.stm")).unwrap();
        assert_eq!(stm.transmitter.get("NumberOfTurns"), Some("1"));
        assert_eq!(stm.receiver.get_f64("NumberOfWindows"), Some(2.0));
        assert_eq!(stm.windows.len(), 2);
        assert!((stm.windows[0].centre() - 1.5e-6).abs() < 1e-12);
    }

    #[test]
    fn missing_section_is_an_error() {
        let text = "Transmitter Begin\nFoo = 1\nTransmitter End\n";
        let err = StmDescriptor::parse(text, Path::new("t.stm")).unwrap_err();
        assert!(matches!(err, FormatError::MissingSection("Receiver")));
    }
}
