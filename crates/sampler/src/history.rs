use std::fs::{File, OpenOptions};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use aem_wavelet_tree::WaveletTree;

use crate::engine::{MoveKind, StepOutcome};
use crate::errors::{Result, SamplerError};

const TAG_INITIALISE: u8 = 0;
const TAG_DELTA: u8 = 1;

impl MoveKind {
    fn to_tag(self) -> u8 {
        match self {
            Self::Birth => 0,
            Self::Death => 1,
            Self::Value => 2,
            Self::Hierarchical => 3,
            Self::HierarchicalPrior => 4,
        }
    }

    fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(Self::Birth),
            1 => Some(Self::Death),
            2 => Some(Self::Value),
            3 => Some(Self::Hierarchical),
            4 => Some(Self::HierarchicalPrior),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct InitialisePayload {
    live: Vec<(u32, f64)>,
    lambda_scale: Vec<f64>,
    temperature: f64,
    likelihood: f64,
    log_normalization: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct DeltaPayload {
    kind: u8,
    idx: u32,
    depth: u32,
    new_value: f64,
    old_value: Option<f64>,
    accepted: bool,
    likelihood: f64,
    log_normalization: f64,
    temperature: f64,
    hierarchical_scalar: f64,
}

/// A decoded chain-history record (spec §4.6): every segment begins with
/// an `Initialise`, followed by zero or more `Delta`s. A reader must
/// tolerate back-to-back `Initialise` records with no intervening `Delta`
/// (spec §9 redesign flag on ring overflow) — each one simply re-anchors
/// the replayed live-index multiset.
#[derive(Debug, Clone)]
pub enum Record {
    Initialise {
        live: Vec<(u32, f64)>,
        lambda_scale: Vec<f64>,
        temperature: f64,
        likelihood: f64,
        log_normalization: f64,
    },
    Delta {
        kind: MoveKind,
        idx: u32,
        depth: u32,
        new_value: f64,
        old_value: Option<f64>,
        accepted: bool,
        likelihood: f64,
        log_normalization: f64,
        temperature: f64,
        hierarchical_scalar: f64,
    },
}

fn write_record(writer: &mut impl Write, path: &Path, tag: u8, payload: &impl Serialize) -> Result<()> {
    let bytes = bincode::serialize(payload)
        .map_err(|source| SamplerError::Codec { action: "encoding a chain-history record", source })?;
    let header = (bytes.len() as u32).to_be_bytes();
    writer
        .write_all(&[tag])
        .and_then(|_| writer.write_all(&header))
        .and_then(|_| writer.write_all(&bytes))
        .map_err(|source| SamplerError::SegmentIo {
            action: "write",
            path: path.to_path_buf(),
            source,
        })
}

/// Reads one record, or `None` at a clean end-of-file between segments
/// (spec §4.6: "EOF between segments is legal").
fn read_record(reader: &mut impl Read, path: &Path) -> Result<Option<Record>> {
    let mut tag_buf = [0u8; 1];
    match reader.read_exact(&mut tag_buf) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(source) => {
            return Err(SamplerError::SegmentIo { action: "read", path: path.to_path_buf(), source })
        }
    }
    let mut len_buf = [0u8; 4];
    reader
        .read_exact(&mut len_buf)
        .map_err(|source| SamplerError::SegmentIo { action: "read", path: path.to_path_buf(), source })?;
    let len = u32::from_be_bytes(len_buf) as usize;
    let mut payload = vec![0u8; len];
    reader
        .read_exact(&mut payload)
        .map_err(|source| SamplerError::SegmentIo { action: "read", path: path.to_path_buf(), source })?;

    match tag_buf[0] {
        TAG_INITIALISE => {
            let p: InitialisePayload = bincode::deserialize(&payload)
                .map_err(|source| SamplerError::Codec { action: "decoding an INITIALISE record", source })?;
            Ok(Some(Record::Initialise {
                live: p.live,
                lambda_scale: p.lambda_scale,
                temperature: p.temperature,
                likelihood: p.likelihood,
                log_normalization: p.log_normalization,
            }))
        }
        TAG_DELTA => {
            let p: DeltaPayload = bincode::deserialize(&payload)
                .map_err(|source| SamplerError::Codec { action: "decoding a DELTA record", source })?;
            let kind = MoveKind::from_tag(p.kind).ok_or_else(|| SamplerError::SegmentFormat {
                path: path.to_path_buf(),
                message: format!("unknown move-kind tag {}", p.kind),
            })?;
            Ok(Some(Record::Delta {
                kind,
                idx: p.idx,
                depth: p.depth,
                new_value: p.new_value,
                old_value: p.old_value,
                accepted: p.accepted,
                likelihood: p.likelihood,
                log_normalization: p.log_normalization,
                temperature: p.temperature,
                hierarchical_scalar: p.hierarchical_scalar,
            }))
        }
        other => Err(SamplerError::SegmentFormat {
            path: path.to_path_buf(),
            message: format!("unknown record tag {other}"),
        }),
    }
}

/// Per-chain bounded ring of step records, flushed to a binary segment
/// stream (spec §4.6). `capacity` bounds how many `Delta` records
/// accumulate since the last `Initialise` before a caller-driven flush
/// re-anchors the segment; PT-swap-accept and resample-accept also force
/// an immediate re-anchor regardless of the ring's fill level (spec §4.5
/// item 5: "the affected chains must flush and re-initialise").
pub struct ChainHistory {
    writer: BufWriter<File>,
    path: PathBuf,
    capacity: usize,
    pending: usize,
}

impl ChainHistory {
    /// Opens `path` for append, writing an initial `Initialise` record
    /// from the given live state.
    pub fn create(
        path: impl Into<PathBuf>,
        capacity: usize,
        tree: &WaveletTree,
        lambda_scale: &[f64],
        temperature: f64,
        likelihood: f64,
        log_normalization: f64,
    ) -> Result<Self> {
        let path = path.into();
        let file = OpenOptions::new().create(true).write(true).truncate(true).open(&path).map_err(
            |source| SamplerError::SegmentIo { action: "create", path: path.clone(), source },
        )?;
        let mut history = Self { writer: BufWriter::new(file), path, capacity: capacity.max(1), pending: 0 };
        history.reinitialise(tree, lambda_scale, temperature, likelihood, log_normalization)?;
        Ok(history)
    }

    /// Writes a fresh `Initialise` record from the current live state and
    /// resets the ring's pending-record count.
    pub fn reinitialise(
        &mut self,
        tree: &WaveletTree,
        lambda_scale: &[f64],
        temperature: f64,
        likelihood: f64,
        log_normalization: f64,
    ) -> Result<()> {
        let payload = InitialisePayload {
            live: tree.live_snapshot(),
            lambda_scale: lambda_scale.to_vec(),
            temperature,
            likelihood,
            log_normalization,
        };
        write_record(&mut self.writer, &self.path, TAG_INITIALISE, &payload)?;
        self.pending = 0;
        Ok(())
    }

    /// Appends one completed step's `Delta` record, regardless of
    /// accept/reject (spec §4.6: the `accepted` flag distinguishes them on
    /// replay).
    pub fn append(&mut self, outcome: &StepOutcome) -> Result<()> {
        let payload = DeltaPayload {
            kind: outcome.kind.to_tag(),
            idx: outcome.idx,
            depth: outcome.depth,
            new_value: outcome.new_value,
            old_value: outcome.old_value,
            accepted: outcome.accepted,
            likelihood: outcome.likelihood,
            log_normalization: outcome.log_normalization,
            temperature: outcome.temperature,
            hierarchical_scalar: outcome.hierarchical_scalar,
        };
        write_record(&mut self.writer, &self.path, TAG_DELTA, &payload)?;
        self.pending += 1;
        Ok(())
    }

    pub fn pending(&self) -> usize {
        self.pending
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_full(&self) -> bool {
        self.pending >= self.capacity
    }

    /// Flushes buffered writes to disk without re-anchoring the segment.
    /// Call at end-of-run for a final, complete flush.
    pub fn flush(&mut self) -> Result<()> {
        self.writer
            .flush()
            .map_err(|source| SamplerError::SegmentIo { action: "flush", path: self.path.clone(), source })
    }
}

/// Reads every record from a chain-history file in order. Returns an
/// empty vector for a file that contains no complete records (e.g. a
/// zero-byte file), rather than an error — a segment truncated exactly at
/// a record boundary is a legal `EOF between segments` (spec §4.6).
pub fn read_all(path: impl AsRef<Path>) -> Result<Vec<Record>> {
    let path = path.as_ref();
    let file = File::open(path)
        .map_err(|source| SamplerError::SegmentIo { action: "open", path: path.to_path_buf(), source })?;
    let mut reader = BufReader::new(file);
    let mut records = Vec::new();
    while let Some(record) = read_record(&mut reader, path)? {
        records.push(record);
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use aem_wavelet_tree::WaveletTree;
    use tempfile::NamedTempFile;

    fn tiny_tree() -> WaveletTree {
        let mut tree = WaveletTree::new(1, 1); // 2x2
        let idx = tree.birth_eligible_indices().next().unwrap();
        tree.insert(idx, 0.5).unwrap();
        tree
    }

    #[test]
    fn round_trips_an_initialise_and_a_delta_record() {
        let tree = tiny_tree();
        let file = NamedTempFile::new().unwrap();
        let mut history = ChainHistory::create(file.path(), 8, &tree, &[1.0], 1.0, 10.0, 2.0).unwrap();

        let outcome = StepOutcome {
            kind: MoveKind::Value,
            idx: 3,
            depth: 1,
            new_value: 0.75,
            old_value: Some(0.5),
            accepted: true,
            likelihood: 9.5,
            log_normalization: 2.1,
            temperature: 1.0,
            hierarchical_scalar: 1.0,
        };
        history.append(&outcome).unwrap();
        history.flush().unwrap();

        let records = read_all(file.path()).unwrap();
        assert_eq!(records.len(), 2);
        match &records[0] {
            Record::Initialise { live, lambda_scale, likelihood, .. } => {
                assert_eq!(live, &tree.live_snapshot());
                assert_eq!(lambda_scale, &vec![1.0]);
                assert_eq!(*likelihood, 10.0);
            }
            _ => panic!("expected an Initialise record first"),
        }
        match &records[1] {
            Record::Delta { kind, idx, accepted, new_value, .. } => {
                assert_eq!(*kind, MoveKind::Value);
                assert_eq!(*idx, 3);
                assert!(*accepted);
                assert_eq!(*new_value, 0.75);
            }
            _ => panic!("expected a Delta record second"),
        }
    }

    #[test]
    fn tolerates_back_to_back_initialise_records() {
        let tree = tiny_tree();
        let file = NamedTempFile::new().unwrap();
        let mut history = ChainHistory::create(file.path(), 8, &tree, &[1.0], 1.0, 10.0, 2.0).unwrap();
        history.reinitialise(&tree, &[1.0], 1.0, 10.0, 2.0).unwrap();
        history.flush().unwrap();

        let records = read_all(file.path()).unwrap();
        assert_eq!(records.len(), 2);
        assert!(matches!(records[0], Record::Initialise { .. }));
        assert!(matches!(records[1], Record::Initialise { .. }));
    }

    #[test]
    fn ring_reports_full_at_capacity() {
        let tree = tiny_tree();
        let file = NamedTempFile::new().unwrap();
        let mut history = ChainHistory::create(file.path(), 2, &tree, &[1.0], 1.0, 10.0, 2.0).unwrap();
        let outcome = StepOutcome {
            kind: MoveKind::Value,
            idx: 3,
            depth: 1,
            new_value: 0.75,
            old_value: Some(0.5),
            accepted: true,
            likelihood: 9.5,
            log_normalization: 2.1,
            temperature: 1.0,
            hierarchical_scalar: 1.0,
        };
        assert!(!history.is_full());
        history.append(&outcome).unwrap();
        history.append(&outcome).unwrap();
        assert!(history.is_full());
        history.reinitialise(&tree, &[1.0], 1.0, 10.0, 2.0).unwrap();
        assert!(!history.is_full());
    }
}
