use std::path::PathBuf;

/// Errors raised by [`crate::WaveletTree`] mutations and (de)serialization.
///
/// These are invariant-tier errors per the error taxonomy: a caller that
/// triggers one of the `InvalidMove` variants has violated a tree invariant
/// and the condition should not occur if `ProposalEngine` only ever proposes
/// moves drawn from the birth-eligible / death-eligible sets it maintains.
#[derive(Debug, thiserror::Error)]
pub enum WaveletTreeError {
    #[error("cannot insert coefficient {idx}: parent is not live in the tree")]
    ParentMissing { idx: u32 },

    #[error("cannot remove coefficient {idx}: it still has live children")]
    HasLiveChildren { idx: u32 },

    #[error("cannot update coefficient {idx}: it is not live in the tree")]
    NotLive { idx: u32 },

    #[error("coefficient index {idx} exceeds grid size {n}")]
    IndexOutOfRange { idx: u32, n: usize },

    #[error("coefficient {idx} at depth {depth} exceeds max depth {max_depth}")]
    DepthExceeded { idx: u32, depth: u32, max_depth: u32 },

    #[error("failed to read wavelet tree file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to decode wavelet tree file {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: bincode::Error,
    },

    #[error("unknown wavelet kernel '{0}'")]
    UnknownKernel(String),

    #[error("kernel '{name}' requires an array length that is a power of two, got {len}")]
    NonPowerOfTwoLength { name: &'static str, len: usize },
}

pub type Result<T> = std::result::Result<T, WaveletTreeError>;
