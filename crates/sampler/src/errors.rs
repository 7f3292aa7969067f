use std::path::PathBuf;

use aem_forward_model::FormatError;
use aem_wavelet_tree::WaveletTreeError;

/// Unrecoverable tiers of spec §7's error taxonomy: invariant violations,
/// io failures, and response-length mismatches. These abort the run.
#[derive(Debug, thiserror::Error)]
pub enum SamplerError {
    #[error(transparent)]
    Tree(#[from] WaveletTreeError),

    #[error(transparent)]
    Format(#[from] FormatError),

    #[error("forward model '{system}' returned {got} response values, expected {expected}")]
    ResponseLengthMismatch { system: String, expected: usize, got: usize },

    #[error("forward model '{system}' evaluation failed: {source}")]
    Forward { system: String, source: FormatError },

    #[error("failed to {action} chain-history segment {path}: {source}")]
    SegmentIo { action: &'static str, path: PathBuf, source: std::io::Error },

    #[error("malformed chain-history segment at {path}: {message}")]
    SegmentFormat { path: PathBuf, message: String },

    #[error("bincode (de)serialization failed while {action}: {source}")]
    Codec { action: &'static str, source: bincode::Error },
}

pub type Result<T> = std::result::Result<T, SamplerError>;

/// Proposal-invalid tier (spec §7): local to a single move attempt, never
/// surfaced to the caller as a hard failure. `ProposalEngine::step` matches
/// on this, increments the move's `propose` counter, and returns without
/// mutating any state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProposalReject {
    /// A sampled or perturbed value fell outside the coefficient's prior
    /// range.
    OutOfPriorRange,
    /// The birth- or death-eligible set was empty when the move needed to
    /// draw from it.
    NoEligibleIndex,
    /// A birth was attempted at a coefficient whose depth already exceeds
    /// `Dmax`, or the tree is already at `kmax`.
    DepthSaturated,
    /// The numeric tier (spec §7): a proposed likelihood or
    /// log-normalization evaluated to a non-finite value. Counted as an
    /// automatic reject with a `warn`-level log, not a propose-only skip.
    NonFiniteLikelihood,
}
