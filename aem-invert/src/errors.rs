use std::path::PathBuf;

use aem_forward_model::FormatError;
use aem_postprocess::PostprocessError;
use aem_pt::PtError;
use aem_sampler::SamplerError;
use aem_wavelet_tree::WaveletTreeError;

/// Unifies every library crate's error type into one `Result` for `main`
/// (spec SPEC_FULL.md §3.1: "a `thiserror` enum of `#[from]` variants
/// unifying the above for `main`'s `Result`"). Validation failures here are
/// the CLI's own (bad flag combinations, missing files before any library
/// call); everything else is a transparent pass-through.
#[derive(Debug, thiserror::Error)]
pub enum InversionError {
    #[error(transparent)]
    Tree(#[from] WaveletTreeError),

    #[error(transparent)]
    Format(#[from] FormatError),

    #[error(transparent)]
    Sampler(#[from] SamplerError),

    #[error(transparent)]
    Pt(#[from] PtError),

    #[error(transparent)]
    Postprocess(#[from] PostprocessError),

    #[error("invalid configuration: {0}")]
    Validation(String),

    #[error("failed to write {path}: {source}")]
    Io { path: PathBuf, source: std::io::Error },
}

pub type Result<T> = std::result::Result<T, InversionError>;
