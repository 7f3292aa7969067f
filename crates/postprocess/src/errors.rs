use std::path::PathBuf;

use aem_sampler::SamplerError;
use aem_wavelet_tree::WaveletTreeError;

/// Errors raised while replaying chain-history segments and summarizing
/// the resulting posterior (spec §4.7/§8). A malformed or out-of-order
/// segment is an invariant-tier failure: the file was either produced by a
/// different run configuration than the one supplied to the replay, or is
/// itself corrupt.
#[derive(Debug, thiserror::Error)]
pub enum PostprocessError {
    #[error(transparent)]
    Sampler(#[from] SamplerError),

    #[error(transparent)]
    Tree(#[from] WaveletTreeError),

    #[error("failed to write postprocess output {path}: {source}")]
    Io { path: PathBuf, source: std::io::Error },
}

pub type Result<T> = std::result::Result<T, PostprocessError>;
