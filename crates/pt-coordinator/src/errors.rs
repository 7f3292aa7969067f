use aem_sampler::SamplerError;

/// Errors surfaced by the PT coordinator and driver; wraps `SamplerError`
/// so a `Driver` can propagate a single replica's fatal failure without
/// the caller needing to know which layer produced it (spec §5's "fatal
/// invariant violations abort the process").
#[derive(Debug, thiserror::Error)]
pub enum PtError {
    #[error(transparent)]
    Sampler(#[from] SamplerError),

    #[error("temperature ladder must have at least 1 level and an even chains_per_T (got {levels} x {chains_per_t})")]
    InvalidLadder { levels: usize, chains_per_t: usize },
}

pub type Result<T> = std::result::Result<T, PtError>;
