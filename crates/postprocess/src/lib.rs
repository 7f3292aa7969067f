//! Chain-history replay and per-pixel posterior summarization (spec
//! §4.7): reconstructs the evolving live-index multiset one record at a
//! time, maps each retained sample through the inverse 2-D wavelet
//! transform, and accumulates per-pixel mean/variance/histogram summaries
//! consumed by `aem-invert`'s output stage.

mod errors;
mod histogram;
mod pixel_stats;
mod postprocessor;
mod replay;

pub use errors::{PostprocessError, Result};
pub use histogram::PixelHistogram;
pub use pixel_stats::PixelStats;
pub use postprocessor::{PixelSummary, PostprocessConfig, PosteriorSummary, Postprocessor};
pub use replay::{replay, ReplaySession};
