//! Per-coefficient prior/proposal distributions keyed by `(depth, i, j)`
//! (spec §4.2). Loaded at start-up from a text prior-configuration file and
//! held as a read-only reference shared across replicas (spec §3
//! "Ownership").

mod depth_prior;
mod proposal;

pub use depth_prior::DepthPrior;
pub use proposal::PriorProposal;
