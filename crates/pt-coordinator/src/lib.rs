//! Temperature ladder, in-process SPMD communicator, PT swap/resample
//! operators, and the single-loop [`Driver`] (spec §4.5/§5): the
//! coordination layer sitting above `aem-sampler`'s per-replica
//! `ChainState`/`ProposalEngine`.

mod communicator;
mod driver;
mod errors;
mod ladder;
mod resample;
mod swap;

pub use communicator::RayonCommunicator;
pub use driver::Driver;
pub use errors::{PtError, Result};
pub use ladder::TemperatureLadder;
pub use resample::resample;
pub use swap::{propose_swaps, SwapStats};
