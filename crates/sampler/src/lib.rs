//! Chain state, the five-move RJ-MCMC proposal engine, and the binary
//! chain-history segment codec (spec §4.3/§4.4/§4.6): the per-replica
//! surface that `aem-pt`'s driver drives one step at a time.

mod chain_state;
mod communicator;
mod engine;
mod errors;
mod history;
mod stats;
mod survey;

pub use chain_state::{ChainState, ModelSnapshot};
pub use communicator::{Communicator, SingleRankCommunicator};
pub use engine::{MoveKind, MoveProbabilities, MoveStats, ProposalEngine, StepOutcome};
pub use errors::{ProposalReject, Result, SamplerError};
pub use history::{read_all, ChainHistory, Record};
pub use stats::{CovarianceAccumulator, ResidualHistogram, ResidualMoments};
pub use survey::Survey;
