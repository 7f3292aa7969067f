//! The five-move RJ-MCMC proposal engine (spec §4.4): birth, death, value,
//! hierarchical (noise `lambda_scale`), and hierarchical-prior moves, each
//! with its own acceptance bookkeeping and reverse-move restoration on
//! reject.

mod birth;
mod death;
mod hierarchical;
mod stats;
mod value;

pub use stats::MoveStats;

use aem_prior::PriorProposal;
use rand::Rng;
use tracing::instrument;

use crate::chain_state::ChainState;
use crate::communicator::Communicator;
use crate::errors::Result;
use crate::survey::Survey;

/// Which move kind a step attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveKind {
    Birth,
    Death,
    Value,
    Hierarchical,
    HierarchicalPrior,
}

impl MoveKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Birth => "birth",
            Self::Death => "death",
            Self::Value => "value",
            Self::Hierarchical => "hierarchical",
            Self::HierarchicalPrior => "hierarchical_prior",
        }
    }
}

/// Relative weights for move selection (spec §6's `--birth-probability`
/// plus the hierarchical move rates). Birth and death always share
/// `birth_prob` equally, matching the standard RJ-MCMC convention of
/// symmetric dimension-change proposal rates.
#[derive(Debug, Clone, Copy)]
pub struct MoveProbabilities {
    pub birth: f64,
    pub death: f64,
    pub value: f64,
    pub hierarchical: f64,
    pub hierarchical_prior: f64,
}

impl MoveProbabilities {
    pub fn new(birth_prob: f64, hierarchical_prob: f64, hierarchical_prior_prob: f64) -> Self {
        assert!((0.0..=1.0).contains(&birth_prob));
        let half = birth_prob / 2.0;
        let remainder = (1.0 - birth_prob - hierarchical_prob - hierarchical_prior_prob).max(0.0);
        Self {
            birth: half,
            death: half,
            value: remainder,
            hierarchical: hierarchical_prob,
            hierarchical_prior: hierarchical_prior_prob,
        }
    }

    pub fn sample(&self, rng: &mut impl Rng) -> MoveKind {
        let total = self.birth + self.death + self.value + self.hierarchical + self.hierarchical_prior;
        let mut u = rng.gen::<f64>() * total;
        for (w, kind) in [
            (self.birth, MoveKind::Birth),
            (self.death, MoveKind::Death),
            (self.value, MoveKind::Value),
            (self.hierarchical, MoveKind::Hierarchical),
            (self.hierarchical_prior, MoveKind::HierarchicalPrior),
        ] {
            if u < w {
                return kind;
            }
            u -= w;
        }
        MoveKind::Value
    }
}

/// One completed step's outcome, carrying everything [`ChainHistory`] needs
/// to append a `DELTA` record (spec §4.6) without reaching back into
/// engine internals. `idx`/`old_value` are meaningless (and ignored by
/// replay) when `accepted` is `false`.
///
/// [`ChainHistory`]: struct@crate::history::ChainHistory
#[derive(Debug, Clone)]
pub struct StepOutcome {
    pub kind: MoveKind,
    pub idx: u32,
    pub depth: u32,
    pub new_value: f64,
    pub old_value: Option<f64>,
    pub accepted: bool,
    pub likelihood: f64,
    pub log_normalization: f64,
    pub temperature: f64,
    pub hierarchical_scalar: f64,
}

impl StepOutcome {
    fn no_op(kind: MoveKind, state: &ChainState) -> Self {
        Self {
            kind,
            idx: 0,
            depth: 0,
            new_value: 0.0,
            old_value: None,
            accepted: false,
            likelihood: state.likelihood,
            log_normalization: state.log_normalization,
            temperature: state.temperature,
            hierarchical_scalar: state.lambda_scale.first().copied().unwrap_or(1.0),
        }
    }
}

/// Owns per-move acceptance statistics (spec §4.4 "Acceptance
/// bookkeeping") and dispatches `step` to the move-specific implementation.
pub struct ProposalEngine {
    pub birth: MoveStats,
    pub death: MoveStats,
    pub value: MoveStats,
    pub hierarchical: MoveStats,
    pub hierarchical_prior: MoveStats,
    kmax: usize,
    /// `--posteriork`: disables likelihood evaluation, treating it as a
    /// constant (spec §6), so every move's acceptance collapses to its
    /// prior/proposal terms alone.
    posteriork: bool,
    /// Log-random-walk step size for the hierarchical `lambda_scale` move
    /// (spec §6 `--lambda-std`).
    lambda_std: f64,
    /// Log-random-walk step size for the hierarchical prior-width move
    /// (spec §6 `--prior-std`).
    prior_std: f64,
}

impl ProposalEngine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        max_depth: u32,
        kmax: usize,
        posteriork: bool,
        lambda_std: f64,
        prior_std: f64,
    ) -> Self {
        let depths = max_depth as usize + 1;
        Self {
            birth: MoveStats::new(depths),
            death: MoveStats::new(depths),
            value: MoveStats::new(depths),
            hierarchical: MoveStats::new(1),
            hierarchical_prior: MoveStats::new(1),
            kmax,
            posteriork,
            lambda_std,
            prior_std,
        }
    }

    pub fn kmax(&self) -> usize {
        self.kmax
    }

    pub fn posteriork(&self) -> bool {
        self.posteriork
    }

    pub fn lambda_std(&self) -> f64 {
        self.lambda_std
    }

    pub fn prior_std(&self) -> f64 {
        self.prior_std
    }

    #[instrument(level = "debug", skip_all, fields(kind = kind.label()))]
    pub fn step(
        &mut self,
        kind: MoveKind,
        state: &mut ChainState,
        survey: &Survey,
        prior: &PriorProposal,
        comm: &dyn Communicator,
    ) -> Result<StepOutcome> {
        let outcome = match kind {
            MoveKind::Birth => birth::try_birth(self, state, survey, prior, comm)?,
            MoveKind::Death => death::try_death(self, state, survey, prior, comm)?,
            MoveKind::Value => value::try_value(self, state, survey, prior, comm)?,
            MoveKind::Hierarchical => hierarchical::try_hierarchical(self, state, survey, comm)?,
            MoveKind::HierarchicalPrior => {
                hierarchical::try_hierarchical_prior(self, state, prior)?
            }
        };
        state.record_step_stats(survey);
        Ok(outcome)
    }

    /// Evaluates the proposed tree's likelihood, routed through the
    /// communicator's collective reduce (spec §5's suspension point (b));
    /// `posteriork` mode skips forward-model evaluation entirely.
    fn evaluate_with_comm(
        &self,
        posteriork: bool,
        state: &mut ChainState,
        survey: &Survey,
        comm: &dyn Communicator,
    ) -> Result<(f64, f64)> {
        if posteriork {
            return Ok((0.0, 0.0));
        }
        let (nll, log_norm) = state.evaluate(survey)?;
        let nll = comm.reduce_sum(nll, 0);
        let log_norm = comm.reduce_sum(log_norm, 0);
        comm.barrier();
        Ok((nll, log_norm))
    }
}
