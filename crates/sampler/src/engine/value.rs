use aem_prior::PriorProposal;
use rand::Rng;
use rand_distr::{Distribution, Normal};
use tracing::warn;

use crate::chain_state::ChainState;
use crate::communicator::Communicator;
use crate::errors::Result;
use crate::survey::Survey;

use super::{MoveKind, ProposalEngine, StepOutcome};

/// Value move (spec §4.4): Gaussian random-walk perturbation of one live
/// coefficient's value at fixed dimension, standard Metropolis acceptance
/// under the temperature-scaled likelihood. Out-of-prior-range proposals
/// are a proposal-invalid silent reject (spec §7), never evaluated against
/// the forward model.
pub fn try_value(
    engine: &mut ProposalEngine,
    state: &mut ChainState,
    survey: &Survey,
    prior: &PriorProposal,
    comm: &dyn Communicator,
) -> Result<StepOutcome> {
    let live = state.tree.live_snapshot();
    let (idx, old_value) = live[state.rng.gen_range(0..live.len())];
    let depth = state.tree.depth_of(idx);
    let (i, j) = state.tree.to_2d(idx);

    let sigma = prior.value_proposal_sigma(depth, state.prior_scale);
    let step: f64 = Normal::new(0.0, sigma.max(1e-12)).expect("positive sigma").sample(&mut state.rng);
    let new_value = old_value + step;

    let (lo, hi) = prior.prior_range(i, j, depth, state.prior_scale);
    if new_value < lo || new_value > hi {
        engine.value.record_invalid();
        return Ok(StepOutcome::no_op(MoveKind::Value, state));
    }

    state.tree.update(idx, new_value)?;
    let (nll_new, log_norm_new) =
        engine.evaluate_with_comm(engine.posteriork, state, survey, comm)?;

    if !nll_new.is_finite() || !log_norm_new.is_finite() {
        warn!(idx, "value proposal produced a non-finite likelihood, auto-rejecting");
        state.tree.update(idx, old_value)?;
        state.restore_valid_residuals();
        engine.value.record(depth as usize, false);
        return Ok(StepOutcome::no_op(MoveKind::Value, state));
    }

    let log_alpha = if engine.posteriork {
        0.0
    } else {
        (state.likelihood - nll_new) / state.temperature
            + (state.log_normalization - log_norm_new) / state.temperature
    };
    let log_u = state.rng.gen::<f64>().ln();
    let accepted = log_u < log_alpha;

    if accepted {
        if !engine.posteriork {
            state.likelihood = nll_new;
            state.log_normalization = log_norm_new;
            state.commit_valid_residuals();
            state.residuals_valid = true;
        }
        engine.value.record(depth as usize, true);
    } else {
        state.tree.update(idx, old_value)?;
        state.restore_valid_residuals();
        engine.value.record(depth as usize, false);
    }

    Ok(StepOutcome {
        kind: MoveKind::Value,
        idx,
        depth,
        new_value,
        old_value: Some(old_value),
        accepted,
        likelihood: state.likelihood,
        log_normalization: state.log_normalization,
        temperature: state.temperature,
        hierarchical_scalar: state.lambda_scale.first().copied().unwrap_or(1.0),
    })
}
