use aem_prior::PriorProposal;
use rand::Rng;
use tracing::warn;

use crate::chain_state::ChainState;
use crate::communicator::Communicator;
use crate::errors::Result;
use crate::survey::Survey;

use super::{MoveKind, ProposalEngine, StepOutcome};

/// Death move (spec §4.4): remove one coefficient drawn uniformly from the
/// death-eligible set (leaves of the live tree). Symmetric to birth: the
/// Green's ratio, prior ratio, and proposal-density terms are each the
/// reciprocal of what the same coefficient's birth would have produced.
pub fn try_death(
    engine: &mut ProposalEngine,
    state: &mut ChainState,
    survey: &Survey,
    prior: &PriorProposal,
    comm: &dyn Communicator,
) -> Result<StepOutcome> {
    let k_before = state.tree.len();
    let eligible: Vec<u32> = state.tree.death_eligible_indices().collect();
    if eligible.is_empty() {
        engine.death.record_invalid();
        return Ok(StepOutcome::no_op(MoveKind::Death, state));
    }
    let idx = eligible[state.rng.gen_range(0..eligible.len())];
    let depth = state.tree.depth_of(idx);
    let (i, j) = state.tree.to_2d(idx);
    let parent = state.tree.parent_of(idx).expect("death-eligible index is non-root");
    let parent_value = state.tree.value(parent).expect("parent is live");
    let old_value = state.tree.value(idx).expect("death-eligible index is live");

    let n_death_before = state.tree.n_death_eligible();
    state.tree.remove(idx)?;
    let n_birth_after = state.tree.n_birth_eligible();

    let log_green = (n_death_before as f64).ln() - (n_birth_after as f64).ln();
    let log_prior = prior.log_prior_ratio_death(
        i,
        j,
        depth,
        old_value,
        k_before as u32,
        engine.kmax as u32,
        state.prior_scale,
    );
    // The reverse move (birth) would need to redraw exactly `old_value`.
    let log_q_rev = prior.reverse_birth_density(i, j, depth, parent_value, old_value, state.prior_scale);
    let log_prop = log_q_rev;

    let (nll_new, log_norm_new) =
        engine.evaluate_with_comm(engine.posteriork, state, survey, comm)?;

    if !nll_new.is_finite() || !log_norm_new.is_finite() {
        warn!(idx, "death proposal produced a non-finite likelihood, auto-rejecting");
        state.tree.insert(idx, old_value)?;
        state.restore_valid_residuals();
        engine.death.record(depth as usize, false);
        return Ok(StepOutcome::no_op(MoveKind::Death, state));
    }

    let log_alpha_like = if engine.posteriork {
        0.0
    } else {
        (state.likelihood - nll_new) / state.temperature
            + (state.log_normalization - log_norm_new) / state.temperature
    };
    let log_alpha = log_green + log_prior + log_prop + log_alpha_like;
    let log_u = state.rng.gen::<f64>().ln();
    let accepted = log_prior.is_finite() && log_u < log_alpha;

    if accepted {
        if !engine.posteriork {
            state.likelihood = nll_new;
            state.log_normalization = log_norm_new;
            state.commit_valid_residuals();
            state.residuals_valid = true;
        }
        engine.death.record(depth as usize, true);
    } else {
        state.tree.insert(idx, old_value)?;
        state.restore_valid_residuals();
        engine.death.record(depth as usize, false);
    }

    Ok(StepOutcome {
        kind: MoveKind::Death,
        idx,
        depth,
        new_value: 0.0,
        old_value: Some(old_value),
        accepted,
        likelihood: state.likelihood,
        log_normalization: state.log_normalization,
        temperature: state.temperature,
        hierarchical_scalar: state.lambda_scale.first().copied().unwrap_or(1.0),
    })
}
