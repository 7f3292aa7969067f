use aem_prior::PriorProposal;
use rand::Rng;
use tracing::warn;

use crate::chain_state::ChainState;
use crate::communicator::Communicator;
use crate::errors::Result;
use crate::survey::Survey;

use super::{MoveKind, ProposalEngine, StepOutcome};

/// Birth move (spec §4.4): add one coefficient drawn uniformly from the
/// birth-eligible set, value drawn from the prior, accept/reject against
/// the Green's-ratio-corrected, temperature-scaled posterior.
pub fn try_birth(
    engine: &mut ProposalEngine,
    state: &mut ChainState,
    survey: &Survey,
    prior: &PriorProposal,
    comm: &dyn Communicator,
) -> Result<StepOutcome> {
    let k_before = state.tree.len();
    if k_before >= engine.kmax {
        engine.birth.record_invalid();
        return Ok(StepOutcome::no_op(MoveKind::Birth, state));
    }

    let eligible: Vec<u32> = state.tree.birth_eligible_indices().collect();
    if eligible.is_empty() {
        engine.birth.record_invalid();
        return Ok(StepOutcome::no_op(MoveKind::Birth, state));
    }
    let idx = eligible[state.rng.gen_range(0..eligible.len())];
    let depth = state.tree.depth_of(idx);
    let (i, j) = state.tree.to_2d(idx);
    let parent = state.tree.parent_of(idx).expect("birth-eligible index has a live parent");
    let parent_value = state.tree.value(parent).expect("parent is live");

    let (value, log_q_fwd) =
        prior.sample_birth(&mut state.rng, i, j, depth, parent_value, state.prior_scale);
    let n_birth_before = state.tree.n_birth_eligible();

    state.tree.insert(idx, value)?;
    let n_death_after = state.tree.n_death_eligible();

    let log_green = (n_birth_before as f64).ln() - (n_death_after as f64).ln();
    let log_prior = prior.log_prior_ratio_birth(
        i,
        j,
        depth,
        value,
        k_before as u32,
        engine.kmax as u32,
        state.prior_scale,
    );
    // The reverse move (death) is deterministic given idx: q_rev = 1.
    let log_prop = -log_q_fwd;

    let (nll_new, log_norm_new) =
        engine.evaluate_with_comm(engine.posteriork, state, survey, comm)?;

    if !nll_new.is_finite() || !log_norm_new.is_finite() {
        warn!(idx, "birth proposal produced a non-finite likelihood, auto-rejecting");
        state.tree.remove(idx)?;
        state.restore_valid_residuals();
        engine.birth.record(depth as usize, false);
        return Ok(StepOutcome::no_op(MoveKind::Birth, state));
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
        engine.birth.record(depth as usize, true);
    } else {
        state.tree.remove(idx)?;
        state.restore_valid_residuals();
        engine.birth.record(depth as usize, false);
    }

    Ok(StepOutcome {
        kind: MoveKind::Birth,
        idx,
        depth,
        new_value: value,
        old_value: None,
        accepted,
        likelihood: state.likelihood,
        log_normalization: state.log_normalization,
        temperature: state.temperature,
        hierarchical_scalar: state.lambda_scale.first().copied().unwrap_or(1.0),
    })
}
