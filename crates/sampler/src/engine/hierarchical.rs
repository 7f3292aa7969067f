use aem_prior::PriorProposal;
use rand::Rng;
use rand_distr::{Distribution, Normal};
use tracing::warn;

use crate::chain_state::ChainState;
use crate::communicator::Communicator;
use crate::errors::Result;
use crate::survey::Survey;

use super::{MoveKind, ProposalEngine, StepOutcome};

/// Hierarchical noise move (spec §4.4): log-random-walk on one system's
/// `lambda_scale`. The tree and residuals are untouched; only the
/// whitened residual and its likelihood contribution change, so the
/// forward model is never re-evaluated. Asserts `residuals_valid` first
/// (spec §9's design note), refreshing from scratch if a prior move left
/// it stale.
pub fn try_hierarchical(
    engine: &mut ProposalEngine,
    state: &mut ChainState,
    survey: &Survey,
    comm: &dyn Communicator,
) -> Result<StepOutcome> {
    if !state.residuals_valid {
        state.recompute_likelihood(survey)?;
    }

    let n_systems = state.lambda_scale.len();
    let s = state.rng.gen_range(0..n_systems);
    let old_lambda = state.lambda_scale[s];
    let step: f64 = Normal::new(0.0, engine.lambda_std()).expect("positive lambda_std").sample(&mut state.rng);
    let new_lambda = old_lambda * step.exp();

    let mut trial_lambda = state.lambda_scale.clone();
    trial_lambda[s] = new_lambda;
    let mut normed_scratch = vec![0.0; state.residual.len()];

    let (nll_local, log_norm_local) = if engine.posteriork() {
        (0.0, 0.0)
    } else {
        survey.nll(&state.residual, &trial_lambda, &mut normed_scratch)
    };
    let nll_new = comm.reduce_sum(nll_local, 0);
    let log_norm_new = comm.reduce_sum(log_norm_local, 0);
    comm.barrier();

    if !nll_new.is_finite() || !log_norm_new.is_finite() {
        warn!(system = s, "hierarchical proposal produced a non-finite likelihood, auto-rejecting");
        engine.hierarchical.record(0, false);
        return Ok(StepOutcome::no_op(MoveKind::Hierarchical, state));
    }

    // p(log lambda) is flat (Jeffreys-like), so the symmetric log-random
    // walk carries no Jacobian correction: the prior/proposal term is 0.
    let log_alpha = if engine.posteriork() {
        0.0
    } else {
        (state.likelihood - nll_new) / state.temperature
            + (state.log_normalization - log_norm_new) / state.temperature
    };
    let log_u = state.rng.gen::<f64>().ln();
    let accepted = log_u < log_alpha;

    if accepted && !engine.posteriork() {
        state.lambda_scale[s] = new_lambda;
        state.residual_normed.copy_from_slice(&normed_scratch);
        state.likelihood = nll_new;
        state.log_normalization = log_norm_new;
        state.commit_valid_residuals();
        state.residuals_valid = true;
    } else if accepted {
        state.lambda_scale[s] = new_lambda;
    }
    engine.hierarchical.record(0, accepted);

    Ok(StepOutcome {
        kind: MoveKind::Hierarchical,
        idx: 0,
        depth: 0,
        new_value: new_lambda,
        old_value: Some(old_lambda),
        accepted,
        likelihood: state.likelihood,
        log_normalization: state.log_normalization,
        temperature: state.temperature,
        hierarchical_scalar: state.lambda_scale[s],
    })
}

/// Hierarchical prior-width move (spec §4.4): log-random-walk on
/// `state.prior_scale`, the multiplier widening/narrowing every depth's
/// prior range symmetrically. No likelihood term: the move is rejected
/// outright if it would strand any live coefficient outside its new
/// scaled range, otherwise accepted against the ratio of prior densities
/// summed over every live coefficient.
pub fn try_hierarchical_prior(
    engine: &mut ProposalEngine,
    state: &mut ChainState,
    prior: &PriorProposal,
) -> Result<StepOutcome> {
    let old_scale = state.prior_scale;
    let step: f64 = Normal::new(0.0, engine.prior_std()).expect("positive prior_std").sample(&mut state.rng);
    let new_scale = old_scale * step.exp();

    let mut log_alpha = 0.0;
    for (idx, value) in state.tree.live_snapshot() {
        let depth = state.tree.depth_of(idx);
        let (i, j) = state.tree.to_2d(idx);
        let (new_lo, new_hi) = prior.prior_range(i, j, depth, new_scale);
        if value < new_lo || value > new_hi {
            log_alpha = f64::NEG_INFINITY;
            break;
        }
        let (old_lo, old_hi) = prior.prior_range(i, j, depth, old_scale);
        log_alpha += (old_hi - old_lo).ln() - (new_hi - new_lo).ln();
    }

    let log_u = state.rng.gen::<f64>().ln();
    let accepted = log_alpha.is_finite() && log_u < log_alpha;
    if accepted {
        state.prior_scale = new_scale;
    }
    engine.hierarchical_prior.record(0, accepted);

    Ok(StepOutcome {
        kind: MoveKind::HierarchicalPrior,
        idx: 0,
        depth: 0,
        new_value: new_scale,
        old_value: Some(old_scale),
        accepted,
        likelihood: state.likelihood,
        log_normalization: state.log_normalization,
        temperature: state.temperature,
        hierarchical_scalar: state.prior_scale,
    })
}
