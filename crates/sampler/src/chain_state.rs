use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use aem_wavelet_tree::{Kernel2D, WaveletTree};

use crate::errors::Result;
use crate::stats::{CovarianceAccumulator, ResidualHistogram, ResidualMoments};
use crate::survey::Survey;

/// Per-replica mutable state (spec §3/§4). Owns the tree exclusively;
/// residuals and running statistics are exclusively owned here too. The
/// survey (forward models + noise models + observations) and the prior are
/// shared read-only references held by [`crate::ProposalEngine`], not by
/// `ChainState` itself, matching spec §3's "Ownership" split.
pub struct ChainState {
    pub tree: WaveletTree,
    /// Scratch buffer reused for `map_to_array` and, in place, the inverse
    /// 2-D wavelet transform: after `refresh_image` it holds the dense
    /// log-conductivity reconstruction (spec §3 "Dense reconstruction
    /// buffer").
    image: Vec<f64>,
    kernel: Kernel2D,

    /// One entry per system (spec §3's "per-model noise parameters"),
    /// multiplying that system's base noise scale.
    pub lambda_scale: Vec<f64>,
    /// Multiplier widening/narrowing every depth's prior range
    /// symmetrically (spec §4.4 "Hierarchical Prior" move).
    pub prior_scale: f64,

    pub residual: Vec<f64>,
    pub residual_normed: Vec<f64>,
    last_valid_residual: Vec<f64>,
    last_valid_residual_normed: Vec<f64>,
    /// Spec §9 design note: maintained explicitly rather than eagerly
    /// recomputed. A hierarchical move asserts this is `true` on entry,
    /// refreshing from scratch first if not.
    pub residuals_valid: bool,

    pub likelihood: f64,
    pub log_normalization: f64,

    pub residual_moments: ResidualMoments,
    pub residual_histogram: ResidualHistogram,
    pub system_covariance: Vec<CovarianceAccumulator>,
    /// Indexed by tree size `k`; incremented once per completed step
    /// regardless of accept/reject (spec SPEC_FULL.md §4 "khistogram").
    pub khistogram: Vec<u64>,

    pub rng: ChaCha8Rng,
    pub temperature: f64,
}

/// See [`ChainState::model_snapshot`] / [`ChainState::adopt_model`].
#[derive(Debug, Clone)]
pub struct ModelSnapshot {
    tree: WaveletTree,
    lambda_scale: Vec<f64>,
    prior_scale: f64,
    residual: Vec<f64>,
    residual_normed: Vec<f64>,
    last_valid_residual: Vec<f64>,
    last_valid_residual_normed: Vec<f64>,
    residuals_valid: bool,
    likelihood: f64,
    log_normalization: f64,
}

impl ChainState {
    /// `kmax` bounds the khistogram's extent; `hist_bins/vmin/vmax`
    /// parameterize the residual diagnostic histogram.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        tree: WaveletTree,
        kernel: Kernel2D,
        n_systems: usize,
        n_data: usize,
        system_sizes: &[usize],
        seed: u64,
        temperature: f64,
        kmax: usize,
        hist_bins: usize,
        hist_vmin: f64,
        hist_vmax: f64,
    ) -> Self {
        let n_coeff = tree.n_coeff();
        Self {
            image: vec![0.0; n_coeff],
            kernel,
            lambda_scale: vec![1.0; n_systems],
            prior_scale: 1.0,
            residual: vec![0.0; n_data],
            residual_normed: vec![0.0; n_data],
            last_valid_residual: vec![0.0; n_data],
            last_valid_residual_normed: vec![0.0; n_data],
            residuals_valid: false,
            likelihood: f64::INFINITY,
            log_normalization: 0.0,
            residual_moments: ResidualMoments::new(n_data),
            residual_histogram: ResidualHistogram::new(hist_vmin, hist_vmax, hist_bins),
            system_covariance: system_sizes.iter().map(|&n| CovarianceAccumulator::new(n)).collect(),
            khistogram: vec![0; kmax + 1],
            rng: ChaCha8Rng::seed_from_u64(seed),
            temperature,
            tree,
        }
    }

    /// Reconstructs the dense log-conductivity image from the current
    /// sparse tree: `map_to_array` then the registered inverse 2-D
    /// transform (spec §4.7's "horizontal then vertical" ordering,
    /// mirrored by the kernel composition itself).
    pub fn refresh_image(&mut self) -> Result<()> {
        self.tree.map_to_array(&mut self.image);
        let (w, h) = (self.tree.shape().width(), self.tree.shape().height());
        self.kernel.inverse_2d(&mut self.image, w, h)?;
        Ok(())
    }

    pub fn image(&self) -> &[f64] {
        &self.image
    }

    /// Evaluates the current tree's likelihood into `self.residual` /
    /// `self.residual_normed` without touching `residuals_valid` or the
    /// last-accepted snapshot; used by proposal moves that need to score a
    /// tentative mutation before deciding whether to keep it.
    pub fn evaluate(&mut self, survey: &Survey) -> Result<(f64, f64)> {
        self.refresh_image()?;
        survey.compute_residual(&self.image, &mut self.residual)?;
        Ok(survey.nll(&self.residual, &self.lambda_scale, &mut self.residual_normed))
    }

    /// Full likelihood evaluation from the current tree, committed as the
    /// new last-accepted state. Called once at chain-state construction and
    /// whenever residuals must be recomputed from scratch (spec §9's
    /// `residuals_valid` design note).
    pub fn recompute_likelihood(&mut self, survey: &Survey) -> Result<()> {
        let (nll, log_norm) = self.evaluate(survey)?;
        self.likelihood = nll;
        self.log_normalization = log_norm;
        self.residuals_valid = true;
        self.commit_valid_residuals();
        Ok(())
    }

    /// Exchanges the entire model (tree, hierarchical parameters, cached
    /// likelihoods, residuals) with another replica's state, as a PT swap
    /// or resample accept requires (spec §4.5 item 3: "exchange whole
    /// models ... Temperatures stay at their rank positions"). `rng`,
    /// `temperature`, and the running diagnostic accumulators
    /// (`residual_moments`, `residual_histogram`, `system_covariance`,
    /// `khistogram`) stay put: they describe what has been observed at
    /// this rank/temperature, not which model currently sits there.
    pub fn swap_model_with(&mut self, other: &mut ChainState) {
        std::mem::swap(&mut self.tree, &mut other.tree);
        std::mem::swap(&mut self.image, &mut other.image);
        std::mem::swap(&mut self.lambda_scale, &mut other.lambda_scale);
        std::mem::swap(&mut self.prior_scale, &mut other.prior_scale);
        std::mem::swap(&mut self.residual, &mut other.residual);
        std::mem::swap(&mut self.residual_normed, &mut other.residual_normed);
        std::mem::swap(&mut self.last_valid_residual, &mut other.last_valid_residual);
        std::mem::swap(&mut self.last_valid_residual_normed, &mut other.last_valid_residual_normed);
        std::mem::swap(&mut self.residuals_valid, &mut other.residuals_valid);
        std::mem::swap(&mut self.likelihood, &mut other.likelihood);
        std::mem::swap(&mut self.log_normalization, &mut other.log_normalization);
    }

    /// A snapshot of everything `swap_model_with` considers part of "the
    /// model" (spec §4.5's resampling operator: "copy a whole model from a
    /// lower-temperature rank"), independent of any other chain's state —
    /// unlike a swap, resampling is a one-directional copy, so both the
    /// donor and the receiver need their own owned data.
    pub fn model_snapshot(&self) -> ModelSnapshot {
        ModelSnapshot {
            tree: self.tree.clone(),
            lambda_scale: self.lambda_scale.clone(),
            prior_scale: self.prior_scale,
            residual: self.residual.clone(),
            residual_normed: self.residual_normed.clone(),
            last_valid_residual: self.last_valid_residual.clone(),
            last_valid_residual_normed: self.last_valid_residual_normed.clone(),
            residuals_valid: self.residuals_valid,
            likelihood: self.likelihood,
            log_normalization: self.log_normalization,
        }
    }

    /// Overwrites this state's model with a donor's snapshot (spec §4.5
    /// resampling). `rng` and `temperature` are left untouched, matching
    /// `swap_model_with`'s "temperatures stay at their rank positions".
    pub fn adopt_model(&mut self, snapshot: ModelSnapshot) {
        self.tree = snapshot.tree;
        self.lambda_scale = snapshot.lambda_scale;
        self.prior_scale = snapshot.prior_scale;
        self.residual = snapshot.residual;
        self.residual_normed = snapshot.residual_normed;
        self.last_valid_residual = snapshot.last_valid_residual;
        self.last_valid_residual_normed = snapshot.last_valid_residual_normed;
        self.residuals_valid = snapshot.residuals_valid;
        self.likelihood = snapshot.likelihood;
        self.log_normalization = snapshot.log_normalization;
    }

    pub fn commit_valid_residuals(&mut self) {
        self.last_valid_residual.copy_from_slice(&self.residual);
        self.last_valid_residual_normed.copy_from_slice(&self.residual_normed);
    }

    /// Rolls the residual buffers back to the last accepted step (spec
    /// §4.4 "Acceptance bookkeeping": a rejected move that touched
    /// residuals must restore `last_valid_residual(_normed)` exactly).
    pub fn restore_valid_residuals(&mut self) {
        self.residual.copy_from_slice(&self.last_valid_residual);
        self.residual_normed.copy_from_slice(&self.last_valid_residual_normed);
    }

    /// Updates the running residual/khistogram statistics for one
    /// completed step, whichever move kind produced it and whether or not
    /// it was accepted (spec SPEC_FULL.md §4: "updated once per completed
    /// step").
    pub fn record_step_stats(&mut self, survey: &Survey) {
        self.residual_moments.update(&self.residual);
        self.residual_histogram.update(&self.residual);
        for (s, acc) in self.system_covariance.iter_mut().enumerate() {
            for block in survey.system_point_blocks(s, &self.residual) {
                acc.update(&block);
            }
        }
        let k = self.tree.len().min(self.khistogram.len() - 1);
        self.khistogram[k] += 1;
    }
}
