use std::path::Path;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use tracing::{info, instrument};

use aem_prior::PriorProposal;
use aem_sampler::{
    ChainHistory, ChainState, MoveProbabilities, ProposalEngine, SingleRankCommunicator, Survey,
};

use crate::errors::Result;
use crate::ladder::TemperatureLadder;
use crate::resample::resample;
use crate::swap::{propose_swaps, SwapStats};

/// The single coordinating loop (spec §4: "Control flow: Driver → random
/// move selection → ProposalEngine.step ... → ChainHistory.append →
/// periodically PTCoordinator.swap / resample → periodically
/// ChainHistory.flush"). Each replica's own step is independent of every
/// other replica's (run via `rayon` across the replica vector, spec §3.6's
/// "use thread-based data parallelism rather than hand-rolled thread
/// pools"); PT swap and resample are the only synchronization points
/// (spec §5 "Ordering guarantees").
pub struct Driver<'a> {
    ladder: TemperatureLadder,
    survey: &'a Survey,
    prior: &'a PriorProposal,
    move_probs: MoveProbabilities,
    chains: Vec<ChainState>,
    engines: Vec<ProposalEngine>,
    histories: Vec<ChainHistory>,
    exchange_rate: u64,
    resample_rate: Option<u64>,
    /// A dedicated stream for the swap/resample pairing decision (spec
    /// §4.5 item 1: "stable across ranks via a shared seed"), independent
    /// of any single replica's own RNG so that pairing a replica in does
    /// not alias its per-step move RNG.
    pairing_rng: ChaCha8Rng,
    pub swap_stats: SwapStats,
}

impl<'a> Driver<'a> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        ladder: TemperatureLadder,
        survey: &'a Survey,
        prior: &'a PriorProposal,
        move_probs: MoveProbabilities,
        chains: Vec<ChainState>,
        engines: Vec<ProposalEngine>,
        histories: Vec<ChainHistory>,
        exchange_rate: u64,
        resample_rate: Option<u64>,
        pairing_seed: u64,
    ) -> Self {
        assert_eq!(chains.len(), ladder.total_replicas());
        assert_eq!(engines.len(), ladder.total_replicas());
        assert_eq!(histories.len(), ladder.total_replicas());
        Self {
            ladder,
            survey,
            prior,
            move_probs,
            chains,
            engines,
            histories,
            exchange_rate,
            resample_rate,
            pairing_rng: ChaCha8Rng::seed_from_u64(pairing_seed),
            swap_stats: SwapStats::default(),
        }
    }

    pub fn chains(&self) -> &[ChainState] {
        &self.chains
    }

    pub fn ladder(&self) -> &TemperatureLadder {
        &self.ladder
    }

    pub fn engines(&self) -> &[ProposalEngine] {
        &self.engines
    }

    /// Runs `total_steps` iterations of the driver loop, returning once
    /// every replica has taken `total_steps` proposal steps and every
    /// chain-history segment has received a final flush.
    #[instrument(level = "info", skip(self))]
    pub fn run(&mut self, total_steps: u64) -> Result<()> {
        for step in 1..=total_steps {
            self.step_all_replicas()?;

            if step % self.exchange_rate == 0 {
                self.run_swap_round()?;
            }
            if let Some(rate) = self.resample_rate {
                if step % rate == 0 {
                    self.run_resample_round()?;
                }
            }
            self.flush_full_rings()?;
        }
        for history in &mut self.histories {
            history.flush()?;
        }
        info!(total_steps, swap_ratio = self.swap_stats.ratio(), "driver run complete");
        Ok(())
    }

    fn step_all_replicas(&mut self) -> Result<()> {
        let survey = self.survey;
        let prior = self.prior;
        let move_probs = self.move_probs;
        let comm = SingleRankCommunicator;

        self.chains
            .par_iter_mut()
            .zip(self.engines.par_iter_mut())
            .zip(self.histories.par_iter_mut())
            .try_for_each(|((chain, engine), history)| -> Result<()> {
                let kind = move_probs.sample(&mut chain.rng);
                let outcome = engine.step(kind, chain, survey, prior, &comm)?;
                history.append(&outcome)?;
                Ok(())
            })
    }

    fn run_swap_round(&mut self) -> Result<()> {
        let touched = propose_swaps(&mut self.chains, &mut self.pairing_rng, &mut self.swap_stats);
        self.reinitialise(&touched)
    }

    fn run_resample_round(&mut self) -> Result<()> {
        let touched = resample(&mut self.chains, &mut self.pairing_rng);
        self.reinitialise(&touched)
    }

    fn flush_full_rings(&mut self) -> Result<()> {
        let mut touched = Vec::new();
        for (i, history) in self.histories.iter().enumerate() {
            if history.is_full() {
                touched.push(i);
            }
        }
        self.reinitialise(&touched)
    }

    fn reinitialise(&mut self, indices: &[usize]) -> Result<()> {
        for &i in indices {
            let chain = &self.chains[i];
            self.histories[i].flush()?;
            self.histories[i].reinitialise(
                &chain.tree,
                &chain.lambda_scale,
                chain.temperature,
                chain.likelihood,
                chain.log_normalization,
            )?;
        }
        Ok(())
    }

    /// Writes `acceptance.txt` (spec §4 supplemented feature): per-move,
    /// per-depth acceptance ratios for every replica, plus the swap ratio.
    pub fn write_acceptance_report(&self, path: impl AsRef<Path>) -> Result<()> {
        use std::fmt::Write as _;
        let mut out = String::new();
        writeln!(
            out,
            "swap {:.6} {} {}",
            self.swap_stats.ratio(),
            self.swap_stats.accepted,
            self.swap_stats.proposed
        )
        .ok();
        for (i, engine) in self.engines.iter().enumerate() {
            for (label, stats) in [
                ("birth", &engine.birth),
                ("death", &engine.death),
                ("value", &engine.value),
                ("hierarchical", &engine.hierarchical),
                ("hierarchical_prior", &engine.hierarchical_prior),
            ] {
                writeln!(out, "replica{i} {label} {:.6} {} {}", stats.ratio(), stats.accept(), stats.propose())
                    .ok();
            }
        }
        std::fs::write(path.as_ref(), out).map_err(|source| {
            aem_sampler::SamplerError::SegmentIo {
                action: "write",
                path: path.as_ref().to_path_buf(),
                source,
            }
            .into()
        })
    }
}
