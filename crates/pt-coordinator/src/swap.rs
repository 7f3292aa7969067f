use rand::seq::SliceRandom;
use rand::Rng;

use aem_sampler::ChainState;

/// Running totals for the swap operator's `acceptance.txt` line (spec §8
/// scenario 4: "Swap-acceptance ratio printed in `acceptance.txt`").
#[derive(Debug, Clone, Copy, Default)]
pub struct SwapStats {
    pub proposed: u64,
    pub accepted: u64,
}

impl SwapStats {
    pub fn ratio(&self) -> f64 {
        if self.proposed == 0 {
            0.0
        } else {
            self.accepted as f64 / self.proposed as f64
        }
    }
}

/// One round of PT swap proposals (spec §4.5 steps 1-3): pairs up every
/// replica randomly (a shared-seed permutation, stable across callers that
/// pass the same `rng` state), then for each pair accepts an exchange of
/// whole models with probability `min(1, exp((L_a - L_b)(1/T_a - 1/T_b)))`
/// where `T_a < T_b` and `L` is each replica's cached NLL (lower is a
/// better fit) — the standard replica-exchange formula `(β_a-β_b)(E_a-E_b)`
/// with `β = 1/T`. Returns the flat indices into `chains` whose
/// chain-history segment must be flushed and re-initialised (spec §4.5
/// item 5: "on any accept, the affected chains must flush and
/// re-initialise").
pub fn propose_swaps(chains: &mut [ChainState], rng: &mut impl Rng, stats: &mut SwapStats) -> Vec<usize> {
    let n = chains.len();
    let mut order: Vec<usize> = (0..n).collect();
    order.shuffle(rng);

    let mut touched = Vec::new();
    for pair in order.chunks_exact(2) {
        let (mut lo, mut hi) = (pair[0], pair[1]);
        if chains[lo].temperature > chains[hi].temperature {
            std::mem::swap(&mut lo, &mut hi);
        }
        let (t_a, t_b) = (chains[lo].temperature, chains[hi].temperature);
        let (l_a, l_b) = (chains[lo].likelihood, chains[hi].likelihood);

        stats.proposed += 1;
        let log_alpha = if t_a == t_b { 0.0 } else { (l_a - l_b) * (1.0 / t_a - 1.0 / t_b) };
        let log_u = rng.gen::<f64>().ln();
        if log_u < log_alpha {
            stats.accepted += 1;
            let (left, right) = chains.split_at_mut(hi);
            left[lo].swap_model_with(&mut right[0]);
            touched.push(lo);
            touched.push(hi);
        }
    }
    touched
}

#[cfg(test)]
mod tests {
    use super::*;
    use aem_sampler::SingleRankCommunicator;
    use aem_wavelet_tree::{Kernel2D, WaveletTree};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn state(seed: u64, temperature: f64, likelihood: f64) -> ChainState {
        let mut s = ChainState::new(
            WaveletTree::new(1, 1),
            Kernel2D::new("haar", "haar").unwrap(),
            1,
            4,
            &[4],
            seed,
            temperature,
            16,
            8,
            -5.0,
            5.0,
        );
        s.likelihood = likelihood;
        s
    }

    /// Runs `trials` independent swap rounds on a fresh two-replica pair
    /// with the given (temperature, likelihood) pairs, returning the
    /// fraction of rounds that swapped.
    fn acceptance_rate(cold: (f64, f64), hot: (f64, f64), trials: u32, seed: u64) -> f64 {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut stats = SwapStats::default();
        let mut accepted = 0u32;
        for _ in 0..trials {
            let mut chains = vec![state(1, cold.0, cold.1), state(2, hot.0, hot.1)];
            let touched = propose_swaps(&mut chains, &mut rng, &mut stats);
            if !touched.is_empty() {
                accepted += 1;
            }
        }
        accepted as f64 / trials as f64
    }

    #[test]
    fn swap_accepts_almost_always_when_the_hot_replica_fits_better() {
        let _ = SingleRankCommunicator; // acknowledges the P=1 collapse this test exercises implicitly
        // cold (T=1) holds a badly-fitting model (NLL=1000), hot (T=4) holds
        // a well-fitting one (NLL=1): log_alpha = (1000-1)*(1/1-1/4) >> 0, so
        // swapping the better-fitting model down to the cold replica should
        // be accepted on essentially every round.
        let rate = acceptance_rate((1.0, 1000.0), (4.0, 1.0), 200, 42);
        assert!(rate > 0.9, "expected near-certain acceptance, got {rate}");
    }

    #[test]
    fn swap_rejects_almost_always_when_the_cold_replica_already_fits_better() {
        // cold (T=1) already holds the well-fitting model (NLL=1), hot
        // (T=4) holds the badly-fitting one (NLL=1000): log_alpha =
        // (1-1000)*(1/1-1/4) << 0, so the swap should almost never accept.
        let rate = acceptance_rate((1.0, 1.0), (4.0, 1000.0), 200, 42);
        assert!(rate < 0.1, "expected near-certain rejection, got {rate}");
    }
}
