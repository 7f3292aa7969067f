use rand::Rng;

use aem_sampler::ChainState;

/// One resampling round (spec §4.5 "Resampling (optional operator)"): each
/// replica may copy a whole model from a replica at a strictly lower
/// temperature, chosen by likelihood-weighted sampling among the eligible
/// donors (better-fitting donors — lower NLL — are proportionally more
/// likely to be chosen). Unlike a swap this is a one-directional copy, so
/// the donor keeps its own model. Returns the flat indices of the replicas
/// that adopted a new model, which (like a swap accept) must flush and
/// re-initialise their chain-history segment.
pub fn resample(chains: &mut [ChainState], rng: &mut impl Rng) -> Vec<usize> {
    let n = chains.len();
    let mut touched = Vec::new();

    for target in 0..n {
        let t_target = chains[target].temperature;
        let donors: Vec<usize> = (0..n).filter(|&i| chains[i].temperature < t_target).collect();
        if donors.is_empty() {
            continue;
        }

        let min_likelihood =
            donors.iter().map(|&i| chains[i].likelihood).fold(f64::INFINITY, f64::min);
        let weights: Vec<f64> =
            donors.iter().map(|&i| (-(chains[i].likelihood - min_likelihood)).exp()).collect();
        let total: f64 = weights.iter().sum();

        let mut u = rng.gen::<f64>() * total;
        let mut chosen = *donors.last().expect("non-empty donors");
        for (&idx, &w) in donors.iter().zip(&weights) {
            if u < w {
                chosen = idx;
                break;
            }
            u -= w;
        }

        let snapshot = chains[chosen].model_snapshot();
        chains[target].adopt_model(snapshot);
        touched.push(target);
    }
    touched
}

#[cfg(test)]
mod tests {
    use super::*;
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

    #[test]
    fn hottest_replica_always_has_a_donor_and_adopts_its_likelihood() {
        let mut chains = vec![state(1, 1.0, 5.0), state(2, 4.0, 9.0)];
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let touched = resample(&mut chains, &mut rng);
        assert_eq!(touched, vec![1]);
        assert!((chains[1].likelihood - 5.0).abs() < 1e-12);
    }

    #[test]
    fn coldest_replica_has_no_eligible_donor() {
        let mut chains = vec![state(1, 1.0, 5.0), state(2, 4.0, 9.0)];
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let touched = resample(&mut chains, &mut rng);
        assert!(!touched.contains(&0));
    }
}
