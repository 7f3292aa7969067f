/// Ratio between successive layer thicknesses in the derived log-spaced
/// thickness vector (spec §3): thin layers near the surface, coarser with
/// depth, the conventional layered-earth discretization for AEM inversion.
const LAYER_GROWTH_RATIO: f64 = 1.15;

/// Derives an `h`-element thickness vector, geometrically (log-)spaced, so
/// that `thicknesses.sum() == depth` (spec §3: "A layered-thickness vector
/// of length `H` is derived log-spaced such that sum equals `depth`").
pub fn log_spaced_thicknesses(h: usize, depth: f64) -> Vec<f64> {
    assert!(h > 0);
    assert!(depth > 0.0);
    if h == 1 {
        return vec![depth];
    }
    let q = LAYER_GROWTH_RATIO;
    let t1 = depth * (q - 1.0) / (q.powi(h as i32) - 1.0);
    let mut out = Vec::with_capacity(h);
    let mut t = t1;
    for _ in 0..h {
        out.push(t);
        t *= q;
    }
    out
}

/// Depths to the bottom of each layer (cumulative sum of thicknesses).
pub fn layer_bottoms(thicknesses: &[f64]) -> Vec<f64> {
    let mut acc = 0.0;
    thicknesses
        .iter()
        .map(|t| {
            acc += t;
            acc
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thicknesses_sum_to_depth() {
        for h in [1usize, 2, 5, 16, 200] {
            let t = log_spaced_thicknesses(h, 300.0);
            assert_eq!(t.len(), h);
            let sum: f64 = t.iter().sum();
            assert!((sum - 300.0).abs() < 1e-6, "h={h} sum={sum}");
        }
    }

    #[test]
    fn thicknesses_increase_with_depth() {
        let t = log_spaced_thicknesses(10, 100.0);
        for w in t.windows(2) {
            assert!(w[1] > w[0]);
        }
    }
}
