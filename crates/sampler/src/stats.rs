//! Running statistics owned by [`crate::ChainState`]: residual mean/variance
//! (Welford), a coarse residual histogram, and a per-system residual
//! covariance accumulator (spec §3: "residual mean, residual histogram (bin
//! grid), residual covariance per system").

/// Welford's online mean/variance accumulator, one slot per data index.
#[derive(Debug, Clone)]
pub struct ResidualMoments {
    mean: Vec<f64>,
    m2: Vec<f64>,
    count: u64,
}

impl ResidualMoments {
    pub fn new(n: usize) -> Self {
        Self { mean: vec![0.0; n], m2: vec![0.0; n], count: 0 }
    }

    pub fn update(&mut self, residual: &[f64]) {
        assert_eq!(residual.len(), self.mean.len());
        self.count += 1;
        let n = self.count as f64;
        for i in 0..residual.len() {
            let delta = residual[i] - self.mean[i];
            self.mean[i] += delta / n;
            let delta2 = residual[i] - self.mean[i];
            self.m2[i] += delta * delta2;
        }
    }

    pub fn mean(&self) -> &[f64] {
        &self.mean
    }

    pub fn variance(&self) -> Vec<f64> {
        if self.count < 2 {
            return vec![0.0; self.mean.len()];
        }
        let denom = (self.count - 1) as f64;
        self.m2.iter().map(|m2| m2 / denom).collect()
    }

    pub fn count(&self) -> u64 {
        self.count
    }
}

/// A fixed-width histogram over residual magnitude, shared across all data
/// indices (a coarse diagnostic, distinct from the per-pixel posterior
/// histograms the postprocessor builds).
#[derive(Debug, Clone)]
pub struct ResidualHistogram {
    vmin: f64,
    vmax: f64,
    bins: Vec<u64>,
}

impl ResidualHistogram {
    pub fn new(vmin: f64, vmax: f64, n_bins: usize) -> Self {
        assert!(vmax > vmin && n_bins > 0);
        Self { vmin, vmax, bins: vec![0; n_bins] }
    }

    pub fn update(&mut self, residual: &[f64]) {
        let n_bins = self.bins.len();
        let width = (self.vmax - self.vmin) / n_bins as f64;
        for &r in residual {
            if !r.is_finite() {
                continue;
            }
            let idx = (((r - self.vmin) / width) as isize).clamp(0, n_bins as isize - 1) as usize;
            self.bins[idx] += 1;
        }
    }

    pub fn bins(&self) -> &[u64] {
        &self.bins
    }

    pub fn bin_edges(&self) -> (f64, f64) {
        (self.vmin, self.vmax)
    }
}

/// Online (Welford-style) covariance accumulator for one system's residual
/// block, producing a dense `n x n` covariance matrix.
#[derive(Debug, Clone)]
pub struct CovarianceAccumulator {
    n: usize,
    mean: Vec<f64>,
    /// Row-major `n x n` accumulated co-moment matrix (Welford's `C`).
    c: Vec<f64>,
    count: u64,
}

impl CovarianceAccumulator {
    pub fn new(n: usize) -> Self {
        Self { n, mean: vec![0.0; n], c: vec![0.0; n * n], count: 0 }
    }

    pub fn update(&mut self, block: &[f64]) {
        assert_eq!(block.len(), self.n);
        self.count += 1;
        let k = self.count as f64;
        let mut delta = vec![0.0; self.n];
        for i in 0..self.n {
            delta[i] = block[i] - self.mean[i];
            self.mean[i] += delta[i] / k;
        }
        // Welford's multivariate update: C[i,j] += delta_i_old * (x_j - mean_j_new).
        for i in 0..self.n {
            for j in 0..self.n {
                self.c[i * self.n + j] += delta[i] * (block[j] - self.mean[j]);
            }
        }
    }

    /// Sample covariance matrix, row-major `n x n`.
    pub fn covariance(&self) -> Vec<f64> {
        if self.count < 2 {
            return vec![0.0; self.n * self.n];
        }
        let denom = (self.count - 1) as f64;
        self.c.iter().map(|v| v / denom).collect()
    }

    pub fn n(&self) -> usize {
        self.n
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn residual_moments_match_known_mean_variance() {
        let mut m = ResidualMoments::new(1);
        for v in [1.0, 2.0, 3.0, 4.0] {
            m.update(&[v]);
        }
        assert!((m.mean()[0] - 2.5).abs() < 1e-12);
        assert!((m.variance()[0] - (5.0 / 3.0)).abs() < 1e-9);
    }

    #[test]
    fn histogram_counts_every_finite_sample() {
        let mut h = ResidualHistogram::new(0.0, 10.0, 10);
        h.update(&[0.5, 5.5, 9.9, f64::NAN]);
        let total: u64 = h.bins().iter().sum();
        assert_eq!(total, 3);
    }

    #[test]
    fn covariance_of_independent_scaled_axes_is_diagonal() {
        let mut c = CovarianceAccumulator::new(2);
        let samples = [[1.0, 0.0], [-1.0, 0.0], [1.0, 0.0], [-1.0, 0.0], [0.0, 2.0], [0.0, -2.0]];
        for s in samples {
            c.update(&s);
        }
        let cov = c.covariance();
        assert!(cov[0 * 2 + 1].abs() < 1.0, "off-diagonal should stay small");
    }
}
