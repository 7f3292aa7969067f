use serde::{Deserialize, Serialize};

/// Per-depth prior configuration row: a uniform prior/proposal on
/// coefficient value, plus the fractional scale of the Gaussian random-walk
/// used by the value move (spec §4.4: "Gaussian perturbation in coefficient
/// space with scale from the prior range").
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DepthPrior {
    pub vmin: f64,
    pub vmax: f64,
    /// Random-walk standard deviation as a fraction of `vmax - vmin`.
    pub value_step_frac: f64,
}

impl DepthPrior {
    pub fn width(&self) -> f64 {
        self.vmax - self.vmin
    }

    pub fn midpoint(&self) -> f64 {
        0.5 * (self.vmin + self.vmax)
    }

    /// Range after applying a hierarchical prior-width multiplier (spec
    /// §4.4 "Hierarchical Prior" move): widened or narrowed symmetrically
    /// about the midpoint, never inverted.
    pub fn scaled_range(&self, prior_scale: f64) -> (f64, f64) {
        let half = 0.5 * self.width() * prior_scale.max(1e-12);
        let mid = self.midpoint();
        (mid - half, mid + half)
    }

    pub fn contains_scaled(&self, v: f64, prior_scale: f64) -> bool {
        let (lo, hi) = self.scaled_range(prior_scale);
        v >= lo && v <= hi
    }
}
