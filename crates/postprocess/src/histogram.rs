//! A per-pixel posterior histogram over `[vmin, vmax)` and the summary
//! statistics the postprocessor derives from it (spec §4.7): mode,
//! median, credible interval, and HPD interval.

/// Fixed-width histogram accumulated over one pixel's posterior samples.
#[derive(Debug, Clone)]
pub struct PixelHistogram {
    vmin: f64,
    vmax: f64,
    bins: Vec<u64>,
}

impl PixelHistogram {
    pub fn new(vmin: f64, vmax: f64, n_bins: usize) -> Self {
        assert!(vmax > vmin && n_bins > 0);
        Self { vmin, vmax, bins: vec![0; n_bins] }
    }

    pub fn update(&mut self, value: f64) {
        if !value.is_finite() {
            return;
        }
        let n_bins = self.bins.len();
        let width = (self.vmax - self.vmin) / n_bins as f64;
        let idx = (((value - self.vmin) / width) as isize).clamp(0, n_bins as isize - 1) as usize;
        self.bins[idx] += 1;
    }

    pub fn bins(&self) -> &[u64] {
        &self.bins
    }

    pub fn total(&self) -> u64 {
        self.bins.iter().sum()
    }

    fn bin_width(&self) -> f64 {
        (self.vmax - self.vmin) / self.bins.len() as f64
    }

    fn bin_centre(&self, i: usize) -> f64 {
        self.vmin + (i as f64 + 0.5) * self.bin_width()
    }

    fn bin_edges(&self, i: usize) -> (f64, f64) {
        let w = self.bin_width();
        (self.vmin + i as f64 * w, self.vmin + (i + 1) as f64 * w)
    }

    /// Arg-max bin's centre. Ties resolve to the first (lowest-value) bin.
    pub fn mode(&self) -> f64 {
        let (i, _) = self
            .bins
            .iter()
            .enumerate()
            .max_by_key(|&(_, &count)| count)
            .unwrap_or((0, &0));
        self.bin_centre(i)
    }

    /// Median via an opposing-cumulative-sum walk: two pointers start at
    /// the histogram's ends and each advances past whichever side
    /// currently holds less accumulated weight, until they meet. The
    /// meeting bin's centre is the estimated median (spec §4.7).
    pub fn median(&self) -> f64 {
        let n = self.bins.len();
        if n == 0 {
            return self.vmin;
        }
        let mut lo = 0usize;
        let mut hi = n - 1;
        let mut lo_sum = self.bins[lo] as f64;
        let mut hi_sum = self.bins[hi] as f64;
        while lo < hi {
            if lo_sum <= hi_sum {
                lo += 1;
                lo_sum += self.bins[lo] as f64;
            } else {
                hi -= 1;
                hi_sum += self.bins[hi] as f64;
            }
        }
        self.bin_centre(lo)
    }

    /// `[q_{(1-p)/2}, q_{(1+p)/2}]`: walk in from each tail, dropping
    /// `(1-p)/2` of the total weight off each side (spec §4.7).
    pub fn credible_interval(&self, p: f64) -> (f64, f64) {
        assert!((0.0..=1.0).contains(&p));
        let total = self.total() as f64;
        if total == 0.0 {
            return (self.vmin, self.vmax);
        }
        let tail = (1.0 - p) / 2.0 * total;

        let mut cumulative = 0.0;
        let mut lo_bin = 0usize;
        for (i, &count) in self.bins.iter().enumerate() {
            cumulative += count as f64;
            if cumulative > tail {
                lo_bin = i;
                break;
            }
        }
        let mut cumulative = 0.0;
        let mut hi_bin = self.bins.len() - 1;
        for (i, &count) in self.bins.iter().enumerate().rev() {
            cumulative += count as f64;
            if cumulative > tail {
                hi_bin = i;
                break;
            }
        }
        let (lo, _) = self.bin_edges(lo_bin.min(hi_bin));
        let (_, hi) = self.bin_edges(hi_bin.max(lo_bin));
        (lo, hi)
    }

    /// Brute-force minimum-width contiguous window of bins whose combined
    /// weight is at least fraction `p` of the total (spec §4.7's Highest
    /// Posterior Density interval).
    pub fn hpd_interval(&self, p: f64) -> (f64, f64) {
        assert!((0.0..=1.0).contains(&p));
        let total = self.total() as f64;
        let n = self.bins.len();
        if total == 0.0 || n == 0 {
            return (self.vmin, self.vmax);
        }
        let target = p * total;

        let mut best_width = f64::INFINITY;
        let mut best = (self.vmin, self.vmax);
        for start in 0..n {
            let mut sum = 0.0;
            for end in start..n {
                sum += self.bins[end] as f64;
                if sum >= target {
                    let (lo, _) = self.bin_edges(start);
                    let (_, hi) = self.bin_edges(end);
                    let width = hi - lo;
                    if width < best_width {
                        best_width = width;
                        best = (lo, hi);
                    }
                    break;
                }
            }
        }
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled(values: &[f64], vmin: f64, vmax: f64, bins: usize) -> PixelHistogram {
        let mut h = PixelHistogram::new(vmin, vmax, bins);
        for &v in values {
            h.update(v);
        }
        h
    }

    #[test]
    fn mode_picks_the_most_populated_bin() {
        let h = filled(&[0.1, 0.1, 0.1, 0.9], 0.0, 1.0, 10);
        assert!((h.mode() - 0.15).abs() < 1e-9);
    }

    #[test]
    fn median_of_a_symmetric_histogram_is_central() {
        let values: Vec<f64> = (0..100).map(|i| i as f64 / 100.0).collect();
        let h = filled(&values, 0.0, 1.0, 100);
        assert!((h.median() - 0.5).abs() < 0.02);
    }

    #[test]
    fn credible_interval_shrinks_with_p() {
        let values: Vec<f64> = (0..1000).map(|i| i as f64 / 1000.0).collect();
        let h = filled(&values, 0.0, 1.0, 1000);
        let (lo90, hi90) = h.credible_interval(0.90);
        let (lo50, hi50) = h.credible_interval(0.50);
        assert!(lo50 >= lo90 && hi50 <= hi90);
    }

    #[test]
    fn hpd_interval_is_no_wider_than_the_full_range() {
        let values: Vec<f64> = (0..500).map(|i| (i as f64 / 500.0 - 0.5).abs()).collect();
        let h = filled(&values, 0.0, 1.0, 200);
        let (lo, hi) = h.hpd_interval(0.5);
        assert!(hi > lo);
        assert!(lo >= 0.0 && hi <= 1.0);
    }

    #[test]
    fn empty_histogram_reports_the_full_range() {
        let h = PixelHistogram::new(-1.0, 1.0, 10);
        assert_eq!(h.credible_interval(0.9), (-1.0, 1.0));
        assert_eq!(h.hpd_interval(0.9), (-1.0, 1.0));
    }
}
