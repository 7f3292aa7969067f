/// Per-move `propose`/`accept` counters, plus a per-depth (or, for the
/// hierarchical moves, a single aggregate bucket) breakdown (spec §4.4).
#[derive(Debug, Clone)]
pub struct MoveStats {
    propose: u64,
    accept: u64,
    propose_by_bucket: Vec<u64>,
    accept_by_bucket: Vec<u64>,
}

impl MoveStats {
    pub fn new(n_buckets: usize) -> Self {
        Self {
            propose: 0,
            accept: 0,
            propose_by_bucket: vec![0; n_buckets.max(1)],
            accept_by_bucket: vec![0; n_buckets.max(1)],
        }
    }

    /// Records a proposal; `bucket` is the depth (birth/death/value) or
    /// `0` for the hierarchical moves. `evaluated` distinguishes a
    /// proposal-invalid silent skip (counts only `propose`, no bucket
    /// entry) from a fully evaluated attempt.
    pub fn record(&mut self, bucket: usize, accepted: bool) {
        self.propose += 1;
        let b = bucket.min(self.propose_by_bucket.len() - 1);
        self.propose_by_bucket[b] += 1;
        if accepted {
            self.accept += 1;
            self.accept_by_bucket[b] += 1;
        }
    }

    /// Spec §7 "proposal-invalid" tier: increments `propose` only, no
    /// bucket, no accept.
    pub fn record_invalid(&mut self) {
        self.propose += 1;
    }

    pub fn propose(&self) -> u64 {
        self.propose
    }

    pub fn accept(&self) -> u64 {
        self.accept
    }

    pub fn ratio(&self) -> f64 {
        if self.propose == 0 {
            0.0
        } else {
            self.accept as f64 / self.propose as f64
        }
    }

    pub fn bucket_ratios(&self) -> Vec<f64> {
        self.propose_by_bucket
            .iter()
            .zip(&self.accept_by_bucket)
            .map(|(&p, &a)| if p == 0 { 0.0 } else { a as f64 / p as f64 })
            .collect()
    }

    pub fn propose_by_bucket(&self) -> &[u64] {
        &self.propose_by_bucket
    }

    pub fn accept_by_bucket(&self) -> &[u64] {
        &self.accept_by_bucket
    }
}
