/// The kind of mutation that produced a [`ChangeRecord`], mirroring the
/// `DELTA` record kinds chain-history stores (spec §4.6): everything here
/// except `RootValueChange` is a dimension-changing or in-place value move
/// at a live coefficient.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ChangeKind {
    RootValueChange,
    Birth,
    Death,
    ValueChange,
}

/// The delta of the most recent mutating call to [`crate::WaveletTree`],
/// returned by `last_perturbation()`. Carries enough information for
/// `ChainHistory` to append a `DELTA` record and for a replay consumer to
/// reconstruct `S_v` incrementally without re-reading the whole tree.
#[derive(Debug, Clone)]
pub struct ChangeRecord {
    pub kind: ChangeKind,
    pub idx: u32,
    pub new_value: f64,
    pub old_value: Option<f64>,
    /// Sorted `(idx, value)` pairs describing the live set after the change.
    pub live_after: Vec<(u32, f64)>,
}
