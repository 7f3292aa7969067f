/// The SPMD collective-communication contract (spec §5) that
/// `ProposalEngine::step`'s five-stage protocol suspends on: broadcasting a
/// root-proposed candidate to the rest of the replica's ranks, reducing
/// per-column likelihood contributions to a scalar, and all-gathering
/// residual segments back out so every rank's view stays consistent.
///
/// There is exactly one production implementation (a `rayon`-backed one in
/// `aem-pt`); `P = 1` collapses every method here to a no-op pass-through
/// via [`SingleRankCommunicator`], which is what removes the source's
/// latent serial/parallel divergence (spec §9's design note on
/// `likelihood` vs. `likelihood_mpi`): there is one code path, and a
/// single-rank replica simply has a trivial communicator.
pub trait Communicator: Send + Sync {
    fn rank(&self) -> usize;
    fn size(&self) -> usize;

    /// Broadcasts `buf` (already populated by the root) to every rank in
    /// the communicator; non-root ranks overwrite `buf` in place.
    fn broadcast_f64(&self, buf: &mut [f64], root: usize);

    /// Sums `local` across all ranks; the result is only meaningful on
    /// `root` for communicators that don't also broadcast it back.
    fn reduce_sum(&self, local: f64, root: usize) -> f64;

    /// Gathers each rank's `local` slice (all equal length) into one
    /// concatenated vector, ordered by rank.
    fn all_gather_f64(&self, local: &[f64]) -> Vec<f64>;

    /// Synchronizes all ranks at an iteration boundary.
    fn barrier(&self);
}

/// `P = 1` pass-through: every collective degenerates to identity. Used
/// directly by single-chain runs and by unit tests that exercise
/// `ProposalEngine` without a parallel-likelihood fabric.
#[derive(Debug, Default, Clone, Copy)]
pub struct SingleRankCommunicator;

impl Communicator for SingleRankCommunicator {
    fn rank(&self) -> usize {
        0
    }

    fn size(&self) -> usize {
        1
    }

    fn broadcast_f64(&self, _buf: &mut [f64], _root: usize) {}

    fn reduce_sum(&self, local: f64, _root: usize) -> f64 {
        local
    }

    fn all_gather_f64(&self, local: &[f64]) -> Vec<f64> {
        local.to_vec()
    }

    fn barrier(&self) {}
}
