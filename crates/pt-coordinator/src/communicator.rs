use std::sync::{Arc, Barrier, Mutex};

use aem_sampler::Communicator;
use rayon::Scope;

/// Shared synchronization state for one group of `size` ranks (spec §3.6:
/// "a single production implementation built on `rayon::scope` and
/// `std::sync::mpsc`/`Barrier`"). Every collective is a write phase
/// followed by a read phase, each bounded by a barrier; because every rank
/// in the group executes the exact same sequence of collective calls (the
/// SPMD guarantee), the shared scratch slots never need per-call
/// generation tagging.
struct CommContext {
    size: usize,
    write_barrier: Barrier,
    read_barrier: Barrier,
    reduce_scratch: Mutex<Vec<f64>>,
    broadcast_scratch: Mutex<Vec<f64>>,
    gather_scratch: Mutex<Vec<Vec<f64>>>,
}

impl CommContext {
    fn new(size: usize) -> Self {
        Self {
            size,
            write_barrier: Barrier::new(size),
            read_barrier: Barrier::new(size),
            reduce_scratch: Mutex::new(vec![0.0; size]),
            broadcast_scratch: Mutex::new(Vec::new()),
            gather_scratch: Mutex::new(vec![Vec::new(); size]),
        }
    }
}

/// One rank's handle onto a `rayon`-backed communicator group. Every
/// collective is called identically by every rank in the group; `P = 1`
/// groups never need this (see [`aem_sampler::SingleRankCommunicator`]) —
/// this is the production path for `P > 1` likelihood-evaluation fan-out
/// within a single replica (spec §5's "`P` is the parallelism of
/// likelihood evaluation per replica").
pub struct RayonCommunicator {
    rank: usize,
    ctx: Arc<CommContext>,
}

impl RayonCommunicator {
    /// Spawns `size` rayon tasks inside `scope`, each running `body` with
    /// its own rank's communicator handle. `body` must call the same
    /// sequence of `Communicator` methods on every rank (the SPMD
    /// contract); a mismatched sequence deadlocks on the barrier, the same
    /// failure mode a real MPI program would hit.
    pub fn spawn_group<'scope, F>(scope: &Scope<'scope>, size: usize, body: F)
    where
        F: Fn(RayonCommunicator) + Sync + Send + 'scope,
    {
        let ctx = Arc::new(CommContext::new(size));
        let body = Arc::new(body);
        for rank in 0..size {
            let comm = RayonCommunicator { rank, ctx: ctx.clone() };
            let body = body.clone();
            scope.spawn(move |_| body(comm));
        }
    }
}

impl Communicator for RayonCommunicator {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.ctx.size
    }

    fn broadcast_f64(&self, buf: &mut [f64], root: usize) {
        if self.rank == root {
            let mut slot = self.ctx.broadcast_scratch.lock().expect("broadcast scratch poisoned");
            *slot = buf.to_vec();
        }
        self.ctx.write_barrier.wait();
        if self.rank != root {
            let slot = self.ctx.broadcast_scratch.lock().expect("broadcast scratch poisoned");
            buf.copy_from_slice(&slot);
        }
        self.ctx.read_barrier.wait();
    }

    fn reduce_sum(&self, local: f64, _root: usize) -> f64 {
        {
            let mut slot = self.ctx.reduce_scratch.lock().expect("reduce scratch poisoned");
            slot[self.rank] = local;
        }
        self.ctx.write_barrier.wait();
        let sum = {
            let slot = self.ctx.reduce_scratch.lock().expect("reduce scratch poisoned");
            slot.iter().sum()
        };
        self.ctx.read_barrier.wait();
        sum
    }

    fn all_gather_f64(&self, local: &[f64]) -> Vec<f64> {
        {
            let mut slot = self.ctx.gather_scratch.lock().expect("gather scratch poisoned");
            slot[self.rank] = local.to_vec();
        }
        self.ctx.write_barrier.wait();
        let gathered = {
            let slot = self.ctx.gather_scratch.lock().expect("gather scratch poisoned");
            slot.iter().flat_map(|v| v.iter().copied()).collect()
        };
        self.ctx.read_barrier.wait();
        gathered
    }

    fn barrier(&self) {
        self.ctx.write_barrier.wait();
        self.ctx.read_barrier.wait();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    #[test]
    fn reduce_sum_matches_across_every_rank() {
        let total = AtomicU64::new(0);
        rayon::scope(|scope| {
            RayonCommunicator::spawn_group(scope, 4, |comm| {
                let sum = comm.reduce_sum((comm.rank() + 1) as f64, 0);
                assert_eq!(sum, 10.0);
                total.fetch_add(1, Ordering::SeqCst);
            });
        });
        assert_eq!(total.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn broadcast_delivers_roots_buffer_to_every_rank() {
        rayon::scope(|scope| {
            RayonCommunicator::spawn_group(scope, 3, |comm| {
                let mut buf = if comm.rank() == 0 { vec![7.0, 8.0] } else { vec![0.0, 0.0] };
                comm.broadcast_f64(&mut buf, 0);
                assert_eq!(buf, vec![7.0, 8.0]);
            });
        });
    }

    #[test]
    fn all_gather_orders_by_rank() {
        rayon::scope(|scope| {
            RayonCommunicator::spawn_group(scope, 3, |comm| {
                let gathered = comm.all_gather_f64(&[comm.rank() as f64]);
                assert_eq!(gathered, vec![0.0, 1.0, 2.0]);
            });
        });
    }
}
