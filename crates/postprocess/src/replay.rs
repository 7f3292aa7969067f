use std::path::Path;

use aem_sampler::{read_all, MoveKind, Record};
use aem_wavelet_tree::{SerializedTree, WaveletTree};

use crate::errors::Result;

/// Reconstructs the evolving live-index multiset `S_v` one record at a
/// time (spec §4.6: "a consumer reconstructs the evolving live-index
/// multiset"). An `Initialise` record re-anchors the tree from scratch (a
/// segment boundary, including the back-to-back case spec §9 calls out);
/// a `Delta` record mutates it in place when `accepted` is set, and leaves
/// it untouched otherwise — a rejected step's current state is simply
/// whatever the tree already was, which is itself a valid posterior draw.
pub struct ReplaySession {
    tree: WaveletTree,
}

impl ReplaySession {
    pub fn new(dx: u32, dy: u32, max_depth: u32) -> Self {
        Self { tree: WaveletTree::with_max_depth(dx, dy, max_depth) }
    }

    pub fn tree(&self) -> &WaveletTree {
        &self.tree
    }

    /// Applies one decoded record. Returns `true` when the record was a
    /// completed step (a `Delta`), `false` for an `Initialise` anchor.
    pub fn apply(&mut self, record: &Record) -> Result<bool> {
        match record {
            Record::Initialise { live, .. } => {
                self.reset_from_live(live)?;
                Ok(false)
            }
            Record::Delta { kind, idx, new_value, accepted, .. } => {
                if *accepted {
                    match kind {
                        MoveKind::Birth => self.tree.insert(*idx, *new_value)?,
                        MoveKind::Death => self.tree.remove(*idx)?,
                        MoveKind::Value => self.tree.update(*idx, *new_value)?,
                        MoveKind::Hierarchical | MoveKind::HierarchicalPrior => {}
                    }
                }
                Ok(true)
            }
        }
    }

    fn reset_from_live(&mut self, live: &[(u32, f64)]) -> Result<()> {
        let shape = self.tree.shape();
        let serialized = SerializedTree {
            dx: shape.dx,
            dy: shape.dy,
            max_depth: self.tree.max_depth(),
            live: live.to_vec(),
        };
        self.tree = WaveletTree::load_promote(serialized)?;
        Ok(())
    }
}

/// Replays every record in `path` in order, invoking `on_step` once per
/// completed step (`Delta` record) with a 0-based, file-global step index
/// and the reconstructed tree *after* that step has been applied — for a
/// rejected step this is identical to the tree before it. `Initialise`
/// records update the session silently and are not themselves steps.
pub fn replay<F>(path: impl AsRef<Path>, dx: u32, dy: u32, max_depth: u32, mut on_step: F) -> Result<u64>
where
    F: FnMut(u64, &WaveletTree, &Record) -> Result<()>,
{
    let mut session = ReplaySession::new(dx, dy, max_depth);
    let mut step = 0u64;
    for record in read_all(path.as_ref())? {
        let is_step = session.apply(&record)?;
        if is_step {
            on_step(step, session.tree(), &record)?;
            step += 1;
        }
    }
    Ok(step)
}

#[cfg(test)]
mod tests {
    use super::*;
    use aem_sampler::{ChainHistory, StepOutcome};
    use aem_wavelet_tree::WaveletTree;

    fn tiny_tree() -> WaveletTree {
        let mut t = WaveletTree::new(1, 1);
        let idx = t.birth_eligible_indices().next().unwrap();
        t.insert(idx, 0.5).unwrap();
        t
    }

    #[test]
    fn replay_reproduces_the_live_multiset_after_an_accepted_birth() {
        let tree = tiny_tree();
        let file = tempfile::NamedTempFile::new().unwrap();
        let mut history = ChainHistory::create(file.path(), 8, &tree, &[1.0], 1.0, 1.0, 0.0).unwrap();

        let birth_idx = (0..tree.shape().n_coeff() as u32)
            .find(|&i| !tree.contains(i) && tree.contains(tree.parent_of(i).unwrap()))
            .unwrap();
        let outcome = StepOutcome {
            kind: MoveKind::Birth,
            idx: birth_idx,
            depth: tree.depth_of(birth_idx),
            new_value: 1.25,
            old_value: None,
            accepted: true,
            likelihood: 0.0,
            log_normalization: 0.0,
            temperature: 1.0,
            hierarchical_scalar: 1.0,
        };
        history.append(&outcome).unwrap();
        history.flush().unwrap();

        let mut last_live = Vec::new();
        let steps = replay(file.path(), 1, 1, 2, |_step, tree, _record| {
            last_live = tree.live_snapshot();
            Ok(())
        })
        .unwrap();

        assert_eq!(steps, 1);
        assert!(last_live.iter().any(|&(idx, v)| idx == birth_idx && (v - 1.25).abs() < 1e-12));
    }

    #[test]
    fn a_rejected_delta_leaves_the_tree_unchanged() {
        let tree = tiny_tree();
        let file = tempfile::NamedTempFile::new().unwrap();
        let mut history = ChainHistory::create(file.path(), 8, &tree, &[1.0], 1.0, 1.0, 0.0).unwrap();
        let outcome = StepOutcome {
            kind: MoveKind::Value,
            idx: 0,
            depth: 0,
            new_value: 9.0,
            old_value: Some(0.5),
            accepted: false,
            likelihood: 0.0,
            log_normalization: 0.0,
            temperature: 1.0,
            hierarchical_scalar: 1.0,
        };
        history.append(&outcome).unwrap();
        history.flush().unwrap();

        let mut seen = Vec::new();
        replay(file.path(), 1, 1, 2, |_step, tree, _record| {
            seen = tree.live_snapshot();
            Ok(())
        })
        .unwrap();
        assert_eq!(seen, tree.live_snapshot());
    }
}
