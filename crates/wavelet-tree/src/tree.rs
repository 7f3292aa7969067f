use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::change::{ChangeKind, ChangeRecord};
use crate::errors::{Result, WaveletTreeError};
use crate::index::GridShape;

const ROOT: u32 = 0;

/// On-disk representation used by `save`/`load`, and reused verbatim for a
/// chain-history `INITIALISE` record's live-index payload (spec §4.6/§6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerializedTree {
    pub dx: u32,
    pub dy: u32,
    pub max_depth: u32,
    /// Sorted by `idx`.
    pub live: Vec<(u32, f64)>,
}

/// Sparse 2D wavelet-coefficient quadtree.
///
/// `A` (the live index set) is `values.keys()`; the tree invariant (every
/// non-root live index has a live parent) is maintained by construction:
/// `insert` refuses to create an orphan and `remove` refuses to orphan a
/// child. Birth-eligible and death-eligible sets (spec §4.1) are maintained
/// incrementally in O(1) amortized per mutation via `child_count`.
#[derive(Debug, Clone)]
pub struct WaveletTree {
    shape: GridShape,
    /// Caps how deep a coefficient may be born, independent of (and at most
    /// equal to) the grid's geometric `max_depth()`; see spec §4.1's "fixed
    /// maximum depth `Dmax`", which a run may set below the grid's natural
    /// resolution limit to bound the model's effective dimensionality.
    max_depth: u32,
    values: HashMap<u32, f64>,
    /// For each live index, how many of its children are also live.
    child_count: HashMap<u32, u32>,
    birth_eligible: HashSet<u32>,
    death_eligible: HashSet<u32>,
    last_change: Option<ChangeKind>,
    last_idx: u32,
    last_new: f64,
    last_old: Option<f64>,
}

impl WaveletTree {
    pub fn new(dx: u32, dy: u32) -> Self {
        Self::with_max_depth(dx, dy, GridShape::new(dx, dy).max_depth())
    }

    /// Like [`Self::new`] but caps coefficient depth below the grid's
    /// geometric maximum.
    pub fn with_max_depth(dx: u32, dy: u32, max_depth: u32) -> Self {
        let shape = GridShape::new(dx, dy);
        assert!(max_depth <= shape.max_depth());
        let mut tree = Self {
            shape,
            max_depth,
            values: HashMap::new(),
            child_count: HashMap::new(),
            birth_eligible: HashSet::new(),
            death_eligible: HashSet::new(),
            last_change: None,
            last_idx: ROOT,
            last_new: 0.0,
            last_old: None,
        };
        tree.init(0.0);
        tree
    }

    pub fn shape(&self) -> GridShape {
        self.shape
    }

    pub fn max_depth(&self) -> u32 {
        self.max_depth
    }

    pub fn n_coeff(&self) -> usize {
        self.shape.n_coeff()
    }

    pub fn depth_of(&self, idx: u32) -> u32 {
        self.shape.depth_of(idx)
    }

    pub fn parent_of(&self, idx: u32) -> Option<u32> {
        self.shape.parent_of(idx)
    }

    pub fn children_of(&self, idx: u32) -> Vec<u32> {
        self.shape.children_of(idx)
    }

    pub fn to_2d(&self, idx: u32) -> (u32, u32) {
        self.shape.to_2d(idx)
    }

    pub fn from_2d(&self, i: u32, j: u32) -> u32 {
        self.shape.from_2d(i, j)
    }

    pub fn contains(&self, idx: u32) -> bool {
        self.values.contains_key(&idx)
    }

    pub fn value(&self, idx: u32) -> Option<f64> {
        self.values.get(&idx).copied()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn n_birth_eligible(&self) -> usize {
        self.birth_eligible.len()
    }

    pub fn n_death_eligible(&self) -> usize {
        self.death_eligible.len()
    }

    pub fn birth_eligible_indices(&self) -> impl Iterator<Item = u32> + '_ {
        self.birth_eligible.iter().copied()
    }

    pub fn death_eligible_indices(&self) -> impl Iterator<Item = u32> + '_ {
        self.death_eligible.iter().copied()
    }

    /// Resets the tree to a single root coefficient.
    pub fn init(&mut self, v_root: f64) {
        self.values.clear();
        self.child_count.clear();
        self.birth_eligible.clear();
        self.death_eligible.clear();

        self.values.insert(ROOT, v_root);
        self.child_count.insert(ROOT, 0);
        for child in self.shape.children_of(ROOT) {
            if self.shape.depth_of(child) <= self.max_depth {
                self.birth_eligible.insert(child);
            }
        }
        self.last_change = Some(ChangeKind::RootValueChange);
        self.last_idx = ROOT;
        self.last_new = v_root;
        self.last_old = None;
    }

    pub fn insert(&mut self, idx: u32, v: f64) -> Result<()> {
        self.validate_idx(idx)?;
        if idx == ROOT {
            let old = self.values.insert(ROOT, v);
            self.last_change = Some(ChangeKind::RootValueChange);
            self.last_idx = ROOT;
            self.last_new = v;
            self.last_old = old;
            return Ok(());
        }
        let depth = self.shape.depth_of(idx);
        if depth > self.max_depth {
            return Err(WaveletTreeError::DepthExceeded {
                idx,
                depth,
                max_depth: self.max_depth,
            });
        }
        let parent = self.shape.parent_of(idx).expect("non-root has a parent");
        if !self.values.contains_key(&parent) {
            return Err(WaveletTreeError::ParentMissing { idx });
        }
        if self.values.contains_key(&idx) {
            // Re-inserting a live index degrades to a value update.
            return self.update(idx, v);
        }

        self.values.insert(idx, v);
        self.child_count.insert(idx, 0);
        self.birth_eligible.remove(&idx);
        self.death_eligible.insert(idx);

        let cc = self.child_count.entry(parent).or_insert(0);
        *cc += 1;
        self.death_eligible.remove(&parent);

        for child in self.shape.children_of(idx) {
            if !self.values.contains_key(&child) && self.shape.depth_of(child) <= self.max_depth {
                self.birth_eligible.insert(child);
            }
        }

        trace!(idx, depth = self.depth_of(idx), "wavelet tree birth");
        self.last_change = Some(ChangeKind::Birth);
        self.last_idx = idx;
        self.last_new = v;
        self.last_old = None;
        Ok(())
    }

    pub fn remove(&mut self, idx: u32) -> Result<()> {
        self.validate_idx(idx)?;
        if idx == ROOT {
            return Err(WaveletTreeError::HasLiveChildren { idx });
        }
        if !self.values.contains_key(&idx) {
            return Err(WaveletTreeError::NotLive { idx });
        }
        let children_live = self.child_count.get(&idx).copied().unwrap_or(0);
        if children_live > 0 {
            return Err(WaveletTreeError::HasLiveChildren { idx });
        }

        let old = self.values.remove(&idx);
        self.child_count.remove(&idx);
        self.death_eligible.remove(&idx);
        self.birth_eligible.insert(idx);

        for child in self.shape.children_of(idx) {
            self.birth_eligible.remove(&child);
        }

        let parent = self.shape.parent_of(idx).expect("non-root has a parent");
        if let Some(cc) = self.child_count.get_mut(&parent) {
            *cc -= 1;
            if *cc == 0 && parent != ROOT {
                self.death_eligible.insert(parent);
            }
        }

        trace!(idx, "wavelet tree death");
        self.last_change = Some(ChangeKind::Death);
        self.last_idx = idx;
        self.last_new = 0.0;
        self.last_old = old;
        Ok(())
    }

    pub fn update(&mut self, idx: u32, v: f64) -> Result<()> {
        self.validate_idx(idx)?;
        let old = self
            .values
            .get_mut(&idx)
            .ok_or(WaveletTreeError::NotLive { idx })?;
        let old_value = *old;
        *old = v;

        self.last_change = Some(if idx == ROOT {
            ChangeKind::RootValueChange
        } else {
            ChangeKind::ValueChange
        });
        self.last_idx = idx;
        self.last_new = v;
        self.last_old = Some(old_value);
        Ok(())
    }

    /// Writes live values into `out`, zeroing every other position.
    pub fn map_to_array(&self, out: &mut [f64]) {
        assert_eq!(out.len(), self.n_coeff());
        out.fill(0.0);
        for (&idx, &v) in &self.values {
            out[idx as usize] = v;
        }
    }

    pub fn last_perturbation(&self) -> Option<ChangeRecord> {
        let kind = self.last_change?;
        Some(ChangeRecord {
            kind,
            idx: self.last_idx,
            new_value: self.last_new,
            old_value: self.last_old,
            live_after: self.live_snapshot(),
        })
    }

    pub fn live_snapshot(&self) -> Vec<(u32, f64)> {
        let mut out: Vec<(u32, f64)> = self.values.iter().map(|(&k, &v)| (k, v)).collect();
        out.sort_unstable_by_key(|(k, _)| *k);
        out
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let file = File::create(path).map_err(|source| WaveletTreeError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let serialized = SerializedTree {
            dx: self.shape.dx,
            dy: self.shape.dy,
            max_depth: self.max_depth,
            live: self.live_snapshot(),
        };
        bincode::serialize_into(BufWriter::new(file), &serialized).map_err(|source| {
            WaveletTreeError::Decode { path: path.to_path_buf(), source }
        })
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| WaveletTreeError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let serialized: SerializedTree = bincode::deserialize_from(BufReader::new(file))
            .map_err(|source| WaveletTreeError::Decode { path: path.to_path_buf(), source })?;
        Self::load_promote(serialized)
    }

    /// Loads a previously saved sparse tree, rejecting coefficients whose
    /// depth exceeds the tree's configured `Dmax` (spec §4.1).
    pub fn load_promote(serialized: SerializedTree) -> Result<Self> {
        let shape = GridShape::new(serialized.dx, serialized.dy);
        let max_depth = serialized.max_depth;

        for &(idx, _) in &serialized.live {
            let depth = shape.depth_of(idx);
            if depth > max_depth {
                return Err(WaveletTreeError::DepthExceeded { idx, depth, max_depth });
            }
        }

        let mut tree = Self::with_max_depth(serialized.dx, serialized.dy, max_depth);
        tree.values.clear();
        tree.child_count.clear();
        tree.birth_eligible.clear();
        tree.death_eligible.clear();

        for (idx, v) in serialized.live {
            tree.values.insert(idx, v);
            tree.child_count.insert(idx, 0);
        }
        // Rebuild child_count, birth_eligible, death_eligible from scratch.
        for &idx in tree.values.keys().collect::<Vec<_>>() {
            if let Some(parent) = shape.parent_of(idx) {
                *tree.child_count.entry(parent).or_insert(0) += 1;
            }
        }
        for &idx in tree.values.keys() {
            let live_children = tree.child_count.get(&idx).copied().unwrap_or(0);
            if live_children == 0 && idx != ROOT {
                tree.death_eligible.insert(idx);
            }
            for child in shape.children_of(idx) {
                if !tree.values.contains_key(&child) && shape.depth_of(child) <= max_depth {
                    tree.birth_eligible.insert(child);
                }
            }
        }
        tree.last_change = None;
        Ok(tree)
    }

    fn validate_idx(&self, idx: u32) -> Result<()> {
        if idx as usize >= self.n_coeff() {
            return Err(WaveletTreeError::IndexOutOfRange { idx, n: self.n_coeff() });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn fresh_tree_has_only_root() {
        let t = WaveletTree::new(3, 3);
        assert_eq!(t.len(), 1);
        assert!(t.contains(0));
        assert_eq!(t.n_death_eligible(), 0, "root is never death-eligible");
        assert!(t.n_birth_eligible() > 0);
    }

    #[test]
    fn insert_requires_live_parent() {
        let mut t = WaveletTree::new(2, 2);
        let grandchild = t
            .children_of(*t.children_of(0).first().unwrap())
            .first()
            .copied()
            .unwrap();
        let err = t.insert(grandchild, 1.0).unwrap_err();
        assert!(matches!(err, WaveletTreeError::ParentMissing { .. }));
    }

    #[test]
    fn remove_requires_no_live_children() {
        let mut t = WaveletTree::new(2, 2);
        let child = *t.children_of(0).first().unwrap();
        t.insert(child, 1.0).unwrap();
        let grandchild = *t.children_of(child).first().unwrap();
        t.insert(grandchild, 2.0).unwrap();
        let err = t.remove(child).unwrap_err();
        assert!(matches!(err, WaveletTreeError::HasLiveChildren { .. }));
        t.remove(grandchild).unwrap();
        t.remove(child).unwrap();
        assert_eq!(t.len(), 1);
    }

    #[test]
    fn birth_death_eligibility_stays_consistent() {
        let mut t = WaveletTree::new(3, 3);
        for _ in 0..20 {
            let births: Vec<u32> = t.birth_eligible_indices().collect();
            if let Some(&idx) = births.first() {
                t.insert(idx, 0.1).unwrap();
            }
        }
        // Every live non-root index with zero live children must be death-eligible.
        for idx in 0..t.n_coeff() as u32 {
            if t.contains(idx) && idx != 0 {
                let has_live_children = t.children_of(idx).iter().any(|&c| t.contains(c));
                assert_eq!(!has_live_children, t.death_eligible_indices().any(|d| d == idx));
            }
        }
    }

    #[test]
    fn save_load_roundtrip_is_exact() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tree.bin");
        let mut t = WaveletTree::new(3, 2);
        for idx in t.birth_eligible_indices().collect::<Vec<_>>() {
            t.insert(idx, idx as f64 * 0.5).unwrap();
        }
        t.save(&path).unwrap();
        let reloaded = WaveletTree::load(&path).unwrap();
        assert_eq!(t.live_snapshot(), reloaded.live_snapshot());
    }

    #[test]
    fn load_promote_rejects_depth_beyond_dmax() {
        let shape = GridShape::new(3, 3);
        let deep_idx = shape.from_2d(4, 4); // depth 3, exceeds a cap of 2
        let serialized = SerializedTree {
            dx: 3,
            dy: 3,
            max_depth: 2,
            live: vec![(0, 0.0), (deep_idx, 1.0)],
        };
        let err = WaveletTree::load_promote(serialized).unwrap_err();
        assert!(matches!(err, WaveletTreeError::DepthExceeded { .. }));
    }
}
