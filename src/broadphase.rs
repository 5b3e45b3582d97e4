use std::collections::{HashMap, HashSet};

use crate::types::*;

/// Candidate-pair generator rebuilt once per step.
///
/// Boxes are identified by their index in the slice handed to [`BroadPhase::rebuild`];
/// pairs come back as `(i, j)` with `i < j`, sorted, without duplicates. The
/// output is a superset of the truly intersecting pairs: touching boxes are
/// reported too.
pub struct BroadPhase {
    kind: BroadPhaseKind,
    boxes: Vec<Aabb>,
    pairs: Vec<(usize, usize)>,

    // Sweep-and-prune scratch: box indices sorted by min.x
    order: Vec<usize>,

    // Uniform grid: cell coord -> indices into `boxes`
    grid: HashMap<(i32, i32), Vec<usize>>,
    seen: HashSet<(usize, usize)>,
}

impl BroadPhase {
    pub fn new(kind: BroadPhaseKind) -> Self {
        Self {
            kind,
            boxes: Vec::new(),
            pairs: Vec::new(),
            order: Vec::new(),
            grid: HashMap::new(),
            seen: HashSet::new(),
        }
    }

    pub fn kind(&self) -> BroadPhaseKind {
        self.kind
    }

    pub fn set_kind(&mut self, kind: BroadPhaseKind) {
        self.kind = kind;
    }

    /// Replace the box set and recompute candidate pairs.
    pub fn rebuild(&mut self, boxes: impl IntoIterator<Item = Aabb>) {
        self.boxes.clear();
        self.boxes.extend(boxes);
        self.pairs.clear();
        self.grid.clear();

        match self.kind {
            BroadPhaseKind::SweepAndPrune => self.sweep(),
            BroadPhaseKind::UniformGrid { cell_size } => self.scan_grid(cell_size),
        }

        self.pairs.sort_unstable();
        self.pairs.dedup();
    }

    pub fn pairs(&self) -> &[(usize, usize)] {
        &self.pairs
    }

    pub fn len(&self) -> usize {
        self.boxes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.boxes.is_empty()
    }

    /// Number of occupied grid cells after the last rebuild (0 for sweep-and-prune).
    pub fn cells(&self) -> usize {
        self.grid.len()
    }

    fn sweep(&mut self) {
        self.order.clear();
        self.order.extend(0..self.boxes.len());
        let boxes = &self.boxes;
        // Stable for equal keys: ties fall back to insertion index.
        self.order.sort_by(|&a, &b| boxes[a].min.x.total_cmp(&boxes[b].min.x).then(a.cmp(&b)));

        for (k, &a) in self.order.iter().enumerate() {
            let box_a = boxes[a];
            for &b in &self.order[k + 1..] {
                let box_b = boxes[b];
                if box_b.min.x > box_a.max.x {
                    break;
                }
                if overlaps_inclusive(&box_a, &box_b) {
                    self.pairs.push((a.min(b), a.max(b)));
                }
            }
        }
    }

    fn scan_grid(&mut self, cell_size: f32) {
        let cs = if cell_size.is_finite() { cell_size.max(1e-5) } else { 64.0 };
        for (i, b) in self.boxes.iter().enumerate() {
            let (ix0, iy0) = world_to_cell(b.min.x, b.min.y, cs);
            let (ix1, iy1) = world_to_cell(b.max.x, b.max.y, cs);
            for iy in iy0..=iy1 {
                for ix in ix0..=ix1 {
                    self.grid.entry((ix, iy)).or_default().push(i);
                }
            }
        }

        self.seen.clear();
        for indices in self.grid.values() {
            for (k, &a) in indices.iter().enumerate() {
                for &b in &indices[k + 1..] {
                    let key = (a.min(b), a.max(b));
                    if !self.seen.insert(key) {
                        continue;
                    }
                    if overlaps_inclusive(&self.boxes[a], &self.boxes[b]) {
                        self.pairs.push(key);
                    }
                }
            }
        }
    }
}

fn overlaps_inclusive(a: &Aabb, b: &Aabb) -> bool {
    a.overlap_x(b) >= 0.0 && a.overlap_y(b) >= 0.0
}

fn world_to_cell(x: f32, y: f32, cs: f32) -> (i32, i32) {
    ((x / cs).floor() as i32, (y / cs).floor() as i32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec2;

    /// Deterministic scatter of boxes (xorshift).
    fn scatter(n: usize, seed: u32) -> Vec<Aabb> {
        let mut s = seed;
        let mut next = || {
            s ^= s << 13;
            s ^= s >> 17;
            s ^= s << 5;
            (s % 10_000) as f32 / 10_000.0
        };
        (0..n)
            .map(|_| {
                let pos = Vec2::new(next() * 400.0 - 50.0, next() * 300.0);
                let size = Vec2::new(2.0 + next() * 40.0, 2.0 + next() * 40.0);
                Aabb::from_pos_size(pos, size)
            })
            .collect()
    }

    fn brute_force(boxes: &[Aabb]) -> Vec<(usize, usize)> {
        let mut out = Vec::new();
        for i in 0..boxes.len() {
            for j in (i + 1)..boxes.len() {
                if boxes[i].intersects(&boxes[j]) {
                    out.push((i, j));
                }
            }
        }
        out
    }

    fn assert_superset(kind: BroadPhaseKind) {
        for seed in [1u32, 7, 99, 12345] {
            let boxes = scatter(150, seed);
            let mut bp = BroadPhase::new(kind);
            bp.rebuild(boxes.iter().copied());
            for pair in brute_force(&boxes) {
                assert!(bp.pairs().binary_search(&pair).is_ok(), "{kind:?} missed {pair:?} (seed {seed})");
            }
        }
    }

    #[test]
    fn test_sweep_is_superset_of_brute_force() {
        assert_superset(BroadPhaseKind::SweepAndPrune);
    }

    #[test]
    fn test_grid_is_superset_of_brute_force() {
        assert_superset(BroadPhaseKind::UniformGrid { cell_size: 32.0 });
        assert_superset(BroadPhaseKind::UniformGrid { cell_size: 5.0 });
    }

    #[test]
    fn test_pairs_sorted_unique_and_ordered() {
        let boxes = scatter(80, 3);
        for kind in [BroadPhaseKind::SweepAndPrune, BroadPhaseKind::UniformGrid { cell_size: 16.0 }] {
            let mut bp = BroadPhase::new(kind);
            bp.rebuild(boxes.iter().copied());
            let pairs = bp.pairs();
            assert!(pairs.iter().all(|&(i, j)| i < j));
            assert!(pairs.windows(2).all(|w| w[0] < w[1]));
        }
    }

    #[test]
    fn test_both_strategies_agree() {
        let boxes = scatter(120, 42);
        let mut sap = BroadPhase::new(BroadPhaseKind::SweepAndPrune);
        let mut grid = BroadPhase::new(BroadPhaseKind::UniformGrid { cell_size: 24.0 });
        sap.rebuild(boxes.iter().copied());
        grid.rebuild(boxes.iter().copied());
        assert_eq!(sap.pairs(), grid.pairs());
    }

    #[test]
    fn test_touching_boxes_are_candidates() {
        let boxes = [
            Aabb::from_pos_size(Vec2::ZERO, Vec2::splat(10.0)),
            Aabb::from_pos_size(Vec2::new(10.0, 0.0), Vec2::splat(10.0)),
            Aabb::from_pos_size(Vec2::new(50.0, 50.0), Vec2::splat(1.0)),
        ];
        let mut bp = BroadPhase::new(BroadPhaseKind::SweepAndPrune);
        bp.rebuild(boxes);
        assert_eq!(bp.pairs(), &[(0, 1)]);
        assert_eq!(bp.len(), 3);
        assert_eq!(bp.cells(), 0);
    }

    #[test]
    fn test_grid_cells_straddle_origin() {
        let mut bp = BroadPhase::new(BroadPhaseKind::UniformGrid { cell_size: 1.0 });
        bp.rebuild([Aabb::new(Vec2::splat(-0.5), Vec2::splat(0.5))]);
        // Floor indexing: a box straddling the origin covers 4 cells
        assert_eq!(bp.cells(), 4);
        assert!(bp.pairs().is_empty());
    }

    #[test]
    fn test_rebuild_clears_previous_pairs() {
        let mut bp = BroadPhase::new(BroadPhaseKind::SweepAndPrune);
        bp.rebuild([Aabb::from_pos_size(Vec2::ZERO, Vec2::ONE), Aabb::from_pos_size(Vec2::splat(0.5), Vec2::ONE)]);
        assert_eq!(bp.pairs().len(), 1);
        bp.rebuild(std::iter::empty());
        assert!(bp.pairs().is_empty() && bp.is_empty());
    }
}
