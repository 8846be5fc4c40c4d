use petgraph::graph::NodeIndex;

use super::Layout;
use crate::edge::BondType;
use crate::vector2::{self, Vector2};

/// Crowding of the current drawing. Every pair of drawn atoms in the same
/// component closer than one bond length adds `(L - d) / L` to the total
/// and to both atoms.
#[derive(Debug, Clone, PartialEq)]
pub(super) struct OverlapScore {
    pub total: f64,
    /// Indexed by atom.
    pub atoms: Vec<f64>,
    /// Atoms by descending score.
    pub ranked: Vec<(NodeIndex, f64)>,
}

impl Layout {
    pub(super) fn resolve_overlaps(&mut self) {
        let before = self.overlap_score().total;
        self.resolve_primary_overlaps();

        let mut total = self.overlap_score().total;
        for _ in 0..self.options.overlap_resolution_iterations {
            total = self.rotate_crowded_bonds(total);
        }

        let score = self.overlap_score();
        self.resolve_secondary_overlaps(&score);
        tracing::debug!(before, after = self.overlap_score().total, "resolved overlaps");
    }

    pub(super) fn overlap_score(&self) -> OverlapScore {
        let l = self.bond_length();
        let count = self.graph.atom_count();
        let mut atoms = vec![0.0; count];
        let mut total = 0.0;
        for i in 0..count {
            let a = NodeIndex::new(i);
            if !self.graph.atom(a).is_drawn {
                continue;
            }
            for j in (i + 1)..count {
                let b = NodeIndex::new(j);
                if !self.graph.atom(b).is_drawn || !self.same_component(a, b) {
                    continue;
                }
                let dist_sq = self.pos(a).distance_sq(self.pos(b));
                if dist_sq < self.options.bond_length_sq() {
                    let weighted = (l - dist_sq.sqrt()) / l;
                    total += weighted;
                    atoms[i] += weighted;
                    atoms[j] += weighted;
                }
            }
        }
        let mut ranked: Vec<(NodeIndex, f64)> = atoms.iter().enumerate().map(|(i, &s)| (NodeIndex::new(i), s)).collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        OverlapScore { total, atoms, ranked }
    }

    /// Mean score of the crowded atoms in the branch at `root` pointing away
    /// from `parent`. Zero when nothing in it is crowded.
    fn subtree_overlap_score(&self, root: NodeIndex, parent: NodeIndex, scores: &[f64]) -> f64 {
        let mut sum = 0.0;
        let mut count = 0usize;
        for atom in self.graph.traverse_tree(root, Some(parent)) {
            if !self.graph.atom(atom).is_drawn {
                continue;
            }
            let s = scores[atom.index()];
            if s > self.options.overlap_sensitivity {
                sum += s;
                count += 1;
            }
        }
        if count == 0 {
            0.0
        } else {
            sum / count as f64
        }
    }

    /// Rotates the branch at `root` pointing away from `parent` around
    /// `center`, carrying the centers of rings anchored inside it.
    pub(super) fn rotate_subtree(&mut self, root: NodeIndex, parent: NodeIndex, angle: f64, center: Vector2) {
        for atom in self.graph.traverse_tree(root, Some(parent)) {
            self.placements[atom.index()].position.rotate_around(angle, center);
            for &ring in &self.graph.atom(atom).anchored_rings {
                self.rings.ring_mut(ring).center.rotate_around(angle, center);
            }
        }
    }

    /// Neighbours of a ring atom outside all of its rings.
    fn non_ring_neighbours(&self, atom: NodeIndex) -> Vec<NodeIndex> {
        self.graph
            .neighbours(atom)
            .into_iter()
            .filter(|&n| !self.in_same_ring(atom, n) && !self.graph.atom(n).is_bridge)
            .collect()
    }

    /// Spreads two substituents sharing a ring atom apart, keeping whichever
    /// of the two mirror-image arrangements crowds them less.
    fn resolve_primary_overlaps(&mut self) {
        let mut done = vec![false; self.graph.atom_count()];
        let mut pairs: Vec<(NodeIndex, NodeIndex, NodeIndex, f64)> = Vec::new();
        for ring in self.rings.original_rings() {
            for &m in &ring.members {
                if std::mem::replace(&mut done[m.index()], true) {
                    continue;
                }
                if let [a, b] = self.non_ring_neighbours(m)[..] {
                    pairs.push((m, a, b, (2.0 * std::f64::consts::PI - ring.ring_angle()) / 6.0));
                }
            }
        }

        for (common, a, b, angle) in pairs {
            if !self.graph.atom(a).is_drawn || !self.graph.atom(b).is_drawn {
                continue;
            }
            let center = self.pos(common);
            self.rotate_subtree(a, common, angle, center);
            self.rotate_subtree(b, common, -angle, center);
            let first = self.pair_overlap(common, a, b);

            self.rotate_subtree(a, common, -2.0 * angle, center);
            self.rotate_subtree(b, common, 2.0 * angle, center);
            let second = self.pair_overlap(common, a, b);

            if first < second {
                self.rotate_subtree(a, common, 2.0 * angle, center);
                self.rotate_subtree(b, common, -2.0 * angle, center);
            }
        }
    }

    fn pair_overlap(&self, common: NodeIndex, a: NodeIndex, b: NodeIndex) -> f64 {
        let score = self.overlap_score();
        self.subtree_overlap_score(a, common, &score.atoms) + self.subtree_overlap_score(b, common, &score.atoms)
    }

    /// A single bond between two non-terminal atoms that do not share a ring.
    fn is_rotatable(&self, a: NodeIndex, b: NodeIndex, bond: BondType) -> bool {
        bond == BondType::Single && !self.graph.is_terminal(a) && !self.graph.is_terminal(b) && !self.in_same_ring(a, b)
    }

    /// One pass over the rotatable bonds: the shorter side of each crowded
    /// bond is swung away. A rotation that raises the total is undone.
    /// Returns the new total.
    fn rotate_crowded_bonds(&mut self, mut total: f64) -> f64 {
        let turn = vector2::to_rad(120.0);
        let mut score = self.overlap_score();
        let edges: Vec<_> = self.graph.edges().collect();
        for e in edges {
            let (source, target, bond) = {
                let edge = self.graph.edge(e);
                (edge.source, edge.target, edge.bond_type())
            };
            if !self.is_rotatable(source, target, bond) {
                continue;
            }
            let depth_source = self.graph.tree_depth(source, Some(target));
            let depth_target = self.graph.tree_depth(target, Some(source));
            let (a, b) = if depth_source > depth_target {
                (source, target)
            } else {
                (target, source)
            };
            if self.subtree_overlap_score(b, a, &score.atoms) <= self.options.overlap_sensitivity {
                continue;
            }

            let (pa, pb) = (self.pos(a), self.pos(b));
            let neighbours: Vec<NodeIndex> = self.graph.neighbours(b).into_iter().filter(|&n| n != a).collect();
            let moves: Vec<(NodeIndex, f64)> = match neighbours[..] {
                [n] => vec![(n, self.pos(n).get_rotate_away_from_angle(pa, pb, turn))],
                [n0, n1] => {
                    let ringless = |x: NodeIndex| !self.graph.atom(x).is_in_ring();
                    if (self.graph.atom(a).is_in_ring() && self.graph.atom(b).is_in_ring()) || !ringless(n0) || !ringless(n1) {
                        Vec::new()
                    } else {
                        vec![
                            (n0, self.pos(n0).get_rotate_away_from_angle(pa, pb, turn)),
                            (n1, self.pos(n1).get_rotate_away_from_angle(pa, pb, turn)),
                        ]
                    }
                }
                _ => Vec::new(),
            };
            if moves.is_empty() {
                continue;
            }

            for &(n, angle) in &moves {
                self.rotate_subtree(n, b, angle, pb);
            }
            let new_total = self.overlap_score().total;
            if new_total > total {
                for &(n, angle) in &moves {
                    self.rotate_subtree(n, b, -angle, pb);
                }
            } else {
                tracing::trace!(a = a.index(), b = b.index(), total = new_total, "rotated crowded bond");
                total = new_total;
            }
            score = self.overlap_score();
        }
        total
    }

    /// Nudges crowded terminal atoms 20° away from their closest neighbour
    /// in the drawing.
    fn resolve_secondary_overlaps(&mut self, score: &OverlapScore) {
        let nudge = vector2::to_rad(20.0);
        for &(atom, s) in &score.ranked {
            if s <= self.options.overlap_sensitivity {
                break;
            }
            if !self.graph.is_terminal(atom) {
                continue;
            }
            let Some(closest) = self.closest_atom(atom) else {
                continue;
            };
            let away = if self.graph.is_terminal(closest) {
                self.pivot(closest)
            } else {
                self.pos(closest)
            };
            let pivot = self.pivot(atom);
            self.placements[atom.index()].position.rotate_away_from(away, pivot, nudge);
        }
    }

    /// The atom a terminal atom swings around: the one it was placed from,
    /// or its first neighbour.
    fn pivot(&self, atom: NodeIndex) -> Vector2 {
        self.placements[atom.index()]
            .previous
            .or_else(|| self.graph.neighbours(atom).first().copied())
            .map_or(self.pos(atom), |p| self.pos(p))
    }

    fn closest_atom(&self, atom: NodeIndex) -> Option<NodeIndex> {
        let p = self.pos(atom);
        self.graph
            .atoms()
            .filter(|&o| o != atom && self.same_component(o, atom) && self.graph.atom(o).is_drawn)
            .min_by(|&x, &y| p.distance_sq(self.pos(x)).total_cmp(&p.distance_sq(self.pos(y))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::LayoutOptions;
    use crate::rings::RingSystem;
    use crate::smiles::parse_smiles;

    fn n(i: usize) -> NodeIndex {
        NodeIndex::new(i)
    }

    fn placed(smiles: &str) -> Layout {
        let mut graph = parse_smiles(smiles).unwrap();
        let rings = RingSystem::perceive(&mut graph);
        let mut layout = Layout::new(graph, rings, LayoutOptions::default());
        layout.place_atoms();
        layout
    }

    #[test]
    fn score_counts_close_pairs_once() {
        let mut layout = placed("C.C");
        layout.placements[0].position = Vector2::zero();
        layout.placements[1].position = Vector2::new(0.5, 0.0);
        // different components never score
        assert_eq!(layout.overlap_score().total, 0.0);

        let mut layout = placed("CCC");
        layout.placements[0].position = Vector2::zero();
        layout.placements[1].position = Vector2::new(1.0, 0.0);
        layout.placements[2].position = Vector2::new(-0.25, 0.0);
        let score = layout.overlap_score();
        assert!((score.total - 0.75).abs() < 1e-12);
        assert!((score.atoms[0] - 0.75).abs() < 1e-12);
        assert!((score.atoms[2] - 0.75).abs() < 1e-12);
        assert_eq!(score.atoms[1], 0.0);
        assert_eq!(score.ranked[2], (n(1), 0.0));
    }

    #[test]
    fn subtree_score_averages_crowded_atoms() {
        let layout = placed("CCCC");
        let scores = [0.1, 0.5, 0.9, 0.0];
        assert!((layout.subtree_overlap_score(n(1), n(0), &scores) - 0.7).abs() < 1e-12);
        assert_eq!(layout.subtree_overlap_score(n(3), n(2), &scores), 0.0);
    }

    #[test]
    fn rotate_subtree_moves_anchored_ring() {
        let mut layout = placed("CCc1ccccc1");
        let center = layout.pos(n(1));
        let ring_center = layout.rings.ring(0).center;
        let expected = ring_center.rotated_around(1.0, center);
        layout.rotate_subtree(n(2), n(1), 1.0, center);
        assert!(layout.rings.ring(0).center.distance(expected) < 1e-9);
        // bonds keep their length
        assert!((layout.pos(n(1)).distance(layout.pos(n(2))) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn geminal_substituents_are_spread() {
        let mut layout = placed("CC1(C)CCCCC1");
        layout.resolve_overlaps();
        let (a, b) = (layout.pos(n(0)), layout.pos(n(2)));
        assert!(a.distance(b) > 1.0);
        assert!(layout.overlap_score().total < 1e-9);
    }

    #[test]
    fn uncrowded_drawings_stay_put() {
        for smiles in ["CC(C)(C)c1ccccc1", "c1ccccc1-c1ccccc1"] {
            let mut layout = placed(smiles);
            let before: Vec<Vector2> = layout.positions().collect();
            layout.resolve_overlaps();
            assert!(layout.overlap_score().total < 1e-9, "{smiles}");
            for (p, q) in before.iter().zip(layout.positions()) {
                assert!(p.distance(q) < 1e-9, "{smiles}");
            }
        }
    }
}
