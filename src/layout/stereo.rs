use std::cmp::Ordering;

use petgraph::graph::NodeIndex;

use super::Layout;
use crate::atom::{ChiralTag, Chirality, Direction};
use crate::vector2::Vector2;

/// Bonds followed from a stereocenter when ranking its neighbours.
const PRIORITY_DEPTH: usize = 10;

/// Ranking key of one neighbour: per sphere, the `parent * 1000 + atomic`
/// entries found there, largest first. Bond orders repeat entries and open
/// valences add hydrogens, so duplicated atoms are accounted for.
type PriorityKey = Vec<Vec<u32>>;

impl Layout {
    pub(super) fn annotate_stereochemistry(&mut self) {
        let centers: Vec<NodeIndex> = self
            .graph
            .atoms()
            .filter(|&a| self.graph.atom(a).chiral_tag().is_some())
            .collect();
        for c in centers {
            self.annotate_center(c);
        }
    }

    fn annotate_center(&mut self, center: NodeIndex) {
        let Some(tag) = self.graph.atom(center).chiral_tag() else {
            return;
        };
        let has_h = self.graph.atom(center).has_hydrogen;

        // written order, the bracket hydrogen (None) right after the preceding atom
        let mut written: Vec<Option<NodeIndex>> = self
            .graph
            .written_neighbours(center)
            .iter()
            .map(|&n| Some(n))
            .collect();
        if has_h {
            let at = usize::from(self.graph.spanning_tree_parent(center).is_some()).min(written.len());
            written.insert(at, None);
        }
        if written.len() != 4 {
            tracing::debug!(atom = center.index(), neighbours = written.len(), "skipping stereocenter");
            return;
        }
        self.graph.atom_mut(center).is_stereo_center = true;

        let keys: Vec<PriorityKey> = written
            .iter()
            .map(|n| n.map_or_else(Vec::new, |n| self.priority_key(center, n)))
            .collect();
        let rank = |i: usize| written[i].map_or(-1, |n| n.index() as i64);
        let mut ranked: Vec<usize> = (0..4).collect();
        ranked.sort_by(|&i, &j| compare_keys(&keys[j], &keys[i]).then_with(|| rank(j).cmp(&rank(i))));

        let sign = match tag {
            ChiralTag::Anticlockwise => -1,
            ChiralTag::Clockwise => 1,
        };
        let chirality = if permutation_parity(&ranked) * sign == 1 {
            Chirality::R
        } else {
            Chirality::S
        };

        let by_rank: Vec<Option<NodeIndex>> = ranked.iter().map(|&i| written[i]).collect();
        for (r, n) in by_rank.iter().enumerate() {
            if let Some(n) = *n {
                let depth = self.graph.tree_depth(n, Some(center));
                let atom = self.graph.atom_mut(n);
                atom.priority = Some(r);
                atom.subtree_depth = depth;
            }
        }
        self.graph.atom_mut(center).chirality = chirality;
        self.assign_wedges(center, &by_rank, has_h, chirality);
    }

    /// Ranking key of `start` as seen from `center`: every simple path of up
    /// to [`PRIORITY_DEPTH`] bonds, one sphere per step.
    fn priority_key(&self, center: NodeIndex, start: NodeIndex) -> PriorityKey {
        let mut key: PriorityKey = Vec::new();
        let count = self.graph.atom_count();
        let mut visited = vec![false; count];
        visited[center.index()] = true;
        let root_parent = u32::from(self.graph.atom(center).atomic_number());
        let mut stack = vec![(start, center, 0usize, root_parent, visited)];

        while let Some((atom, from, depth, parent_number, mut visited)) = stack.pop() {
            visited[atom.index()] = true;
            let a = self.graph.atom(atom);
            let number = u32::from(a.atomic_number());
            if key.len() <= depth {
                key.resize_with(depth + 1, Vec::new);
            }
            let weight = self
                .graph
                .edge_between(atom, from)
                .map_or(1, |e| self.graph.edge(e).weight());
            for _ in 0..weight {
                key[depth].push(parent_number * 1000 + number);
            }
            if depth + 1 >= PRIORITY_DEPTH {
                continue;
            }

            let neighbours = self.graph.neighbours(atom);
            let bonds: u32 = self.graph.bond_count(atom);
            let open = u32::from(a.max_bonds()).saturating_sub(bonds);
            if open > 0 {
                if key.len() <= depth + 1 {
                    key.resize_with(depth + 2, Vec::new);
                }
                for _ in 0..open {
                    key[depth + 1].push(number * 1000 + 1);
                }
            }
            for &n in neighbours.iter().rev() {
                if !visited[n.index()] {
                    stack.push((n, atom, depth + 1, number, visited.clone()));
                }
            }
        }

        for sphere in &mut key {
            sphere.sort_unstable_by(|a, b| b.cmp(a));
        }
        key
    }

    /// Marks one neighbour (two when no hydrogen is written) as pointing out
    /// of or into the paper so the drawing reproduces `chirality`.
    fn assign_wedges(&mut self, center: NodeIndex, by_rank: &[Option<NodeIndex>], has_h: bool, chirality: Chirality) {
        let heavy: Vec<NodeIndex> = by_rank.iter().flatten().copied().collect();
        let mut candidates = heavy.clone();
        candidates.sort_by_key(|&n| std::cmp::Reverse(self.wedge_score(center, n)));

        let plans: Vec<(NodeIndex, Option<NodeIndex>)> = if has_h {
            let lowest = heavy.last().copied();
            let pick = match lowest {
                Some(n) if !self.graph.atom(n).is_stereo_center && !self.in_same_ring(center, n) => Some(n),
                _ => candidates.first().copied(),
            };
            pick.into_iter().map(|n| (n, None)).collect()
        } else {
            let Some(&first) = candidates.first() else {
                return;
            };
            let direction = |n: NodeIndex| Vector2::difference(self.pos(n), self.pos(center)).normalized();
            // an opposite wedge drawn straight across the first one flattens the center
            let mut plans: Vec<_> = candidates[1..]
                .iter()
                .filter(|&&o| Vector2::dot(direction(first), direction(o)) > -0.99)
                .map(|&o| (first, Some(o)))
                .collect();
            plans.push((first, None));
            plans
        };
        let Some(&fallback) = plans.first() else {
            return;
        };

        let (wedged, opposite, volume) = plans
            .iter()
            .map(|&(w, o)| (w, o, self.wedged_volume(center, &heavy, w, o)))
            .find(|&(_, _, v)| v.abs() > 1e-6)
            .unwrap_or((fallback.0, fallback.1, 0.0));
        if volume == 0.0 {
            tracing::debug!(center = center.index(), "flat stereocenter, wedge sign is arbitrary");
        }

        // R is drawn with a negative volume
        let s = if volume == 0.0 || (volume < 0.0) == (chirality == Chirality::R) {
            1.0
        } else {
            -1.0
        };
        let (up, down) = (Direction::Up, Direction::Down);
        let towards = if s > 0.0 { up } else { down };
        let away = if s > 0.0 { down } else { up };

        self.set_wedge(center, wedged, towards);
        self.graph.atom_mut(wedged).plane = if s > 0.0 { 1 } else { -1 };
        if let Some(o) = opposite {
            self.set_wedge(center, o, away);
            self.graph.atom_mut(o).plane = if s > 0.0 { -1 } else { 1 };
        }
        if has_h {
            self.graph.atom_mut(center).hydrogen_direction = Some(away);
        }
        tracing::trace!(center = center.index(), wedged = wedged.index(), ?chirality, "assigned wedge");
    }

    /// Signed volume spanned by the substituents in priority order when
    /// `wedged` points out of the paper and `opposite` into it. With three
    /// heavy neighbours the hydrogen sits at the center; with four, the
    /// lowest one is the reference corner.
    fn wedged_volume(&self, center: NodeIndex, heavy: &[NodeIndex], wedged: NodeIndex, opposite: Option<NodeIndex>) -> f64 {
        let rows: Vec<[f64; 3]> = heavy
            .iter()
            .map(|&n| {
                let mut d = Vector2::difference(self.pos(n), self.pos(center));
                if d.length_sq() > 1e-12 {
                    d.normalize();
                }
                let z = if n == wedged {
                    1.0
                } else if Some(n) == opposite {
                    -1.0
                } else {
                    0.0
                };
                [d.x, d.y, z]
            })
            .collect();
        signed_volume(&rows)
    }

    fn set_wedge(&mut self, center: NodeIndex, neighbour: NodeIndex, direction: Direction) {
        if let Some(e) = self.graph.edge_between(center, neighbour) {
            let edge = self.graph.edge_mut(e);
            edge.wedge = Some(direction);
            edge.wedge_origin = Some(center);
        }
    }

    /// Preference for carrying the wedge: not a stereocenter itself, outside
    /// the center's rings, a hetero atom, a short branch.
    fn wedge_score(&self, center: NodeIndex, n: NodeIndex) -> i64 {
        let atom = self.graph.atom(n);
        let mut score = 0;
        if !atom.is_stereo_center {
            score += 100_000;
        }
        if !self.in_same_ring(center, n) {
            score += 10_000;
        }
        if atom.is_hetero_atom() {
            score += 1_000;
        }
        score + 1_000 - self.graph.tree_depth(n, Some(center)).min(1_000) as i64
    }
}

fn compare_keys(a: &PriorityKey, b: &PriorityKey) -> Ordering {
    for sphere in 0..a.len().max(b.len()) {
        let x = a.get(sphere).map_or(&[][..], Vec::as_slice);
        let y = b.get(sphere).map_or(&[][..], Vec::as_slice);
        for i in 0..x.len().max(y.len()) {
            let o = x.get(i).unwrap_or(&0).cmp(y.get(i).unwrap_or(&0));
            if o != Ordering::Equal {
                return o;
            }
        }
    }
    Ordering::Equal
}

/// Orientation of substituent rows `[dx, dy, z]` in priority order: the
/// determinant of the first three, or of the first three taken relative to
/// the fourth. Both have the same sign for a tetrahedral arrangement.
pub(crate) fn signed_volume(rows: &[[f64; 3]]) -> f64 {
    match rows {
        [a, b, c] => determinant(a, b, c),
        [a, b, c, d] => {
            let rel = |r: &[f64; 3]| [r[0] - d[0], r[1] - d[1], r[2] - d[2]];
            determinant(&rel(a), &rel(b), &rel(c))
        }
        _ => 0.0,
    }
}

fn determinant(a: &[f64; 3], b: &[f64; 3], c: &[f64; 3]) -> f64 {
    a[0] * (b[1] * c[2] - b[2] * c[1]) - a[1] * (b[0] * c[2] - b[2] * c[0]) + a[2] * (b[0] * c[1] - b[1] * c[0])
}

/// `1` for an even permutation of `0..n`, `-1` for an odd one.
pub(crate) fn permutation_parity(perm: &[usize]) -> i8 {
    let mut visited = vec![false; perm.len()];
    let mut swaps = 0usize;
    for i in 0..perm.len() {
        if visited[i] {
            continue;
        }
        let mut j = i;
        let mut cycle_len = 0;
        while !visited[j] {
            visited[j] = true;
            j = perm[j];
            cycle_len += 1;
        }
        swaps += cycle_len - 1;
    }
    if swaps % 2 == 0 {
        1
    } else {
        -1
    }
}
