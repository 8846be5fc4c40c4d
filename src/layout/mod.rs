//! Two-dimensional coordinates for a parsed molecule.
//!
//! [`Layout`] walks through the [`LayoutStage`]s in order: tree placement of
//! chains and rings, overlap resolution, stereo annotation and a final pass
//! that contracts terminal groups and arranges disconnected components side
//! by side. Each stage lives in its own submodule as an `impl Layout` block.

mod overlap;
mod position;
mod pseudo;
mod stereo;

use petgraph::graph::NodeIndex;
use serde::Serialize;

use crate::diagnostics::LayoutDiagnostic;
use crate::edge::BondType;
use crate::graph::Graph;
use crate::options::LayoutOptions;
use crate::rings::RingSystem;
use crate::vector2::{self, Vector2};

/// Progress of a [`Layout`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LayoutStage {
    Unplaced,
    TreePositioned,
    OverlapResolved,
    StereoAnnotated,
    Done,
}

/// Where an atom sits and how it got there.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct Placement {
    pub position: Vector2,
    pub previous_position: Vector2,
    /// Atom this one was placed from.
    pub previous: Option<NodeIndex>,
    /// Turn relative to the incoming bond.
    pub angle: f64,
    pub positioned: bool,
}

/// Coordinate generation for one molecule.
///
/// ```
/// use crabdepict::{Layout, LayoutOptions, LayoutStage, RingSystem};
///
/// let mut graph = crabdepict::parse_smiles("CCO").unwrap();
/// let rings = RingSystem::perceive(&mut graph);
/// let mut layout = Layout::new(graph, rings, LayoutOptions::default());
/// layout.run();
/// assert_eq!(layout.stage(), LayoutStage::Done);
/// assert_eq!(layout.positions().count(), 3);
/// ```
#[derive(Debug, Clone)]
pub struct Layout {
    graph: Graph,
    rings: RingSystem,
    options: LayoutOptions,
    placements: Vec<Placement>,
    /// Connected component of each atom.
    component: Vec<usize>,
    stage: LayoutStage,
    diagnostics: Vec<LayoutDiagnostic>,
}

impl Layout {
    pub fn new(graph: Graph, rings: RingSystem, options: LayoutOptions) -> Self {
        let mut component = vec![0; graph.atom_count()];
        for (i, atoms) in graph.components().iter().enumerate() {
            for a in atoms {
                component[a.index()] = i;
            }
        }
        Self {
            placements: vec![Placement::default(); graph.atom_count()],
            graph,
            rings,
            options,
            component,
            stage: LayoutStage::Unplaced,
            diagnostics: Vec::new(),
        }
    }

    /// Runs every remaining stage.
    pub fn run(&mut self) {
        while self.stage != LayoutStage::Done {
            self.step();
        }
    }

    /// Runs the next stage and returns the stage reached.
    pub fn step(&mut self) -> LayoutStage {
        self.stage = match self.stage {
            LayoutStage::Unplaced => {
                self.place_atoms();
                LayoutStage::TreePositioned
            }
            LayoutStage::TreePositioned => {
                self.resolve_overlaps();
                self.repair_degenerate();
                LayoutStage::OverlapResolved
            }
            LayoutStage::OverlapResolved => {
                if self.options.isomeric {
                    self.annotate_stereochemistry();
                }
                LayoutStage::StereoAnnotated
            }
            LayoutStage::StereoAnnotated | LayoutStage::Done => {
                if self.options.compact_drawing {
                    self.init_pseudo_elements();
                }
                self.finish();
                LayoutStage::Done
            }
        };
        tracing::debug!(stage = ?self.stage, atoms = self.graph.atom_count(), "layout stage");
        self.stage
    }

    pub fn stage(&self) -> LayoutStage {
        self.stage
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn rings(&self) -> &RingSystem {
        &self.rings
    }

    pub fn options(&self) -> &LayoutOptions {
        &self.options
    }

    pub fn position(&self, atom: NodeIndex) -> Vector2 {
        self.placements[atom.index()].position
    }

    /// Positions in atom index order.
    pub fn positions(&self) -> impl Iterator<Item = Vector2> + '_ {
        self.placements.iter().map(|p| p.position)
    }

    pub fn diagnostics(&self) -> &[LayoutDiagnostic] {
        &self.diagnostics
    }

    pub fn into_parts(self) -> (Graph, RingSystem, Vec<LayoutDiagnostic>) {
        (self.graph, self.rings, self.diagnostics)
    }

    fn bond_length(&self) -> f64 {
        self.options.bond_length
    }

    fn pos(&self, atom: NodeIndex) -> Vector2 {
        self.placements[atom.index()].position
    }

    fn is_positioned(&self, atom: NodeIndex) -> bool {
        self.placements[atom.index()].positioned
    }

    fn same_component(&self, a: NodeIndex, b: NodeIndex) -> bool {
        self.component[a.index()] == self.component[b.index()]
    }

    /// Whether the two atoms currently share a ring.
    fn in_same_ring(&self, a: NodeIndex, b: NodeIndex) -> bool {
        let rb = &self.graph.atom(b).rings;
        self.graph.atom(a).rings.iter().any(|r| rb.contains(r))
    }

    fn finish(&mut self) {
        for atoms in self.graph.components() {
            self.align_horizontally(&atoms);
        }
        self.arrange_components();
        self.mark_centered_bonds();
        self.mark_explicit_atoms();
        self.mark_main_chain();
        self.repair_degenerate();
    }

    /// Turns a component so its two most distant atoms lie on a line at a
    /// multiple of 30° to the x axis, preferring horizontal.
    fn align_horizontally(&mut self, atoms: &[NodeIndex]) {
        let mut best: Option<(NodeIndex, NodeIndex)> = None;
        let mut max_dist = 0.0;
        for (i, &a) in atoms.iter().enumerate() {
            for &b in &atoms[i + 1..] {
                let d = self.pos(a).distance_sq(self.pos(b));
                if d > max_dist {
                    max_dist = d;
                    best = Some((a, b));
                }
            }
        }
        let Some((a, b)) = best else {
            return;
        };
        let step = vector2::to_rad(30.0);
        let mut angle = -Vector2::difference(self.pos(a), self.pos(b)).angle();
        if !angle.is_finite() {
            return;
        }
        let remainder = angle.rem_euclid(step);
        if remainder < step / 2.0 {
            angle -= remainder;
        } else {
            angle += step - remainder;
        }
        for &atom in atoms {
            self.placements[atom.index()].position.rotate(angle);
        }
        for id in self.component_rings(atoms) {
            self.rings.ring_mut(id).center.rotate(angle);
        }
    }

    fn component_rings(&self, atoms: &[NodeIndex]) -> Vec<usize> {
        self.rings
            .rings()
            .iter()
            .filter(|r| r.members.first().is_some_and(|m| atoms.contains(m)))
            .map(|r| r.id)
            .collect()
    }

    /// Lays components out left to right, one bond length apart, each
    /// centered on the x axis, and centers the whole drawing on the origin.
    fn arrange_components(&mut self) {
        let components = self.graph.components();
        let gap = self.bond_length();
        let mut cursor = 0.0;
        let mut min_x = f64::INFINITY;
        let mut max_x = f64::NEG_INFINITY;
        for atoms in &components {
            let (lo, hi) = self.bounds(atoms);
            let offset = Vector2::new(cursor - lo.x, -(lo.y + hi.y) / 2.0);
            self.translate(atoms, offset);
            min_x = min_x.min(cursor);
            cursor += hi.x - lo.x;
            max_x = max_x.max(cursor);
            cursor += gap;
        }
        if components.is_empty() {
            return;
        }
        let shift = Vector2::new(-(min_x + max_x) / 2.0, 0.0);
        let all: Vec<NodeIndex> = self.graph.atoms().collect();
        self.translate(&all, shift);
    }

    fn bounds(&self, atoms: &[NodeIndex]) -> (Vector2, Vector2) {
        let mut lo = Vector2::new(f64::INFINITY, f64::INFINITY);
        let mut hi = Vector2::new(f64::NEG_INFINITY, f64::NEG_INFINITY);
        for &a in atoms {
            let p = self.pos(a);
            lo.set(lo.x.min(p.x), lo.y.min(p.y));
            hi.set(hi.x.max(p.x), hi.y.max(p.y));
        }
        (lo, hi)
    }

    fn translate(&mut self, atoms: &[NodeIndex], offset: Vector2) {
        for &a in atoms {
            self.placements[a.index()].position.add(offset);
        }
        for id in self.component_rings(atoms) {
            self.rings.ring_mut(id).center.add(offset);
        }
    }

    /// Double bonds outside rings are drawn centered when one end is
    /// terminal or sits in a cumulated system.
    fn mark_centered_bonds(&mut self) {
        let edges: Vec<_> = self.graph.edges().collect();
        for e in edges {
            let edge = self.graph.edge(e);
            if edge.bond_type() != BondType::Double {
                continue;
            }
            let (a, b) = (edge.source, edge.target);
            if self.rings.shared_ring_count(a, b) > 0 {
                continue;
            }
            let center = [a, b]
                .iter()
                .any(|&x| self.graph.degree(x) == 1 || self.is_cumulated(x));
            self.graph.edge_mut(e).center = center;
        }
    }

    fn is_cumulated(&self, atom: NodeIndex) -> bool {
        self.graph
            .edges_of(atom)
            .iter()
            .filter(|&&e| self.graph.edge(e).bond_type() == BondType::Double)
            .count()
            >= 2
    }

    /// Hetero atoms, charged or labelled carbons, allene centers and, on
    /// request, terminal carbons get an explicit label.
    fn mark_explicit_atoms(&mut self) {
        let atoms: Vec<NodeIndex> = self.graph.atoms().collect();
        for atom in atoms {
            let a = self.graph.atom(atom);
            let bracket_label = a.bracket.is_some_and(|b| b.charge != 0 || b.isotope != 0);
            let explicit = a.element != "C"
                || bracket_label
                || self.graph.degree(atom) == 0
                || (self.is_cumulated(atom) && self.graph.degree(atom) == 2)
                || (self.options.terminal_carbons && self.graph.degree(atom) == 1);
            self.graph.atom_mut(atom).draw_explicit = explicit;
        }
    }

    /// Follows the deepest branch from each component's first atom.
    fn mark_main_chain(&mut self) {
        for atoms in self.graph.components() {
            let Some(&start) = atoms.first() else {
                continue;
            };
            let mut current = start;
            let mut visited = vec![false; self.graph.atom_count()];
            loop {
                visited[current.index()] = true;
                self.graph.atom_mut(current).main_chain = true;
                let next = self
                    .graph
                    .neighbours(current)
                    .into_iter()
                    .filter(|n| !visited[n.index()])
                    .max_by_key(|&n| (self.graph.tree_depth(n, Some(current)), std::cmp::Reverse(n)));
                match next {
                    Some(n) => current = n,
                    None => break,
                }
            }
        }
    }

    /// Replaces non-finite positions and atoms sitting on a bonded
    /// neighbour with a bond-length offset, recording a diagnostic.
    fn repair_degenerate(&mut self) {
        let l = self.bond_length();
        for i in 0..self.placements.len() {
            let atom = NodeIndex::new(i);
            if self.placements[i].position.is_finite() {
                continue;
            }
            let base = self.placements[i]
                .previous
                .map(|p| self.pos(p))
                .filter(Vector2::is_finite)
                .unwrap_or_default();
            self.placements[i].position = Vector2::sum(base, Vector2::new(l, 0.0));
            self.record(LayoutDiagnostic::Degenerate {
                atom,
                reason: "non-finite position",
            });
        }
        let edges: Vec<_> = self.graph.edges().collect();
        for e in edges {
            let (a, b) = {
                let edge = self.graph.edge(e);
                (edge.source, edge.target)
            };
            if self.pos(a).distance_sq(self.pos(b)) > 1e-12 * l * l {
                continue;
            }
            let moved = Vector2::sum(self.pos(a), Vector2::new(l, 0.0).rotated(vector2::to_rad(60.0)));
            self.placements[b.index()].position = moved;
            self.record(LayoutDiagnostic::Degenerate {
                atom: b,
                reason: "coincides with a bonded atom",
            });
        }
    }

    fn record(&mut self, diagnostic: LayoutDiagnostic) {
        tracing::debug!(%diagnostic, "repaired layout");
        self.diagnostics.push(diagnostic);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::smiles::parse_smiles;

    fn n(i: usize) -> NodeIndex {
        NodeIndex::new(i)
    }

    fn layout(smiles: &str) -> Layout {
        let mut graph = parse_smiles(smiles).unwrap();
        let rings = RingSystem::perceive(&mut graph);
        let mut layout = Layout::new(graph, rings, LayoutOptions::default());
        layout.run();
        layout
    }

    #[test]
    fn stages_advance_in_order() {
        let mut graph = parse_smiles("CCO").unwrap();
        let rings = RingSystem::perceive(&mut graph);
        let mut layout = Layout::new(graph, rings, LayoutOptions::default());
        assert_eq!(layout.stage(), LayoutStage::Unplaced);
        assert_eq!(layout.step(), LayoutStage::TreePositioned);
        assert_eq!(layout.step(), LayoutStage::OverlapResolved);
        assert_eq!(layout.step(), LayoutStage::StereoAnnotated);
        assert_eq!(layout.step(), LayoutStage::Done);
    }

    #[test]
    fn single_atom_sits_at_origin() {
        let l = layout("C");
        assert!(l.position(n(0)).length() < 1e-9);
        assert!(l.diagnostics().is_empty());
    }

    #[test]
    fn drawing_is_centered() {
        let l = layout("CCCCCC");
        let (lo, hi) = l.bounds(&l.graph().atoms().collect::<Vec<_>>());
        assert!((lo.x + hi.x).abs() < 1e-9);
        assert!((lo.y + hi.y).abs() < 1e-9);
    }

    #[test]
    fn components_do_not_overlap() {
        let l = layout("CCC.CCC");
        let left_max = (0..3).map(|i| l.position(n(i)).x).fold(f64::MIN, f64::max);
        let right_min = (3..6).map(|i| l.position(n(i)).x).fold(f64::MAX, f64::min);
        assert!(right_min - left_max >= 1.0 - 1e-9);
    }

    #[test]
    fn terminal_double_bond_is_centered() {
        let l = layout("CC(=O)C");
        let e = l.graph().edge_between(n(1), n(2)).unwrap();
        assert!(l.graph().edge(e).center);
        let e = l.graph().edge_between(n(0), n(1)).unwrap();
        assert!(!l.graph().edge(e).center);
    }

    #[test]
    fn hetero_atoms_are_explicit() {
        let l = layout("CCO");
        assert!(!l.graph().atom(n(0)).draw_explicit);
        assert!(l.graph().atom(n(2)).draw_explicit);
    }

    #[test]
    fn terminal_carbons_option() {
        let mut graph = parse_smiles("CCO").unwrap();
        let rings = RingSystem::perceive(&mut graph);
        let options = LayoutOptions {
            terminal_carbons: true,
            ..LayoutOptions::default()
        };
        let mut l = Layout::new(graph, rings, options);
        l.run();
        assert!(l.graph().atom(n(0)).draw_explicit);
    }

    #[test]
    fn main_chain_follows_longest_branch() {
        let l = layout("CC(C)CCC");
        assert!(l.graph().atom(n(3)).main_chain);
        assert!(!l.graph().atom(n(2)).main_chain);
    }
}
