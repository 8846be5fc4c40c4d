use std::collections::VecDeque;

use petgraph::graph::{EdgeIndex, NodeIndex, UnGraph};
use petgraph::visit::EdgeRef;

use crate::atom::Atom;
use crate::diagnostics::ChemistryWarning;
use crate::edge::Edge;
use crate::element;

/// A ring closure confirmed by the parser: the two atoms that carried the
/// same digit and the edge created between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RingClosure {
    pub id: u16,
    pub first: NodeIndex,
    pub second: NodeIndex,
    pub edge: EdgeIndex,
}

/// Molecular graph produced by the SMILES parser.
///
/// Besides the atom/edge arena it keeps the parser's spanning tree (each
/// atom's parent is the atom it was bonded to when written), the ring
/// closure table and the neighbour order as written, which tetrahedral
/// markers refer to.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    graph: UnGraph<Atom, Edge>,
    parent: Vec<Option<NodeIndex>>,
    children: Vec<Vec<NodeIndex>>,
    written_order: Vec<Vec<NodeIndex>>,
    ring_closures: Vec<RingClosure>,
    warnings: Vec<ChemistryWarning>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inner(&self) -> &UnGraph<Atom, Edge> {
        &self.graph
    }

    /// Adds an atom as a spanning tree child of `parent`. Creating the bond
    /// to the parent is up to the caller.
    pub fn add_atom(&mut self, atom: Atom, parent: Option<NodeIndex>) -> NodeIndex {
        let idx = self.graph.add_node(atom);
        self.parent.push(parent);
        self.children.push(Vec::new());
        self.written_order.push(Vec::new());
        if let Some(p) = parent {
            self.children[p.index()].push(idx);
        }
        idx
    }

    pub fn add_edge(&mut self, edge: Edge) -> EdgeIndex {
        self.graph.add_edge(edge.source, edge.target, edge)
    }

    pub(crate) fn push_written_neighbour(&mut self, atom: NodeIndex, neighbour: NodeIndex) -> usize {
        let order = &mut self.written_order[atom.index()];
        order.push(neighbour);
        order.len() - 1
    }

    pub(crate) fn set_written_neighbour(&mut self, atom: NodeIndex, slot: usize, neighbour: NodeIndex) {
        self.written_order[atom.index()][slot] = neighbour;
    }

    pub(crate) fn add_ring_closure(&mut self, closure: RingClosure) {
        self.ring_closures.push(closure);
    }

    pub(crate) fn add_warning(&mut self, warning: ChemistryWarning) {
        tracing::warn!(%warning, "chemistry warning");
        self.warnings.push(warning);
    }

    pub fn atom(&self, idx: NodeIndex) -> &Atom {
        &self.graph[idx]
    }

    pub fn atom_mut(&mut self, idx: NodeIndex) -> &mut Atom {
        &mut self.graph[idx]
    }

    pub fn edge(&self, idx: EdgeIndex) -> &Edge {
        &self.graph[idx]
    }

    pub fn edge_mut(&mut self, idx: EdgeIndex) -> &mut Edge {
        &mut self.graph[idx]
    }

    pub fn edge_between(&self, a: NodeIndex, b: NodeIndex) -> Option<EdgeIndex> {
        self.graph.find_edge(a, b)
    }

    pub fn atoms(&self) -> impl Iterator<Item = NodeIndex> + '_ {
        self.graph.node_indices()
    }

    pub fn edges(&self) -> impl Iterator<Item = EdgeIndex> + '_ {
        self.graph.edge_indices()
    }

    pub fn atom_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Neighbours in bond creation order.
    pub fn neighbours(&self, idx: NodeIndex) -> Vec<NodeIndex> {
        let mut edges: Vec<(EdgeIndex, NodeIndex)> = self
            .graph
            .edges(idx)
            .map(|e| (e.id(), if e.source() == idx { e.target() } else { e.source() }))
            .collect();
        edges.sort_by_key(|(e, _)| *e);
        edges.into_iter().map(|(_, n)| n).collect()
    }

    pub fn degree(&self, idx: NodeIndex) -> usize {
        self.graph.edges(idx).count()
    }

    /// Incident edges in creation order.
    pub fn edges_of(&self, idx: NodeIndex) -> Vec<EdgeIndex> {
        let mut edges: Vec<EdgeIndex> = self.graph.edges(idx).map(|e| e.id()).collect();
        edges.sort();
        edges
    }

    /// Neighbours in the order the SMILES string lists them: the previous
    /// atom, ring closures in digit order, then branches and the next atom.
    pub fn written_neighbours(&self, idx: NodeIndex) -> &[NodeIndex] {
        &self.written_order[idx.index()]
    }

    pub fn ring_closures(&self) -> &[RingClosure] {
        &self.ring_closures
    }

    pub fn warnings(&self) -> &[ChemistryWarning] {
        &self.warnings
    }

    pub fn spanning_tree_parent(&self, idx: NodeIndex) -> Option<NodeIndex> {
        self.parent[idx.index()]
    }

    pub fn spanning_tree_children(&self, idx: NodeIndex) -> &[NodeIndex] {
        &self.children[idx.index()]
    }

    /// Tree neighbours of `idx` (parent and children) other than `exclude`.
    pub fn spanning_tree_neighbours(&self, idx: NodeIndex, exclude: Option<NodeIndex>) -> Vec<NodeIndex> {
        let mut out = Vec::new();
        if let Some(p) = self.parent[idx.index()] {
            if Some(p) != exclude {
                out.push(p);
            }
        }
        out.extend(
            self.children[idx.index()]
                .iter()
                .copied()
                .filter(|c| Some(*c) != exclude),
        );
        out
    }

    /// Atoms reachable from `start` without passing through `parent`, in
    /// depth-first order starting with `start` itself.
    pub fn traverse_tree(&self, start: NodeIndex, parent: Option<NodeIndex>) -> Vec<NodeIndex> {
        let mut visited = vec![false; self.atom_count()];
        if let Some(p) = parent {
            visited[p.index()] = true;
        }
        let mut order = Vec::new();
        let mut stack = vec![start];
        while let Some(v) = stack.pop() {
            if visited[v.index()] {
                continue;
            }
            visited[v.index()] = true;
            order.push(v);
            let neighbours = self.neighbours(v);
            for &n in neighbours.iter().rev() {
                if !visited[n.index()] {
                    stack.push(n);
                }
            }
        }
        order
    }

    /// Depth of the branch rooted at `start` and pointing away from
    /// `parent`, counting `start` as 1.
    pub fn tree_depth(&self, start: NodeIndex, parent: Option<NodeIndex>) -> usize {
        let mut visited = vec![false; self.atom_count()];
        if let Some(p) = parent {
            visited[p.index()] = true;
        }
        visited[start.index()] = true;
        let mut queue = VecDeque::from([(start, 1usize)]);
        let mut depth = 0;
        while let Some((v, d)) = queue.pop_front() {
            depth = depth.max(d);
            for n in self.neighbours(v) {
                if !visited[n.index()] {
                    visited[n.index()] = true;
                    queue.push_back((n, d + 1));
                }
            }
        }
        depth
    }

    /// Sum of incident bond weights.
    pub fn bond_count(&self, idx: NodeIndex) -> u32 {
        self.graph.edges(idx).map(|e| e.weight().weight() as u32).sum()
    }

    pub fn is_terminal(&self, idx: NodeIndex) -> bool {
        self.atom(idx).has_attached_pseudo_elements() || self.degree(idx) <= 1
    }

    /// Hydrogens the atom carries: the bracket count when written, otherwise
    /// the gap to the smallest normal valence that fits the bonds. Aromatic
    /// atoms give one up to the delocalised bond.
    pub fn hydrogen_count(&self, idx: NodeIndex) -> u8 {
        let atom = self.atom(idx);
        if let Some(bracket) = atom.bracket {
            return bracket.hydrogen_count;
        }
        let bonds = self.bond_count(idx);
        let Some(valence) = element::default_valences(&atom.element)
            .iter()
            .map(|&v| v as u32)
            .find(|&v| v >= bonds)
        else {
            return 0;
        };
        let mut h = valence - bonds;
        if atom.is_part_of_aromatic_ring {
            h = h.saturating_sub(1);
        }
        h as u8
    }

    /// Connected components, each listed in atom index order, ordered by
    /// their first atom.
    pub fn components(&self) -> Vec<Vec<NodeIndex>> {
        let mut seen = vec![false; self.atom_count()];
        let mut out = Vec::new();
        for start in self.atoms() {
            if seen[start.index()] {
                continue;
            }
            let mut component = self.traverse_tree(start, None);
            for v in &component {
                seen[v.index()] = true;
            }
            component.sort();
            out.push(component);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edge::BondType;

    fn chain(symbols: &[&str]) -> Graph {
        let mut g = Graph::new();
        let mut prev = None;
        for s in symbols {
            let idx = g.add_atom(Atom::new(s, BondType::Single), prev);
            if let Some(p) = prev {
                g.add_edge(Edge::new(p, idx, BondType::Single));
            }
            prev = Some(idx);
        }
        g
    }

    fn n(i: usize) -> NodeIndex {
        NodeIndex::new(i)
    }

    #[test]
    fn neighbours_in_creation_order() {
        let mut g = chain(&["C", "C", "C"]);
        let extra = g.add_atom(Atom::new("O", BondType::Single), Some(n(1)));
        g.add_edge(Edge::new(n(1), extra, BondType::Single));
        assert_eq!(g.neighbours(n(1)), vec![n(0), n(2), n(3)]);
        assert_eq!(g.spanning_tree_children(n(1)), &[n(2), n(3)]);
        assert_eq!(g.spanning_tree_parent(n(1)), Some(n(0)));
        assert_eq!(g.spanning_tree_neighbours(n(1), Some(n(2))), vec![n(0), n(3)]);
    }

    #[test]
    fn traverse_and_depth_stay_on_their_side() {
        let g = chain(&["C", "C", "C", "C", "C"]);
        assert_eq!(g.traverse_tree(n(2), Some(n(1))), vec![n(2), n(3), n(4)]);
        assert_eq!(g.tree_depth(n(2), Some(n(1))), 3);
        assert_eq!(g.tree_depth(n(1), Some(n(2))), 2);
        assert_eq!(g.tree_depth(n(0), None), 5);
    }

    #[test]
    fn traverse_terminates_on_cycles() {
        let mut g = chain(&["C", "C", "C", "C"]);
        g.add_edge(Edge::new(n(3), n(0), BondType::Single));
        let visited = g.traverse_tree(n(0), None);
        assert_eq!(visited.len(), 4);
        assert_eq!(g.tree_depth(n(1), Some(n(0))), 3);
    }

    #[test]
    fn implicit_hydrogens() {
        let mut g = chain(&["C", "C", "O"]);
        let e = g.edge_between(n(1), n(2)).unwrap();
        g.edge_mut(e).set_bond_type(BondType::Double);
        assert_eq!(g.hydrogen_count(n(0)), 3);
        assert_eq!(g.hydrogen_count(n(1)), 1);
        assert_eq!(g.hydrogen_count(n(2)), 0);
        assert_eq!(g.bond_count(n(1)), 3);
    }

    #[test]
    fn terminal_atoms() {
        let g = chain(&["C", "C", "C"]);
        assert!(g.is_terminal(n(0)));
        assert!(!g.is_terminal(n(1)));
    }

    #[test]
    fn components_in_index_order() {
        let mut g = chain(&["C", "C"]);
        g.add_atom(Atom::new("O", BondType::Single), None);
        assert_eq!(g.components(), vec![vec![n(0), n(1)], vec![n(2)]]);
    }
}
