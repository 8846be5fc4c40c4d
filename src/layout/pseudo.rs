use petgraph::graph::NodeIndex;

use super::Layout;

impl Layout {
    /// Folds terminal hetero substituents of a branching acyclic atom into
    /// its label, so CF3 or SO3H are drawn as text. Phosphorus, guanidine
    /// carbons and stereocenters keep their bonds, as does any terminal atom
    /// on a wedged bond.
    pub(super) fn init_pseudo_elements(&mut self) {
        let atoms: Vec<NodeIndex> = self.graph.atoms().collect();
        for atom in atoms {
            let neighbours = self.graph.neighbours(atom);
            let a = self.graph.atom(atom);
            if neighbours.len() < 3 || a.is_in_ring() || a.element == "P" || a.is_stereo_center {
                continue;
            }
            if neighbours.len() == 3 && neighbours.iter().all(|&n| self.graph.atom(n).element == "N") {
                continue;
            }

            let absorbable = |n: NodeIndex| self.graph.degree(n) == 1 && !self.is_wedged(atom, n);
            let terminal_hetero = neighbours
                .iter()
                .filter(|&&n| absorbable(n) && self.graph.atom(n).is_hetero_atom())
                .count();
            let inner: Vec<NodeIndex> = neighbours
                .iter()
                .copied()
                .filter(|&n| self.graph.degree(n) > 1)
                .collect();
            if inner.len() > 1 || terminal_hetero < 2 {
                continue;
            }
            let previous_element = inner
                .first()
                .map(|&p| self.graph.atom(p).element.clone())
                .unwrap_or_default();

            let absorbed: Vec<NodeIndex> = neighbours.into_iter().filter(|&n| absorbable(n)).collect();
            for n in absorbed {
                let (element, hydrogens, charge) = {
                    let t = self.graph.atom(n);
                    let open = t.max_bonds().saturating_sub(self.graph.bond_count(n).min(u8::MAX as u32) as u8);
                    match t.bracket {
                        Some(b) => (t.element.clone(), b.hydrogen_count, b.charge),
                        None => (t.element.clone(), open, 0),
                    }
                };
                self.graph.atom_mut(n).is_drawn = false;
                self.graph
                    .atom_mut(atom)
                    .attach_pseudo_element(&element, &previous_element, hydrogens, charge);
            }
            tracing::trace!(atom = atom.index(), "contracted terminal substituents");
        }
    }

    fn is_wedged(&self, a: NodeIndex, b: NodeIndex) -> bool {
        self.graph
            .edge_between(a, b)
            .is_some_and(|e| self.graph.edge(e).wedge.is_some())
    }
}
