//! Renderer-facing result of a finished [`Layout`].

use serde::Serialize;

use crate::atom::{Chirality, Direction, PseudoElement};
use crate::diagnostics::{ChemistryWarning, LayoutDiagnostic};
use crate::edge::BondType;
use crate::layout::Layout;
use crate::vector2::Vector2;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DepictedAtom {
    /// Element symbol.
    pub label: String,
    pub position: Vector2,
    pub is_drawn: bool,
    pub draw_explicit: bool,
    pub hydrogen_count: u8,
    pub charge: i8,
    /// Mass number, `0` when none was written.
    pub isotope: u16,
    pub chirality: Chirality,
    pub plane: i8,
    pub hydrogen_direction: Option<Direction>,
    pub pseudo_elements: Vec<PseudoElement>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DepictedEdge {
    pub source: usize,
    pub target: usize,
    pub bond_type: BondType,
    pub weight: u8,
    pub center: bool,
    pub is_part_of_aromatic_ring: bool,
    pub wedge: Option<Direction>,
    pub wedge_origin: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DepictedRing {
    pub members: Vec<usize>,
    pub center: Vector2,
}

/// Everything a renderer needs: positioned atoms, annotated bonds, ring
/// centers for inner double-bond lines, and the warnings collected on the
/// way.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Depiction {
    pub atoms: Vec<DepictedAtom>,
    pub edges: Vec<DepictedEdge>,
    pub rings: Vec<DepictedRing>,
    pub warnings: Vec<ChemistryWarning>,
    pub diagnostics: Vec<LayoutDiagnostic>,
}

impl Depiction {
    pub fn from_layout(layout: &Layout) -> Self {
        let graph = layout.graph();
        let atoms = graph
            .atoms()
            .map(|idx| {
                let atom = graph.atom(idx);
                DepictedAtom {
                    label: atom.element.clone(),
                    position: layout.position(idx),
                    is_drawn: atom.is_drawn,
                    draw_explicit: atom.draw_explicit,
                    hydrogen_count: graph.hydrogen_count(idx),
                    charge: atom.charge(),
                    isotope: atom.bracket.map_or(0, |b| b.isotope),
                    chirality: atom.chirality,
                    plane: atom.plane,
                    hydrogen_direction: atom.hydrogen_direction,
                    pseudo_elements: atom.attached_pseudo_elements().cloned().collect(),
                }
            })
            .collect();

        let edges = graph
            .edges()
            .map(|e| {
                let edge = graph.edge(e);
                DepictedEdge {
                    source: edge.source.index(),
                    target: edge.target.index(),
                    bond_type: edge.bond_type(),
                    weight: edge.weight(),
                    center: edge.center,
                    is_part_of_aromatic_ring: edge.is_part_of_aromatic_ring,
                    wedge: edge.wedge,
                    wedge_origin: edge.wedge_origin.map(|o| o.index()),
                }
            })
            .collect();

        let rings = layout
            .rings()
            .original_rings()
            .map(|r| DepictedRing {
                members: r.members.iter().map(|m| m.index()).collect(),
                center: r.center,
            })
            .collect();

        Self {
            atoms,
            edges,
            rings,
            warnings: graph.warnings().to_vec(),
            diagnostics: layout.diagnostics().to_vec(),
        }
    }

    /// Lower-left and upper-right corners around the drawn atoms, `None`
    /// when nothing is drawn.
    pub fn bounds(&self) -> Option<(Vector2, Vector2)> {
        let mut drawn = self.atoms.iter().filter(|a| a.is_drawn).map(|a| a.position);
        let first = drawn.next()?;
        Some(drawn.fold((first, first), |(lo, hi), p| {
            (
                Vector2::new(lo.x.min(p.x), lo.y.min(p.y)),
                Vector2::new(hi.x.max(p.x), hi.y.max(p.y)),
            )
        }))
    }
}

impl From<&Layout> for Depiction {
    fn from(layout: &Layout) -> Self {
        Depiction::from_layout(layout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::LayoutOptions;
    use crate::rings::RingSystem;
    use crate::smiles::parse_smiles;

    fn depicted(smiles: &str) -> Depiction {
        let mut graph = parse_smiles(smiles).unwrap();
        let rings = RingSystem::perceive(&mut graph);
        let mut layout = Layout::new(graph, rings, LayoutOptions::default());
        layout.run();
        Depiction::from(&layout)
    }

    #[test]
    fn atoms_and_edges_follow_the_graph() {
        let d = depicted("[13CH3]C(=O)[O-]");
        assert_eq!(d.atoms.len(), 4);
        assert_eq!(d.edges.len(), 3);
        assert_eq!(d.atoms[0].isotope, 13);
        assert_eq!(d.atoms[0].hydrogen_count, 3);
        assert_eq!(d.atoms[3].charge, -1);
        assert_eq!(d.edges[1].bond_type, BondType::Double);
        assert_eq!(d.edges[1].weight, 2);
        assert!(d.rings.is_empty());
    }

    #[test]
    fn rings_report_centers() {
        let d = depicted("c1ccccc1");
        assert_eq!(d.rings.len(), 1);
        let ring = &d.rings[0];
        assert_eq!(ring.members.len(), 6);
        for &m in &ring.members {
            assert!((d.atoms[m].position.distance(ring.center) - 1.0).abs() < 1e-6);
        }
        assert!(d.edges.iter().all(|e| e.is_part_of_aromatic_ring));
    }

    #[test]
    fn bounds_skip_hidden_atoms() {
        let d = depicted("CCC(F)(F)F");
        let (lo, hi) = d.bounds().unwrap();
        let drawn: Vec<_> = d.atoms.iter().filter(|a| a.is_drawn).collect();
        assert_eq!(drawn.len(), 3);
        for a in drawn {
            assert!(a.position.x >= lo.x && a.position.x <= hi.x);
        }
        assert_eq!(d.atoms[2].pseudo_elements[0].count, 3);
        assert!(!d.atoms[3].is_drawn);
    }

    #[test]
    fn serializes_to_json() {
        let d = depicted("C[C@H](N)O");
        let json = serde_json::to_value(&d).unwrap();
        assert_eq!(json["atoms"][1]["label"], "C");
        assert!(json["atoms"][0]["position"]["x"].is_number());
        assert_eq!(json["edges"][0]["source"], 0);
        assert!(json["warnings"].as_array().unwrap().is_empty());
    }
}
