pub mod error;
mod parser;
mod tokenizer;

use crate::diagnostics::ChemistryWarning;
use crate::element;
use crate::graph::Graph;
pub use error::ParseError;

/// Parses a SMILES string into a molecular graph.
///
/// Surrounding whitespace is ignored; error positions are character offsets
/// into the original string. On success every atom has its neighbour
/// symbols and bond count cached and stereocenter candidates are flagged.
pub fn parse_smiles(s: &str) -> Result<Graph, ParseError> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return Err(ParseError::EmptyInput { pos: 0 });
    }
    let offset = s.chars().count() - s.trim_start().chars().count();
    let tokens = tokenizer::tokenize(trimmed, offset)?;
    let mut graph = parser::build_graph(&tokens)?;
    annotate(&mut graph);
    tracing::debug!(
        atoms = graph.atom_count(),
        edges = graph.edge_count(),
        ring_closures = graph.ring_closures().len(),
        "parsed SMILES"
    );
    Ok(graph)
}

fn annotate(graph: &mut Graph) {
    let atoms: Vec<_> = graph.atoms().collect();
    for idx in atoms {
        let neighbours = graph.neighbours(idx);
        let elements = neighbours
            .iter()
            .map(|n| graph.atom(*n).element.clone())
            .collect();
        let bond_count = graph.bond_count(idx);

        let atom = graph.atom_mut(idx);
        atom.neighbouring_elements = elements;
        atom.bond_count = bond_count;

        let bracket_h = atom.bracket.map_or(0, |b| b.hydrogen_count as usize);
        atom.is_stereo_center = atom.chiral_tag().is_some()
            && neighbours.len() >= 3
            && neighbours.len() + bracket_h == 4;

        let charge = atom.charge().unsigned_abs() as u32;
        let max = element::default_valences(&atom.element)
            .last()
            .map_or(atom.max_bonds() as u32, |v| *v as u32)
            + charge;
        if bond_count > max {
            let element = atom.element.clone();
            graph.add_warning(ChemistryWarning::ValenceExceeded {
                atom: idx,
                element,
                bonds: bond_count,
                max,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atom::{Atom, ChiralTag};
    use crate::edge::BondType;
    use petgraph::graph::NodeIndex;

    fn n(i: usize) -> NodeIndex {
        NodeIndex::new(i)
    }

    fn atom(g: &Graph, i: usize) -> &Atom {
        g.atom(n(i))
    }

    // ---- Simple molecules ----

    #[test]
    fn methane() {
        let g = parse_smiles("C").unwrap();
        assert_eq!(g.atom_count(), 1);
        assert_eq!(g.edge_count(), 0);
        assert_eq!(g.hydrogen_count(n(0)), 4);
    }

    #[test]
    fn ethene() {
        let g = parse_smiles("C=C").unwrap();
        assert_eq!(g.edge_count(), 1);
        assert_eq!(g.hydrogen_count(n(0)), 2);
        assert_eq!(atom(&g, 1).bond_count, 2);
        let e = g.edge_between(n(0), n(1)).unwrap();
        assert_eq!(g.edge(e).bond_type(), BondType::Double);
    }

    #[test]
    fn acetic_acid_neighbours() {
        let g = parse_smiles("CC(=O)O").unwrap();
        assert!(atom(&g, 1).neighbouring_elements_equal(&["O", "O", "C"]));
        assert_eq!(atom(&g, 1).bond_count, 4);
    }

    #[test]
    fn surrounding_whitespace() {
        let g = parse_smiles("  CCO\n").unwrap();
        assert_eq!(g.atom_count(), 3);
        assert_eq!(
            parse_smiles("  C?").unwrap_err(),
            ParseError::UnexpectedChar { pos: 3, ch: '?' }
        );
    }

    #[test]
    fn empty_input() {
        assert_eq!(parse_smiles("").unwrap_err(), ParseError::EmptyInput { pos: 0 });
        assert_eq!(parse_smiles("   ").unwrap_err(), ParseError::EmptyInput { pos: 0 });
    }

    // ---- Rings ----

    #[test]
    fn cyclohexane_counts() {
        let g = parse_smiles("C1CCCCC1").unwrap();
        assert_eq!(g.atom_count(), 6);
        assert_eq!(g.edge_count(), 6);
    }

    #[test]
    fn naphthalene_counts() {
        let g = parse_smiles("c1ccc2ccccc2c1").unwrap();
        assert_eq!(g.atom_count(), 10);
        assert_eq!(g.edge_count(), 11);
        assert_eq!(g.ring_closures().len(), 2);
    }

    // ---- Stereo ----

    #[test]
    fn stereocenter_with_bracket_hydrogen() {
        let g = parse_smiles("N[C@@H](C)C(=O)O").unwrap();
        let c = atom(&g, 1);
        assert_eq!(c.chiral_tag(), Some(ChiralTag::Clockwise));
        assert!(c.is_stereo_center);
        assert!(c.has_hydrogen);
        assert!(!atom(&g, 0).is_stereo_center);
    }

    #[test]
    fn chirality_marker_without_four_substituents() {
        let g = parse_smiles("C[C@H]C").unwrap();
        assert!(!atom(&g, 1).is_stereo_center);
    }

    #[test]
    fn directional_bonds_kept() {
        let g = parse_smiles("F/C=C/F").unwrap();
        assert_eq!(atom(&g, 1).bond_type, BondType::Up);
        assert_eq!(atom(&g, 3).bond_type, BondType::Up);
    }

    // ---- Warnings ----

    #[test]
    fn pentavalent_carbon_warns() {
        let g = parse_smiles("CC(C)(C)(C)C").unwrap();
        assert!(matches!(
            g.warnings(),
            [ChemistryWarning::ValenceExceeded { bonds: 5, max: 4, .. }]
        ));
    }

    #[test]
    fn charge_raises_valence_limit() {
        let g = parse_smiles("C[N+](C)(C)C").unwrap();
        // N allows 5 through its second valence
        assert!(g.warnings().is_empty());
        let g = parse_smiles("C[O+](C)C").unwrap();
        assert!(g.warnings().is_empty());
        let g = parse_smiles("CO(C)C").unwrap();
        assert_eq!(g.warnings().len(), 1);
    }
}
