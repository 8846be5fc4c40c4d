use petgraph::graph::NodeIndex;

use crate::atom::Atom;
use crate::diagnostics::ChemistryWarning;
use crate::edge::{BondType, Edge};
use crate::element;
use crate::graph::{Graph, RingClosure};
use crate::smiles::error::ParseError;
use crate::smiles::tokenizer::{AtomToken, Token};

#[derive(Debug, Clone, Copy)]
struct OpenRing {
    atom: NodeIndex,
    bond: Option<BondType>,
    pos: usize,
    /// Slot in the opening atom's written neighbour order.
    slot: usize,
}

/// Builds the molecular graph from a token stream.
///
/// Branches are tracked on an explicit stack, so nesting depth is bounded
/// only by memory.
pub fn build_graph(tokens: &[Token]) -> Result<Graph, ParseError> {
    let mut graph = Graph::new();
    // (branch source, position of its '(')
    let mut stack: Vec<(NodeIndex, usize)> = Vec::new();
    let mut current: Option<NodeIndex> = None;
    let mut pending_bond: Option<(BondType, usize)> = None;
    let mut branch_open = false;
    let mut ring_opens: Vec<Option<OpenRing>> = vec![None; 100];

    for token in tokens {
        match token {
            Token::Atom(atom_tok) => {
                let bond = pending_bond.take();
                let idx = add_atom(&mut graph, atom_tok, current, bond, branch_open);
                branch_open = false;
                current = Some(idx);
            }
            Token::Bond { bond, pos } => {
                if current.is_none() || pending_bond.is_some() {
                    return Err(ParseError::UnexpectedChar {
                        pos: *pos,
                        ch: bond.symbol(),
                    });
                }
                pending_bond = Some((*bond, *pos));
            }
            Token::RingClosure { bond, id, pos } => {
                let cur = current.ok_or(ParseError::InvalidRingBond { pos: *pos, id: *id })?;
                let bond = bond.or(pending_bond.take().map(|(b, _)| b));
                let slot = *id as usize;

                match ring_opens[slot].take() {
                    Some(open) => close_ring(&mut graph, open, cur, bond, *id, *pos)?,
                    None => {
                        graph.atom_mut(cur).add_ringbond(*id, bond);
                        let written = graph.push_written_neighbour(cur, NodeIndex::end());
                        ring_opens[slot] = Some(OpenRing {
                            atom: cur,
                            bond,
                            pos: *pos,
                            slot: written,
                        });
                    }
                }
            }
            Token::OpenParen(pos) => {
                let cur = current.ok_or(ParseError::UnexpectedChar { pos: *pos, ch: '(' })?;
                if let Some((_, bond_pos)) = pending_bond {
                    return Err(ParseError::DanglingBond { pos: bond_pos });
                }
                stack.push((cur, *pos));
                branch_open = true;
            }
            Token::CloseParen(pos) => {
                if let Some((_, bond_pos)) = pending_bond {
                    return Err(ParseError::DanglingBond { pos: bond_pos });
                }
                if branch_open {
                    return Err(ParseError::UnexpectedChar { pos: *pos, ch: ')' });
                }
                let (source, _) = stack.pop().ok_or(ParseError::UnmatchedParen { pos: *pos })?;
                current = Some(source);
            }
            Token::Dot(pos) => {
                if let Some((_, bond_pos)) = pending_bond {
                    return Err(ParseError::DanglingBond { pos: bond_pos });
                }
                if current.is_none() {
                    return Err(ParseError::UnexpectedChar { pos: *pos, ch: '.' });
                }
                if let Some(&(_, open_pos)) = stack.last() {
                    return Err(ParseError::UnmatchedParen { pos: open_pos });
                }
                current = None;
            }
        }
    }

    if let Some((_, bond_pos)) = pending_bond {
        return Err(ParseError::DanglingBond { pos: bond_pos });
    }
    if let Some(&(_, open_pos)) = stack.first() {
        return Err(ParseError::UnmatchedParen { pos: open_pos });
    }
    let dangling = ring_opens
        .iter()
        .enumerate()
        .filter_map(|(id, open)| open.map(|o| (id as u16, o.pos)))
        .min_by_key(|(_, pos)| *pos);
    if let Some((id, pos)) = dangling {
        return Err(ParseError::UnclosedRing { pos, id });
    }

    Ok(graph)
}

fn add_atom(
    graph: &mut Graph,
    tok: &AtomToken,
    current: Option<NodeIndex>,
    bond: Option<(BondType, usize)>,
    branch_open: bool,
) -> NodeIndex {
    let bond_type = bond.map_or(BondType::Single, |(b, _)| b);
    let mut atom = Atom::new(&tok.symbol, bond_type);
    if let Some(bracket) = tok.bracket {
        atom = atom.with_bracket(bracket);
    }
    if branch_open {
        atom.branch_bond = bond.map(|(b, _)| b);
    }

    let known = element::is_known(&atom.element);
    let element = atom.element.clone();
    let idx = graph.add_atom(atom, current);
    if !known {
        graph.add_warning(ChemistryWarning::UnknownElement {
            atom: idx,
            symbol: element,
        });
    }

    if let Some(prev) = current {
        graph.add_edge(Edge::new(prev, idx, bond_type));
        graph.push_written_neighbour(prev, idx);
        graph.push_written_neighbour(idx, prev);
    }
    idx
}

fn close_ring(
    graph: &mut Graph,
    open: OpenRing,
    cur: NodeIndex,
    bond: Option<BondType>,
    id: u16,
    pos: usize,
) -> Result<(), ParseError> {
    if open.atom == cur || graph.edge_between(open.atom, cur).is_some() {
        return Err(ParseError::InvalidRingBond { pos, id });
    }
    let bond_type = match (open.bond, bond) {
        (Some(a), Some(b)) if a != b && !opposite_directions(a, b) => {
            return Err(ParseError::RingBondConflict { pos, id });
        }
        (Some(a), _) => a,
        (None, Some(b)) => b,
        (None, None) => BondType::Single,
    };

    graph.atom_mut(cur).add_ringbond(id, bond);
    let edge = graph.add_edge(Edge::new(open.atom, cur, bond_type));
    graph.set_written_neighbour(open.atom, open.slot, cur);
    graph.push_written_neighbour(cur, open.atom);
    graph.add_ring_closure(RingClosure {
        id,
        first: open.atom,
        second: cur,
        edge,
    });
    Ok(())
}

/// `C/1.../1` writes the same direction from opposite ends, which reads as
/// `/` on one side and `\` on the other. Both spellings are accepted.
fn opposite_directions(a: BondType, b: BondType) -> bool {
    matches!(
        (a, b),
        (BondType::Up, BondType::Down) | (BondType::Down, BondType::Up)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::smiles::tokenizer::tokenize;

    fn parse(s: &str) -> Result<Graph, ParseError> {
        build_graph(&tokenize(s, 0)?)
    }

    fn n(i: usize) -> NodeIndex {
        NodeIndex::new(i)
    }

    #[test]
    fn chain() {
        let g = parse("CCO").unwrap();
        assert_eq!(g.atom_count(), 3);
        assert_eq!(g.edge_count(), 2);
        assert_eq!(g.spanning_tree_parent(n(2)), Some(n(1)));
    }

    #[test]
    fn cyclohexane_closure() {
        let g = parse("C1CCCCC1").unwrap();
        assert_eq!(g.atom_count(), 6);
        assert_eq!(g.edge_count(), 6);
        assert_eq!(g.ring_closures().len(), 1);
        let rc = g.ring_closures()[0];
        assert_eq!((rc.first, rc.second), (n(0), n(5)));
        assert!(Atom::have_common_ringbond(g.atom(n(0)), g.atom(n(5))));
        assert!(g.edge_between(n(0), n(5)).is_some());
    }

    #[test]
    fn branches() {
        let g = parse("CC(C)(O)N").unwrap();
        assert_eq!(g.neighbours(n(1)), vec![n(0), n(2), n(3), n(4)]);
        assert_eq!(g.spanning_tree_children(n(1)), &[n(2), n(3), n(4)]);
    }

    #[test]
    fn branch_bond_recorded() {
        let g = parse("CC(=O)O").unwrap();
        assert_eq!(g.atom(n(2)).branch_bond, Some(BondType::Double));
        assert_eq!(g.atom(n(2)).bond_type, BondType::Double);
        assert_eq!(g.atom(n(3)).branch_bond, None);
        let e = g.edge_between(n(1), n(2)).unwrap();
        assert_eq!(g.edge(e).weight(), 2);
    }

    #[test]
    fn aromatic_bonds_default_to_single() {
        let g = parse("c1ccccc1").unwrap();
        for e in g.edges() {
            assert_eq!(g.edge(e).bond_type(), BondType::Single);
        }
        assert!(g.atom(n(0)).is_part_of_aromatic_ring);
    }

    #[test]
    fn ring_bond_type_from_either_end() {
        let g = parse("C=1CCCCC1").unwrap();
        let e = g.edge_between(n(0), n(5)).unwrap();
        assert_eq!(g.edge(e).bond_type(), BondType::Double);

        let g = parse("C1CCCCC=1").unwrap();
        let e = g.edge_between(n(0), n(5)).unwrap();
        assert_eq!(g.edge(e).bond_type(), BondType::Double);
    }

    #[test]
    fn ring_id_reuse() {
        let g = parse("C1CC1C1CC1").unwrap();
        assert_eq!(g.ring_closures().len(), 2);
        assert_eq!(g.edge_count(), 7);
    }

    #[test]
    fn written_order_puts_ring_digit_in_place() {
        // the closure to atom 4 is written before the branch to atom 1
        let g = parse("[C@]1(F)CCC1").unwrap();
        assert_eq!(g.written_neighbours(n(0)), &[n(4), n(1), n(2)]);
        assert_eq!(g.written_neighbours(n(4)), &[n(3), n(0)]);
    }

    #[test]
    fn components() {
        let g = parse("[Na+].[Cl-]").unwrap();
        assert_eq!(g.atom_count(), 2);
        assert_eq!(g.edge_count(), 0);
    }

    #[test]
    fn error_offsets() {
        assert_eq!(parse("C(C").unwrap_err(), ParseError::UnmatchedParen { pos: 1 });
        assert_eq!(parse("CC)C").unwrap_err(), ParseError::UnmatchedParen { pos: 2 });
        assert_eq!(parse("C1CC").unwrap_err(), ParseError::UnclosedRing { pos: 1, id: 1 });
        assert_eq!(parse("CC=").unwrap_err(), ParseError::DanglingBond { pos: 2 });
        assert_eq!(parse("C=.C").unwrap_err(), ParseError::DanglingBond { pos: 1 });
        assert_eq!(parse("C(=)C").unwrap_err(), ParseError::DanglingBond { pos: 2 });
        assert_eq!(
            parse("=C").unwrap_err(),
            ParseError::UnexpectedChar { pos: 0, ch: '=' }
        );
        assert_eq!(
            parse("C=1CCC#1").unwrap_err(),
            ParseError::RingBondConflict { pos: 7, id: 1 }
        );
        assert_eq!(parse("C11").unwrap_err(), ParseError::InvalidRingBond { pos: 2, id: 1 });
        assert_eq!(parse("C12CC12").unwrap_err(), ParseError::InvalidRingBond { pos: 6, id: 2 });
        assert_eq!(parse("1C").unwrap_err(), ParseError::InvalidRingBond { pos: 0, id: 1 });
    }

    #[test]
    fn unknown_element_warns() {
        let g = parse("[Xx]C").unwrap();
        assert_eq!(
            g.warnings(),
            &[ChemistryWarning::UnknownElement {
                atom: n(0),
                symbol: "Xx".into()
            }]
        );
    }
}
