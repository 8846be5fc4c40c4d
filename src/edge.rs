use petgraph::graph::NodeIndex;
use serde::Serialize;

use crate::atom::Direction;

/// Bond symbol as written in SMILES.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub enum BondType {
    /// `-` or nothing
    #[default]
    Single,
    /// `/`
    Up,
    /// `\`
    Down,
    /// `=`
    Double,
    /// `#`
    Triple,
    /// `$`
    Quadruple,
    /// `:`
    Aromatic,
}

impl BondType {
    pub fn from_char(c: char) -> Option<BondType> {
        match c {
            '-' => Some(BondType::Single),
            '/' => Some(BondType::Up),
            '\\' => Some(BondType::Down),
            '=' => Some(BondType::Double),
            '#' => Some(BondType::Triple),
            '$' => Some(BondType::Quadruple),
            ':' => Some(BondType::Aromatic),
            _ => None,
        }
    }

    pub fn symbol(self) -> char {
        match self {
            BondType::Single => '-',
            BondType::Up => '/',
            BondType::Down => '\\',
            BondType::Double => '=',
            BondType::Triple => '#',
            BondType::Quadruple => '$',
            BondType::Aromatic => ':',
        }
    }

    pub fn weight(self) -> u8 {
        match self {
            BondType::Single | BondType::Up | BondType::Down | BondType::Aromatic => 1,
            BondType::Double => 2,
            BondType::Triple => 3,
            BondType::Quadruple => 4,
        }
    }

    /// `/` or `\`.
    pub fn is_directional(self) -> bool {
        matches!(self, BondType::Up | BondType::Down)
    }
}

/// A bond of the molecular graph.
///
/// `bond_type` and `weight` are only reachable through [`Edge::new`] and
/// [`Edge::set_bond_type`], so the weight always matches the symbol.
#[derive(Debug, Clone, PartialEq)]
pub struct Edge {
    pub source: NodeIndex,
    pub target: NodeIndex,
    bond_type: BondType,
    weight: u8,
    pub is_part_of_aromatic_ring: bool,
    /// Double bond drawn centered on the bond axis rather than offset.
    pub center: bool,
    pub wedge: Option<Direction>,
    /// Stereocenter the wedge starts at.
    pub wedge_origin: Option<NodeIndex>,
}

impl Edge {
    pub fn new(source: NodeIndex, target: NodeIndex, bond_type: BondType) -> Self {
        Self {
            source,
            target,
            bond_type,
            weight: bond_type.weight(),
            is_part_of_aromatic_ring: false,
            center: false,
            wedge: None,
            wedge_origin: None,
        }
    }

    pub fn bond_type(&self) -> BondType {
        self.bond_type
    }

    pub fn weight(&self) -> u8 {
        self.weight
    }

    pub fn set_bond_type(&mut self, bond_type: BondType) {
        self.bond_type = bond_type;
        self.weight = bond_type.weight();
    }

    /// The endpoint that is not `atom`. `atom` must be one of the endpoints.
    pub fn other(&self, atom: NodeIndex) -> NodeIndex {
        if self.source == atom {
            self.target
        } else {
            self.source
        }
    }

    pub fn connects(&self, a: NodeIndex, b: NodeIndex) -> bool {
        (self.source == a && self.target == b) || (self.source == b && self.target == a)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn n(i: usize) -> NodeIndex {
        NodeIndex::new(i)
    }

    #[test]
    fn weight_follows_bond_type() {
        let mut e = Edge::new(n(0), n(1), BondType::Single);
        assert_eq!(e.weight(), 1);
        e.set_bond_type(BondType::Double);
        assert_eq!(e.bond_type(), BondType::Double);
        assert_eq!(e.weight(), 2);
        e.set_bond_type(BondType::Quadruple);
        assert_eq!(e.weight(), 4);
        e.set_bond_type(BondType::Down);
        assert_eq!(e.weight(), 1);
    }

    #[test]
    fn every_symbol_has_its_weight() {
        let table = [
            ('-', 1),
            ('/', 1),
            ('\\', 1),
            ('=', 2),
            ('#', 3),
            ('$', 4),
            (':', 1),
        ];
        for (c, w) in table {
            let t = BondType::from_char(c).unwrap();
            assert_eq!(t.symbol(), c);
            assert_eq!(Edge::new(n(0), n(1), t).weight(), w);
        }
        assert_eq!(BondType::from_char('x'), None);
    }

    #[test]
    fn other_endpoint() {
        let e = Edge::new(n(3), n(7), BondType::Single);
        assert_eq!(e.other(n(3)), n(7));
        assert_eq!(e.other(n(7)), n(3));
        assert!(e.connects(n(7), n(3)));
        assert!(!e.connects(n(7), n(4)));
    }
}
