use std::collections::BTreeMap;

use serde::Serialize;

use crate::edge::BondType;
use crate::element;

/// Tetrahedral marker as written in a bracket atom.
///
/// `@` means the neighbours that follow the first one are listed
/// anticlockwise when viewed from the first; `@@` means clockwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ChiralTag {
    /// `@`
    Anticlockwise,
    /// `@@`
    Clockwise,
}

/// CIP descriptor assigned during stereo annotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub enum Chirality {
    #[default]
    None,
    R,
    S,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
}

/// Payload of a bracket atom such as `[13CH3+:2]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct BracketInfo {
    pub hydrogen_count: u8,
    pub charge: i8,
    /// Mass number. `0` means none was written.
    pub isotope: u16,
    pub chirality: Option<ChiralTag>,
    pub atom_class: u16,
}

/// One ring-closure digit (or `%nn`) written on an atom.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RingBond {
    pub id: u16,
    /// Bond symbol written together with the digit, if any.
    pub bond_type: Option<BondType>,
}

/// A terminal substituent folded into its neighbour's label, e.g. the three
/// fluorines of a CF3 group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PseudoElement {
    pub element: String,
    pub count: usize,
    pub hydrogen_count: u8,
    pub previous_element: String,
    pub charge: i8,
}

/// A node of the molecular graph.
///
/// Atoms are created by the SMILES parser in source order and referenced
/// everywhere else by `NodeIndex`. The parser fills the chemical fields;
/// ring perception and layout fill the annotation fields afterwards.
///
/// # Examples
///
/// ```
/// use crabdepict::{Atom, BondType};
///
/// let c = Atom::new("c", BondType::Single);
/// assert_eq!(c.element, "C");
/// assert!(c.is_part_of_aromatic_ring);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Atom {
    /// Canonical element symbol (`"C"`, `"Cl"`, `"Se"`).
    pub element: String,
    /// Set when the symbol was written in lower case.
    pub is_part_of_aromatic_ring: bool,
    /// Bond symbol that led to this atom, single when none was written.
    pub bond_type: BondType,
    /// Bond symbol written directly after an opening `(`.
    pub branch_bond: Option<BondType>,
    /// Ring-closure digits seen on this atom. Cleared by ring perception once
    /// every closure is confirmed.
    pub ringbonds: Vec<RingBond>,
    /// Ids of the rings this atom is a member of.
    pub rings: Vec<usize>,
    pub original_rings: Vec<usize>,
    /// Member of a bridged system but not of its main ring.
    pub is_bridge: bool,
    /// Main-ring atom of a bridged system bonded to a bridge atom.
    pub is_bridge_node: bool,
    pub bridged_ring: Option<usize>,
    /// Rings whose center moves with this atom.
    pub anchored_rings: Vec<usize>,
    pub bracket: Option<BracketInfo>,
    /// Contracted substituents, keyed by `"{hydrogen_count}{element}{charge}"`.
    pub attached_pseudo_elements: BTreeMap<String, PseudoElement>,
    pub neighbouring_elements: Vec<String>,
    pub is_drawn: bool,
    /// Label must be drawn even for carbon.
    pub draw_explicit: bool,
    pub is_connected_to_ring: bool,
    /// Sum of incident bond weights.
    pub bond_count: u32,
    pub chirality: Chirality,
    /// Rank among the neighbours of a stereocenter, 0 being highest.
    pub priority: Option<usize>,
    pub main_chain: bool,
    pub hydrogen_direction: Option<Direction>,
    pub subtree_depth: usize,
    /// `1` above the paper, `-1` below, `0` in plane.
    pub plane: i8,
    pub is_stereo_center: bool,
    pub has_hydrogen: bool,
}

impl Atom {
    pub fn new(symbol: &str, bond_type: BondType) -> Self {
        let element = canonical_symbol(symbol);
        let is_part_of_aromatic_ring = element != symbol;
        Self {
            element,
            is_part_of_aromatic_ring,
            bond_type,
            branch_bond: None,
            ringbonds: Vec::new(),
            rings: Vec::new(),
            original_rings: Vec::new(),
            is_bridge: false,
            is_bridge_node: false,
            bridged_ring: None,
            anchored_rings: Vec::new(),
            bracket: None,
            attached_pseudo_elements: BTreeMap::new(),
            neighbouring_elements: Vec::new(),
            is_drawn: true,
            draw_explicit: false,
            is_connected_to_ring: false,
            bond_count: 0,
            chirality: Chirality::None,
            priority: None,
            main_chain: false,
            hydrogen_direction: None,
            subtree_depth: 1,
            plane: 0,
            is_stereo_center: false,
            has_hydrogen: false,
        }
    }

    pub fn with_bracket(mut self, bracket: BracketInfo) -> Self {
        self.has_hydrogen = bracket.hydrogen_count > 0;
        self.bracket = Some(bracket);
        self
    }

    pub fn is_hetero_atom(&self) -> bool {
        self.element != "C" && self.element != "H"
    }

    pub fn atomic_number(&self) -> u8 {
        element::atomic_number(&self.element)
    }

    pub fn max_bonds(&self) -> u8 {
        element::max_bonds(&self.element)
    }

    pub fn charge(&self) -> i8 {
        self.bracket.map_or(0, |b| b.charge)
    }

    pub fn chiral_tag(&self) -> Option<ChiralTag> {
        self.bracket.and_then(|b| b.chirality)
    }

    pub fn add_ringbond(&mut self, id: u16, bond_type: Option<BondType>) {
        self.ringbonds.push(RingBond { id, bond_type });
    }

    pub fn ringbond_count(&self) -> usize {
        self.ringbonds.len()
    }

    pub fn has_ringbond(&self, id: u16) -> bool {
        self.ringbonds.iter().any(|r| r.id == id)
    }

    /// True iff the two atoms carry at least one ring-closure id in common.
    pub fn have_common_ringbond(a: &Atom, b: &Atom) -> bool {
        a.ringbonds.iter().any(|r| b.has_ringbond(r.id))
    }

    pub fn clear_ringbonds(&mut self) {
        self.ringbonds.clear();
    }

    pub fn add_ring(&mut self, ring: usize) {
        if !self.rings.contains(&ring) {
            self.rings.push(ring);
        }
    }

    pub fn is_in_ring(&self) -> bool {
        !self.rings.is_empty()
    }

    pub fn backup_rings(&mut self) {
        self.original_rings = self.rings.clone();
    }

    pub fn restore_rings(&mut self) {
        self.rings = self.original_rings.clone();
    }

    pub fn anchor_ring(&mut self, ring: usize) {
        if !self.anchored_rings.contains(&ring) {
            self.anchored_rings.push(ring);
        }
    }

    /// Folds a terminal neighbour into this atom's label. A second
    /// substituent with the same element, charge and hydrogen count raises
    /// the count of the existing entry instead of adding one.
    pub fn attach_pseudo_element(
        &mut self,
        element: &str,
        previous_element: &str,
        hydrogen_count: u8,
        charge: i8,
    ) {
        let key = format!("{hydrogen_count}{element}{charge}");
        self.attached_pseudo_elements
            .entry(key)
            .and_modify(|p| p.count += 1)
            .or_insert_with(|| PseudoElement {
                element: element.to_string(),
                count: 1,
                hydrogen_count,
                previous_element: previous_element.to_string(),
                charge,
            });
    }

    /// Pseudo elements in ascending key order.
    pub fn attached_pseudo_elements(&self) -> impl Iterator<Item = &PseudoElement> + '_ {
        self.attached_pseudo_elements.values()
    }

    pub fn has_attached_pseudo_elements(&self) -> bool {
        !self.attached_pseudo_elements.is_empty()
    }

    /// Order-independent comparison of the cached neighbour symbols.
    pub fn neighbouring_elements_equal(&self, elements: &[&str]) -> bool {
        if self.neighbouring_elements.len() != elements.len() {
            return false;
        }
        let mut mine: Vec<&str> = self.neighbouring_elements.iter().map(String::as_str).collect();
        let mut theirs = elements.to_vec();
        mine.sort_unstable();
        theirs.sort_unstable();
        mine == theirs
    }
}

/// Upper-cases single-letter symbols and capitalises the two-letter aromatic
/// bracket symbols. Everything else is returned unchanged.
fn canonical_symbol(symbol: &str) -> String {
    let mut chars = symbol.chars();
    match (chars.next(), chars.next(), chars.next()) {
        (Some(c), None, None) => c.to_ascii_uppercase().to_string(),
        (Some(c), Some(d), None) if element::is_aromatic_symbol(symbol) => {
            format!("{}{}", c.to_ascii_uppercase(), d)
        }
        _ => symbol.to_string(),
    }
}
