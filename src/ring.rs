use petgraph::graph::{EdgeIndex, NodeIndex};

use crate::vector2::{self, Vector2};

/// A ring of the molecule, or the drawable unit standing in for a bridged
/// ring system.
///
/// Ids are indices into [`RingSystem::rings`](crate::rings::RingSystem) and
/// never change once assigned.
#[derive(Debug, Clone, PartialEq)]
pub struct Ring {
    pub id: usize,
    /// Atoms in cyclic order. For a bridged unit this is its main ring.
    pub members: Vec<NodeIndex>,
    /// Atoms of a bridged unit that are not on its main ring.
    pub bridges: Vec<NodeIndex>,
    /// Ring-closure edges lying on this ring.
    pub ringbond_edges: Vec<EdgeIndex>,
    pub is_bridged: bool,
    /// Rings collapsed into this bridged unit.
    pub sub_rings: Vec<usize>,
    /// Rings sharing at least one atom with this one.
    pub neighbours: Vec<usize>,
    pub center: Vector2,
    /// Atom the center moves with.
    pub anchor: Option<NodeIndex>,
    pub positioned: bool,
    pub is_fused: bool,
    pub is_spiro: bool,
}

impl Ring {
    pub fn new(id: usize, members: Vec<NodeIndex>) -> Self {
        Self {
            id,
            members,
            bridges: Vec::new(),
            ringbond_edges: Vec::new(),
            is_bridged: false,
            sub_rings: Vec::new(),
            neighbours: Vec::new(),
            center: Vector2::zero(),
            anchor: None,
            positioned: false,
            is_fused: false,
            is_spiro: false,
        }
    }

    pub fn size(&self) -> usize {
        self.members.len()
    }

    /// Index of `atom` in the cyclic member order.
    pub fn position_of(&self, atom: NodeIndex) -> Option<usize> {
        self.members.iter().position(|&m| m == atom)
    }

    pub fn contains(&self, atom: NodeIndex) -> bool {
        self.members.contains(&atom) || self.bridges.contains(&atom)
    }

    /// Main ring atoms followed by bridge atoms.
    pub fn atoms(&self) -> impl Iterator<Item = NodeIndex> + '_ {
        self.members.iter().chain(self.bridges.iter()).copied()
    }

    pub fn circumradius(&self, bond_length: f64) -> f64 {
        vector2::poly_circumradius(bond_length, self.size())
    }

    /// Angle between the center-to-member rays of two adjacent members.
    pub fn central_angle(&self) -> f64 {
        vector2::central_angle(self.size())
    }

    /// Interior angle of the regular polygon.
    pub fn inner_angle(&self) -> f64 {
        vector2::inner_angle(self.size())
    }

    /// `π` minus the central angle, used to size substituent rotations.
    pub fn ring_angle(&self) -> f64 {
        std::f64::consts::PI - self.central_angle()
    }

    /// The member following `atom` in cyclic order, walking away from
    /// `previous` when given.
    pub fn next_member(&self, atom: NodeIndex, previous: Option<NodeIndex>) -> Option<NodeIndex> {
        let n = self.members.len();
        let i = self.members.iter().position(|m| *m == atom)?;
        let forward = self.members[(i + 1) % n];
        let backward = self.members[(i + n - 1) % n];
        Some(if previous == Some(forward) { backward } else { forward })
    }

    /// Members in cyclic order starting at `start`, heading away from
    /// `previous` when `previous` is a neighbouring member.
    pub fn ordered_from(&self, start: NodeIndex, previous: Option<NodeIndex>) -> Vec<NodeIndex> {
        let n = self.members.len();
        let Some(i) = self.members.iter().position(|m| *m == start) else {
            return self.members.clone();
        };
        let forward = self.members[(i + 1) % n];
        if previous == Some(forward) {
            (0..n).map(|k| self.members[(i + n - k) % n]).collect()
        } else {
            (0..n).map(|k| self.members[(i + k) % n]).collect()
        }
    }
}

/// The atoms two rings have in common.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RingConnection {
    pub id: usize,
    pub first_ring: usize,
    pub second_ring: usize,
    pub vertices: Vec<NodeIndex>,
}

impl RingConnection {
    pub fn new(id: usize, first_ring: usize, second_ring: usize, mut vertices: Vec<NodeIndex>) -> Self {
        vertices.sort();
        vertices.dedup();
        Self {
            id,
            first_ring,
            second_ring,
            vertices,
        }
    }

    pub fn links(&self, a: usize, b: usize) -> bool {
        (self.first_ring == a && self.second_ring == b) || (self.first_ring == b && self.second_ring == a)
    }

    pub fn involves(&self, ring: usize) -> bool {
        self.first_ring == ring || self.second_ring == ring
    }

    pub fn other(&self, ring: usize) -> usize {
        if self.first_ring == ring {
            self.second_ring
        } else {
            self.first_ring
        }
    }

    /// One shared atom.
    pub fn is_spiro(&self) -> bool {
        self.vertices.len() == 1
    }

    /// Exactly one shared bond.
    pub fn is_fused(&self) -> bool {
        self.vertices.len() == 2
    }

    /// The rings overlap in a path of three or more atoms and cannot be drawn
    /// as two polygons.
    pub fn is_bridge(&self) -> bool {
        self.vertices.len() > 2
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn n(i: usize) -> NodeIndex {
        NodeIndex::new(i)
    }

    fn hexagon() -> Ring {
        Ring::new(0, (0..6).map(n).collect())
    }

    #[test]
    fn geometry() {
        let r = hexagon();
        assert!((r.circumradius(1.0) - 1.0).abs() < 1e-12);
        assert!((r.central_angle() - std::f64::consts::PI / 3.0).abs() < 1e-12);
        assert!((r.ring_angle() - 2.0 * std::f64::consts::PI / 3.0).abs() < 1e-12);
    }

    #[test]
    fn ordered_walk_leaves_previous_behind() {
        let r = hexagon();
        assert_eq!(
            r.ordered_from(n(2), Some(n(3))),
            vec![n(2), n(1), n(0), n(5), n(4), n(3)]
        );
        assert_eq!(
            r.ordered_from(n(2), Some(n(1))),
            vec![n(2), n(3), n(4), n(5), n(0), n(1)]
        );
        assert_eq!(r.next_member(n(0), Some(n(1))), Some(n(5)));
        assert_eq!(r.next_member(n(0), None), Some(n(1)));
    }

    #[test]
    fn connection_kinds() {
        let spiro = RingConnection::new(0, 0, 1, vec![n(3)]);
        let fused = RingConnection::new(1, 0, 2, vec![n(4), n(3)]);
        let bridge = RingConnection::new(2, 1, 2, vec![n(1), n(2), n(3)]);
        assert!(spiro.is_spiro() && !spiro.is_fused());
        assert!(fused.is_fused() && !fused.is_bridge());
        assert_eq!(fused.vertices, vec![n(3), n(4)]);
        assert!(bridge.is_bridge());
        assert!(bridge.links(2, 1));
        assert_eq!(bridge.other(1), 2);
    }
}
