use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::f64::consts::{FRAC_PI_2, PI};

use petgraph::graph::{EdgeIndex, NodeIndex};

use super::Layout;
use crate::edge::BondType;
use crate::ring::Ring;
use crate::vector2::{self, Vector2};

/// Pending placement work. The stack is last-in first-out, so follow-ups are
/// pushed in reverse to keep depth-first order.
#[derive(Debug, Clone, Copy)]
enum Task {
    Bond {
        atom: NodeIndex,
        previous: Option<NodeIndex>,
        /// Absolute direction of the bond from `previous`.
        angle: f64,
        origin_shortest: bool,
    },
    Ring {
        ring: usize,
        center: Vector2,
        start: NodeIndex,
        previous: Option<NodeIndex>,
    },
    RingNeighbour {
        ring: usize,
        neighbour: usize,
    },
    RingSubstituents {
        ring: usize,
    },
}

impl Layout {
    pub(super) fn place_atoms(&mut self) {
        for atoms in self.graph.components() {
            let mut stack = vec![Task::Bond {
                atom: atoms[0],
                previous: None,
                angle: 0.0,
                origin_shortest: false,
            }];
            loop {
                while let Some(task) = stack.pop() {
                    self.run_task(&mut stack, task);
                }
                // anything the walk missed hangs off its first placed neighbour
                let Some((atom, from)) = atoms.iter().find_map(|&a| {
                    if self.is_positioned(a) {
                        return None;
                    }
                    self.graph
                        .neighbours(a)
                        .into_iter()
                        .find(|&n| self.is_positioned(n))
                        .map(|n| (a, n))
                }) else {
                    break;
                };
                stack.push(Task::Bond {
                    atom,
                    previous: Some(from),
                    angle: 0.0,
                    origin_shortest: false,
                });
            }
        }
        self.restore_ring_information();
        self.enforce_double_bond_configurations();
    }

    fn run_task(&mut self, stack: &mut Vec<Task>, task: Task) {
        match task {
            Task::Bond {
                atom,
                previous,
                angle,
                origin_shortest,
            } => self.create_next_bond(stack, atom, previous, angle, origin_shortest),
            Task::Ring {
                ring,
                center,
                start,
                previous,
            } => self.create_ring(stack, ring, center, start, previous),
            Task::RingNeighbour { ring, neighbour } => self.create_neighbour_ring(stack, ring, neighbour),
            Task::RingSubstituents { ring } => self.create_ring_substituents(stack, ring),
        }
    }

    fn create_next_bond(
        &mut self,
        stack: &mut Vec<Task>,
        atom: NodeIndex,
        previous: Option<NodeIndex>,
        angle: f64,
        origin_shortest: bool,
    ) {
        if self.is_positioned(atom) {
            return;
        }
        let l = self.bond_length();
        match previous {
            None => {
                let p = &mut self.placements[atom.index()];
                p.previous_position = Vector2::new(l, 0.0).rotated(vector2::to_rad(-60.0));
                p.position = Vector2::new(l, 0.0);
                p.angle = vector2::to_rad(-60.0);
            }
            Some(prev) => {
                let position = if self.graph.atom(prev).is_in_ring() {
                    self.position_away_from_ring(prev)
                } else {
                    let mut v = Vector2::new(l, 0.0);
                    v.rotate(angle).add(self.pos(prev));
                    v
                };
                let previous_position = self.pos(prev);
                let p = &mut self.placements[atom.index()];
                p.position = position;
                p.previous_position = previous_position;
                p.previous = Some(prev);
            }
        }
        self.placements[atom.index()].positioned = true;

        let a = self.graph.atom(atom);
        if let Some(ring) = a.bridged_ring.or_else(|| a.rings.first().copied()) {
            if !self.rings.ring(ring).positioned {
                let p = self.placements[atom.index()];
                let direction = Vector2::difference(p.position, p.previous_position);
                let center = self.fused_entry_center(atom, ring, direction).unwrap_or_else(|| {
                    let mut center = direction;
                    center
                        .normalize()
                        .multiply_scalar(self.rings.ring(ring).circumradius(l))
                        .add(p.position);
                    center
                });
                stack.push(Task::Ring {
                    ring,
                    center,
                    start: atom,
                    previous: None,
                });
            }
            return;
        }
        self.distribute_chain_neighbours(stack, atom, previous, origin_shortest);
    }

    /// Center for `ring` entered at the fusion atom `atom` so that the fused
    /// bond continues `direction`. The incoming bond then bisects the
    /// exterior angle between the two rings.
    fn fused_entry_center(&self, atom: NodeIndex, ring_id: usize, direction: Vector2) -> Option<Vector2> {
        let a = self.graph.atom(atom);
        if a.bridged_ring.is_some() || a.rings.len() < 2 || direction.length_sq() < 1e-12 {
            return None;
        }
        let ring = self.rings.ring(ring_id);
        let order = ring.ordered_from(atom, None);
        let fused = |m: NodeIndex| {
            let other = self.graph.atom(m);
            a.rings
                .iter()
                .any(|&r| r != ring_id && other.rings.contains(&r))
        };
        // +1 when the fused partner is placed one step counterclockwise.
        let turn = if order.get(1).copied().is_some_and(fused) {
            1.0
        } else if order.last().copied().is_some_and(fused) {
            -1.0
        } else {
            return None;
        };
        let phi = direction.angle() - turn * (FRAC_PI_2 + ring.central_angle() / 2.0);
        let radius = ring.circumradius(self.bond_length());
        let mut center = self.pos(atom);
        center.subtract(Vector2::new(phi.cos() * radius, phi.sin() * radius));
        Some(center)
    }

    /// Position for an atom bonded to the ring atom `prev`: straight out
    /// along the fusion bond when `prev` joins two rings, otherwise opposite
    /// the sum of the bonds to its placed ring neighbours.
    fn position_away_from_ring(&self, prev: NodeIndex) -> Vector2 {
        let l = self.bond_length();
        let prev_pos = self.pos(prev);
        let prev_atom = self.graph.atom(prev);
        let neighbours = self.graph.neighbours(prev);

        if prev_atom.bridged_ring.is_none() && prev_atom.rings.len() > 1 {
            let joined = neighbours.iter().copied().find(|&n| {
                self.is_positioned(n)
                    && prev_atom
                        .rings
                        .iter()
                        .all(|r| self.graph.atom(n).rings.contains(r))
            });
            if let Some(j) = joined {
                return self.pos(j).rotated_around(PI, prev_pos);
            }
        }

        let mut sum = Vector2::zero();
        for n in neighbours {
            if self.is_positioned(n) && self.in_same_ring(n, prev) {
                sum.add(Vector2::difference(self.pos(n), prev_pos));
            }
        }
        if sum.length_sq() < 1e-12 {
            sum = prev_atom
                .rings
                .first()
                .map(|&r| Vector2::difference(self.rings.ring(r).center, prev_pos))
                .filter(|v| v.length_sq() > 1e-12)
                .unwrap_or(Vector2::new(-1.0, 0.0));
        }
        sum.invert().normalize().multiply_scalar(l).add(prev_pos);
        sum
    }

    fn distribute_chain_neighbours(
        &mut self,
        stack: &mut Vec<Task>,
        atom: NodeIndex,
        previous: Option<NodeIndex>,
        origin_shortest: bool,
    ) {
        let neighbours: Vec<NodeIndex> = self
            .graph
            .neighbours(atom)
            .into_iter()
            .filter(|&n| Some(n) != previous && self.graph.atom(n).is_drawn)
            .collect();
        let placement = self.placements[atom.index()];
        let previous_angle = Vector2::difference(placement.position, placement.previous_position).angle();
        let own = placement.angle;
        let sixty = vector2::to_rad(60.0);

        // (atom, turn relative to the incoming bond, origin_shortest)
        let mut next: Vec<(NodeIndex, f64, bool)> = Vec::with_capacity(neighbours.len());
        match neighbours.len() {
            0 => {}
            1 => {
                let nb = neighbours[0];
                let turn = if self.is_linear(atom, previous, nb) {
                    0.0
                } else if previous.is_some_and(|p| self.graph.atom(p).is_in_ring()) {
                    self.turn_away_from_mass(atom, previous_angle)
                } else {
                    let a = self.zig_zag_angle(atom, previous);
                    if origin_shortest {
                        a
                    } else {
                        -a
                    }
                };
                next.push((nb, turn, false));
            }
            2 => {
                let a = if own == 0.0 { sixty } else { own };
                let (n0, n1) = (neighbours[0], neighbours[1]);
                let depth_a = self.graph.tree_depth(n0, Some(atom));
                let depth_b = self.graph.tree_depth(n1, Some(atom));
                self.graph.atom_mut(n0).subtree_depth = depth_a;
                self.graph.atom_mut(n1).subtree_depth = depth_b;
                let depth_c = match previous {
                    Some(p) => {
                        let d = self.graph.tree_depth(p, Some(atom));
                        self.graph.atom_mut(p).subtree_depth = d;
                        d
                    }
                    None => 0,
                };

                // carbon chains continue the zig-zag
                let c0 = self.graph.atom(n0).element == "C";
                let c1 = self.graph.atom(n1).element == "C";
                let (cis, trans) = if c1 && !c0 && depth_b > 1 && depth_a < 5 {
                    (n1, n0)
                } else if !c1 && c0 && depth_a > 1 && depth_b < 5 {
                    (n0, n1)
                } else if depth_b > depth_a {
                    (n1, n0)
                } else {
                    (n0, n1)
                };
                let shortest = depth_c < depth_a && depth_c < depth_b;
                next.push((trans, a, shortest));
                next.push((cis, -a, shortest));
            }
            3 => {
                let depths: Vec<usize> = neighbours
                    .iter()
                    .map(|&n| self.graph.tree_depth(n, Some(atom)))
                    .collect();
                for (&n, &d) in neighbours.iter().zip(&depths) {
                    self.graph.atom_mut(n).subtree_depth = d;
                }
                let (d0, d1, d2) = (depths[0], depths[1], depths[2]);
                let (s, l, r, ds, dl, dr) = if d1 > d0 && d1 > d2 {
                    (neighbours[1], neighbours[0], neighbours[2], d1, d0, d2)
                } else if d2 > d0 && d2 > d1 {
                    (neighbours[2], neighbours[0], neighbours[1], d2, d0, d1)
                } else {
                    (neighbours[0], neighbours[1], neighbours[2], d0, d1, d2)
                };
                let ringless = |x: NodeIndex| !self.graph.atom(x).is_in_ring();
                let cross = previous.is_some_and(ringless)
                    && ringless(s)
                    && ringless(l)
                    && ringless(r)
                    && dl == 1
                    && dr == 1
                    && ds > 1;
                if cross {
                    let side = if own >= 0.0 { 1.0 } else { -1.0 };
                    next.push((s, -own, false));
                    next.push((l, side * vector2::to_rad(30.0), false));
                    next.push((r, side * vector2::to_rad(90.0), false));
                } else {
                    next.push((s, 0.0, false));
                    next.push((l, vector2::to_rad(90.0), false));
                    next.push((r, -vector2::to_rad(90.0), false));
                }
            }
            4 => {
                let depths: Vec<usize> = neighbours
                    .iter()
                    .map(|&n| self.graph.tree_depth(n, Some(atom)))
                    .collect();
                for (&n, &d) in neighbours.iter().zip(&depths) {
                    self.graph.atom_mut(n).subtree_depth = d;
                }
                let deepest = (0..4).find(|&i| (0..4).all(|j| j == i || depths[i] > depths[j]));
                let mut order: Vec<NodeIndex> = neighbours.clone();
                if let Some(i) = deepest {
                    let w = order.remove(i);
                    order.insert(0, w);
                }
                let turns = [-36.0, 36.0, -108.0, 108.0];
                for (&n, t) in order.iter().zip(turns) {
                    next.push((n, vector2::to_rad(t), false));
                }
            }
            count => {
                // evenly around the atom, leaving the incoming bond free
                let step = 2.0 * PI / (count + 1) as f64;
                for (k, &n) in neighbours.iter().enumerate() {
                    next.push((n, PI - step * (k + 1) as f64, false));
                }
            }
        }

        for &(n, turn, _) in &next {
            if !self.is_positioned(n) {
                self.placements[n.index()].angle = turn;
            }
        }
        for &(n, turn, shortest) in next.iter().rev() {
            stack.push(Task::Bond {
                atom: n,
                previous: Some(atom),
                angle: previous_angle + turn,
                origin_shortest: shortest,
            });
        }
    }

    /// Triple bonds and cumulated double bonds keep the chain straight.
    fn is_linear(&self, atom: NodeIndex, previous: Option<NodeIndex>, next: NodeIndex) -> bool {
        let bond = |a: NodeIndex, b: NodeIndex| {
            self.graph
                .edge_between(a, b)
                .map(|e| self.graph.edge(e).bond_type())
        };
        let incoming = previous.and_then(|p| bond(p, atom));
        let outgoing = bond(atom, next);
        incoming == Some(BondType::Triple)
            || outgoing == Some(BondType::Triple)
            || (incoming == Some(BondType::Double) && outgoing == Some(BondType::Double))
    }

    /// `±60°`, whichever points farther from the placed part of the molecule.
    fn turn_away_from_mass(&self, atom: NodeIndex, previous_angle: f64) -> f64 {
        let l = self.bond_length();
        let pos = self.pos(atom);
        let mass = self.center_of_mass(atom);
        let a = vector2::to_rad(60.0);
        let candidate = |turn: f64| Vector2::sum(Vector2::new(l, 0.0).rotated(previous_angle + turn), pos);
        if candidate(a).distance_sq(mass) < candidate(-a).distance_sq(mass) {
            -a
        } else {
            a
        }
    }

    /// Mean position of the placed atoms in `atom`'s component.
    fn center_of_mass(&self, atom: NodeIndex) -> Vector2 {
        let placed: Vec<Vector2> = self
            .graph
            .atoms()
            .filter(|&a| self.is_positioned(a) && self.same_component(a, atom))
            .map(|a| self.pos(a))
            .collect();
        if placed.is_empty() {
            return self.pos(atom);
        }
        Vector2::centroid(&placed)
    }

    fn zig_zag_angle(&self, atom: NodeIndex, previous: Option<NodeIndex>) -> f64 {
        let sixty = vector2::to_rad(60.0);
        let mut a = self.placements[atom.index()].angle;
        if previous.is_some_and(|p| self.graph.degree(p) > 3) {
            a = if a > 0.0 {
                a.min(sixty)
            } else if a < 0.0 {
                a.max(-sixty)
            } else {
                sixty
            };
        } else if a == 0.0 {
            a = self.last_turn(atom).unwrap_or(sixty);
        }
        a
    }

    /// Nearest non-zero turn walking back along the placement path.
    fn last_turn(&self, atom: NodeIndex) -> Option<f64> {
        let mut current = self.placements[atom.index()].previous;
        let mut steps = 0;
        while let Some(c) = current {
            let p = self.placements[c.index()];
            if p.angle != 0.0 {
                return Some(p.angle);
            }
            current = p.previous;
            steps += 1;
            if steps > self.placements.len() {
                break;
            }
        }
        None
    }

    fn create_ring(
        &mut self,
        stack: &mut Vec<Task>,
        ring_id: usize,
        center: Vector2,
        start: NodeIndex,
        previous: Option<NodeIndex>,
    ) {
        if self.rings.ring(ring_id).positioned {
            return;
        }
        let l = self.bond_length();
        if self.rings.ring(ring_id).is_bridged {
            self.create_bridged_ring(ring_id, center, start);
        } else {
            let ring = self.rings.ring(ring_id);
            let radius = ring.circumradius(l);
            let step = ring.central_angle();
            let order = ring.ordered_from(start, previous);
            let mut a = Vector2::difference(self.pos(start), center).angle();
            for m in order {
                let p = &mut self.placements[m.index()];
                if !p.positioned {
                    p.position = Vector2::new(center.x + a.cos() * radius, center.y + a.sin() * radius);
                    p.previous_position = center;
                    p.positioned = true;
                }
                a += step;
            }
            self.rings.ring_mut(ring_id).center = center;
        }

        let ring = self.rings.ring_mut(ring_id);
        ring.positioned = true;
        ring.anchor = Some(start);
        self.graph.atom_mut(start).anchor_ring(ring_id);

        let ring = self.rings.ring(ring_id);
        let mut neighbours: Vec<(usize, usize)> = ring
            .neighbours
            .iter()
            .map(|&n| {
                let shared = self
                    .rings
                    .connection_between(ring_id, n)
                    .map_or(0, |c| c.vertices.len());
                (n, shared)
            })
            .collect();
        neighbours.sort_by(|a, b| b.1.cmp(&a.1));

        stack.push(Task::RingSubstituents { ring: ring_id });
        for &(n, _) in neighbours.iter().rev() {
            stack.push(Task::RingNeighbour {
                ring: ring_id,
                neighbour: n,
            });
        }
    }

    /// Places a ring sharing atoms with the already placed `ring_id`: across
    /// the shared bond when fused, opposite this ring's center when spiro.
    fn create_neighbour_ring(&mut self, stack: &mut Vec<Task>, ring_id: usize, neighbour: usize) {
        if self.rings.ring(neighbour).positioned {
            return;
        }
        let Some(vertices) = self
            .rings
            .connection_between(ring_id, neighbour)
            .map(|c| c.vertices.clone())
        else {
            return;
        };
        let l = self.bond_length();
        let center = self.rings.ring(ring_id).center;
        let next_ring = self.rings.ring(neighbour);

        match vertices[..] {
            [a, b] => {
                let (pa, pb) = (self.pos(a), self.pos(b));
                let mid = Vector2::midpoint(pa, pb);
                let apothem = vector2::apothem(next_ring.circumradius(l), next_ring.size());
                let [mut n0, mut n1] = Vector2::units(pa, pb);
                n0.multiply_scalar(apothem).add(mid);
                n1.multiply_scalar(apothem).add(mid);
                let next_center = if center.distance_sq(n1) > center.distance_sq(n0) {
                    n1
                } else {
                    n0
                };
                let rel_a = Vector2::difference(pa, next_center);
                let rel_b = Vector2::difference(pb, next_center);
                let (start, previous) = if rel_a.clockwise(rel_b) == -1 { (a, b) } else { (b, a) };
                self.create_ring(stack, neighbour, next_center, start, Some(previous));
            }
            [a] => {
                let pa = self.pos(a);
                let mut next_center = Vector2::difference(pa, center);
                next_center
                    .normalize()
                    .multiply_scalar(next_ring.circumradius(l))
                    .add(pa);
                self.create_ring(stack, neighbour, next_center, a, None);
            }
            _ => {}
        }
    }

    /// Queues the first unplaced non-ring neighbour of the ring's atoms and
    /// re-queues itself behind it.
    fn create_ring_substituents(&mut self, stack: &mut Vec<Task>, ring_id: usize) {
        let atoms: Vec<NodeIndex> = self.rings.ring(ring_id).atoms().collect();
        for m in atoms {
            if let Some(nb) = self
                .graph
                .neighbours(m)
                .into_iter()
                .find(|&n| !self.is_positioned(n))
            {
                stack.push(Task::RingSubstituents { ring: ring_id });
                stack.push(Task::Bond {
                    atom: nb,
                    previous: Some(m),
                    angle: 0.0,
                    origin_shortest: false,
                });
                return;
            }
        }
    }

    /// Draws a bridged unit in its own frame, then moves it rigidly onto the
    /// atoms already placed: one atom keeps its position and the unit faces
    /// `target_center`; with two, the shared bond is matched and the unit is
    /// flipped onto the side of `target_center`.
    fn create_bridged_ring(&mut self, unit: usize, target_center: Vector2, start: NodeIndex) {
        let ring = self.rings.ring(unit).clone();
        let fixed: Vec<NodeIndex> = ring.atoms().filter(|&a| self.is_positioned(a)).collect();
        let mut local = self.bridged_local_layout(&ring);
        let pinned: &[NodeIndex] = if fixed.len() > 1 { &fixed } else { &[] };
        self.relax_bridged_layout(&mut local, pinned);
        let local_center = Vector2::zero();

        let entry = if fixed.contains(&start) {
            Some(start)
        } else {
            fixed.first().copied()
        };

        let (entry_local, entry_pos, angle, partner) = match entry.and_then(|e| local.get(&e).map(|p| (e, *p))) {
            Some((e, e_local)) => {
                let partner = fixed
                    .iter()
                    .copied()
                    .find(|&a| a != e && local.contains_key(&a));
                let angle = match partner {
                    Some(b) => {
                        Vector2::difference(self.pos(b), self.pos(e)).angle()
                            - Vector2::difference(local[&b], e_local).angle()
                    }
                    None => {
                        Vector2::difference(target_center, self.pos(e)).angle()
                            - Vector2::difference(local_center, e_local).angle()
                    }
                };
                (e_local, self.pos(e), angle, partner.map(|b| (e, b)))
            }
            None => (local_center, target_center, 0.0, None),
        };

        let transform = |p: Vector2| {
            let mut v = Vector2::difference(p, entry_local);
            v.rotate(angle).add(entry_pos);
            v
        };
        let mut placed: Vec<(NodeIndex, Vector2)> = local.iter().map(|(&a, &p)| (a, transform(p))).collect();
        let mut unit_center = transform(local_center);

        if let Some((a, b)) = partner {
            let (pa, pb) = (self.pos(a), self.pos(b));
            let mut mirrored = unit_center;
            mirrored.mirror_about_line(pa, pb);
            if mirrored.distance_sq(target_center) < unit_center.distance_sq(target_center) {
                for (_, p) in &mut placed {
                    p.mirror_about_line(pa, pb);
                }
                unit_center = mirrored;
            }
        }

        for (atom, position) in placed {
            let p = &mut self.placements[atom.index()];
            if !p.positioned {
                p.position = position;
                p.previous_position = unit_center;
                p.positioned = true;
            }
        }
        self.rings.ring_mut(unit).center = unit_center;
        tracing::trace!(unit, atoms = ring.members.len() + ring.bridges.len(), "placed bridged unit");
    }

    /// Main ring as a regular polygon around the origin, bridges threaded
    /// between already placed atoms.
    fn bridged_local_layout(&self, ring: &Ring) -> BTreeMap<NodeIndex, Vector2> {
        let l = self.bond_length();
        let radius = ring.circumradius(l);
        let step = ring.central_angle();
        let mut local = BTreeMap::new();
        for (k, &m) in ring.members.iter().enumerate() {
            let a = step * k as f64;
            local.insert(m, Vector2::new(a.cos() * radius, a.sin() * radius));
        }

        let mut remaining: BTreeSet<NodeIndex> = ring.bridges.iter().copied().collect();
        while !remaining.is_empty() {
            match self.find_bridge_path(&local, &remaining) {
                Some(path) => {
                    let (p, q) = (local[&path[0]], local[&path[path.len() - 1]]);
                    let interior = &path[1..path.len() - 1];
                    let points = bridge_points(p, q, interior.len(), l, &local);
                    for (&a, pt) in interior.iter().zip(points) {
                        local.insert(a, pt);
                        remaining.remove(&a);
                    }
                }
                None => {
                    // a dangling bridge atom continues outward from its placed neighbour
                    let next = remaining
                        .iter()
                        .copied()
                        .find_map(|a| {
                            self.graph
                                .neighbours(a)
                                .into_iter()
                                .find(|n| local.contains_key(n))
                                .map(|n| (a, Some(n)))
                        })
                        .or_else(|| remaining.iter().next().map(|&a| (a, None)));
                    let Some((atom, anchor)) = next else {
                        break;
                    };
                    let position = match anchor {
                        Some(n) => {
                            let pn = local[&n];
                            let dir = if pn.length_sq() > 1e-12 {
                                pn.normalized()
                            } else {
                                Vector2::new(1.0, 0.0)
                            };
                            Vector2::sum(pn, dir.scaled(l))
                        }
                        None => Vector2::zero(),
                    };
                    local.insert(atom, position);
                    remaining.remove(&atom);
                }
            }
        }
        local
    }

    /// Pulls every bond of the unit toward the bond length while keeping
    /// unbonded atoms [`BRIDGE_CLEARANCE`] apart. Each sweep moves one atom
    /// at a time to the mean of the spots one bond from its neighbours.
    fn relax_bridged_layout(&self, local: &mut BTreeMap<NodeIndex, Vector2>, pinned: &[NodeIndex]) {
        let l = self.bond_length();
        let clear = BRIDGE_CLEARANCE * l;
        let atoms: Vec<NodeIndex> = local.keys().copied().collect();
        for _ in 0..BRIDGE_RELAX_SWEEPS {
            for &atom in atoms.iter().filter(|a| !pinned.contains(*a)) {
                let here = local[&atom];
                let spots: Vec<Vector2> = self
                    .graph
                    .neighbours(atom)
                    .into_iter()
                    .filter_map(|n| local.get(&n).copied())
                    .filter_map(|pn| {
                        let d = Vector2::difference(here, pn);
                        (d.length_sq() > 1e-18).then(|| Vector2::sum(pn, d.normalized().scaled(l)))
                    })
                    .collect();
                if spots.is_empty() {
                    continue;
                }
                let mut target = Vector2::centroid(&spots);
                for &other in &atoms {
                    if other == atom || self.graph.edge_between(atom, other).is_some() {
                        continue;
                    }
                    let d = Vector2::difference(target, local[&other]);
                    let gap = d.length();
                    if gap > 1e-9 && gap < clear {
                        target.add(d.scaled(0.5 * (clear - gap) / gap));
                    }
                }
                local.insert(atom, target);
            }
        }
    }

    /// Shortest run of unplaced bridge atoms joining two distinct placed
    /// atoms, endpoints included.
    fn find_bridge_path(
        &self,
        local: &BTreeMap<NodeIndex, Vector2>,
        remaining: &BTreeSet<NodeIndex>,
    ) -> Option<Vec<NodeIndex>> {
        for &first in remaining {
            let starts: Vec<NodeIndex> = self
                .graph
                .neighbours(first)
                .into_iter()
                .filter(|n| local.contains_key(n))
                .collect();
            for p in starts {
                let mut came_from: BTreeMap<NodeIndex, NodeIndex> = BTreeMap::new();
                let mut queue = VecDeque::from([first]);
                let mut seen = BTreeSet::from([first]);
                while let Some(x) = queue.pop_front() {
                    let end = self
                        .graph
                        .neighbours(x)
                        .into_iter()
                        .find(|&q| q != p && local.contains_key(&q));
                    if let Some(q) = end {
                        let mut path = vec![q, x];
                        let mut cur = x;
                        while let Some(&prev) = came_from.get(&cur) {
                            path.push(prev);
                            cur = prev;
                        }
                        path.push(p);
                        path.reverse();
                        return Some(path);
                    }
                    for y in self.graph.neighbours(x) {
                        if remaining.contains(&y) && seen.insert(y) {
                            came_from.insert(y, x);
                            queue.push_back(y);
                        }
                    }
                }
            }
        }
        None
    }

    /// Sub-ring centers of each bridged unit become their member centroids
    /// and move with the unit's anchor.
    fn restore_ring_information(&mut self) {
        let units = self.rings.bridged_rings().to_vec();
        self.rings.restore(&mut self.graph);
        for unit in units {
            let (anchor, subs) = {
                let r = self.rings.ring(unit);
                (r.anchor, r.sub_rings.clone())
            };
            for sub in subs {
                let points: Vec<Vector2> = self
                    .rings
                    .ring(sub)
                    .members
                    .iter()
                    .map(|&m| self.pos(m))
                    .collect();
                let ring = self.rings.ring_mut(sub);
                ring.center = Vector2::centroid(&points);
                ring.positioned = true;
                ring.anchor = anchor;
                if let Some(a) = anchor {
                    self.graph.atom_mut(a).anchor_ring(sub);
                }
            }
        }
    }

    /// Mirrors the far side of each acyclic double bond whose drawing
    /// contradicts the `/` `\` markers around it.
    fn enforce_double_bond_configurations(&mut self) {
        let edges: Vec<EdgeIndex> = self.graph.edges().collect();
        for e in edges {
            let edge = self.graph.edge(e);
            if edge.bond_type() != BondType::Double {
                continue;
            }
            let (a, b) = (edge.source, edge.target);
            if self.rings.shared_ring_count(a, b) > 0 {
                continue;
            }
            let (Some((x, side_x)), Some((y, side_y))) =
                (self.directional_substituent(a, b), self.directional_substituent(b, a))
            else {
                continue;
            };
            let (pa, pb) = (self.pos(a), self.pos(b));
            let sx = self.pos(x).which_side(pa, pb);
            let sy = self.pos(y).which_side(pa, pb);
            if sx.abs() < 1e-9 || sy.abs() < 1e-9 {
                continue;
            }
            let want_cis = side_x == side_y;
            let drawn_cis = (sx > 0.0) == (sy > 0.0);
            if want_cis != drawn_cis {
                tracing::trace!(a = a.index(), b = b.index(), "mirroring double bond substituents");
                self.mirror_subtree(b, a, pa, pb);
            }
        }
    }

    /// First neighbour of `atom` other than `across` bonded with `/` or `\`,
    /// and the side it was written on: `1` above `atom`, `-1` below.
    fn directional_substituent(&self, atom: NodeIndex, across: NodeIndex) -> Option<(NodeIndex, i8)> {
        self.graph.edges_of(atom).into_iter().find_map(|e| {
            let edge = self.graph.edge(e);
            let other = edge.other(atom);
            if other == across || !edge.bond_type().is_directional() {
                return None;
            }
            // `a/b` puts the later atom above the earlier one
            let up = edge.bond_type() == BondType::Up;
            let later = other.index() > atom.index();
            Some((other, if up == later { 1 } else { -1 }))
        })
    }

    fn mirror_subtree(&mut self, root: NodeIndex, parent: NodeIndex, a: Vector2, b: Vector2) {
        let atoms = self.graph.traverse_tree(root, Some(parent));
        for &x in &atoms {
            self.placements[x.index()].position.mirror_about_line(a, b);
        }
        for id in self.component_rings(&atoms) {
            self.rings.ring_mut(id).center.mirror_about_line(a, b);
        }
    }
}

/// Smallest distance, in bond lengths, between unbonded atoms of a relaxed
/// bridged unit.
const BRIDGE_CLEARANCE: f64 = 0.8;

const BRIDGE_RELAX_SWEEPS: usize = 100;

/// `count` points on a circular arc from `p` to `q`, consecutive points one
/// `length` apart, bulging toward `toward`. `None` when the chord is too long
/// for the arc.
fn arc_points(p: Vector2, q: Vector2, count: usize, length: f64, toward: Vector2) -> Option<Vec<Vector2>> {
    let d = p.distance(q);
    let chords = (count + 1) as f64;
    if count == 0 || d < 1e-9 || d >= chords * length * (1.0 - 1e-9) {
        return None;
    }
    // half the angle one chord subtends; chord(φ) = L sin(kφ) / sin φ falls on (0, π/k)
    let (mut lo, mut hi) = (0.0_f64, PI / chords);
    for _ in 0..64 {
        let mid = 0.5 * (lo + hi);
        if length * (chords * mid).sin() / mid.sin() > d {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    let phi = 0.5 * (lo + hi);
    let radius = length / (2.0 * phi.sin());
    let alpha = chords * phi;

    let mid = Vector2::midpoint(p, q);
    let [left, right] = Vector2::units(p, q);
    let bulge = if Vector2::sum(mid, right).distance_sq(toward) < Vector2::sum(mid, left).distance_sq(toward) {
        right
    } else {
        left
    };
    let center = Vector2::difference(mid, bulge.scaled(radius * alpha.cos()));
    let apex = |turn: f64| Vector2::dot(Vector2::difference(p.rotated_around(turn, center), mid), bulge);
    let sign = if apex(alpha) >= apex(-alpha) { 1.0 } else { -1.0 };
    Some(
        (1..=count)
            .map(|i| p.rotated_around(sign * 2.0 * phi * i as f64, center))
            .collect(),
    )
}

fn chord_points(p: Vector2, q: Vector2, count: usize) -> Vec<Vector2> {
    let delta = Vector2::difference(q, p);
    (1..=count)
        .map(|i| Vector2::sum(p, delta.scaled(i as f64 / (count + 1) as f64)))
        .collect()
}

/// Points for a bridge of `count` atoms from `p` to `q`: an arc bulging into
/// the unit, an arc bulging out, the straight chord, then the chord pushed to
/// either side. The first candidate keeping half a bond clear of every placed
/// atom wins, otherwise the one with the most room.
fn bridge_points(
    p: Vector2,
    q: Vector2,
    count: usize,
    length: f64,
    placed: &BTreeMap<NodeIndex, Vector2>,
) -> Vec<Vector2> {
    let mid = Vector2::midpoint(p, q);
    let [left, _] = Vector2::units(p, q);
    let push = |side: f64| {
        let offset = left.scaled(side * 0.6 * length);
        chord_points(p, q, count)
            .into_iter()
            .map(|pt| Vector2::sum(pt, offset))
            .collect::<Vec<_>>()
    };
    let mut candidates: Vec<Vec<Vector2>> = Vec::with_capacity(5);
    candidates.extend(arc_points(p, q, count, length, Vector2::zero()));
    candidates.extend(arc_points(p, q, count, length, mid.scaled(2.0)));
    candidates.push(chord_points(p, q, count));
    candidates.push(push(1.0));
    candidates.push(push(-1.0));

    let limit = 0.25 * length * length;
    let mut best: Option<(f64, Vec<Vector2>)> = None;
    for points in candidates {
        let room = clearance(&points, placed);
        if room >= limit {
            return points;
        }
        if best.as_ref().map_or(true, |(r, _)| room > *r) {
            best = Some((room, points));
        }
    }
    best.map(|(_, points)| points).unwrap_or_default()
}

/// Smallest squared distance from a new point to a placed atom or to another
/// new point.
fn clearance(points: &[Vector2], placed: &BTreeMap<NodeIndex, Vector2>) -> f64 {
    let mut room = f64::INFINITY;
    for (i, pt) in points.iter().enumerate() {
        for other in placed.values().chain(&points[i + 1..]) {
            room = room.min(pt.distance_sq(*other));
        }
    }
    room
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::LayoutOptions;
    use crate::rings::RingSystem;
    use crate::smiles::parse_smiles;

    const EPS: f64 = 1e-6;

    fn n(i: usize) -> NodeIndex {
        NodeIndex::new(i)
    }

    fn placed(smiles: &str) -> Layout {
        let mut graph = parse_smiles(smiles).unwrap();
        let rings = RingSystem::perceive(&mut graph);
        let mut layout = Layout::new(graph, rings, LayoutOptions::default());
        layout.place_atoms();
        layout
    }

    fn bond_lengths_ok(layout: &Layout) -> bool {
        layout.graph.edges().all(|e| {
            let edge = layout.graph.edge(e);
            (layout.pos(edge.source).distance(layout.pos(edge.target)) - 1.0).abs() < EPS
        })
    }

    #[test]
    fn first_atom_placement() {
        let l = placed("CC");
        assert!(l.pos(n(0)).distance(Vector2::new(1.0, 0.0)) < EPS);
        assert!((l.pos(n(0)).distance(l.pos(n(1))) - 1.0).abs() < EPS);
    }

    #[test]
    fn chain_zig_zags() {
        let l = placed("CCCCC");
        assert!(bond_lengths_ok(&l));
        for i in 1..4 {
            let a = Vector2::difference(l.pos(n(i - 1)), l.pos(n(i)));
            let b = Vector2::difference(l.pos(n(i + 1)), l.pos(n(i)));
            assert!((Vector2::angle_between(a, b) - vector2::to_rad(120.0)).abs() < EPS);
        }
        // alternate sides of the 0-2 line
        let s1 = l.pos(n(1)).which_side(l.pos(n(0)), l.pos(n(2)));
        let s3 = l.pos(n(3)).which_side(l.pos(n(2)), l.pos(n(4)));
        assert!(s1 * s3 > 0.0);
    }

    #[test]
    fn triple_bond_is_straight() {
        let l = placed("CC#CC");
        let a = Vector2::difference(l.pos(n(0)), l.pos(n(1)));
        let b = Vector2::difference(l.pos(n(2)), l.pos(n(1)));
        assert!((Vector2::angle_between(a, b) - PI).abs() < EPS);
        let c = Vector2::difference(l.pos(n(3)), l.pos(n(2)));
        assert!(Vector2::angle_between(b, c) < EPS);
    }

    #[test]
    fn benzene_is_a_regular_hexagon() {
        let l = placed("c1ccccc1");
        assert!(bond_lengths_ok(&l));
        let center = l.rings.ring(0).center;
        for i in 0..6 {
            assert!((l.pos(n(i)).distance(center) - 1.0).abs() < EPS);
        }
    }

    #[test]
    fn fused_rings_share_an_edge() {
        let l = placed("c1ccc2ccccc2c1");
        assert!(bond_lengths_ok(&l));
        let (c0, c1) = (l.rings.ring(0).center, l.rings.ring(1).center);
        assert!((c0.distance(c1) - 3f64.sqrt()).abs() < EPS);
        for i in 0..l.graph.atom_count() {
            for j in (i + 1)..l.graph.atom_count() {
                assert!(l.pos(n(i)).distance(l.pos(n(j))) > 0.5);
            }
        }
    }

    #[test]
    fn chain_entering_a_fusion_atom_bisects_the_exterior() {
        // atom 1 joins both rings; atom 6 and atom 10 are its outer ring neighbours
        let l = placed("CC12CCCCC1CCCC2");
        assert!(bond_lengths_ok(&l));
        let fusion = l.pos(n(1));
        let methyl = Vector2::difference(l.pos(n(0)), fusion);
        let shared = Vector2::difference(l.pos(n(6)), fusion);
        assert!((Vector2::angle_between(methyl, shared) - PI).abs() < EPS);
        let a = Vector2::angle_between(methyl, Vector2::difference(l.pos(n(2)), fusion));
        let b = Vector2::angle_between(methyl, Vector2::difference(l.pos(n(10)), fusion));
        assert!((a - b).abs() < EPS);
        for i in 2..11 {
            assert!(l.pos(n(0)).distance(l.pos(n(i))) > 0.5, "atom {i}");
        }
    }

    #[test]
    fn spiro_rings_face_away() {
        let l = placed("C1CCC2(CC1)CCC2");
        assert!(bond_lengths_ok(&l));
        let spiro = l.pos(n(3));
        let a = Vector2::difference(l.rings.ring(0).center, spiro);
        let b = Vector2::difference(l.rings.ring(1).center, spiro);
        assert!((Vector2::angle_between(a, b) - PI).abs() < EPS);
    }

    #[test]
    fn substituent_points_out_of_ring() {
        let l = placed("c1ccccc1C");
        let center = l.rings.ring(0).center;
        let ring_atom = l.pos(n(5));
        let methyl = l.pos(n(6));
        assert!((ring_atom.distance(methyl) - 1.0).abs() < EPS);
        assert!((center.distance(methyl) - 2.0).abs() < EPS);
    }

    #[test]
    fn norbornane_bridge_sits_in_the_middle() {
        let l = placed("C1CC2CC1CC2");
        assert!(l.graph.atoms().all(|a| l.is_positioned(a)));
        assert!(bond_lengths_ok(&l));
        assert!(!l.rings.is_collapsed());
    }

    #[test]
    fn bridged_bonds_stay_near_the_bond_length() {
        // adamantane, bicyclo[2.2.2]octane, bicyclo[2.1.1]hexane
        for smiles in ["C1C2CC3CC1CC(C2)C3", "C1CC2CCC1CC2", "C1CC2CC1C2"] {
            let l = placed(smiles);
            for e in l.graph.edges() {
                let edge = l.graph.edge(e);
                let d = l.pos(edge.source).distance(l.pos(edge.target));
                assert!((0.8..=1.2).contains(&d), "{smiles}: bond {}-{} is {d}", edge.source.index(), edge.target.index());
            }
            for i in 0..l.graph.atom_count() {
                for j in (i + 1)..l.graph.atom_count() {
                    if l.graph.edge_between(n(i), n(j)).is_none() {
                        assert!(l.pos(n(i)).distance(l.pos(n(j))) > 0.5, "{smiles}: {i} and {j}");
                    }
                }
            }
        }
    }

    #[test]
    fn bridged_positions_are_finite_and_distinct() {
        for smiles in ["C1CC2CCC1CC2", "C1C2CC3CC1CC(C2)C3"] {
            let l = placed(smiles);
            let count = l.graph.atom_count();
            for i in 0..count {
                assert!(l.pos(n(i)).is_finite(), "{smiles}");
                for j in (i + 1)..count {
                    assert!(l.pos(n(i)).distance(l.pos(n(j))) > 1e-3, "{smiles}");
                }
            }
        }
    }

    #[test]
    fn trans_and_cis_double_bonds() {
        let trans = placed("F/C=C/F");
        let (a, b) = (trans.pos(n(1)), trans.pos(n(2)));
        assert!(trans.pos(n(0)).which_side(a, b) * trans.pos(n(3)).which_side(a, b) < 0.0);

        let cis = placed("F/C=C\\F");
        let (a, b) = (cis.pos(n(1)), cis.pos(n(2)));
        assert!(cis.pos(n(0)).which_side(a, b) * cis.pos(n(3)).which_side(a, b) > 0.0);
        assert!(bond_lengths_ok(&cis));
    }

    #[test]
    fn branch_written_directional_bond() {
        // C(\F) reads the same as F/C
        let l = placed("C(\\F)=C/F");
        let (a, b) = (l.pos(n(0)), l.pos(n(2)));
        assert!(l.pos(n(1)).which_side(a, b) * l.pos(n(3)).which_side(a, b) < 0.0);
    }

    #[test]
    fn arc_points_have_unit_spacing() {
        let p = Vector2::new(-0.8, 0.0);
        let q = Vector2::new(0.8, 0.0);
        let pts = arc_points(p, q, 2, 1.0, Vector2::new(0.0, 5.0)).unwrap();
        let chain = [p, pts[0], pts[1], q];
        for w in chain.windows(2) {
            assert!((w[0].distance(w[1]) - 1.0).abs() < 1e-9);
        }
        assert!(pts.iter().all(|pt| pt.y > 0.0));
        assert!(arc_points(p, q, 0, 1.0, Vector2::zero()).is_none());
        assert!(arc_points(Vector2::zero(), Vector2::new(2.0, 0.0), 1, 1.0, Vector2::zero()).is_none());
    }

    #[test]
    fn chord_fallback_is_even() {
        let pts = chord_points(Vector2::zero(), Vector2::new(3.0, 0.0), 2);
        assert_eq!(pts.len(), 2);
        assert!(pts[0].distance(Vector2::new(1.0, 0.0)) < 1e-12);
        assert!(pts[1].distance(Vector2::new(2.0, 0.0)) < 1e-12);
    }

    #[test]
    fn crowded_bridge_moves_off_the_center() {
        // a diametric chord through an atom already at the center
        let mut placed = BTreeMap::new();
        placed.insert(n(0), Vector2::new(-1.0, 0.0));
        placed.insert(n(1), Vector2::new(1.0, 0.0));
        placed.insert(n(2), Vector2::zero());
        let pts = bridge_points(placed[&n(0)], placed[&n(1)], 1, 1.0, &placed);
        assert!(clearance(&pts, &placed) >= 0.25);
    }
}
