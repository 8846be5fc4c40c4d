use std::cmp::Reverse;
use std::collections::{HashMap, VecDeque};

use petgraph::graph::{EdgeIndex, NodeIndex};
use petgraph::unionfind::UnionFind;

use crate::atom::Atom;
use crate::graph::Graph;
use crate::ring::{Ring, RingConnection};
use crate::vector2::{self, Vector2};

/// Rings of a molecule and the atoms they share.
///
/// [`RingSystem::perceive`] finds the smallest set of smallest rings and
/// collapses every bridged system into one drawable unit, appended to the
/// ring arena with a fresh id. [`RingSystem::restore`] undoes the collapse
/// on the atoms once layout no longer needs it.
#[derive(Debug, Clone, Default)]
pub struct RingSystem {
    rings: Vec<Ring>,
    connections: Vec<RingConnection>,
    original_connections: Vec<RingConnection>,
    bridged: Vec<usize>,
    collapsed: bool,
}

impl RingSystem {
    pub fn perceive(graph: &mut Graph) -> Self {
        close_ring_bonds(graph);

        let mut system = Self::default();
        let expected = graph.ring_closures().len();
        if expected > 0 {
            for (id, members) in smallest_rings(graph, expected).into_iter().enumerate() {
                let mut ring = Ring::new(id, members);
                ring.ringbond_edges = ring_closure_edges(graph, &ring.members);
                for &m in &ring.members {
                    graph.atom_mut(m).add_ring(id);
                }
                system.rings.push(ring);
            }
            system.connect();
            mark_aromatic_edges(graph);
            system.original_connections = system.connections.clone();
            system.collapse_bridged(graph);
        }
        mark_connected_to_ring(graph);

        tracing::debug!(
            rings = system.rings.len(),
            connections = system.connections.len(),
            bridged = system.bridged.len(),
            "perceived rings"
        );
        system
    }

    pub fn ring(&self, id: usize) -> &Ring {
        &self.rings[id]
    }

    pub fn ring_mut(&mut self, id: usize) -> &mut Ring {
        &mut self.rings[id]
    }

    /// Every ring ever created, including collapsed members and bridged units.
    pub fn rings(&self) -> &[Ring] {
        &self.rings
    }

    /// Rings currently in effect: bridged units and untouched rings while
    /// collapsed, the perceived rings otherwise.
    pub fn active_rings(&self) -> Vec<usize> {
        self.rings
            .iter()
            .filter(|r| {
                if self.collapsed {
                    !self.bridged.iter().any(|b| self.rings[*b].sub_rings.contains(&r.id))
                } else {
                    !r.is_bridged
                }
            })
            .map(|r| r.id)
            .collect()
    }

    /// Perceived rings, never bridged units.
    pub fn original_rings(&self) -> impl Iterator<Item = &Ring> + '_ {
        self.rings.iter().filter(|r| !r.is_bridged)
    }

    pub fn bridged_rings(&self) -> &[usize] {
        &self.bridged
    }

    pub fn connections(&self) -> &[RingConnection] {
        &self.connections
    }

    pub fn connection_between(&self, a: usize, b: usize) -> Option<&RingConnection> {
        self.connections.iter().find(|c| c.links(a, b))
    }

    pub fn is_collapsed(&self) -> bool {
        self.collapsed
    }

    /// Number of perceived rings containing both atoms.
    pub fn shared_ring_count(&self, a: NodeIndex, b: NodeIndex) -> usize {
        self.original_rings()
            .filter(|r| r.contains(a) && r.contains(b))
            .count()
    }

    /// Gives every atom of a bridged unit back its perceived rings.
    pub fn restore(&mut self, graph: &mut Graph) {
        if !self.collapsed {
            return;
        }
        for &id in &self.bridged {
            for atom in self.rings[id].atoms() {
                graph.atom_mut(atom).restore_rings();
            }
        }
        self.connections = self.original_connections.clone();
        self.collapsed = false;
        tracing::debug!(bridged = self.bridged.len(), "restored bridged rings");
    }

    fn connect(&mut self) {
        let n = self.rings.len();
        for i in 0..n {
            for j in (i + 1)..n {
                let shared: Vec<NodeIndex> = self.rings[i]
                    .atoms()
                    .filter(|a| self.rings[j].contains(*a))
                    .collect();
                if shared.is_empty() {
                    continue;
                }
                let id = self.connections.len();
                self.connections.push(RingConnection::new(id, i, j, shared));
            }
        }
        self.refresh_neighbours();
    }

    fn refresh_neighbours(&mut self) {
        for ring in &mut self.rings {
            ring.neighbours.clear();
            ring.is_fused = false;
            ring.is_spiro = false;
        }
        for c in &self.connections {
            for (a, b) in [(c.first_ring, c.second_ring), (c.second_ring, c.first_ring)] {
                let ring = &mut self.rings[a];
                if !ring.neighbours.contains(&b) {
                    ring.neighbours.push(b);
                }
                ring.is_fused |= c.is_fused();
                ring.is_spiro |= c.is_spiro();
            }
        }
    }

    /// Collapses rings sharing three or more atoms, then fused clusters that
    /// cannot be drawn as regular polygons glued along their shared bonds.
    fn collapse_bridged(&mut self, graph: &mut Graph) {
        let mut clusters = self.clusters(RingConnection::is_bridge, &[]);
        self.absorb_enclosed_rings(&mut clusters);
        let taken: Vec<usize> = clusters.iter().flatten().copied().collect();
        let cages: Vec<Vec<usize>> = self
            .clusters(RingConnection::is_fused, &taken)
            .into_iter()
            .filter(|cluster| !self.tiles_as_polygons(graph, cluster))
            .collect();
        clusters.extend(cages);
        for cluster in clusters {
            self.collapse_cluster(graph, &cluster);
        }
        self.collapsed = !self.bridged.is_empty();
    }

    /// Adds to a cluster every ring sharing three or more atoms with the
    /// cluster as a whole, such as the last face of a cage.
    fn absorb_enclosed_rings(&self, clusters: &mut [Vec<usize>]) {
        loop {
            let mut grown = false;
            for ci in 0..clusters.len() {
                let taken: Vec<usize> = clusters.iter().flatten().copied().collect();
                let atoms: Vec<NodeIndex> = clusters[ci]
                    .iter()
                    .flat_map(|&r| self.rings[r].members.iter().copied())
                    .collect();
                let enclosed = self
                    .rings
                    .iter()
                    .find(|r| !taken.contains(&r.id) && r.atoms().filter(|a| atoms.contains(a)).count() > 2);
                if let Some(ring) = enclosed {
                    clusters[ci].push(ring.id);
                    grown = true;
                }
            }
            if !grown {
                break;
            }
        }
    }

    /// Groups of two or more rings joined by `link` connections, leaving out
    /// the rings in `skip`.
    fn clusters(&self, link: fn(&RingConnection) -> bool, skip: &[usize]) -> Vec<Vec<usize>> {
        let n = self.rings.len();
        let mut uf = UnionFind::<usize>::new(n);
        for c in self.connections.iter().filter(|c| link(c)) {
            if !skip.contains(&c.first_ring) && !skip.contains(&c.second_ring) {
                uf.union(c.first_ring, c.second_ring);
            }
        }
        let labels = uf.into_labeling();
        (0..n)
            .map(|root| (0..n).filter(|&i| labels[i] == root).collect::<Vec<usize>>())
            .filter(|members| members.len() > 1)
            .collect()
    }

    /// Lays the cluster out as unit regular polygons, each fused neighbour
    /// across its shared bond on the far side. Cages and helicenes fail: an
    /// atom is reached at two different points or two atoms land together.
    fn tiles_as_polygons(&self, graph: &Graph, cluster: &[usize]) -> bool {
        let Some(&first) = cluster.first() else {
            return true;
        };
        let mut positions: HashMap<NodeIndex, Vector2> = HashMap::new();
        let mut centers: HashMap<usize, Vector2> = HashMap::new();

        let ring = &self.rings[first];
        let start = Vector2::new(vector2::poly_circumradius(1.0, ring.size()), 0.0);
        if !place_polygon(&mut positions, &ring.members, 0, start, Vector2::zero(), 1.0) {
            return false;
        }
        centers.insert(first, Vector2::zero());

        let mut queue = VecDeque::from([first]);
        while let Some(i) = queue.pop_front() {
            let center = centers[&i];
            for c in self.connections.iter().filter(|c| c.is_fused() && c.involves(i)) {
                let j = c.other(i);
                if !cluster.contains(&j) || centers.contains_key(&j) {
                    continue;
                }
                let (a, b) = (c.vertices[0], c.vertices[1]);
                if graph.edge_between(a, b).is_none() {
                    return false;
                }
                let (pa, pb) = (positions[&a], positions[&b]);
                let other = &self.rings[j];
                let n = other.size();
                let (Some(ka), Some(kb)) = (other.position_of(a), other.position_of(b)) else {
                    return false;
                };

                let along = Vector2::difference(pb, pa).normalized();
                let mut normal = Vector2::new(-along.y, along.x);
                let mid = Vector2::midpoint(pa, pb);
                if Vector2::dot(normal, Vector2::difference(mid, center)) < 0.0 {
                    normal.invert();
                }
                let apothem = vector2::apothem(vector2::poly_circumradius(1.0, n), n);
                let other_center = Vector2::sum(mid, normal.scaled(apothem));

                // direction that carries a onto b, then onto the member order
                let step = vector2::central_angle(n);
                let turn = if pa.rotated_around(step, other_center).distance(pb)
                    < pa.rotated_around(-step, other_center).distance(pb)
                {
                    1.0
                } else {
                    -1.0
                };
                let dir = if (ka + 1) % n == kb {
                    turn
                } else if (kb + 1) % n == ka {
                    -turn
                } else {
                    return false;
                };
                if !place_polygon(&mut positions, &other.members, ka, pa, other_center, dir) {
                    return false;
                }
                centers.insert(j, other_center);
                queue.push_back(j);
            }
        }

        let placed: Vec<Vector2> = positions.values().copied().collect();
        placed.iter().enumerate().all(|(i, p)| {
            placed[i + 1..].iter().all(|q| p.distance(*q) > 0.5)
        })
    }

    fn collapse_cluster(&mut self, graph: &mut Graph, cluster: &[usize]) {
        let Some(&main_id) = cluster
            .iter()
            .max_by_key(|&&id| (self.rings[id].size(), Reverse(id)))
        else {
            return;
        };

        let mut main = self.rings[main_id].members.clone();
        let mut main_bv = edge_bitvector(graph, &main);
        loop {
            let mut grown = false;
            for &id in cluster.iter().filter(|&&id| id != main_id) {
                let mut candidate = main_bv.clone();
                xor_into(&mut candidate, &edge_bitvector(graph, &self.rings[id].members));
                if popcount(&candidate) <= popcount(&main_bv) {
                    continue;
                }
                if let Some(cycle) = simple_cycle(graph, &candidate) {
                    main = cycle;
                    main_bv = candidate;
                    grown = true;
                }
            }
            if !grown {
                break;
            }
        }
        let main = normalize_ring(&main);

        let mut all_atoms: Vec<NodeIndex> = cluster
            .iter()
            .flat_map(|&id| self.rings[id].members.iter().copied())
            .collect();
        all_atoms.sort();
        all_atoms.dedup();
        let bridges: Vec<NodeIndex> = all_atoms
            .iter()
            .copied()
            .filter(|a| !main.contains(a))
            .collect();

        let id = self.rings.len();
        let mut unit = Ring::new(id, main.clone());
        unit.bridges = bridges.clone();
        unit.is_bridged = true;
        unit.sub_rings = cluster.to_vec();
        for &sub in cluster {
            for &e in &self.rings[sub].ringbond_edges {
                if !unit.ringbond_edges.contains(&e) {
                    unit.ringbond_edges.push(e);
                }
            }
        }
        self.rings.push(unit);
        self.bridged.push(id);

        for &atom in &all_atoms {
            let is_bridge = bridges.contains(&atom);
            let is_bridge_node =
                !is_bridge && graph.neighbours(atom).iter().any(|n| bridges.contains(n));
            let a = graph.atom_mut(atom);
            a.backup_rings();
            a.rings.retain(|r| !cluster.contains(r));
            a.add_ring(id);
            a.bridged_ring = Some(id);
            a.is_bridge = is_bridge;
            a.is_bridge_node = is_bridge_node;
        }

        self.repoint_connections(cluster, id);
        tracing::debug!(
            unit = id,
            main = main.len(),
            bridges = bridges.len(),
            "collapsed bridged ring system"
        );
    }

    /// Drops connections inside `cluster` and points the ones leaving it at
    /// the bridged unit, merging duplicates.
    fn repoint_connections(&mut self, cluster: &[usize], unit: usize) {
        let mut out: Vec<RingConnection> = Vec::new();
        for c in &self.connections {
            let first_in = cluster.contains(&c.first_ring);
            let second_in = cluster.contains(&c.second_ring);
            if first_in && second_in {
                continue;
            }
            let (a, b) = match (first_in, second_in) {
                (true, false) => (unit, c.second_ring),
                (false, true) => (c.first_ring, unit),
                _ => (c.first_ring, c.second_ring),
            };
            if let Some(existing) = out.iter_mut().find(|o| o.links(a, b)) {
                let mut vertices = existing.vertices.clone();
                vertices.extend(c.vertices.iter().copied());
                *existing = RingConnection::new(existing.id, existing.first_ring, existing.second_ring, vertices);
            } else {
                out.push(RingConnection::new(out.len(), a, b, c.vertices.clone()));
            }
        }
        self.connections = out;
        self.refresh_neighbours();
    }
}

/// Confirms every parser-recorded closure and clears the ring-closure ids
/// from the atoms.
fn close_ring_bonds(graph: &mut Graph) {
    let closures = graph.ring_closures().to_vec();
    for rc in &closures {
        debug_assert!(Atom::have_common_ringbond(graph.atom(rc.first), graph.atom(rc.second)));
        debug_assert_eq!(graph.edge_between(rc.first, rc.second), Some(rc.edge));
    }
    for rc in &closures {
        graph.atom_mut(rc.first).clear_ringbonds();
        graph.atom_mut(rc.second).clear_ringbonds();
    }
}

/// Puts `members` on a regular polygon around `center`, member `from` at
/// `start`, stepping the central angle in direction `dir`. Returns false
/// when an already placed member would move.
fn place_polygon(
    positions: &mut HashMap<NodeIndex, Vector2>,
    members: &[NodeIndex],
    from: usize,
    start: Vector2,
    center: Vector2,
    dir: f64,
) -> bool {
    let n = members.len();
    let step = vector2::central_angle(n);
    for (k, &m) in members.iter().enumerate() {
        let offset = ((k + n - from) % n) as f64;
        let p = start.rotated_around(dir * offset * step, center);
        match positions.get(&m) {
            Some(q) if q.distance(p) > 1e-3 => return false,
            Some(_) => {}
            None => {
                positions.insert(m, p);
            }
        }
    }
    true
}

fn ring_closure_edges(graph: &Graph, members: &[NodeIndex]) -> Vec<EdgeIndex> {
    let len = members.len();
    graph
        .ring_closures()
        .iter()
        .filter(|rc| {
            (0..len).any(|i| {
                let a = members[i];
                let b = members[(i + 1) % len];
                (rc.first == a && rc.second == b) || (rc.first == b && rc.second == a)
            })
        })
        .map(|rc| rc.edge)
        .collect()
}

fn mark_aromatic_edges(graph: &mut Graph) {
    let edges: Vec<EdgeIndex> = graph.edges().collect();
    for e in edges {
        let (a, b) = {
            let edge = graph.edge(e);
            (graph.atom(edge.source), graph.atom(edge.target))
        };
        let aromatic = a.is_part_of_aromatic_ring
            && b.is_part_of_aromatic_ring
            && a.rings.iter().any(|r| b.rings.contains(r));
        if aromatic {
            graph.edge_mut(e).is_part_of_aromatic_ring = true;
        }
    }
}

fn mark_connected_to_ring(graph: &mut Graph) {
    let atoms: Vec<NodeIndex> = graph.atoms().collect();
    for idx in atoms {
        let connected = !graph.atom(idx).is_in_ring()
            && graph
                .neighbours(idx)
                .iter()
                .any(|n| graph.atom(*n).is_in_ring());
        graph.atom_mut(idx).is_connected_to_ring = connected;
    }
}

/// Atoms left after repeatedly stripping atoms of degree one.
fn cyclic_core(graph: &Graph) -> Vec<bool> {
    let n = graph.atom_count();
    let mut degree: Vec<usize> = (0..n).map(|i| graph.degree(NodeIndex::new(i))).collect();
    let mut alive = vec![true; n];
    let mut queue: VecDeque<usize> = (0..n).filter(|&i| degree[i] <= 1).collect();
    while let Some(i) = queue.pop_front() {
        if !alive[i] {
            continue;
        }
        alive[i] = false;
        for nb in graph.neighbours(NodeIndex::new(i)) {
            let j = nb.index();
            if alive[j] {
                degree[j] -= 1;
                if degree[j] <= 1 {
                    queue.push_back(j);
                }
            }
        }
    }
    alive
}

fn smallest_rings(graph: &Graph, num_expected: usize) -> Vec<Vec<NodeIndex>> {
    let core = cyclic_core(graph);
    let num_edges = graph.edge_count();
    let candidates = horton_candidates(graph, &core);

    let mut result = Vec::with_capacity(num_expected);
    let mut basis: Vec<Vec<u64>> = Vec::with_capacity(num_expected);
    for ring in &candidates {
        if result.len() >= num_expected {
            break;
        }
        let bv = ring_to_edge_bitvector(ring, num_edges, graph);
        if bv.iter().all(|&w| w == 0) {
            continue;
        }
        if try_add_to_basis(&mut basis, bv) {
            result.push(normalize_ring(ring));
        }
    }

    result.sort_by(|a, b| a.len().cmp(&b.len()).then_with(|| a.cmp(b)));
    result
}

fn horton_candidates(graph: &Graph, core: &[bool]) -> Vec<Vec<NodeIndex>> {
    let n = graph.atom_count();
    let dist = all_pairs_bfs(graph, core);
    let pred = all_pairs_predecessors(graph, core, &dist);

    let mut candidates: Vec<Vec<NodeIndex>> = Vec::new();
    for e in graph.edges() {
        let edge = graph.edge(e);
        let (u, v) = (edge.source, edge.target);
        if !core[u.index()] || !core[v.index()] {
            continue;
        }
        for w_idx in (0..n).filter(|&i| core[i]) {
            let du = dist[w_idx][u.index()];
            let dv = dist[w_idx][v.index()];
            if du == u32::MAX || dv == u32::MAX {
                continue;
            }
            if du as usize + dv as usize + 1 < 3 {
                continue;
            }
            let w = NodeIndex::new(w_idx);
            let path_u = reconstruct_path(&pred, w, u);
            let path_v = reconstruct_path(&pred, w, v);
            if path_u.is_empty() || path_v.is_empty() || paths_share_internal_node(&path_u, &path_v) {
                continue;
            }
            let mut ring = path_u;
            ring.extend(path_v[1..].iter().rev());
            candidates.push(ring);
        }
    }

    candidates.sort_by(|a, b| a.len().cmp(&b.len()).then_with(|| a.cmp(b)));
    candidates.dedup();
    candidates
}

fn all_pairs_bfs(graph: &Graph, core: &[bool]) -> Vec<Vec<u32>> {
    let n = graph.atom_count();
    let mut dist = vec![vec![u32::MAX; n]; n];
    for (src, row) in dist.iter_mut().enumerate() {
        if !core[src] {
            continue;
        }
        row[src] = 0;
        let mut queue = VecDeque::from([NodeIndex::new(src)]);
        while let Some(cur) = queue.pop_front() {
            let d = row[cur.index()];
            for nb in graph.neighbours(cur) {
                if core[nb.index()] && row[nb.index()] == u32::MAX {
                    row[nb.index()] = d + 1;
                    queue.push_back(nb);
                }
            }
        }
    }
    dist
}

fn all_pairs_predecessors(graph: &Graph, core: &[bool], dist: &[Vec<u32>]) -> Vec<Vec<Option<NodeIndex>>> {
    let n = graph.atom_count();
    let mut pred = vec![vec![None; n]; n];
    for src in (0..n).filter(|&i| core[i]) {
        let mut visited = vec![false; n];
        visited[src] = true;
        let mut queue = VecDeque::from([NodeIndex::new(src)]);
        while let Some(cur) = queue.pop_front() {
            for nb in graph.neighbours(cur) {
                let j = nb.index();
                if core[j] && !visited[j] && dist[src][j] == dist[src][cur.index()] + 1 {
                    visited[j] = true;
                    pred[src][j] = Some(cur);
                    queue.push_back(nb);
                }
            }
        }
    }
    pred
}

fn reconstruct_path(pred: &[Vec<Option<NodeIndex>>], src: NodeIndex, dst: NodeIndex) -> Vec<NodeIndex> {
    let mut path = vec![dst];
    let mut cur = dst;
    while cur != src {
        match pred[src.index()][cur.index()] {
            Some(p) => {
                path.push(p);
                cur = p;
            }
            None => return vec![],
        }
    }
    path.reverse();
    path
}

fn paths_share_internal_node(path_u: &[NodeIndex], path_v: &[NodeIndex]) -> bool {
    if path_u.len() < 2 || path_v.len() < 2 {
        return false;
    }
    path_u[1..].iter().any(|node| path_v[1..].contains(node))
}

fn ring_to_edge_bitvector(ring: &[NodeIndex], num_edges: usize, graph: &Graph) -> Vec<u64> {
    let mut bv = vec![0u64; num_edges.div_ceil(64).max(1)];
    let len = ring.len();
    for i in 0..len {
        if let Some(edge) = graph.edge_between(ring[i], ring[(i + 1) % len]) {
            let idx = edge.index();
            bv[idx / 64] |= 1u64 << (idx % 64);
        }
    }
    bv
}

fn edge_bitvector(graph: &Graph, ring: &[NodeIndex]) -> Vec<u64> {
    ring_to_edge_bitvector(ring, graph.edge_count(), graph)
}

fn try_add_to_basis(basis: &mut Vec<Vec<u64>>, candidate: Vec<u64>) -> bool {
    let mut v = candidate;
    for row in basis.iter() {
        if let Some(p) = leading_bit(row) {
            if v[p / 64] & (1u64 << (p % 64)) != 0 {
                xor_into(&mut v, row);
            }
        }
    }
    if v.iter().all(|&w| w == 0) {
        return false;
    }
    basis.push(v);
    true
}

fn leading_bit(bv: &[u64]) -> Option<usize> {
    bv.iter()
        .enumerate()
        .find(|(_, &w)| w != 0)
        .map(|(i, w)| i * 64 + w.trailing_zeros() as usize)
}

fn xor_into(a: &mut [u64], b: &[u64]) {
    for (aw, bw) in a.iter_mut().zip(b.iter()) {
        *aw ^= *bw;
    }
}

fn popcount(bv: &[u64]) -> u32 {
    bv.iter().map(|w| w.count_ones()).sum()
}

/// The cycle an edge set describes, in walking order, if the set is one
/// simple cycle.
fn simple_cycle(graph: &Graph, bv: &[u64]) -> Option<Vec<NodeIndex>> {
    let n = graph.atom_count();
    let mut adj: Vec<Vec<NodeIndex>> = vec![vec![]; n];
    let mut edge_count = 0;
    for e in graph.edges() {
        let idx = e.index();
        if bv[idx / 64] & (1u64 << (idx % 64)) == 0 {
            continue;
        }
        let edge = graph.edge(e);
        adj[edge.source.index()].push(edge.target);
        adj[edge.target.index()].push(edge.source);
        edge_count += 1;
    }
    if adj.iter().any(|a| !a.is_empty() && a.len() != 2) {
        return None;
    }

    let start = (0..n).find(|&i| !adj[i].is_empty())?;
    let mut ring = vec![NodeIndex::new(start)];
    let mut prev = start;
    let mut cur = adj[start][0].index();
    while cur != start {
        ring.push(NodeIndex::new(cur));
        let next = adj[cur].iter().find(|nb| nb.index() != prev)?.index();
        prev = cur;
        cur = next;
    }
    (ring.len() == edge_count).then_some(ring)
}

/// Rotates the ring to start at its lowest atom and walks towards the lower
/// of that atom's two ring neighbours.
fn normalize_ring(ring: &[NodeIndex]) -> Vec<NodeIndex> {
    let Some(min_pos) = ring
        .iter()
        .enumerate()
        .min_by_key(|&(_, idx)| idx)
        .map(|(i, _)| i)
    else {
        return vec![];
    };

    let len = ring.len();
    let mut normalized: Vec<NodeIndex> = (0..len).map(|i| ring[(min_pos + i) % len]).collect();
    if len > 2 && normalized[1] > normalized[len - 1] {
        normalized[1..].reverse();
    }
    normalized
}
