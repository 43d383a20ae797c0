//! Travel-time graph and all-pairs shortest paths.
//!
//! Nodes are the zones that appear in at least one connection, ordered by
//! handle so indices are stable within a run. Edge weights are connection
//! averages in whole seconds. When only one direction of a pair was ever
//! observed, its time is used for the other direction as well.
//!
//! Unreachable pairs are `None` in every matrix, never zero.
//!
//! With the `parallel` feature, one Dijkstra search per source runs on the
//! rayon pool; rows are independent so the result is the same.

use log::info;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

use crate::{ConnectionSet, LocationHandle};

/// Shortest travel times between every pair of connected zones.
#[derive(Debug, Clone)]
pub struct TravelGraph {
    nodes: Vec<LocationHandle>,
    index: HashMap<LocationHandle, usize>,
    /// Direct edge cost, row-major `from * n + to`
    costs: Vec<Option<u64>>,
    /// Shortest time, row-major `source * n + target`
    shortest: Vec<Option<u64>>,
    /// Node preceding `target` on the shortest path from `source`
    predecessors: Vec<Option<usize>>,
}

impl TravelGraph {
    /// Build the graph from aggregated connections.
    pub fn from_connections(connections: &ConnectionSet) -> Self {
        let edges: Vec<(LocationHandle, LocationHandle, u64)> = connections
            .iter()
            .map(|c| (c.from, c.to, c.edge_secs()))
            .collect();
        Self::from_edges(&edges)
    }

    /// Build the graph from directed `(from, to, seconds)` edges.
    ///
    /// Self-loops are ignored; repeated edges keep the cheapest cost.
    pub fn from_edges(edges: &[(LocationHandle, LocationHandle, u64)]) -> Self {
        let mut nodes: Vec<LocationHandle> = edges
            .iter()
            .filter(|(a, b, _)| a != b)
            .flat_map(|(a, b, _)| [*a, *b])
            .collect();
        nodes.sort();
        nodes.dedup();

        let n = nodes.len();
        let index: HashMap<LocationHandle, usize> =
            nodes.iter().enumerate().map(|(i, h)| (*h, i)).collect();

        let mut costs: Vec<Option<u64>> = vec![None; n * n];
        for (from, to, secs) in edges {
            if from == to {
                continue;
            }
            let slot = &mut costs[index[from] * n + index[to]];
            *slot = Some(slot.map_or(*secs, |c| c.min(*secs)));
        }

        // Mirror one-way observations
        let observed = costs.clone();
        for i in 0..n {
            for j in 0..n {
                if let (Some(secs), None) = (observed[i * n + j], observed[j * n + i]) {
                    costs[j * n + i] = Some(secs);
                }
            }
        }

        let (shortest, predecessors) = all_pairs(n, &costs);

        info!("[Graph] {} zones, {} edges", n, costs.iter().filter(|c| c.is_some()).count());

        Self {
            nodes,
            index,
            costs,
            shortest,
            predecessors,
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Zones in index order.
    pub fn nodes(&self) -> &[LocationHandle] {
        &self.nodes
    }

    pub fn contains(&self, location: LocationHandle) -> bool {
        self.index.contains_key(&location)
    }

    pub fn index_of(&self, location: LocationHandle) -> Option<usize> {
        self.index.get(&location).copied()
    }

    /// Direct edge cost in seconds, after mirroring.
    pub fn edge_secs(&self, from: LocationHandle, to: LocationHandle) -> Option<u64> {
        let (i, j) = (self.index_of(from)?, self.index_of(to)?);
        self.costs[i * self.nodes.len() + j]
    }

    /// Shortest travel time in seconds; zero from a zone to itself.
    pub fn shortest_secs(&self, from: LocationHandle, to: LocationHandle) -> Option<u64> {
        if from == to {
            return Some(0);
        }
        let (i, j) = (self.index_of(from)?, self.index_of(to)?);
        self.shortest[i * self.nodes.len() + j]
    }

    /// Zones strictly between `from` and `to` on the shortest path.
    ///
    /// Empty when `from == to`, `None` when unreachable.
    ///
    /// ```
    /// use turf_routes::{LocationId, LocationRegistry, StaticLocation, TravelGraph};
    ///
    /// let mut registry = LocationRegistry::new();
    /// let zone = StaticLocation::new("Zone", 100, 1, 57.7, 11.97);
    /// let a = registry.intern(LocationId(1), &zone, None);
    /// let b = registry.intern(LocationId(2), &zone, None);
    /// let c = registry.intern(LocationId(3), &zone, None);
    ///
    /// let graph = TravelGraph::from_edges(&[(a, b, 10), (b, c, 10), (a, c, 30)]);
    /// assert_eq!(graph.shortest_secs(a, c), Some(20));
    /// assert_eq!(graph.waypoints(a, c), Some(vec![b]));
    /// ```
    pub fn waypoints(&self, from: LocationHandle, to: LocationHandle) -> Option<Vec<LocationHandle>> {
        if from == to {
            return Some(Vec::new());
        }
        let (source, target) = (self.index_of(from)?, self.index_of(to)?);
        let n = self.nodes.len();
        self.shortest[source * n + target]?;

        let mut interior = Vec::new();
        let mut current = target;
        while let Some(prev) = self.predecessors[source * n + current] {
            if prev == source {
                break;
            }
            interior.push(self.nodes[prev]);
            current = prev;
            if interior.len() > n {
                return None;
            }
        }
        interior.reverse();
        Some(interior)
    }

    /// Full zone sequence from `from` to `to`, both ends included.
    pub fn path(&self, from: LocationHandle, to: LocationHandle) -> Option<Vec<LocationHandle>> {
        if from == to {
            return Some(vec![from]);
        }
        let interior = self.waypoints(from, to)?;
        let mut path = Vec::with_capacity(interior.len() + 2);
        path.push(from);
        path.extend(interior);
        path.push(to);
        Some(path)
    }
}

// ============================================================================
// Dijkstra
// ============================================================================

type Row = (Vec<Option<u64>>, Vec<Option<usize>>);

fn adjacency(n: usize, costs: &[Option<u64>]) -> Vec<Vec<(usize, u64)>> {
    (0..n)
        .map(|i| {
            (0..n)
                .filter_map(|j| costs[i * n + j].map(|c| (j, c)))
                .collect()
        })
        .collect()
}

/// Single-source shortest times and predecessors.
fn dijkstra(adjacency: &[Vec<(usize, u64)>], source: usize) -> Row {
    let n = adjacency.len();
    let mut dist: Vec<Option<u64>> = vec![None; n];
    let mut prev: Vec<Option<usize>> = vec![None; n];
    dist[source] = Some(0);

    // Node index as secondary key keeps tie-breaking deterministic
    let mut heap: BinaryHeap<Reverse<(u64, usize)>> = BinaryHeap::new();
    heap.push(Reverse((0, source)));

    while let Some(Reverse((cost, node))) = heap.pop() {
        // Skip stale heap entries
        if dist[node].is_some_and(|d| cost > d) {
            continue;
        }
        for &(next, weight) in &adjacency[node] {
            let candidate = cost.saturating_add(weight);
            if dist[next].map_or(true, |d| candidate < d) {
                dist[next] = Some(candidate);
                prev[next] = Some(node);
                heap.push(Reverse((candidate, next)));
            }
        }
    }

    (dist, prev)
}

#[cfg(feature = "parallel")]
fn all_pairs(n: usize, costs: &[Option<u64>]) -> Row {
    use rayon::prelude::*;

    let adj = adjacency(n, costs);
    let rows: Vec<Row> = (0..n).into_par_iter().map(|s| dijkstra(&adj, s)).collect();
    flatten(rows)
}

#[cfg(not(feature = "parallel"))]
fn all_pairs(n: usize, costs: &[Option<u64>]) -> Row {
    let adj = adjacency(n, costs);
    let rows: Vec<Row> = (0..n).map(|s| dijkstra(&adj, s)).collect();
    flatten(rows)
}

fn flatten(rows: Vec<Row>) -> Row {
    let mut shortest = Vec::new();
    let mut predecessors = Vec::new();
    for (dist, prev) in rows {
        shortest.extend(dist);
        predecessors.extend(prev);
    }
    (shortest, predecessors)
}
