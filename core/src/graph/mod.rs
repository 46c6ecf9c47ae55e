//! In-memory directed transfer graph.
//!
//! A `TransferGraph` is materialised once per request by the builder and is
//! never mutated afterwards. Nodes are indexed densely in ascending
//! identifier order, so iterating `0..node_count()` visits accounts in the
//! same order a sorted identifier list would.
//!
//! Two projections are derived on demand:
//!   1. `to_undirected()`: weighted, both directions summed, self-loops kept.
//!   2. `undirected_neighbors()`: topology only, no weights, no self-loops.

pub mod builder;

pub use builder::{GraphBuilder, GraphSnapshot, Transfer};

use crate::types::AccountId;
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};

/// Aggregated transfers between one ordered pair of accounts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EdgeData {
    /// Sum of amounts when built with amounts, otherwise 1.
    pub weight: f64,
    /// Number of transfers merged into this edge (1 when presence-only).
    pub count: u32,
}

/// Directed edge count and summed weight inside a node set.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct InternalStats {
    pub edges: usize,
    pub volume: f64,
}

#[derive(Debug, Clone)]
pub struct TransferGraph {
    ids: Vec<AccountId>,
    index: HashMap<AccountId, usize>,
    out_edges: Vec<Vec<(usize, EdgeData)>>,
    in_edges: Vec<Vec<(usize, EdgeData)>>,
    edge_count: usize,
    weighted: bool,
}

impl TransferGraph {
    /// Build from aggregated edges keyed by (source, target).
    /// Every endpoint becomes a node; there are no isolated nodes.
    pub(crate) fn from_edges(
        edges: BTreeMap<(AccountId, AccountId), EdgeData>,
        weighted: bool,
    ) -> Self {
        let nodes: BTreeSet<&AccountId> = edges.keys().flat_map(|(s, t)| [s, t]).collect();
        let ids: Vec<AccountId> = nodes.into_iter().cloned().collect();
        let index: HashMap<AccountId, usize> = ids
            .iter()
            .enumerate()
            .map(|(i, id)| (id.clone(), i))
            .collect();

        let n = ids.len();
        let mut out_edges = vec![Vec::new(); n];
        let mut in_edges = vec![Vec::new(); n];
        // BTreeMap order keeps both adjacency lists sorted by neighbour index.
        for ((source, target), data) in &edges {
            let s = index[source];
            let t = index[target];
            out_edges[s].push((t, *data));
            in_edges[t].push((s, *data));
        }

        Self {
            ids,
            index,
            out_edges,
            in_edges,
            edge_count: edges.len(),
            weighted,
        }
    }

    // ── Nodes ─────────────────────────────────────────────────────

    pub fn node_count(&self) -> usize {
        self.ids.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edge_count
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// True when edge weights are transfer sums rather than presence markers.
    pub fn is_weighted(&self) -> bool {
        self.weighted
    }

    /// Account identifiers in index order (ascending).
    pub fn ids(&self) -> &[AccountId] {
        &self.ids
    }

    pub fn id(&self, node: usize) -> &str {
        &self.ids[node]
    }

    pub fn index_of(&self, account_id: &str) -> Option<usize> {
        self.index.get(account_id).copied()
    }

    pub fn contains(&self, account_id: &str) -> bool {
        self.index.contains_key(account_id)
    }

    pub fn ids_of(&self, nodes: &[usize]) -> Vec<AccountId> {
        nodes.iter().map(|&i| self.ids[i].clone()).collect()
    }

    // ── Edges ─────────────────────────────────────────────────────

    pub fn out_edges(&self, node: usize) -> &[(usize, EdgeData)] {
        &self.out_edges[node]
    }

    pub fn in_edges(&self, node: usize) -> &[(usize, EdgeData)] {
        &self.in_edges[node]
    }

    pub fn out_degree(&self, node: usize) -> usize {
        self.out_edges[node].len()
    }

    pub fn in_degree(&self, node: usize) -> usize {
        self.in_edges[node].len()
    }

    pub fn edge(&self, source: usize, target: usize) -> Option<EdgeData> {
        self.out_edges[source]
            .binary_search_by_key(&target, |(t, _)| *t)
            .ok()
            .map(|pos| self.out_edges[source][pos].1)
    }

    /// edges / (n·(n−1)); 0 for fewer than two nodes.
    pub fn density(&self) -> f64 {
        density(self.edge_count, self.node_count())
    }

    /// Directed edges with both endpoints in `members`, and their summed weight.
    pub fn internal_stats(&self, members: &[usize]) -> InternalStats {
        let mut inside = vec![false; self.node_count()];
        for &m in members {
            inside[m] = true;
        }
        let mut stats = InternalStats::default();
        for &m in members {
            for (t, data) in &self.out_edges[m] {
                if inside[*t] {
                    stats.edges += 1;
                    stats.volume += data.weight;
                }
            }
        }
        stats
    }

    // ── Projections ───────────────────────────────────────────────

    /// Weighted undirected view. Weights of A→B and B→A are summed into one
    /// edge; a self-loop keeps its weight as a self-loop.
    pub fn to_undirected(&self) -> UndirectedGraph {
        let n = self.node_count();
        let mut pairs: BTreeMap<(usize, usize), f64> = BTreeMap::new();
        let mut self_loops = vec![0.0; n];
        for s in 0..n {
            for (t, data) in &self.out_edges[s] {
                let t = *t;
                if s == t {
                    self_loops[s] += data.weight;
                } else {
                    *pairs.entry((s.min(t), s.max(t))).or_insert(0.0) += data.weight;
                }
            }
        }

        let mut adjacency = vec![Vec::new(); n];
        for ((a, b), w) in pairs {
            adjacency[a].push((b, w));
            adjacency[b].push((a, w));
        }
        for list in &mut adjacency {
            list.sort_by_key(|(v, _)| *v);
        }
        UndirectedGraph::from_parts(adjacency, self_loops)
    }

    /// Topology-only undirected neighbour lists, sorted, without self-loops.
    pub fn undirected_neighbors(&self) -> Vec<Vec<usize>> {
        let n = self.node_count();
        let mut neighbors: Vec<Vec<usize>> = vec![Vec::new(); n];
        for s in 0..n {
            for (t, _) in &self.out_edges[s] {
                if s != *t {
                    neighbors[s].push(*t);
                    neighbors[*t].push(s);
                }
            }
        }
        for list in &mut neighbors {
            list.sort_unstable();
            list.dedup();
        }
        neighbors
    }

    // ── Components ────────────────────────────────────────────────

    /// Weakly connected components. Members ascending; components ordered by
    /// their smallest member.
    pub fn weak_components(&self) -> Vec<Vec<usize>> {
        let n = self.node_count();
        let mut seen = vec![false; n];
        let mut components = Vec::new();
        for root in 0..n {
            if seen[root] {
                continue;
            }
            seen[root] = true;
            let mut members = vec![root];
            let mut queue = VecDeque::from([root]);
            while let Some(v) = queue.pop_front() {
                let neighbours = self.out_edges[v].iter().chain(self.in_edges[v].iter());
                for (w, _) in neighbours {
                    if !seen[*w] {
                        seen[*w] = true;
                        members.push(*w);
                        queue.push_back(*w);
                    }
                }
            }
            members.sort_unstable();
            components.push(members);
        }
        components
    }

    /// Strongly connected components (Tarjan, iterative). Members ascending.
    pub fn strong_components(&self) -> Vec<Vec<usize>> {
        const UNVISITED: usize = usize::MAX;

        let n = self.node_count();
        let mut index = vec![UNVISITED; n];
        let mut low = vec![0usize; n];
        let mut on_stack = vec![false; n];
        let mut stack: Vec<usize> = Vec::new();
        let mut components = Vec::new();
        let mut next_index = 0usize;
        // (node, position of the next out-edge to explore)
        let mut frames: Vec<(usize, usize)> = Vec::new();

        for root in 0..n {
            if index[root] != UNVISITED {
                continue;
            }
            index[root] = next_index;
            low[root] = next_index;
            next_index += 1;
            stack.push(root);
            on_stack[root] = true;
            frames.push((root, 0));

            while let Some(frame) = frames.last_mut() {
                let v = frame.0;
                if let Some(&(w, _)) = self.out_edges[v].get(frame.1) {
                    frame.1 += 1;
                    if index[w] == UNVISITED {
                        index[w] = next_index;
                        low[w] = next_index;
                        next_index += 1;
                        stack.push(w);
                        on_stack[w] = true;
                        frames.push((w, 0));
                    } else if on_stack[w] {
                        low[v] = low[v].min(index[w]);
                    }
                    continue;
                }

                frames.pop();
                if let Some(&(parent, _)) = frames.last() {
                    low[parent] = low[parent].min(low[v]);
                }
                if low[v] == index[v] {
                    let mut members = Vec::new();
                    while let Some(w) = stack.pop() {
                        on_stack[w] = false;
                        members.push(w);
                        if w == v {
                            break;
                        }
                    }
                    members.sort_unstable();
                    components.push(members);
                }
            }
        }
        components
    }
}

/// Weighted undirected projection used by Louvain.
#[derive(Debug, Clone)]
pub struct UndirectedGraph {
    adjacency: Vec<Vec<(usize, f64)>>,
    self_loops: Vec<f64>,
    total_weight: f64,
}

impl UndirectedGraph {
    pub(crate) fn from_parts(adjacency: Vec<Vec<(usize, f64)>>, self_loops: Vec<f64>) -> Self {
        let pair_weight: f64 = adjacency
            .iter()
            .enumerate()
            .flat_map(|(a, list)| list.iter().filter(move |(b, _)| *b > a))
            .map(|(_, w)| *w)
            .sum();
        let total_weight = pair_weight + self_loops.iter().sum::<f64>();
        Self {
            adjacency,
            self_loops,
            total_weight,
        }
    }

    pub fn node_count(&self) -> usize {
        self.adjacency.len()
    }

    /// Neighbours other than the node itself.
    pub fn neighbors(&self, node: usize) -> &[(usize, f64)] {
        &self.adjacency[node]
    }

    pub fn self_loop(&self, node: usize) -> f64 {
        self.self_loops[node]
    }

    /// Weighted degree; a self-loop counts twice.
    pub fn degree(&self, node: usize) -> f64 {
        self.adjacency[node].iter().map(|(_, w)| w).sum::<f64>() + 2.0 * self.self_loops[node]
    }

    /// Sum of all edge weights, each undirected edge and self-loop once.
    pub fn total_weight(&self) -> f64 {
        self.total_weight
    }
}

pub fn density(edges: usize, nodes: usize) -> f64 {
    if nodes < 2 {
        return 0.0;
    }
    edges as f64 / (nodes * (nodes - 1)) as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph(edges: &[(&str, &str, f64)]) -> TransferGraph {
        let mut map = BTreeMap::new();
        for (s, t, w) in edges {
            let e = map
                .entry((s.to_string(), t.to_string()))
                .or_insert(EdgeData { weight: 0.0, count: 0 });
            e.weight += w;
            e.count += 1;
        }
        TransferGraph::from_edges(map, true)
    }

    #[test]
    fn nodes_are_indexed_in_ascending_order() {
        let g = graph(&[("C", "A", 1.0), ("B", "C", 1.0)]);
        assert_eq!(g.ids(), &["A", "B", "C"]);
        assert_eq!(g.index_of("C"), Some(2));
        assert_eq!(g.edge_count(), 2);
    }

    #[test]
    fn density_of_triangle_cycle() {
        let g = graph(&[("A", "B", 1.0), ("B", "C", 1.0), ("C", "A", 1.0)]);
        assert!((g.density() - 0.5).abs() < 1e-12);
        assert_eq!(density(0, 1), 0.0);
    }

    #[test]
    fn undirected_projection_sums_both_directions() {
        let g = graph(&[("A", "B", 10.0), ("B", "A", 5.0), ("B", "B", 2.0)]);
        let u = g.to_undirected();
        assert_eq!(u.neighbors(0), &[(1, 15.0)]);
        assert_eq!(u.self_loop(1), 2.0);
        assert_eq!(u.degree(1), 19.0);
        assert_eq!(u.total_weight(), 17.0);
    }

    #[test]
    fn simple_neighbours_skip_self_loops() {
        let g = graph(&[("A", "B", 1.0), ("B", "A", 1.0), ("A", "A", 1.0)]);
        assert_eq!(g.undirected_neighbors(), vec![vec![1], vec![0]]);
    }

    #[test]
    fn components_strong_and_weak() {
        let g = graph(&[
            ("A", "B", 1.0),
            ("B", "C", 1.0),
            ("C", "A", 1.0),
            ("C", "D", 1.0),
            ("X", "Y", 1.0),
        ]);
        let mut strong = g.strong_components();
        strong.sort();
        assert_eq!(strong, vec![vec![0, 1, 2], vec![3], vec![4], vec![5]]);
        assert_eq!(g.weak_components(), vec![vec![0, 1, 2, 3], vec![4, 5]]);
    }

    #[test]
    fn internal_stats_count_directed_edges() {
        let g = graph(&[("A", "B", 3.0), ("B", "A", 4.0), ("B", "C", 9.0)]);
        let stats = g.internal_stats(&[0, 1]);
        assert_eq!(stats.edges, 2);
        assert_eq!(stats.volume, 7.0);
    }
}
