//! Community detection: groups of accounts that transact mostly with each
//! other.
//!
//! Louvain (weighted, multi-level):
//!   1. Every node starts in its own community.
//!   2. Local moves: visit nodes in seeded random order and move each to the
//!      neighbouring community with the largest positive modularity gain.
//!      Repeat sweeps until nothing moves or the gain falls below threshold.
//!   3. Aggregate: each community becomes one node, internal weight becomes
//!      a self-loop, and step 2 runs again on the smaller graph.
//!   4. Stop when a level no longer improves modularity.
//!
//! Label propagation (unweighted): every node repeatedly adopts the label
//! most frequent among its neighbours, keeping its own label when that is
//! already among the most frequent. Ties are broken by the seeded RNG.
//!
//! RULE: both partitions are exhaustive and non-overlapping. Every node of
//! the snapshot lands in exactly one community.

use crate::{
    error::GraphResult,
    graph::{TransferGraph, UndirectedGraph},
    risk::{summarize, AccountDirectory, NodeSetKind, NodeSetSummary},
    rng::{AlgorithmRng, AlgorithmSlot},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const LOUVAIN_MAX_PASSES: usize = 100;
pub const LOUVAIN_MAX_LEVELS: usize = 32;
pub const MIN_MODULARITY_GAIN: f64 = 1e-7;
pub const LABEL_PROPAGATION_MAX_SWEEPS: usize = 100;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CommunityAlgorithm {
    Louvain,
    LabelPropagation,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CommunityEntry {
    pub community_id: usize,
    #[serde(flatten)]
    pub summary: NodeSetSummary,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CommunityReport {
    pub algorithm: CommunityAlgorithm,
    pub total_communities: usize,
    /// Louvain only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modularity: Option<f64>,
    /// False when the algorithm stopped at its iteration cap; the partition
    /// is then best-effort.
    pub converged: bool,
    pub communities: Vec<CommunityEntry>,
}

/// Community index per node.
#[derive(Debug, Clone, PartialEq)]
pub struct Partition {
    pub assignment: Vec<usize>,
    pub converged: bool,
}

impl Partition {
    /// Node sets, members ascending, largest first (ties by smallest member).
    pub fn groups(&self) -> Vec<Vec<usize>> {
        let mut by_label: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for (node, label) in self.assignment.iter().enumerate() {
            by_label.entry(*label).or_default().push(node);
        }
        let mut groups: Vec<Vec<usize>> = by_label.into_values().collect();
        groups.sort_by(|a, b| b.len().cmp(&a.len()).then(a[0].cmp(&b[0])));
        groups
    }
}

// ── Modularity ────────────────────────────────────────────────────

/// Newman modularity of `assignment` on a weighted undirected graph.
/// Self-loops count once towards internal weight and twice towards degree.
pub fn modularity(graph: &UndirectedGraph, assignment: &[usize]) -> f64 {
    let m = graph.total_weight();
    if m == 0.0 {
        return 0.0;
    }
    let k = assignment.iter().max().map_or(0, |c| c + 1);
    let mut internal = vec![0.0; k];
    let mut degree = vec![0.0; k];
    for v in 0..graph.node_count() {
        let c = assignment[v];
        degree[c] += graph.degree(v);
        internal[c] += graph.self_loop(v);
        for &(u, w) in graph.neighbors(v) {
            if u > v && assignment[u] == c {
                internal[c] += w;
            }
        }
    }
    internal
        .iter()
        .zip(&degree)
        .map(|(inside, deg)| inside / m - (deg / (2.0 * m)).powi(2))
        .sum()
}

// ── Louvain ───────────────────────────────────────────────────────

/// Local-move phase on one level. Returns the community of every node and
/// whether any node moved.
fn one_level(graph: &UndirectedGraph, rng: &mut AlgorithmRng) -> (Vec<usize>, bool) {
    let n = graph.node_count();
    let m2 = 2.0 * graph.total_weight();
    let degrees: Vec<f64> = (0..n).map(|v| graph.degree(v)).collect();
    let mut community: Vec<usize> = (0..n).collect();
    let mut community_degree = degrees.clone();

    // Weight from the current node to each neighbouring community.
    let mut weight_to = vec![0.0f64; n];
    let mut touched: Vec<usize> = Vec::new();
    let mut order: Vec<usize> = (0..n).collect();

    let mut moved_any = false;
    let mut current = modularity(graph, &community);

    for _ in 0..LOUVAIN_MAX_PASSES {
        rng.shuffle(&mut order);
        let mut moved = false;

        for &v in &order {
            let own = community[v];
            for &(u, w) in graph.neighbors(v) {
                let c = community[u];
                if weight_to[c] == 0.0 {
                    touched.push(c);
                }
                weight_to[c] += w;
            }

            let k = degrees[v];
            let ratio = k / m2;
            community_degree[own] -= k;
            let remove_cost = -weight_to[own] + community_degree[own] * ratio;

            let mut best = own;
            let mut best_gain = 0.0;
            touched.sort_unstable();
            for &c in &touched {
                let gain = remove_cost + weight_to[c] - community_degree[c] * ratio;
                if gain > best_gain {
                    best_gain = gain;
                    best = c;
                }
            }

            community_degree[best] += k;
            community[v] = best;
            if best != own {
                moved = true;
            }
            for &c in &touched {
                weight_to[c] = 0.0;
            }
            touched.clear();
        }

        if !moved {
            break;
        }
        moved_any = true;
        let next = modularity(graph, &community);
        if next - current < MIN_MODULARITY_GAIN {
            break;
        }
        current = next;
    }
    (community, moved_any)
}

/// Relabel communities 0..k in order of first appearance.
fn renumber(community: &[usize]) -> (Vec<usize>, usize) {
    let mut map = vec![usize::MAX; community.len()];
    let mut next = 0;
    let mut out = Vec::with_capacity(community.len());
    for &c in community {
        if map[c] == usize::MAX {
            map[c] = next;
            next += 1;
        }
        out.push(map[c]);
    }
    (out, next)
}

/// Collapse each community into one node.
fn aggregate(graph: &UndirectedGraph, community: &[usize], count: usize) -> UndirectedGraph {
    let mut self_loops = vec![0.0; count];
    let mut pairs: BTreeMap<(usize, usize), f64> = BTreeMap::new();
    for v in 0..graph.node_count() {
        let cv = community[v];
        self_loops[cv] += graph.self_loop(v);
        for &(u, w) in graph.neighbors(v) {
            if u < v {
                continue;
            }
            let cu = community[u];
            if cu == cv {
                self_loops[cv] += w;
            } else {
                *pairs.entry((cu.min(cv), cu.max(cv))).or_insert(0.0) += w;
            }
        }
    }
    let mut adjacency = vec![Vec::new(); count];
    for ((a, b), w) in pairs {
        adjacency[a].push((b, w));
        adjacency[b].push((a, w));
    }
    for list in &mut adjacency {
        list.sort_by_key(|(v, _)| *v);
    }
    UndirectedGraph::from_parts(adjacency, self_loops)
}

/// Multi-level Louvain. Returns the partition and its modularity.
pub fn louvain(graph: &UndirectedGraph, rng: &mut AlgorithmRng) -> (Partition, f64) {
    let n = graph.node_count();
    let mut membership: Vec<usize> = (0..n).collect();
    if n == 0 || graph.total_weight() == 0.0 {
        return (
            Partition {
                assignment: membership,
                converged: true,
            },
            0.0,
        );
    }

    let mut level_graph = graph.clone();
    let mut current = modularity(graph, &membership);
    let mut converged = false;
    for level in 0..LOUVAIN_MAX_LEVELS {
        let (community, moved) = one_level(&level_graph, rng);
        if !moved {
            converged = true;
            break;
        }
        let (community, count) = renumber(&community);
        let candidate: Vec<usize> = membership.iter().map(|&m| community[m]).collect();
        let next = modularity(graph, &candidate);
        if level > 0 && next - current < MIN_MODULARITY_GAIN {
            converged = true;
            break;
        }
        log::debug!("Louvain level {level}: {count} communities, modularity {next:.4}");
        membership = candidate;
        current = next;
        level_graph = aggregate(&level_graph, &community, count);
    }
    if !converged {
        log::warn!("Louvain stopped at the level cap ({LOUVAIN_MAX_LEVELS})");
    }

    (
        Partition {
            assignment: membership,
            converged,
        },
        current,
    )
}

// ── Label propagation ─────────────────────────────────────────────

/// Asynchronous label propagation over unweighted neighbour lists.
pub fn label_propagation(neighbors: &[Vec<usize>], rng: &mut AlgorithmRng) -> Partition {
    let n = neighbors.len();
    let mut labels: Vec<usize> = (0..n).collect();
    let mut order: Vec<usize> = (0..n).collect();
    let mut frequency = vec![0usize; n];
    let mut touched: Vec<usize> = Vec::new();
    let mut candidates: Vec<usize> = Vec::new();

    for sweep in 1..=LABEL_PROPAGATION_MAX_SWEEPS {
        rng.shuffle(&mut order);
        let mut changed = false;

        for &v in &order {
            if neighbors[v].is_empty() {
                continue;
            }
            for &u in &neighbors[v] {
                let label = labels[u];
                if frequency[label] == 0 {
                    touched.push(label);
                }
                frequency[label] += 1;
            }
            let best = touched.iter().map(|&l| frequency[l]).max().unwrap_or(0);
            candidates.extend(touched.iter().copied().filter(|&l| frequency[l] == best));
            candidates.sort_unstable();

            if !candidates.contains(&labels[v]) {
                labels[v] = candidates[rng.next_index(candidates.len())];
                changed = true;
            }

            for &l in &touched {
                frequency[l] = 0;
            }
            touched.clear();
            candidates.clear();
        }

        if !changed {
            log::debug!("Label propagation settled after {sweep} sweeps");
            return Partition {
                assignment: labels,
                converged: true,
            };
        }
    }

    log::warn!("Label propagation hit the sweep cap ({LABEL_PROPAGATION_MAX_SWEEPS})");
    Partition {
        assignment: labels,
        converged: false,
    }
}

// ── Reports ───────────────────────────────────────────────────────

fn describe<D: AccountDirectory + ?Sized>(
    graph: &TransferGraph,
    directory: &D,
    partition: &Partition,
) -> GraphResult<Vec<CommunityEntry>> {
    partition
        .groups()
        .iter()
        .enumerate()
        .map(|(id, members)| {
            Ok(CommunityEntry {
                community_id: id,
                summary: summarize(graph, directory, members, NodeSetKind::Community)?,
            })
        })
        .collect()
}

/// Louvain communities of a weighted snapshot.
pub fn louvain_report<D: AccountDirectory + ?Sized>(
    graph: &TransferGraph,
    directory: &D,
    seed: u64,
) -> GraphResult<CommunityReport> {
    let mut rng = AlgorithmRng::new(seed, AlgorithmSlot::Louvain);
    let (partition, modularity) = louvain(&graph.to_undirected(), &mut rng);
    let communities = describe(graph, directory, &partition)?;
    log::info!(
        "Louvain found {} communities (modularity {modularity:.4})",
        communities.len()
    );
    Ok(CommunityReport {
        algorithm: CommunityAlgorithm::Louvain,
        total_communities: communities.len(),
        modularity: Some(modularity),
        converged: partition.converged,
        communities,
    })
}

/// Label propagation communities. Volume is only reported when the
/// snapshot carries amounts.
pub fn label_propagation_report<D: AccountDirectory + ?Sized>(
    graph: &TransferGraph,
    directory: &D,
    seed: u64,
) -> GraphResult<CommunityReport> {
    let mut rng = AlgorithmRng::new(seed, AlgorithmSlot::LabelPropagation);
    let partition = label_propagation(&graph.undirected_neighbors(), &mut rng);
    let communities = describe(graph, directory, &partition)?;
    log::info!("Label propagation found {} communities", communities.len());
    Ok(CommunityReport {
        algorithm: CommunityAlgorithm::LabelPropagation,
        total_communities: communities.len(),
        modularity: None,
        converged: partition.converged,
        communities,
    })
}
