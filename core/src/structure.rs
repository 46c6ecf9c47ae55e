//! Structural analyses: isolated sub-networks and fully connected groups.
//!
//! Weakly connected components show sub-networks with no money flowing in
//! or out. Maximal cliques on the undirected topology point at accounts
//! that all transact with each other, a common collusion signature.

use crate::{
    error::GraphResult,
    graph::{density, TransferGraph},
    risk::{summarize, AccountDirectory, NodeSetKind, NodeSetSummary},
};
use serde::{Deserialize, Serialize};

/// Components smaller than this are flagged as isolated.
pub const ISOLATED_COMPONENT_SIZE: usize = 5;
/// Cliques reported in full; the rest are only counted.
pub const MAX_REPORTED_CLIQUES: usize = 50;

// ── Connected components ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ComponentEntry {
    pub component_id: usize,
    #[serde(flatten)]
    pub summary: NodeSetSummary,
    pub density: f64,
    pub is_isolated: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ComponentReport {
    pub strongly_connected_components: usize,
    pub weakly_connected_components: usize,
    pub largest_component_size: usize,
    pub components: Vec<ComponentEntry>,
}

pub fn connected_components<D: AccountDirectory + ?Sized>(
    graph: &TransferGraph,
    directory: &D,
) -> GraphResult<ComponentReport> {
    let strong = graph.strong_components().len();
    let mut weak = graph.weak_components();
    weak.sort_by(|a, b| b.len().cmp(&a.len()).then(a[0].cmp(&b[0])));

    let mut components = Vec::with_capacity(weak.len());
    for (id, members) in weak.iter().enumerate() {
        let summary = summarize(graph, directory, members, NodeSetKind::Community)?;
        components.push(ComponentEntry {
            component_id: id,
            density: density(summary.internal_edges, members.len()),
            is_isolated: members.len() < ISOLATED_COMPONENT_SIZE,
            summary,
        });
    }

    log::info!(
        "Components: {strong} strong, {} weak",
        components.len()
    );
    Ok(ComponentReport {
        strongly_connected_components: strong,
        weakly_connected_components: weak.len(),
        largest_component_size: weak.first().map_or(0, |c| c.len()),
        components,
    })
}

// ── Cliques ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CliqueEntry {
    pub clique_id: usize,
    #[serde(flatten)]
    pub summary: NodeSetSummary,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CliqueReport {
    pub min_size: usize,
    /// Maximal cliques of at least `min_size` members.
    pub total_cliques: usize,
    pub largest_clique_size: usize,
    /// The largest cliques, ties by member list.
    pub cliques: Vec<CliqueEntry>,
}

/// Maximal cliques with at least `min_size` members (Bron–Kerbosch with
/// Tomita pivoting). Each clique is ascending; the list is ordered by size
/// descending, then by member list.
pub fn maximal_cliques(neighbors: &[Vec<usize>], min_size: usize) -> Vec<Vec<usize>> {
    let mut out = Vec::new();
    let mut r = Vec::new();
    let p: Vec<usize> = (0..neighbors.len()).collect();
    expand(neighbors, &mut r, p, Vec::new(), min_size, &mut out);
    out.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
    out
}

fn expand(
    neighbors: &[Vec<usize>],
    r: &mut Vec<usize>,
    mut p: Vec<usize>,
    mut x: Vec<usize>,
    min_size: usize,
    out: &mut Vec<Vec<usize>>,
) {
    if p.is_empty() {
        if x.is_empty() && r.len() >= min_size {
            let mut clique = r.clone();
            clique.sort_unstable();
            out.push(clique);
        }
        return;
    }
    // No extension of R can reach min_size.
    if r.len() + p.len() < min_size {
        return;
    }

    let adjacent = |u: usize, v: usize| neighbors[u].binary_search(&v).is_ok();
    let pivot = p
        .iter()
        .chain(x.iter())
        .copied()
        .max_by_key(|&u| p.iter().filter(|&&v| adjacent(u, v)).count())
        .unwrap_or(p[0]);
    let candidates: Vec<usize> = p.iter().copied().filter(|&v| !adjacent(pivot, v)).collect();

    for v in candidates {
        let next_p: Vec<usize> = p.iter().copied().filter(|&w| adjacent(v, w)).collect();
        let next_x: Vec<usize> = x.iter().copied().filter(|&w| adjacent(v, w)).collect();
        r.push(v);
        expand(neighbors, r, next_p, next_x, min_size, out);
        r.pop();
        p.retain(|&w| w != v);
        x.push(v);
    }
}

/// Cliques on the undirected topology of `graph`. Volume is read from the
/// snapshot's edge weights.
pub fn cliques<D: AccountDirectory + ?Sized>(
    graph: &TransferGraph,
    directory: &D,
    min_size: usize,
) -> GraphResult<CliqueReport> {
    let all = maximal_cliques(&graph.undirected_neighbors(), min_size);
    let mut cliques = Vec::with_capacity(all.len().min(MAX_REPORTED_CLIQUES));
    for (id, members) in all.iter().take(MAX_REPORTED_CLIQUES).enumerate() {
        cliques.push(CliqueEntry {
            clique_id: id,
            summary: summarize(graph, directory, members, NodeSetKind::Clique)?,
        });
    }
    log::info!("Cliques (min size {min_size}): {} found", all.len());
    Ok(CliqueReport {
        min_size,
        total_cliques: all.len(),
        largest_clique_size: all.first().map_or(0, |c| c.len()),
        cliques,
    })
}
