//! Centrality scores over a transfer snapshot.
//!
//! Four measures:
//!   1. PageRank on the weighted graph (influence).
//!   2. Betweenness on the unweighted directed graph (bridges).
//!   3. Closeness on the largest strongly connected component.
//!   4. Eigenvector on the weighted graph (connection to important nodes).
//!
//! RULE: scores are computed over the whole snapshot first, ranked second.
//! Top-N never changes a score, only which accounts are reported.

use crate::{
    error::GraphResult,
    graph::TransferGraph,
    risk::{AccountDirectory, AccountInfo},
    types::{AccountId, Lookup},
};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

pub const DAMPING: f64 = 0.85;
pub const PAGERANK_MAX_ITERATIONS: usize = 100;
pub const PAGERANK_TOLERANCE: f64 = 1e-6;
pub const EIGENVECTOR_MAX_ITERATIONS: usize = 1000;
pub const EIGENVECTOR_TOLERANCE: f64 = 1e-6;
pub const EIGENVECTOR_RETRY_MAX_ITERATIONS: usize = 100;
pub const EIGENVECTOR_RETRY_TOLERANCE: f64 = 1e-3;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CentralityKind {
    PageRank,
    Betweenness,
    Closeness,
    Eigenvector,
}

impl CentralityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PageRank    => "pagerank",
            Self::Betweenness => "betweenness",
            Self::Closeness   => "closeness",
            Self::Eigenvector => "eigenvector",
        }
    }
}

/// Per-node scores, indexed like the graph. `None` marks a node the measure
/// does not cover (closeness outside the largest strong component).
#[derive(Debug, Clone, PartialEq)]
pub struct CentralityScores {
    pub values: Vec<Option<f64>>,
    pub converged: bool,
    pub iterations: usize,
}

impl CentralityScores {
    fn exact(values: Vec<f64>) -> Self {
        Self {
            values: values.into_iter().map(Some).collect(),
            converged: true,
            iterations: 0,
        }
    }

    pub fn get(&self, node: usize) -> Option<f64> {
        self.values.get(node).copied().flatten()
    }

    pub fn scored_nodes(&self) -> usize {
        self.values.iter().filter(|v| v.is_some()).count()
    }

    /// Node indices with scores, descending by score, ties by index
    /// (and therefore identifier) ascending, truncated to `n`.
    pub fn top(&self, n: usize) -> Vec<(usize, f64)> {
        let mut scored: Vec<(usize, f64)> = self
            .values
            .iter()
            .enumerate()
            .filter_map(|(i, v)| v.map(|s| (i, s)))
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        scored.truncate(n);
        scored
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RankedAccount {
    pub rank: usize,
    pub score: f64,
    #[serde(flatten)]
    pub account: AccountInfo,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CentralityReport {
    pub algorithm: CentralityKind,
    pub converged: bool,
    pub iterations: usize,
    /// Nodes scored before truncation to top-N.
    pub scored_nodes: usize,
    pub accounts: Vec<RankedAccount>,
}

// ── PageRank ──────────────────────────────────────────────────────

/// Weighted PageRank by power iteration. Mass of nodes without outgoing
/// weight is spread uniformly over all nodes.
pub fn pagerank(graph: &TransferGraph) -> CentralityScores {
    let n = graph.node_count();
    if n == 0 {
        return CentralityScores::exact(Vec::new());
    }
    let nf = n as f64;
    let out_weight: Vec<f64> = (0..n)
        .map(|v| graph.out_edges(v).iter().map(|(_, e)| e.weight).sum())
        .collect();

    let mut x = vec![1.0 / nf; n];
    for iteration in 1..=PAGERANK_MAX_ITERATIONS {
        let dangling: f64 = (0..n).filter(|&v| out_weight[v] == 0.0).map(|v| x[v]).sum();
        let base = (1.0 - DAMPING) / nf + DAMPING * dangling / nf;
        let mut next = vec![base; n];
        for v in 0..n {
            if out_weight[v] == 0.0 {
                continue;
            }
            let share = DAMPING * x[v] / out_weight[v];
            for (t, e) in graph.out_edges(v) {
                next[*t] += share * e.weight;
            }
        }
        let err: f64 = next.iter().zip(&x).map(|(a, b)| (a - b).abs()).sum();
        x = next;
        if err < nf * PAGERANK_TOLERANCE {
            log::debug!("PageRank converged after {iteration} iterations");
            return CentralityScores {
                values: x.into_iter().map(Some).collect(),
                converged: true,
                iterations: iteration,
            };
        }
    }

    log::warn!("PageRank did not converge in {PAGERANK_MAX_ITERATIONS} iterations; returning last iterate");
    CentralityScores {
        values: x.into_iter().map(Some).collect(),
        converged: false,
        iterations: PAGERANK_MAX_ITERATIONS,
    }
}

// ── Betweenness ───────────────────────────────────────────────────

/// Brandes betweenness on the directed topology, normalised by
/// 1/((n−1)(n−2)) when n > 2.
pub fn betweenness(graph: &TransferGraph) -> CentralityScores {
    let n = graph.node_count();
    let mut centrality = vec![0.0f64; n];

    for s in 0..n {
        let mut stack: Vec<usize> = Vec::with_capacity(n);
        let mut predecessors: Vec<Vec<usize>> = vec![Vec::new(); n];
        let mut sigma = vec![0.0f64; n];
        let mut dist = vec![-1i64; n];
        sigma[s] = 1.0;
        dist[s] = 0;

        let mut queue = VecDeque::from([s]);
        while let Some(v) = queue.pop_front() {
            stack.push(v);
            for (w, _) in graph.out_edges(v) {
                let w = *w;
                if dist[w] < 0 {
                    dist[w] = dist[v] + 1;
                    queue.push_back(w);
                }
                if dist[w] == dist[v] + 1 {
                    sigma[w] += sigma[v];
                    predecessors[w].push(v);
                }
            }
        }

        let mut delta = vec![0.0f64; n];
        while let Some(w) = stack.pop() {
            for &v in &predecessors[w] {
                delta[v] += (sigma[v] / sigma[w]) * (1.0 + delta[w]);
            }
            if w != s {
                centrality[w] += delta[w];
            }
        }
    }

    if n > 2 {
        let scale = 1.0 / ((n - 1) * (n - 2)) as f64;
        for c in &mut centrality {
            *c *= scale;
        }
    }
    CentralityScores::exact(centrality)
}

// ── Closeness ─────────────────────────────────────────────────────

/// The largest strongly connected component. Ties go to the component
/// whose smallest identifier sorts first.
pub fn largest_strong_component(graph: &TransferGraph) -> Vec<usize> {
    graph
        .strong_components()
        .into_iter()
        .max_by(|a, b| a.len().cmp(&b.len()).then(b[0].cmp(&a[0])))
        .unwrap_or_default()
}

/// Closeness over inward shortest-path distances, restricted to the largest
/// strongly connected component. Other nodes are left unscored.
pub fn closeness(graph: &TransferGraph) -> CentralityScores {
    let n = graph.node_count();
    let mut values = vec![None; n];
    let component = largest_strong_component(graph);
    let r = component.len();

    let mut inside = vec![false; n];
    for &v in &component {
        inside[v] = true;
    }

    let mut dist = vec![usize::MAX; n];
    for &u in &component {
        for &v in &component {
            dist[v] = usize::MAX;
        }
        dist[u] = 0;
        let mut reached = 1usize;
        let mut total = 0usize;
        let mut queue = VecDeque::from([u]);
        while let Some(v) = queue.pop_front() {
            for (w, _) in graph.in_edges(v) {
                let w = *w;
                if inside[w] && dist[w] == usize::MAX {
                    dist[w] = dist[v] + 1;
                    total += dist[w];
                    reached += 1;
                    queue.push_back(w);
                }
            }
        }
        let score = if total > 0 && r > 1 {
            let reach = (reached - 1) as f64;
            (reach / total as f64) * (reach / (r - 1) as f64)
        } else {
            0.0
        };
        values[u] = Some(score);
    }

    if r < n {
        log::debug!("Closeness restricted to largest strong component ({r} of {n} nodes)");
    }
    CentralityScores {
        values,
        converged: true,
        iterations: 0,
    }
}

// ── Eigenvector ───────────────────────────────────────────────────

struct PowerRun {
    values: Vec<f64>,
    error: f64,
    iterations: usize,
    converged: bool,
}

/// Power iteration on (A + I) following in-edges, L2-normalised each step.
fn eigenvector_run(graph: &TransferGraph, max_iterations: usize, tolerance: f64) -> PowerRun {
    let n = graph.node_count();
    let nf = n as f64;
    let mut x = vec![1.0 / nf; n];
    let mut error = f64::INFINITY;

    for iteration in 1..=max_iterations {
        let mut next = x.clone();
        for v in 0..n {
            for (t, e) in graph.out_edges(v) {
                next[*t] += x[v] * e.weight;
            }
        }
        let norm = next.iter().map(|z| z * z).sum::<f64>().sqrt();
        let norm = if norm == 0.0 { 1.0 } else { norm };
        for z in &mut next {
            *z /= norm;
        }
        error = next.iter().zip(&x).map(|(a, b)| (a - b).abs()).sum();
        x = next;
        if error < nf * tolerance {
            return PowerRun {
                values: x,
                error,
                iterations: iteration,
                converged: true,
            };
        }
    }
    PowerRun {
        values: x,
        error,
        iterations: max_iterations,
        converged: false,
    }
}

/// Weighted eigenvector centrality. On failure, retries once with a looser
/// budget; if that also fails, the iterate with the smaller final error is
/// returned and marked unconverged.
pub fn eigenvector(graph: &TransferGraph) -> CentralityScores {
    if graph.is_empty() {
        return CentralityScores::exact(Vec::new());
    }
    let first = eigenvector_run(graph, EIGENVECTOR_MAX_ITERATIONS, EIGENVECTOR_TOLERANCE);
    if first.converged {
        log::debug!("Eigenvector converged after {} iterations", first.iterations);
        return CentralityScores {
            values: first.values.into_iter().map(Some).collect(),
            converged: true,
            iterations: first.iterations,
        };
    }

    log::warn!("Eigenvector did not converge; retrying with a looser tolerance");
    let retry = eigenvector_run(
        graph,
        EIGENVECTOR_RETRY_MAX_ITERATIONS,
        EIGENVECTOR_RETRY_TOLERANCE,
    );
    let iterations = first.iterations + retry.iterations;
    if retry.converged {
        return CentralityScores {
            values: retry.values.into_iter().map(Some).collect(),
            converged: true,
            iterations,
        };
    }

    log::warn!("Eigenvector retry did not converge; returning best partial scores");
    best_partial(first, retry, iterations)
}

/// The unconverged run with the smaller final error.
fn best_partial(first: PowerRun, retry: PowerRun, iterations: usize) -> CentralityScores {
    let best = if retry.error < first.error { retry } else { first };
    CentralityScores {
        values: best.values.into_iter().map(Some).collect(),
        converged: false,
        iterations,
    }
}

pub fn compute(graph: &TransferGraph, kind: CentralityKind) -> CentralityScores {
    match kind {
        CentralityKind::PageRank    => pagerank(graph),
        CentralityKind::Betweenness => betweenness(graph),
        CentralityKind::Closeness   => closeness(graph),
        CentralityKind::Eigenvector => eigenvector(graph),
    }
}

// ── Ranking ───────────────────────────────────────────────────────

/// Top-N accounts by score, each annotated with its account info.
pub fn rank<D: AccountDirectory + ?Sized>(
    graph: &TransferGraph,
    directory: &D,
    kind: CentralityKind,
    scores: &CentralityScores,
    top_n: usize,
) -> GraphResult<CentralityReport> {
    let mut accounts = Vec::new();
    for (position, (node, score)) in scores.top(top_n).into_iter().enumerate() {
        accounts.push(RankedAccount {
            rank: position + 1,
            score,
            account: directory.account_info(graph.id(node))?,
        });
    }
    log::info!(
        "{} ranked {} of {} accounts",
        kind.as_str(),
        accounts.len(),
        scores.scored_nodes()
    );
    Ok(CentralityReport {
        algorithm: kind,
        converged: scores.converged,
        iterations: scores.iterations,
        scored_nodes: scores.scored_nodes(),
        accounts,
    })
}

// ── Single account ────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CentralityValues {
    pub pagerank: f64,
    pub betweenness: f64,
    /// Absent when the account lies outside the largest strong component.
    pub closeness: Option<f64>,
    pub eigenvector: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NetworkPosition {
    /// Distinct accounts sending to this one.
    pub in_degree: usize,
    /// Distinct accounts this one sends to.
    pub out_degree: usize,
    pub total_degree: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AccountCentralities {
    pub account_id: AccountId,
    pub centrality_scores: CentralityValues,
    pub network_position: NetworkPosition,
    pub pagerank_converged: bool,
    pub eigenvector_converged: bool,
    pub account: AccountInfo,
}

/// All four scores for one account, computed on the same snapshot.
pub fn account_centralities<D: AccountDirectory + ?Sized>(
    graph: &TransferGraph,
    directory: &D,
    account_id: &str,
) -> GraphResult<Lookup<AccountCentralities>> {
    let Some(node) = graph.index_of(account_id) else {
        log::info!("Account {account_id} not present in snapshot");
        return Ok(Lookup::not_found(account_id));
    };

    let pr = pagerank(graph);
    let bc = betweenness(graph);
    let cc = closeness(graph);
    let ev = eigenvector(graph);

    let in_degree = graph.in_degree(node);
    let out_degree = graph.out_degree(node);
    Ok(Lookup::Found(AccountCentralities {
        account_id: account_id.to_string(),
        centrality_scores: CentralityValues {
            pagerank: pr.get(node).unwrap_or(0.0),
            betweenness: bc.get(node).unwrap_or(0.0),
            closeness: cc.get(node),
            eigenvector: ev.get(node).unwrap_or(0.0),
        },
        network_position: NetworkPosition {
            in_degree,
            out_degree,
            total_degree: in_degree + out_degree,
        },
        pagerank_converged: pr.converged,
        eigenvector_converged: ev.converged,
        account: directory.account_info(account_id)?,
    }))
}
