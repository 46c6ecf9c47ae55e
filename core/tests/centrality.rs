//! Centrality rankings through the engine.

mod common;

use common::{at_hour, engine, star, transfer};
use fincrime_graph::{
    centrality::{self, CentralityKind},
    graph::GraphBuilder,
};

/// PageRank sums to one over the whole graph, not just the reported top-N.
#[test]
fn pagerank_sums_to_one() {
    let engine = engine();
    star(&engine);
    transfer(&engine, "X1", "B", "C", 40.0, at_hour(6));
    transfer(&engine, "X2", "C", "A", 70.0, at_hour(7));

    let snapshot = GraphBuilder::build(engine.store(), true, None).unwrap();
    let scores = centrality::pagerank(&snapshot.graph);
    let total: f64 = scores.values.iter().flatten().sum();
    assert!((total - 1.0).abs() < 1e-6, "PageRank total was {total}");
    assert!(scores.converged);
}

/// Star A→B..F: the hub has no incoming rank and sits below every leaf.
#[test]
fn star_hub_ranks_below_leaves() {
    let engine = engine();
    star(&engine);

    let report = engine.pagerank(10).unwrap();
    assert_eq!(report.accounts.len(), 6);
    let last = report.accounts.last().unwrap();
    assert_eq!(last.account.account_id, "A", "hub must rank last");
    for leaf in &report.accounts[..5] {
        assert!(leaf.score > last.score);
    }
}

/// Top-N is bounded, strictly ordered, and ties break by identifier.
#[test]
fn top_n_ordering_and_tie_break() {
    let engine = engine();
    star(&engine);

    let report = engine.pagerank(3).unwrap();
    assert_eq!(report.accounts.len(), 3);
    assert_eq!(report.scored_nodes, 6);
    let ids: Vec<&str> = report
        .accounts
        .iter()
        .map(|a| a.account.account_id.as_str())
        .collect();
    assert_eq!(ids, ["B", "C", "D"], "equal leaves must be ordered by id");
    let ranks: Vec<usize> = report.accounts.iter().map(|a| a.rank).collect();
    assert_eq!(ranks, [1, 2, 3]);
    for pair in report.accounts.windows(2) {
        assert!(pair[0].score >= pair[1].score);
    }
}

/// Closeness never scores a node outside the largest strong component.
#[test]
fn closeness_restricted_to_largest_scc() {
    let engine = engine();
    // Cycle A→B→C→A plus tails D→A and C→E.
    transfer(&engine, "T1", "A", "B", 1.0, at_hour(0));
    transfer(&engine, "T2", "B", "C", 1.0, at_hour(1));
    transfer(&engine, "T3", "C", "A", 1.0, at_hour(2));
    transfer(&engine, "T4", "D", "A", 1.0, at_hour(3));
    transfer(&engine, "T5", "C", "E", 1.0, at_hour(4));

    let report = engine.closeness(10).unwrap();
    let mut ids: Vec<&str> = report
        .accounts
        .iter()
        .map(|a| a.account.account_id.as_str())
        .collect();
    ids.sort_unstable();
    assert_eq!(ids, ["A", "B", "C"]);
    assert_eq!(report.scored_nodes, 3);
}

/// The bridge of a path has the highest betweenness.
#[test]
fn betweenness_finds_the_bridge() {
    let engine = engine();
    transfer(&engine, "T1", "A", "B", 1.0, at_hour(0));
    transfer(&engine, "T2", "B", "C", 1.0, at_hour(1));

    let report = engine.betweenness(1).unwrap();
    assert_eq!(report.algorithm, CentralityKind::Betweenness);
    assert_eq!(report.accounts[0].account.account_id, "B");
    assert!((report.accounts[0].score - 0.5).abs() < 1e-12);
}

/// Eigenvector scores are L2-normalised.
#[test]
fn eigenvector_is_normalised() {
    let engine = engine();
    transfer(&engine, "T1", "A", "B", 5.0, at_hour(0));
    transfer(&engine, "T2", "B", "C", 5.0, at_hour(1));
    transfer(&engine, "T3", "C", "A", 5.0, at_hour(2));

    let snapshot = GraphBuilder::build(engine.store(), true, None).unwrap();
    let scores = centrality::eigenvector(&snapshot.graph);
    let norm: f64 = scores.values.iter().flatten().map(|v| v * v).sum::<f64>().sqrt();
    assert!((norm - 1.0).abs() < 1e-6, "norm was {norm}");
}

/// Single-account lookup reports all four measures, or NotFound.
#[test]
fn account_centralities_lookup() {
    let engine = engine();
    star(&engine);

    let found = engine.account_centralities("A").unwrap().found().unwrap();
    assert_eq!(found.network_position.out_degree, 5);
    assert_eq!(found.network_position.in_degree, 0);

    // Every component is a singleton; the tie goes to A, so B is unscored.
    let leaf = engine.account_centralities("B").unwrap().found().unwrap();
    assert_eq!(leaf.centrality_scores.closeness, None);

    assert!(!engine.account_centralities("NOPE").unwrap().is_found());
}
