//! Louvain and label propagation through the engine.

mod common;

use common::{at_hour, engine, star, transfer};
use fincrime_graph::{community::CommunityReport, engine::GraphAnalysisEngine, types::RiskTier};
use std::collections::BTreeSet;

/// Two triangles joined by a single edge.
fn two_triangles(engine: &GraphAnalysisEngine) {
    let edges = [
        ("A", "B"), ("B", "C"), ("C", "A"),
        ("X", "Y"), ("Y", "Z"), ("Z", "X"),
        ("C", "X"),
    ];
    for (i, (s, t)) in edges.iter().enumerate() {
        transfer(engine, &format!("T{i}"), s, t, 100.0, at_hour(i as i64));
    }
}

fn assert_exhaustive(report: &CommunityReport, nodes: usize) {
    let total: usize = report.communities.iter().map(|c| c.summary.total_members).sum();
    assert_eq!(total, nodes, "every node must be in exactly one community");
    let mut seen = BTreeSet::new();
    for c in &report.communities {
        for m in &c.summary.members {
            assert!(seen.insert(m.clone()), "{m} appears in two communities");
        }
    }
    assert_eq!(seen.len(), nodes);
}

/// Louvain separates the two triangles.
#[test]
fn louvain_splits_two_triangles() {
    let engine = engine();
    two_triangles(&engine);

    let report = engine.louvain_communities().unwrap();
    assert_exhaustive(&report, 6);
    assert_eq!(report.total_communities, 2);
    assert!(report.converged);
    let modularity = report.modularity.expect("Louvain reports modularity");
    assert!(modularity > 0.3, "modularity was {modularity}");
    let groups: BTreeSet<Vec<String>> = report
        .communities
        .iter()
        .map(|c| c.summary.members.clone())
        .collect();
    assert!(groups.contains(&vec!["A".to_string(), "B".into(), "C".into()]));
    assert!(groups.contains(&vec!["X".to_string(), "Y".into(), "Z".into()]));
}

/// The same seed gives the same partition.
#[test]
fn louvain_is_reproducible_with_fixed_seed() {
    let engine = engine();
    two_triangles(&engine);
    star(&engine);

    let first = engine.louvain_communities().unwrap();
    let second = engine.louvain_communities().unwrap();
    assert_eq!(first, second);
}

/// Label propagation also covers every node exactly once.
#[test]
fn label_propagation_is_exhaustive() {
    let engine = engine();
    two_triangles(&engine);
    star(&engine);

    let report = engine.label_propagation_communities().unwrap();
    assert_exhaustive(&report, 12);
    assert!(report.modularity.is_none());
    assert!(report.converged);
    assert!(
        report.communities.iter().all(|c| c.summary.total_volume.is_none()),
        "presence-only snapshot carries no volume"
    );
}

/// Communities are listed largest first.
#[test]
fn communities_sorted_by_size() {
    let engine = engine();
    two_triangles(&engine);
    star(&engine);

    let report = engine.louvain_communities().unwrap();
    for pair in report.communities.windows(2) {
        assert!(pair[0].summary.size >= pair[1].summary.size);
    }
    let ids: Vec<usize> = report.communities.iter().map(|c| c.community_id).collect();
    assert_eq!(ids, (0..report.communities.len()).collect::<Vec<_>>());
}

/// A community with more than 30 % flagged members is HIGH risk.
#[test]
fn flagged_members_raise_community_risk() {
    let engine = engine();
    let store = engine.store();
    store.insert_account("A", None, "checking", true).unwrap();
    store.insert_account("B", None, "checking", true).unwrap();
    two_triangles(&engine);

    let report = engine.louvain_communities().unwrap();
    let abc = report
        .communities
        .iter()
        .find(|c| c.summary.members.contains(&"A".to_string()))
        .unwrap();
    assert_eq!(abc.summary.suspicious_accounts, 2);
    assert_eq!(abc.summary.risk_level, RiskTier::High);
    let xyz = report
        .communities
        .iter()
        .find(|c| c.summary.members.contains(&"X".to_string()))
        .unwrap();
    assert_eq!(xyz.summary.risk_level, RiskTier::Low);
}
