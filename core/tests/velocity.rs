//! Fund-velocity tracing through the engine.

mod common;

use common::{at_hour, engine, transfer, BASE_MS};
use fincrime_graph::types::RiskTier;

/// A→B→C→A, 1000 each, one hour apart.
#[test]
fn round_trip_chain_is_medium_risk() {
    let engine = engine();
    transfer(&engine, "T1", "A", "B", 1000.0, at_hour(0));
    transfer(&engine, "T2", "B", "C", 1000.0, at_hour(1));
    transfer(&engine, "T3", "C", "A", 1000.0, at_hour(2));

    let report = engine.velocity("A").unwrap().found().expect("A is in the graph");
    let chain = report
        .chains
        .iter()
        .find(|c| c.hops == 3)
        .expect("a 3-hop chain");
    assert_eq!(chain.accounts, ["A", "B", "C", "A"]);
    assert_eq!(chain.chain_length, 4);
    assert!((chain.total_time_hours - 2.0).abs() < 1e-12);
    assert_eq!(chain.total_amount, 3000.0);
    assert!((chain.velocity_per_hour - 1500.0).abs() < 1e-9);
    assert!((chain.avg_time_between_hops - 1.0).abs() < 1e-12);
    assert_eq!(chain.risk_level, RiskTier::Medium);
    assert_eq!(report.risk_level, RiskTier::Medium);
}

/// Chains whose hops share a timestamp have zero elapsed time and are dropped.
#[test]
fn zero_elapsed_chains_are_excluded() {
    let engine = engine();
    let same = Some(BASE_MS);
    transfer(&engine, "T1", "A", "B", 500.0, same);
    transfer(&engine, "T2", "B", "C", 500.0, same);

    let report = engine.velocity("A").unwrap().found().unwrap();
    assert_eq!(report.candidate_chains, 2);
    assert_eq!(report.total_chains, 0);
    assert!(report.chains.is_empty());
    assert_eq!(report.max_velocity_per_hour, 0.0);
    assert_eq!(report.risk_level, RiskTier::Low);
}

/// Fast, large flows within a day are CRITICAL.
#[test]
fn fast_large_flow_is_critical() {
    let engine = engine();
    transfer(&engine, "T1", "A", "B", 20_000.0, at_hour(0));
    transfer(&engine, "T2", "B", "C", 19_500.0, at_hour(1));

    let report = engine.velocity("A").unwrap().found().unwrap();
    assert_eq!(report.total_chains, 1);
    assert_eq!(report.chains[0].risk_level, RiskTier::Critical);
    assert_eq!(report.risk_level, RiskTier::Critical);
}

/// Untimed transfers never appear in a chain.
#[test]
fn untimed_transfers_are_ignored() {
    let engine = engine();
    transfer(&engine, "T1", "A", "B", 100.0, at_hour(0));
    transfer(&engine, "T2", "B", "C", 100.0, None);

    let report = engine.velocity("A").unwrap().found().unwrap();
    assert_eq!(report.candidate_chains, 1);
    assert_eq!(report.total_chains, 0);
}

/// Unknown accounts are reported as not found, not as an error.
#[test]
fn unknown_account_is_not_found() {
    let engine = engine();
    transfer(&engine, "T1", "A", "B", 100.0, at_hour(0));
    assert!(!engine.velocity("Z").unwrap().is_found());
}

/// Reported chains are ordered fastest first and capped.
#[test]
fn chains_sorted_fastest_first() {
    let engine = engine();
    for i in 0..8 {
        let mid = format!("M{i}");
        transfer(&engine, &format!("A{i}"), "A", &mid, 100.0 * (i + 1) as f64, at_hour(0));
        transfer(&engine, &format!("B{i}"), &mid, "Z", 100.0, at_hour(i + 1));
    }

    let report = engine.velocity("A").unwrap().found().unwrap();
    assert!(report.chains.len() <= 20);
    for pair in report.chains.windows(2) {
        assert!(pair[0].velocity_per_hour >= pair[1].velocity_per_hour);
    }
    assert_eq!(report.max_velocity_per_hour, report.chains[0].velocity_per_hour);
}
