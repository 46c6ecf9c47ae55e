//! Fan patterns, suspicious cycles, account and customer risk.

mod common;

use chrono::Duration;
use common::{at_hour, base_time, engine, fan_in, suspicious_transfer, transfer};
use fincrime_graph::{patterns::FanDirection, types::RiskTier};

/// Ten distinct senders into HUB inside the window form a fan-in.
#[test]
fn fan_in_hub_is_detected() {
    let engine = engine();
    fan_in(&engine);

    let as_of = base_time() + Duration::hours(12);
    let patterns = engine.fan_in_patterns(as_of).unwrap();
    assert_eq!(patterns.len(), 1);
    let hub = &patterns[0];
    assert_eq!(hub.account_id, "HUB");
    assert_eq!(hub.direction, FanDirection::In);
    assert_eq!(hub.counterparties, 10);
    assert_eq!(hub.total_amount, 2500.0);
    assert_eq!(hub.counterparty_ids.first().map(String::as_str), Some("SRC00"));

    assert!(engine.fan_out_patterns(as_of).unwrap().is_empty());
}

/// Transfers after `as_of` or older than the window do not count.
#[test]
fn fan_window_is_bounded() {
    let engine = engine();
    fan_in(&engine);

    let before = base_time() - Duration::hours(1);
    assert!(engine.fan_in_patterns(before).unwrap().is_empty());
    let long_after = base_time() + Duration::days(60);
    assert!(engine.fan_in_patterns(long_after).unwrap().is_empty());
}

/// Only flagged transfers form suspicious cycles.
#[test]
fn suspicious_cycles_use_flagged_transfers() {
    let engine = engine();
    suspicious_transfer(&engine, "T1", "A", "B", 100.0, at_hour(0));
    suspicious_transfer(&engine, "T2", "B", "C", 200.0, at_hour(1));
    suspicious_transfer(&engine, "T3", "C", "A", 300.0, at_hour(2));
    transfer(&engine, "T4", "X", "Y", 50.0, at_hour(3));
    transfer(&engine, "T5", "Y", "Z", 50.0, at_hour(4));
    transfer(&engine, "T6", "Z", "X", 50.0, at_hour(5));

    let cycles = engine.suspicious_cycles(3, 6).unwrap();
    assert_eq!(cycles.len(), 1);
    assert_eq!(cycles[0].accounts, ["A", "B", "C"]);
    assert_eq!(cycles[0].cycle_length, 3);
    assert_eq!(cycles[0].total_amount, 600.0);

    assert!(engine.suspicious_cycles(4, 6).unwrap().is_empty());
}

/// Repeated flagged transfers on one hop merge into a single cycle.
#[test]
fn parallel_flagged_transfers_merge_into_one_cycle() {
    let engine = engine();
    suspicious_transfer(&engine, "T1", "A", "B", 100.0, at_hour(0));
    suspicious_transfer(&engine, "T2", "A", "B", 150.0, at_hour(1));
    suspicious_transfer(&engine, "T3", "B", "C", 200.0, at_hour(2));
    suspicious_transfer(&engine, "T4", "C", "A", 300.0, at_hour(3));

    let cycles = engine.suspicious_cycles(3, 6).unwrap();
    assert_eq!(cycles.len(), 1);
    assert_eq!(cycles[0].accounts, ["A", "B", "C"]);
    assert_eq!(cycles[0].total_amount, 750.0);
}

/// Known accounts without transfers get a zero profile; unknown ones are NotFound.
#[test]
fn account_risk_lookup() {
    let engine = engine();
    suspicious_transfer(&engine, "T1", "A", "B", 100.0, at_hour(0));
    transfer(&engine, "T2", "B", "A", 300.0, at_hour(1));
    engine.store().ensure_account("IDLE").unwrap();

    let a = engine.account_risk("A").unwrap().found().unwrap();
    assert_eq!(a.suspicious_out, 1);
    assert_eq!(a.incoming_count, 1);
    assert_eq!(a.avg_incoming, Some(300.0));
    assert_eq!(a.suspicion_ratio, 0.5);

    let idle = engine.account_risk("IDLE").unwrap().found().unwrap();
    assert_eq!(idle.outgoing_count + idle.incoming_count, 0);
    assert_eq!(idle.suspicion_ratio, 0.0);

    assert!(!engine.account_risk("GHOST").unwrap().is_found());
}

/// Mean suspicion over the customer's accounts drives the tier.
#[test]
fn customer_risk_assessment() {
    let engine = engine();
    let store = engine.store();
    store.insert_customer("C1", "Shell Holdings", "business", Some("PA")).unwrap();
    store.insert_account("ACC1", Some("C1"), "checking", false).unwrap();
    store.insert_account("ACC2", Some("C1"), "savings", false).unwrap();
    suspicious_transfer(&engine, "T1", "ACC1", "X", 5000.0, at_hour(0));
    suspicious_transfer(&engine, "T2", "ACC1", "Y", 5000.0, at_hour(1));
    transfer(&engine, "T3", "ACC2", "Z", 100.0, at_hour(2));

    let as_of = base_time() + Duration::days(1);
    let assessment = engine.customer_risk("C1", as_of).unwrap().found().unwrap();
    assert_eq!(assessment.overall_risk_score, 0.5);
    assert_eq!(assessment.risk_level, RiskTier::Medium);
    assert_eq!(assessment.network_metrics.total_accounts, 2);
    assert_eq!(assessment.network_metrics.accounts_with_risk, 1);
    assert_eq!(assessment.risk_factors.len(), 1);
    assert_eq!(assessment.risk_factors[0].account_id, "ACC1");
    assert_eq!(assessment.risk_factors[0].count, 2);
    assert!(assessment.recommendations[0].starts_with("MEDIUM RISK"));
}

/// Unknown customers and customers without accounts are NotFound.
#[test]
fn customer_risk_not_found() {
    let engine = engine();
    engine.store().insert_customer("EMPTY", "Nobody", "individual", None).unwrap();
    let as_of = base_time();
    assert!(!engine.customer_risk("MISSING", as_of).unwrap().is_found());
    assert!(!engine.customer_risk("EMPTY", as_of).unwrap().is_found());
}

/// Store-wide counts and the typology breakdown.
#[test]
fn network_statistics_counts() {
    let engine = engine();
    engine.store().insert_customer("C1", "Acme", "business", None).unwrap();
    suspicious_transfer(&engine, "T1", "A", "B", 100.0, at_hour(0));
    transfer(&engine, "T2", "B", "C", 100.0, at_hour(1));
    transfer(&engine, "T3", "C", "D", 100.0, at_hour(2));
    transfer(&engine, "T4", "D", "A", 100.0, at_hour(3));

    let stats = engine.network_statistics().unwrap();
    assert_eq!(stats.total_customers, 1);
    assert_eq!(stats.total_accounts, 4);
    assert_eq!(stats.total_transactions, 4);
    assert_eq!(stats.suspicious_transactions, 1);
    assert_eq!(stats.suspicious_percentage, 25.0);
    assert_eq!(stats.typologies.len(), 1);
    assert_eq!(stats.typologies[0].typology, "layering");
}

/// Two-hop fixture around C1's ACC1:
/// ACC1 → M1, M2 → ACC1, M1 → M2, M1 → FAR, FAR → EDGE.
fn two_hop_network(engine: &fincrime_graph::engine::GraphAnalysisEngine) {
    let store = engine.store();
    store.insert_customer("C1", "Shell Holdings", "business", None).unwrap();
    store.insert_account("ACC1", Some("C1"), "checking", false).unwrap();
    store.insert_account("ACC9", Some("C1"), "savings", false).unwrap();
    suspicious_transfer(engine, "T1", "ACC1", "M1", 900.0, at_hour(0));
    transfer(engine, "T2", "M2", "ACC1", 100.0, at_hour(1));
    transfer(engine, "T3", "M1", "M2", 100.0, at_hour(2));
    transfer(engine, "T4", "M1", "FAR", 100.0, at_hour(3));
    transfer(engine, "T5", "FAR", "EDGE", 100.0, at_hour(4));
}

/// Depth bounds both the reached accounts and the edges between them.
#[test]
fn customer_network_respects_depth() {
    let engine = engine();
    two_hop_network(&engine);
    engine.recompute_risk_scores().unwrap();

    let one = engine.customer_network("C1", 1).unwrap().found().unwrap();
    let ids: Vec<&str> = one.nodes.iter().map(|n| n.account_id.as_str()).collect();
    assert_eq!(ids, ["ACC1", "ACC9", "M1", "M2"]);
    assert_eq!(one.node_count, 4);
    let edges: Vec<&str> = one.edges.iter().map(|e| e.transfer_id.as_str()).collect();
    assert_eq!(edges, ["T1", "T2"]);
    assert_eq!(one.edge_count, 2);
    assert!(one.edges[0].suspicious);
    assert_eq!(one.edges[0].amount, 900.0);

    let acc1 = &one.nodes[0];
    assert!(acc1.is_customer_account);
    assert_eq!(acc1.distance, 0);
    assert_eq!(acc1.risk_score, Some(0.5));
    assert!(one.nodes[1].is_customer_account);
    assert!(!one.nodes[2].is_customer_account);

    let two = engine.customer_network("C1", 2).unwrap().found().unwrap();
    assert_eq!(two.node_count, 5);
    assert_eq!(two.nodes.last().map(|n| (n.account_id.as_str(), n.distance)), Some(("FAR", 2)));
    let edges: Vec<&str> = two.edges.iter().map(|e| e.transfer_id.as_str()).collect();
    assert_eq!(edges, ["T1", "T2", "T3", "T4"]);

    let three = engine.customer_network("C1", 3).unwrap().found().unwrap();
    assert_eq!((three.node_count, three.edge_count), (6, 5));
}

/// Unknown customers are NotFound; depth outside 1..=3 is rejected.
#[test]
fn customer_network_lookup_and_depth_checks() {
    let engine = engine();
    two_hop_network(&engine);
    assert!(!engine.customer_network("MISSING", 2).unwrap().is_found());
    assert!(engine.customer_network("C1", 0).is_err());
    assert!(engine.customer_network("C1", 4).is_err());
}
