//! Batch risk-score recomputation.

mod common;

use common::{at_hour, engine, suspicious_transfer, transfer};

/// Each score is the suspicious share of the transfers touching the account.
#[test]
fn scores_are_suspicious_share() {
    let engine = engine();
    suspicious_transfer(&engine, "T1", "A", "B", 100.0, at_hour(0));
    transfer(&engine, "T2", "B", "C", 100.0, at_hour(1));
    engine.store().ensure_account("D").unwrap();

    let updated = engine.recompute_risk_scores().unwrap();
    assert_eq!(updated, 4, "every account is rewritten, including idle ones");

    let store = engine.store();
    assert_eq!(store.risk_score("A").unwrap(), Some(1.0));
    assert_eq!(store.risk_score("B").unwrap(), Some(0.5));
    assert_eq!(store.risk_score("C").unwrap(), Some(0.0));
    assert_eq!(store.risk_score("D").unwrap(), Some(0.0));
}

/// Running the recomputation twice yields identical scores.
#[test]
fn recompute_is_idempotent() {
    let engine = engine();
    suspicious_transfer(&engine, "T1", "A", "B", 100.0, at_hour(0));
    transfer(&engine, "T2", "B", "C", 100.0, at_hour(1));
    transfer(&engine, "T3", "C", "A", 100.0, at_hour(2));
    suspicious_transfer(&engine, "T4", "C", "D", 100.0, at_hour(3));

    let ids = ["A", "B", "C", "D"];
    let first_count = engine.recompute_risk_scores().unwrap();
    let first: Vec<Option<f64>> = ids.iter().map(|id| engine.store().risk_score(id).unwrap()).collect();
    let second_count = engine.recompute_risk_scores().unwrap();
    let second: Vec<Option<f64>> = ids.iter().map(|id| engine.store().risk_score(id).unwrap()).collect();

    assert_eq!(first_count, second_count);
    assert_eq!(first, second);
}

/// Scores are unset until the first recomputation.
#[test]
fn scores_start_unset() {
    let engine = engine();
    transfer(&engine, "T1", "A", "B", 100.0, at_hour(0));
    assert_eq!(engine.store().risk_score("A").unwrap(), None);
    assert_eq!(engine.store().risk_score("UNKNOWN").unwrap(), None);
}
