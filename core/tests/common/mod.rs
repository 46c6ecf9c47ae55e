//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use chrono::{TimeZone, Utc};
use fincrime_graph::{engine::GraphAnalysisEngine, store::NewTransfer, types::Timestamp};

/// 2024-03-01 00:00:00 UTC in epoch milliseconds.
pub const BASE_MS: i64 = 1_709_251_200_000;
pub const HOUR_MS: i64 = 3_600_000;

pub fn init_logging() {
    let _ = env_logger::Builder::from_default_env()
        .is_test(true)
        .try_init();
}

/// Engine over an empty, migrated in-memory store.
pub fn engine() -> GraphAnalysisEngine {
    init_logging();
    GraphAnalysisEngine::build_test().expect("test engine")
}

pub fn at_hour(hour: i64) -> Option<i64> {
    Some(BASE_MS + hour * HOUR_MS)
}

pub fn base_time() -> Timestamp {
    Utc.timestamp_millis_opt(BASE_MS).unwrap()
}

/// Record one transfer, creating both endpoint accounts if needed.
pub fn transfer(
    engine: &GraphAnalysisEngine,
    id: &str,
    source: &str,
    target: &str,
    amount: f64,
    occurred_at_ms: Option<i64>,
) {
    record(engine, id, source, target, amount, occurred_at_ms, false);
}

pub fn suspicious_transfer(
    engine: &GraphAnalysisEngine,
    id: &str,
    source: &str,
    target: &str,
    amount: f64,
    occurred_at_ms: Option<i64>,
) {
    record(engine, id, source, target, amount, occurred_at_ms, true);
}

fn record(
    engine: &GraphAnalysisEngine,
    id: &str,
    source: &str,
    target: &str,
    amount: f64,
    occurred_at_ms: Option<i64>,
    is_suspicious: bool,
) {
    let store = engine.store();
    store.ensure_account(source).unwrap();
    store.ensure_account(target).unwrap();
    store
        .insert_transfer(&NewTransfer {
            transfer_id: id,
            source_account: source,
            target_account: target,
            amount,
            occurred_at_ms,
            is_suspicious,
            typology: is_suspicious.then_some("layering"),
        })
        .unwrap();
}

/// Star: A sends to B, C, D, E and F, one hour apart.
pub fn star(engine: &GraphAnalysisEngine) {
    for (i, leaf) in ["B", "C", "D", "E", "F"].iter().enumerate() {
        transfer(engine, &format!("S{i}"), "A", leaf, 100.0, at_hour(i as i64));
    }
}

/// Ten distinct senders each pay HUB once.
pub fn fan_in(engine: &GraphAnalysisEngine) {
    for i in 0..10 {
        transfer(
            engine,
            &format!("F{i}"),
            &format!("SRC{i:02}"),
            "HUB",
            250.0,
            at_hour(i),
        );
    }
}
