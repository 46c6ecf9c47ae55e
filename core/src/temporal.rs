//! Time-based views of the transfer stream.
//!
//! Windows show how the network grows and densifies over time. Bursts flag
//! calendar hours whose activity sits far above the baseline of all
//! observed hours.
//!
//! RULE: only timestamped transfers take part. Buckets are aligned to the
//! Unix epoch in UTC, never to the first transfer.

use crate::{
    graph::{GraphBuilder, GraphSnapshot, Transfer},
    types::{RiskTier, TimeRange, Timestamp},
};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Windows that get a sub-graph; later buckets are only counted.
pub const MAX_ANALYSED_WINDOWS: usize = 10;
/// Bursts above mean + this many standard deviations are CRITICAL.
pub const CRITICAL_BURST_STD: f64 = 3.0;

const MS_PER_HOUR: i64 = 3_600_000;

/// Count and summed amount of the transfers in one bucket.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct Bucket {
    count: usize,
    volume: f64,
}

/// Group timestamped transfers by `floor(ms / width) * width`.
fn bucket_by(snapshot: &GraphSnapshot, width_ms: i64) -> BTreeMap<i64, Bucket> {
    let mut buckets: BTreeMap<i64, Bucket> = BTreeMap::new();
    for (t, ts) in snapshot.timed_transfers() {
        let start = ts.timestamp_millis().div_euclid(width_ms) * width_ms;
        let bucket = buckets.entry(start).or_default();
        bucket.count += 1;
        bucket.volume += t.amount;
    }
    buckets
}

fn instant(ms: i64) -> Option<Timestamp> {
    DateTime::<Utc>::from_timestamp_millis(ms)
}

// ── Time windows ──────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WindowEntry {
    pub window_start: Timestamp,
    pub window_end: Timestamp,
    pub transaction_count: usize,
    pub total_volume: f64,
    pub unique_accounts: usize,
    pub network_edges: usize,
    pub network_density: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WindowReport {
    pub window_size_hours: u32,
    /// Buckets with at least one transfer, including those not analysed.
    pub total_buckets: usize,
    pub total_windows: usize,
    pub windows: Vec<WindowEntry>,
}

/// Per-window activity and network shape for the earliest windows.
///
/// A window's sub-graph covers `[start, start + window]` inclusive, so a
/// transfer exactly on the boundary shows in both neighbouring sub-graphs
/// while it is counted in one bucket only.
pub fn time_windows(snapshot: &GraphSnapshot, window_hours: u32) -> WindowReport {
    let width_ms = i64::from(window_hours) * MS_PER_HOUR;
    let buckets = bucket_by(snapshot, width_ms);

    let mut windows = Vec::new();
    for (&start_ms, bucket) in buckets.iter().take(MAX_ANALYSED_WINDOWS) {
        let Some(start) = instant(start_ms) else {
            continue;
        };
        let end = start + Duration::hours(i64::from(window_hours));
        let range = TimeRange::new(start, end);
        let inside: Vec<Transfer> = snapshot
            .timed_transfers()
            .filter(|(_, ts)| range.contains(*ts))
            .map(|(t, _)| t.clone())
            .collect();
        let sub = GraphBuilder::from_transfers(inside, true, Some(range));

        windows.push(WindowEntry {
            window_start: start,
            window_end: end,
            transaction_count: bucket.count,
            total_volume: bucket.volume,
            unique_accounts: sub.graph.node_count(),
            network_edges: sub.graph.edge_count(),
            network_density: sub.graph.density(),
        });
    }

    log::info!(
        "Time windows ({window_hours}h): analysed {} of {} buckets",
        windows.len(),
        buckets.len()
    );
    WindowReport {
        window_size_hours: window_hours,
        total_buckets: buckets.len(),
        total_windows: windows.len(),
        windows,
    }
}

// ── Bursts ────────────────────────────────────────────────────────

/// Mean and sample standard deviation (n − 1). The deviation is `None`
/// for fewer than two values.
pub fn mean_and_std(values: &[f64]) -> (f64, Option<f64>) {
    let n = values.len();
    if n == 0 {
        return (0.0, None);
    }
    let mean = values.iter().sum::<f64>() / n as f64;
    if n < 2 {
        return (mean, None);
    }
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
    (mean, Some(var.sqrt()))
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BaselineStats {
    pub observed_hours: usize,
    pub mean_transactions: f64,
    /// 0 when fewer than two hours were observed.
    pub std_transactions: f64,
    pub mean_volume: f64,
    pub std_volume: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Burst {
    /// Start of the calendar hour (UTC).
    pub hour: Timestamp,
    pub transaction_count: usize,
    pub total_volume: f64,
    /// z-score of the count; 0 when the deviation is 0 or undefined.
    pub deviation_tx: f64,
    pub deviation_volume: f64,
    pub severity: RiskTier,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BurstReport {
    pub threshold_std: f64,
    pub baseline_stats: BaselineStats,
    pub total_bursts: usize,
    pub bursts: Vec<Burst>,
}

/// One side (count or volume) of the burst test.
struct Criterion {
    mean: f64,
    std: Option<f64>,
}

impl Criterion {
    fn new(values: &[f64]) -> Self {
        let (mean, std) = mean_and_std(values);
        // A zero deviation disables the criterion, same as an undefined one.
        Self {
            mean,
            std: std.filter(|s| *s > 0.0),
        }
    }

    fn exceeds(&self, value: f64, k: f64) -> bool {
        self.std.is_some_and(|s| value > self.mean + k * s)
    }

    fn z(&self, value: f64) -> f64 {
        self.std.map_or(0.0, |s| (value - self.mean) / s)
    }
}

/// Calendar hours whose count or volume exceeds mean + `threshold_std`·std
/// of all observed hours.
pub fn bursts(snapshot: &GraphSnapshot, threshold_std: f64) -> BurstReport {
    let hours = bucket_by(snapshot, MS_PER_HOUR);
    let counts: Vec<f64> = hours.values().map(|b| b.count as f64).collect();
    let volumes: Vec<f64> = hours.values().map(|b| b.volume).collect();
    let tx = Criterion::new(&counts);
    let vol = Criterion::new(&volumes);

    let mut found = Vec::new();
    for (&start_ms, bucket) in &hours {
        let count = bucket.count as f64;
        if !(tx.exceeds(count, threshold_std) || vol.exceeds(bucket.volume, threshold_std)) {
            continue;
        }
        let Some(hour) = instant(start_ms) else {
            continue;
        };
        let severity = if tx.exceeds(count, CRITICAL_BURST_STD) {
            RiskTier::Critical
        } else {
            RiskTier::High
        };
        found.push(Burst {
            hour,
            transaction_count: bucket.count,
            total_volume: bucket.volume,
            deviation_tx: tx.z(count),
            deviation_volume: vol.z(bucket.volume),
            severity,
        });
    }

    log::info!(
        "Bursts (threshold {threshold_std} std): {} of {} hours",
        found.len(),
        hours.len()
    );
    BurstReport {
        threshold_std,
        baseline_stats: BaselineStats {
            observed_hours: hours.len(),
            mean_transactions: tx.mean,
            std_transactions: tx.std.unwrap_or(0.0),
            mean_volume: vol.mean,
            std_volume: vol.std.unwrap_or(0.0),
        },
        total_bursts: found.len(),
        bursts: found,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_std_uses_n_minus_one() {
        let (mean, std) = mean_and_std(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);
        assert_eq!(mean, 5.0);
        let expected = (32.0f64 / 7.0).sqrt();
        assert!((std.unwrap() - expected).abs() < 1e-12);
    }

    #[test]
    fn single_value_has_no_deviation() {
        assert_eq!(mean_and_std(&[3.0]), (3.0, None));
        assert_eq!(mean_and_std(&[]), (0.0, None));
    }

    #[test]
    fn zero_deviation_disables_criterion() {
        let c = Criterion::new(&[4.0, 4.0, 4.0]);
        assert!(!c.exceeds(100.0, 1.0));
        assert_eq!(c.z(100.0), 0.0);
    }
}
