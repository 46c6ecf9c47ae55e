use crate::error::{GraphError, GraphResult};
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::ops::RangeInclusive;

// ── Recognised ranges ─────────────────────────────────────────────

pub const TOP_N_RANGE: RangeInclusive<usize> = 1..=100;
pub const CLIQUE_MIN_SIZE_RANGE: RangeInclusive<usize> = 2..=10;
pub const WINDOW_HOURS_RANGE: RangeInclusive<u32> = 1..=168;
pub const BURST_THRESHOLD_RANGE: RangeInclusive<f64> = 1.0..=5.0;
pub const CYCLE_LENGTH_RANGE: RangeInclusive<usize> = 2..=6;
pub const FAN_WINDOW_DAYS_RANGE: RangeInclusive<i64> = 1..=3650;
pub const NETWORK_DEPTH_RANGE: RangeInclusive<usize> = 1..=3;

/// Tunables for a graph analysis engine.
///
/// Values here are the defaults used when a caller does not pass an
/// explicit parameter. Fixed cost caps (iteration limits, candidate caps)
/// live as constants next to the algorithm they bound.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AnalysisConfig {
    pub top_n: usize,
    pub clique_min_size: usize,
    pub window_hours: u32,
    pub burst_threshold_std: f64,
    /// Seed for Louvain and label propagation.
    pub seed: u64,
    pub fan_window_days: i64,
    pub fan_min_counterparties: usize,
    pub cycle_min_len: usize,
    pub cycle_max_len: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            top_n: 20,
            clique_min_size: 3,
            window_hours: 24,
            burst_threshold_std: 2.0,
            seed: 42,
            fan_window_days: 30,
            fan_min_counterparties: 5,
            cycle_min_len: 3,
            cycle_max_len: 6,
        }
    }
}

impl AnalysisConfig {
    /// Load from a JSON file. Missing keys fall back to the defaults.
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
        let config: AnalysisConfig = serde_json::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Cannot parse {path}: {e}"))?;
        config.validate()?;
        Ok(config)
    }

    /// Config with a fixed seed for use in tests.
    pub fn default_test() -> Self {
        Self {
            seed: 0x5EED,
            ..Self::default()
        }
    }

    /// Reject any default that lies outside its recognised range.
    pub fn validate(&self) -> GraphResult<()> {
        check_top_n(self.top_n)?;
        check_clique_min_size(self.clique_min_size)?;
        check_window_hours(self.window_hours)?;
        check_burst_threshold(self.burst_threshold_std)?;
        check_cycle_lengths(self.cycle_min_len, self.cycle_max_len)?;
        check_fan_window_days(self.fan_window_days)?;
        if self.fan_min_counterparties < 1 {
            return Err(invalid("fan_min_counterparties", self.fan_min_counterparties, "1.."));
        }
        Ok(())
    }
}

// ── Parameter checks ──────────────────────────────────────────────

pub fn check_top_n(top_n: usize) -> GraphResult<()> {
    check_range("top_n", top_n, &TOP_N_RANGE)
}

pub fn check_clique_min_size(min_size: usize) -> GraphResult<()> {
    check_range("min_size", min_size, &CLIQUE_MIN_SIZE_RANGE)
}

pub fn check_window_hours(hours: u32) -> GraphResult<()> {
    check_range("window_hours", hours, &WINDOW_HOURS_RANGE)
}

pub fn check_burst_threshold(threshold_std: f64) -> GraphResult<()> {
    // NaN fails `contains`, which is what we want.
    check_range("threshold_std", threshold_std, &BURST_THRESHOLD_RANGE)
}

pub fn check_cycle_lengths(min_len: usize, max_len: usize) -> GraphResult<()> {
    check_range("min_len", min_len, &CYCLE_LENGTH_RANGE)?;
    check_range("max_len", max_len, &CYCLE_LENGTH_RANGE)?;
    if min_len > max_len {
        return Err(invalid("min_len", min_len, format!("..={max_len}")));
    }
    Ok(())
}

pub fn check_fan_window_days(days: i64) -> GraphResult<()> {
    check_range("fan_window_days", days, &FAN_WINDOW_DAYS_RANGE)
}

pub fn check_network_depth(depth: usize) -> GraphResult<()> {
    check_range("depth", depth, &NETWORK_DEPTH_RANGE)
}

fn check_range<T>(name: &'static str, value: T, range: &RangeInclusive<T>) -> GraphResult<()>
where
    T: PartialOrd + Display,
{
    if range.contains(&value) {
        Ok(())
    } else {
        Err(invalid(
            name,
            value,
            format!("{}..={}", range.start(), range.end()),
        ))
    }
}

fn invalid(name: &'static str, value: impl Display, allowed: impl Into<String>) -> GraphError {
    GraphError::InvalidParameter {
        name,
        value: value.to_string(),
        allowed: allowed.into(),
    }
}
