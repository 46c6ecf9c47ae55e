//! Shared primitive types used across every analysis.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A stable, unique account identifier as stored in the transaction store.
pub type AccountId = String;

/// A customer identifier as stored in the transaction store.
pub type CustomerId = String;

/// Point in time of a transfer. Always UTC.
pub type Timestamp = DateTime<Utc>;

/// Risk classification attached to accounts, node sets and chains.
///
/// Always derived from its inputs by the constructors in `risk.rs`;
/// never stored on its own.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskTier {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low      => "LOW",
            Self::Medium   => "MEDIUM",
            Self::High     => "HIGH",
            Self::Critical => "CRITICAL",
        }
    }

    /// HIGH or CRITICAL.
    pub fn is_elevated(&self) -> bool {
        *self >= Self::High
    }
}

/// Result of a single-entity query.
///
/// An account (or customer) with no presence in the current snapshot is a
/// normal outcome, not an error.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Lookup<T> {
    Found(T),
    NotFound { id: String },
}

impl<T> Lookup<T> {
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound { id: id.into() }
    }

    pub fn found(self) -> Option<T> {
        match self {
            Self::Found(v) => Some(v),
            Self::NotFound { .. } => None,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, Self::Found(_))
    }
}

/// Inclusive time bounds applied when materialising a snapshot.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct TimeRange {
    pub start: Timestamp,
    pub end:   Timestamp,
}

impl TimeRange {
    pub fn new(start: Timestamp, end: Timestamp) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, ts: Timestamp) -> bool {
        ts >= self.start && ts <= self.end
    }
}
