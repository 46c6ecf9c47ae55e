//! Materialises a point-in-time snapshot from the transaction store.
//!
//! RULE: a snapshot is built once per request and shared read-only by every
//! analysis in that request. A store failure aborts the build; there is no
//! partial snapshot.

use super::{EdgeData, TransferGraph};
use crate::{
    error::GraphResult,
    store::{GraphStore, TransferRow},
    types::{AccountId, TimeRange, Timestamp},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One money movement between two accounts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transfer {
    pub transfer_id: String,
    pub source: AccountId,
    pub target: AccountId,
    pub amount: f64,
    pub timestamp: Option<Timestamp>,
    pub suspicious: bool,
    pub typology: Option<String>,
}

impl Transfer {
    fn from_row(row: TransferRow) -> Self {
        let timestamp = row.occurred_at_ms.and_then(|ms| {
            let ts = DateTime::<Utc>::from_timestamp_millis(ms);
            if ts.is_none() {
                log::warn!(
                    "Transfer {} has an out-of-range timestamp ({ms} ms); treating it as untimed",
                    row.transfer_id
                );
            }
            ts
        });
        Self {
            transfer_id: row.transfer_id,
            source: row.source_account,
            target: row.target_account,
            amount: row.amount,
            timestamp,
            suspicious: row.is_suspicious,
            typology: row.typology,
        }
    }
}

/// Immutable graph plus the raw transfers it was built from.
#[derive(Debug, Clone)]
pub struct GraphSnapshot {
    pub graph: TransferGraph,
    /// Every valid transfer in the snapshot, in store order.
    pub transfers: Vec<Transfer>,
    pub time_range: Option<TimeRange>,
    /// Transfers dropped for a non-positive amount.
    pub skipped: usize,
}

impl GraphSnapshot {
    /// Transfers carrying a timestamp.
    pub fn timed_transfers(&self) -> impl Iterator<Item = (&Transfer, Timestamp)> + '_ {
        self.transfers
            .iter()
            .filter_map(|t| t.timestamp.map(|ts| (t, ts)))
    }
}

pub struct GraphBuilder;

impl GraphBuilder {
    /// Fetch transfers from the store and build a snapshot.
    ///
    /// With `include_amounts`, parallel transfers between the same ordered
    /// pair merge into one edge whose weight is their summed amount. Without
    /// it, they collapse into a single presence edge of weight 1.
    pub fn build(
        store: &GraphStore,
        include_amounts: bool,
        time_range: Option<TimeRange>,
    ) -> GraphResult<GraphSnapshot> {
        let rows = store.fetch_transfers(time_range)?;
        let transfers = rows.into_iter().map(Transfer::from_row).collect();
        let snapshot = Self::from_transfers(transfers, include_amounts, time_range);
        log::info!(
            "Graph built: {} nodes, {} edges ({} transfers, {} skipped)",
            snapshot.graph.node_count(),
            snapshot.graph.edge_count(),
            snapshot.transfers.len(),
            snapshot.skipped,
        );
        Ok(snapshot)
    }

    /// Build a snapshot from transfers already in memory. When `time_range`
    /// is set, only timestamped transfers inside it (inclusive) are kept.
    pub fn from_transfers(
        transfers: Vec<Transfer>,
        include_amounts: bool,
        time_range: Option<TimeRange>,
    ) -> GraphSnapshot {
        let mut kept = Vec::with_capacity(transfers.len());
        let mut skipped = 0usize;
        for t in transfers {
            if let Some(range) = time_range {
                match t.timestamp {
                    Some(ts) if range.contains(ts) => {}
                    _ => continue,
                }
            }
            if t.amount.is_nan() || t.amount <= 0.0 {
                log::warn!(
                    "Skipping transfer {} ({} -> {}): non-positive amount {}",
                    t.transfer_id,
                    t.source,
                    t.target,
                    t.amount
                );
                skipped += 1;
                continue;
            }
            kept.push(t);
        }

        let mut edges: BTreeMap<(AccountId, AccountId), EdgeData> = BTreeMap::new();
        for t in &kept {
            let edge = edges
                .entry((t.source.clone(), t.target.clone()))
                .or_insert(EdgeData {
                    weight: 0.0,
                    count: 0,
                });
            if include_amounts {
                edge.weight += t.amount;
                edge.count += 1;
            } else {
                edge.weight = 1.0;
                edge.count = 1;
            }
        }

        GraphSnapshot {
            graph: TransferGraph::from_edges(edges, include_amounts),
            transfers: kept,
            time_range,
            skipped,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transfer(id: &str, source: &str, target: &str, amount: f64) -> Transfer {
        Transfer {
            transfer_id: id.to_string(),
            source: source.to_string(),
            target: target.to_string(),
            amount,
            timestamp: None,
            suspicious: false,
            typology: None,
        }
    }

    #[test]
    fn nan_and_non_positive_amounts_are_skipped() {
        let snapshot = GraphBuilder::from_transfers(
            vec![
                transfer("T1", "A", "B", 10.0),
                transfer("T2", "B", "C", f64::NAN),
                transfer("T3", "C", "D", -5.0),
                transfer("T4", "D", "E", 0.0),
            ],
            true,
            None,
        );
        assert_eq!(snapshot.skipped, 3);
        assert_eq!(snapshot.transfers.len(), 1);
        assert_eq!(snapshot.graph.edge_count(), 1);
        assert!(!snapshot.graph.contains("C"));
        assert!(snapshot.graph.out_edges(0).iter().all(|(_, e)| e.weight.is_finite()));
    }
}
