//! Risk annotation shared by every analysis that reports on accounts or
//! node sets.
//!
//! RULE: risk tiers are always derived from counts and ratios at report
//! time. Nothing here is persisted.
//!
//! `AccountDirectory` is the seam between the algorithms and the external
//! store: algorithms see only suspicious-flag counts and per-account info.

use crate::{
    error::GraphResult,
    graph::TransferGraph,
    store::GraphStore,
    types::{AccountId, CustomerId, RiskTier},
};
use serde::{Deserialize, Serialize};

/// Members shown for a community or component before truncation.
pub const MEMBER_PREVIEW: usize = 10;

/// Basic account facts attached to ranked results.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AccountInfo {
    pub account_id: AccountId,
    pub is_suspicious: bool,
    pub customer_id: Option<CustomerId>,
    /// Outgoing transfers recorded for the account.
    pub transaction_count: u64,
}

impl AccountInfo {
    pub fn unknown(account_id: &str) -> Self {
        Self {
            account_id: account_id.to_string(),
            ..Self::default()
        }
    }
}

pub trait AccountDirectory {
    /// Number of `account_ids` flagged suspicious.
    fn suspicious_count(&self, account_ids: &[AccountId]) -> GraphResult<usize>;

    fn account_info(&self, account_id: &str) -> GraphResult<AccountInfo>;
}

impl AccountDirectory for GraphStore {
    fn suspicious_count(&self, account_ids: &[AccountId]) -> GraphResult<usize> {
        self.count_suspicious(account_ids)
    }

    fn account_info(&self, account_id: &str) -> GraphResult<AccountInfo> {
        GraphStore::account_info(self, account_id)
    }
}

/// Suspicious accounts among `account_ids`. An empty set is 0 without a
/// directory lookup.
pub fn suspicious_count<D: AccountDirectory + ?Sized>(
    directory: &D,
    account_ids: &[AccountId],
) -> GraphResult<usize> {
    if account_ids.is_empty() {
        return Ok(0);
    }
    directory.suspicious_count(account_ids)
}

// ── Tier rules ────────────────────────────────────────────────────

impl RiskTier {
    /// Communities and components: HIGH above 30 % suspicious, MEDIUM with
    /// any suspicious member, else LOW.
    pub fn for_community(suspicious: usize, size: usize) -> Self {
        if suspicious as f64 > size as f64 * 0.3 {
            Self::High
        } else if suspicious > 0 {
            Self::Medium
        } else {
            Self::Low
        }
    }

    /// Cliques: CRITICAL above 50 % suspicious, HIGH with any, else MEDIUM.
    pub fn for_clique(suspicious: usize, size: usize) -> Self {
        if suspicious as f64 > size as f64 * 0.5 {
            Self::Critical
        } else if suspicious > 0 {
            Self::High
        } else {
            Self::Medium
        }
    }

    /// A single fund-flow chain.
    pub fn for_chain(velocity_per_hour: f64, elapsed_hours: f64) -> Self {
        if velocity_per_hour > 10_000.0 && elapsed_hours < 24.0 {
            Self::Critical
        } else if velocity_per_hour > 5_000.0 {
            Self::High
        } else {
            Self::Medium
        }
    }

    /// Overall velocity risk of an account from its fastest chain.
    pub fn for_velocity(max_velocity_per_hour: f64) -> Self {
        if max_velocity_per_hour > 10_000.0 {
            Self::Critical
        } else if max_velocity_per_hour > 5_000.0 {
            Self::High
        } else if max_velocity_per_hour > 1_000.0 {
            Self::Medium
        } else {
            Self::Low
        }
    }

    /// Customer assessment from the mean suspicion ratio of its accounts.
    pub fn for_customer(overall_risk: f64) -> Self {
        if overall_risk > 0.7 {
            Self::High
        } else if overall_risk > 0.4 {
            Self::Medium
        } else {
            Self::Low
        }
    }
}

// ── Node-set summaries ────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeSetKind {
    /// Louvain or label propagation community, or a weak component.
    Community,
    Clique,
}

/// Statistics common to communities, components and cliques.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NodeSetSummary {
    pub size: usize,
    /// Ascending. Truncated to the first ten for communities and components.
    pub members: Vec<AccountId>,
    pub total_members: usize,
    /// Directed aggregated edges with both endpoints inside the set.
    pub internal_edges: usize,
    /// Summed amount on internal edges; absent for presence-only graphs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_volume: Option<f64>,
    pub suspicious_accounts: usize,
    pub risk_level: RiskTier,
}

/// Summarise a node set. `members` must be node indices in ascending order.
pub fn summarize<D: AccountDirectory + ?Sized>(
    graph: &TransferGraph,
    directory: &D,
    members: &[usize],
    kind: NodeSetKind,
) -> GraphResult<NodeSetSummary> {
    let ids = graph.ids_of(members);
    let suspicious = suspicious_count(directory, &ids)?;
    let stats = graph.internal_stats(members);
    let size = members.len();

    let (preview, risk_level) = match kind {
        NodeSetKind::Community => (
            ids.iter().take(MEMBER_PREVIEW).cloned().collect(),
            RiskTier::for_community(suspicious, size),
        ),
        NodeSetKind::Clique => (ids, RiskTier::for_clique(suspicious, size)),
    };

    Ok(NodeSetSummary {
        size,
        members: preview,
        total_members: size,
        internal_edges: stats.edges,
        total_volume: graph.is_weighted().then_some(stats.volume),
        suspicious_accounts: suspicious,
        risk_level,
    })
}
