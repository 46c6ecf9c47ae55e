//! Classic AML typology checks expressed over a snapshot.
//!
//! 1. Fan-out / fan-in: one account spreading funds to, or gathering funds
//!    from, many distinct counterparties within a look-back window.
//! 2. Suspicious cycles: money returning to its origin through transfers
//!    that are all flagged suspicious.
//! 3. Account and customer risk profiles built from suspicious-transfer
//!    ratios, plus network-wide counts.
//! 4. Customer networks: every account within `depth` hops of a customer's
//!    accounts, with the transfers that connect them.

use crate::{
    error::GraphResult,
    graph::{GraphBuilder, GraphSnapshot, TransferGraph},
    store::GraphStore,
    types::{AccountId, CustomerId, RiskTier, Timestamp},
};
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, VecDeque};

pub const MAX_REPORTED_CYCLES: usize = 100;

// ── Fan-out / fan-in ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FanDirection {
    /// One source, many targets.
    Out,
    /// Many sources, one target.
    In,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FanPattern {
    pub account_id: AccountId,
    pub direction: FanDirection,
    pub counterparties: usize,
    pub total_amount: f64,
    /// Ascending.
    pub counterparty_ids: Vec<AccountId>,
}

/// Accounts with at least `min_counterparties` distinct counterparties in
/// `(as_of − days, as_of]`. Most counterparties first, ties by identifier.
pub fn fan_patterns(
    snapshot: &GraphSnapshot,
    direction: FanDirection,
    as_of: Timestamp,
    days: i64,
    min_counterparties: usize,
) -> Vec<FanPattern> {
    let Some(since) = Duration::try_days(days).and_then(|d| as_of.checked_sub_signed(d)) else {
        log::warn!("Fan window of {days} days before {as_of} is out of range");
        return Vec::new();
    };
    let mut by_account: BTreeMap<&str, (BTreeSet<&str>, f64)> = BTreeMap::new();
    for (t, ts) in snapshot.timed_transfers() {
        if ts <= since || ts > as_of {
            continue;
        }
        let (hub, other) = match direction {
            FanDirection::Out => (t.source.as_str(), t.target.as_str()),
            FanDirection::In => (t.target.as_str(), t.source.as_str()),
        };
        let entry = by_account.entry(hub).or_default();
        entry.0.insert(other);
        entry.1 += t.amount;
    }

    let mut patterns: Vec<FanPattern> = by_account
        .into_iter()
        .filter(|(_, (others, _))| others.len() >= min_counterparties)
        .map(|(hub, (others, total))| FanPattern {
            account_id: hub.to_string(),
            direction,
            counterparties: others.len(),
            total_amount: total,
            counterparty_ids: others.into_iter().map(str::to_string).collect(),
        })
        .collect();
    // Stable sort keeps identifier order among equal counts.
    patterns.sort_by(|a, b| b.counterparties.cmp(&a.counterparties));
    log::info!("Fan-{direction:?} patterns: {} accounts", patterns.len());
    patterns
}

// ── Suspicious cycles ─────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SuspiciousCycle {
    /// Starts at the smallest identifier; the return to it is implied.
    pub accounts: Vec<AccountId>,
    pub cycle_length: usize,
    pub total_amount: f64,
}

fn close_cycles(
    graph: &TransferGraph,
    start: usize,
    path: &mut Vec<usize>,
    amount: f64,
    (min_len, max_len): (usize, usize),
    out: &mut Vec<SuspiciousCycle>,
) {
    let Some(&at) = path.last() else {
        return;
    };
    for (next, edge) in graph.out_edges(at) {
        if out.len() >= MAX_REPORTED_CYCLES {
            return;
        }
        let next = *next;
        if next == start {
            if path.len() >= min_len {
                out.push(SuspiciousCycle {
                    accounts: graph.ids_of(path),
                    cycle_length: path.len(),
                    total_amount: amount + edge.weight,
                });
            }
        } else if next > start && !path.contains(&next) && path.len() < max_len {
            path.push(next);
            close_cycles(graph, start, path, amount + edge.weight, (min_len, max_len), out);
            path.pop();
        }
    }
}

/// Simple directed cycles of `min_len..=max_len` accounts made only of
/// suspicious transfers. Each cycle is reported once.
///
/// RULE: parallel flagged transfers between the same pair are one hop.
/// The cycle is reported once and its amount includes all of them.
pub fn suspicious_cycles(
    snapshot: &GraphSnapshot,
    min_len: usize,
    max_len: usize,
) -> Vec<SuspiciousCycle> {
    let flagged = snapshot
        .transfers
        .iter()
        .filter(|t| t.suspicious)
        .cloned()
        .collect();
    let graph = GraphBuilder::from_transfers(flagged, true, None).graph;

    let mut out = Vec::new();
    for start in 0..graph.node_count() {
        if out.len() >= MAX_REPORTED_CYCLES {
            break;
        }
        let mut path = vec![start];
        close_cycles(&graph, start, &mut path, 0.0, (min_len, max_len), &mut out);
    }
    log::info!("Suspicious cycles ({min_len}..={max_len}): {} found", out.len());
    out
}

// ── Account risk ──────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AccountRiskProfile {
    pub account_id: AccountId,
    pub outgoing_count: usize,
    pub incoming_count: usize,
    pub suspicious_out: usize,
    pub suspicious_in: usize,
    pub avg_outgoing: Option<f64>,
    pub avg_incoming: Option<f64>,
    /// Suspicious share of all transfers touching the account.
    pub suspicion_ratio: f64,
}

/// Transfer counts and suspicion ratio for one account. An account with no
/// transfers yields zeros.
pub fn account_risk(snapshot: &GraphSnapshot, account_id: &str) -> AccountRiskProfile {
    let mut profile = AccountRiskProfile {
        account_id: account_id.to_string(),
        outgoing_count: 0,
        incoming_count: 0,
        suspicious_out: 0,
        suspicious_in: 0,
        avg_outgoing: None,
        avg_incoming: None,
        suspicion_ratio: 0.0,
    };
    let mut out_total = 0.0;
    let mut in_total = 0.0;
    for t in &snapshot.transfers {
        if t.source == account_id {
            profile.outgoing_count += 1;
            profile.suspicious_out += usize::from(t.suspicious);
            out_total += t.amount;
        }
        if t.target == account_id {
            profile.incoming_count += 1;
            profile.suspicious_in += usize::from(t.suspicious);
            in_total += t.amount;
        }
    }
    if profile.outgoing_count > 0 {
        profile.avg_outgoing = Some(out_total / profile.outgoing_count as f64);
    }
    if profile.incoming_count > 0 {
        profile.avg_incoming = Some(in_total / profile.incoming_count as f64);
    }
    let touching = profile.outgoing_count + profile.incoming_count;
    if touching > 0 {
        profile.suspicion_ratio =
            (profile.suspicious_out + profile.suspicious_in) as f64 / touching as f64;
    }
    profile
}

// ── Customer risk ─────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RiskFactorKind {
    SuspiciousOutgoingTransactions,
    SuspiciousIncomingTransactions,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RiskFactor {
    pub account_id: AccountId,
    pub factor: RiskFactorKind,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CustomerNetworkMetrics {
    pub total_accounts: usize,
    pub accounts_with_risk: usize,
    pub suspicious_patterns_found: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CustomerRiskAssessment {
    pub customer_id: CustomerId,
    /// Mean suspicion ratio over the customer's accounts.
    pub overall_risk_score: f64,
    pub risk_level: RiskTier,
    pub risk_factors: Vec<RiskFactor>,
    /// Fan patterns centred on one of the customer's accounts.
    pub suspicious_patterns: Vec<FanPattern>,
    pub network_metrics: CustomerNetworkMetrics,
    pub recommendations: Vec<String>,
}

/// Look-back window and threshold for fan detection.
#[derive(Debug, Clone, Copy)]
pub struct FanWindow {
    pub as_of: Timestamp,
    pub days: i64,
    pub min_counterparties: usize,
}

/// Assess a customer from its accounts. `accounts` must be non-empty.
pub fn customer_risk(
    snapshot: &GraphSnapshot,
    customer_id: &str,
    accounts: &[AccountId],
    fan: FanWindow,
) -> CustomerRiskAssessment {
    let mut ratios = Vec::with_capacity(accounts.len());
    let mut risk_factors = Vec::new();
    for account_id in accounts {
        let profile = account_risk(snapshot, account_id);
        ratios.push(profile.suspicion_ratio);
        if profile.suspicious_out > 0 {
            risk_factors.push(RiskFactor {
                account_id: account_id.clone(),
                factor: RiskFactorKind::SuspiciousOutgoingTransactions,
                count: profile.suspicious_out,
            });
        }
        if profile.suspicious_in > 0 {
            risk_factors.push(RiskFactor {
                account_id: account_id.clone(),
                factor: RiskFactorKind::SuspiciousIncomingTransactions,
                count: profile.suspicious_in,
            });
        }
    }

    let owned: BTreeSet<&str> = accounts.iter().map(String::as_str).collect();
    let suspicious_patterns: Vec<FanPattern> = [FanDirection::Out, FanDirection::In]
        .into_iter()
        .flat_map(|d| fan_patterns(snapshot, d, fan.as_of, fan.days, fan.min_counterparties))
        .filter(|p| owned.contains(p.account_id.as_str()))
        .collect();

    let overall = if ratios.is_empty() {
        0.0
    } else {
        ratios.iter().sum::<f64>() / ratios.len() as f64
    };
    let risk_level = RiskTier::for_customer(overall);

    let mut recommendations: Vec<String> = match risk_level {
        RiskTier::High | RiskTier::Critical => vec![
            "HIGH RISK: open a detailed investigation immediately".into(),
            "Review every transaction from the last 90 days".into(),
        ],
        RiskTier::Medium => vec![
            "MEDIUM RISK: enhanced monitoring recommended".into(),
            "Check recent transaction patterns".into(),
        ],
        RiskTier::Low => vec!["LOW RISK: keep standard monitoring".into()],
    };
    if !suspicious_patterns.is_empty() {
        recommendations.push(format!(
            "Investigate {} suspicious patterns detected",
            suspicious_patterns.len()
        ));
    }

    log::info!("Customer {customer_id}: overall risk {overall:.4} ({})", risk_level.as_str());
    CustomerRiskAssessment {
        customer_id: customer_id.to_string(),
        overall_risk_score: overall,
        risk_level,
        network_metrics: CustomerNetworkMetrics {
            total_accounts: accounts.len(),
            accounts_with_risk: ratios.iter().filter(|r| **r > 0.0).count(),
            suspicious_patterns_found: suspicious_patterns.len(),
        },
        risk_factors,
        suspicious_patterns,
        recommendations,
    }
}

// ── Customer network ──────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NetworkNode {
    pub account_id: AccountId,
    /// Cached score from the last recomputation, if any.
    pub risk_score: Option<f64>,
    pub is_customer_account: bool,
    /// Hops from the nearest customer account.
    pub distance: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NetworkEdge {
    pub transfer_id: String,
    pub source: AccountId,
    pub target: AccountId,
    pub amount: f64,
    pub timestamp: Option<Timestamp>,
    pub suspicious: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CustomerNetwork {
    pub customer_id: CustomerId,
    pub depth: usize,
    /// Nearest first, ties by identifier.
    pub nodes: Vec<NetworkNode>,
    /// Snapshot order.
    pub edges: Vec<NetworkEdge>,
    pub node_count: usize,
    pub edge_count: usize,
}

/// Hop distance from `accounts` to every account reachable within `depth`
/// hops, ignoring transfer direction.
fn hop_distances(
    graph: &TransferGraph,
    accounts: &[AccountId],
    depth: usize,
) -> Vec<Option<usize>> {
    let mut distance = vec![None; graph.node_count()];
    let mut queue = VecDeque::new();
    for node in accounts.iter().filter_map(|a| graph.index_of(a)) {
        if distance[node].is_none() {
            distance[node] = Some(0);
            queue.push_back(node);
        }
    }
    while let Some(node) = queue.pop_front() {
        let Some(hops) = distance[node] else {
            continue;
        };
        if hops == depth {
            continue;
        }
        let neighbours = graph.out_edges(node).iter().chain(graph.in_edges(node));
        for (next, _) in neighbours {
            if distance[*next].is_none() {
                distance[*next] = Some(hops + 1);
                queue.push_back(*next);
            }
        }
    }
    distance
}

/// The transfer network around a customer's accounts.
///
/// RULE: a transfer is an edge when it lies on a path of at most `depth`
/// hops from a customer account, i.e. its nearer endpoint is fewer than
/// `depth` hops out. Customer accounts with no transfers are still nodes.
pub fn customer_network(
    snapshot: &GraphSnapshot,
    store: &GraphStore,
    customer_id: &str,
    accounts: &[AccountId],
    depth: usize,
) -> GraphResult<CustomerNetwork> {
    let graph = &snapshot.graph;
    let distance = hop_distances(graph, accounts, depth);
    let hops_of = |account_id: &str| graph.index_of(account_id).and_then(|n| distance[n]);

    let owned: BTreeSet<&str> = accounts.iter().map(String::as_str).collect();
    let mut reached: Vec<(usize, &str)> = graph
        .ids()
        .iter()
        .filter_map(|id| hops_of(id.as_str()).map(|hops| (hops, id.as_str())))
        .collect();
    for account_id in &owned {
        if !graph.contains(account_id) {
            reached.push((0, *account_id));
        }
    }
    reached.sort();

    let mut nodes = Vec::with_capacity(reached.len());
    for (hops, account_id) in reached {
        nodes.push(NetworkNode {
            account_id: account_id.to_string(),
            risk_score: store.risk_score(account_id)?,
            is_customer_account: owned.contains(account_id),
            distance: hops,
        });
    }

    let edges: Vec<NetworkEdge> = snapshot
        .transfers
        .iter()
        .filter(|t| match (hops_of(t.source.as_str()), hops_of(t.target.as_str())) {
            (Some(from), Some(to)) => from.min(to) < depth,
            _ => false,
        })
        .map(|t| NetworkEdge {
            transfer_id: t.transfer_id.clone(),
            source: t.source.clone(),
            target: t.target.clone(),
            amount: t.amount,
            timestamp: t.timestamp,
            suspicious: t.suspicious,
        })
        .collect();

    log::info!(
        "Customer {customer_id} network at depth {depth}: {} nodes, {} edges",
        nodes.len(),
        edges.len()
    );
    Ok(CustomerNetwork {
        customer_id: customer_id.to_string(),
        depth,
        node_count: nodes.len(),
        edge_count: edges.len(),
        nodes,
        edges,
    })
}

// ── Network statistics ────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TypologyCount {
    pub typology: String,
    pub count: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NetworkStatistics {
    pub total_customers: u64,
    pub total_accounts: u64,
    pub total_transactions: u64,
    pub suspicious_transactions: u64,
    /// 0 when there are no transactions.
    pub suspicious_percentage: f64,
    pub typologies: Vec<TypologyCount>,
}

pub fn network_statistics(store: &GraphStore) -> GraphResult<NetworkStatistics> {
    let counts = store.network_counts()?;
    let typologies = store
        .typology_counts()?
        .into_iter()
        .map(|(typology, count)| TypologyCount { typology, count })
        .collect();
    let suspicious_percentage = if counts.transfers == 0 {
        0.0
    } else {
        counts.suspicious_transfers as f64 * 100.0 / counts.transfers as f64
    };
    Ok(NetworkStatistics {
        total_customers: counts.customers,
        total_accounts: counts.accounts,
        total_transactions: counts.transfers,
        suspicious_transactions: counts.suspicious_transfers,
        suspicious_percentage,
        typologies,
    })
}
