//! Fund-velocity tracing from a single account.
//!
//! A chain is a walk over individual transfers starting at the account:
//!   1. 1 to 5 hops, every hop timestamped.
//!   2. No transfer is used twice; accounts may repeat (A→B→C→A is valid).
//!   3. Elapsed time is the signed sum of consecutive hop deltas, in hours.
//!   4. Chains with elapsed ≤ 0 carry no velocity and are dropped, which
//!      also drops every 1-hop chain.
//!
//! RULE: at most 100 candidate chains are examined, longest first. The
//! cap bounds the work on dense neighbourhoods.

use crate::{
    graph::{GraphSnapshot, Transfer},
    types::{AccountId, Lookup, RiskTier, Timestamp},
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const MAX_CHAIN_HOPS: usize = 5;
pub const MAX_CHAIN_CANDIDATES: usize = 100;
pub const MAX_REPORTED_CHAINS: usize = 20;

const MS_PER_HOUR: f64 = 3_600_000.0;

type Hop<'a> = (&'a Transfer, Timestamp);

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chain {
    /// Accounts in traversal order, starting account first.
    pub accounts: Vec<AccountId>,
    /// Number of accounts listed (hops + 1).
    pub chain_length: usize,
    pub hops: usize,
    pub total_amount: f64,
    pub total_time_hours: f64,
    pub velocity_per_hour: f64,
    pub avg_time_between_hops: f64,
    pub risk_level: RiskTier,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VelocityReport {
    pub account_id: AccountId,
    /// Chains examined before the elapsed-time filter.
    pub candidate_chains: usize,
    /// Chains with a positive elapsed time.
    pub total_chains: usize,
    pub max_velocity_per_hour: f64,
    /// Fastest chains first.
    pub chains: Vec<Chain>,
    pub risk_level: RiskTier,
}

/// Extend `path` to exactly `depth` hops in every possible way.
fn walk<'a>(
    outgoing: &HashMap<&'a str, Vec<Hop<'a>>>,
    at: &str,
    depth: usize,
    path: &mut Vec<Hop<'a>>,
    out: &mut Vec<Vec<Hop<'a>>>,
) {
    if out.len() >= MAX_CHAIN_CANDIDATES {
        return;
    }
    if path.len() == depth {
        out.push(path.clone());
        return;
    }
    let Some(next) = outgoing.get(at) else {
        return;
    };
    for &(transfer, ts) in next {
        if path.iter().any(|(used, _)| std::ptr::eq(*used, transfer)) {
            continue;
        }
        path.push((transfer, ts));
        walk(outgoing, &transfer.target, depth, path, out);
        path.pop();
        if out.len() >= MAX_CHAIN_CANDIDATES {
            return;
        }
    }
}

/// Candidate chains from `start`, longest first, capped.
fn candidate_chains<'a>(snapshot: &'a GraphSnapshot, start: &str) -> Vec<Vec<Hop<'a>>> {
    let mut outgoing: HashMap<&'a str, Vec<Hop<'a>>> = HashMap::new();
    for (t, ts) in snapshot.timed_transfers() {
        outgoing.entry(t.source.as_str()).or_default().push((t, ts));
    }
    for hops in outgoing.values_mut() {
        hops.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.transfer_id.cmp(&b.0.transfer_id)));
    }

    let mut out = Vec::new();
    let mut path = Vec::with_capacity(MAX_CHAIN_HOPS);
    for depth in (1..=MAX_CHAIN_HOPS).rev() {
        walk(&outgoing, start, depth, &mut path, &mut out);
        if out.len() >= MAX_CHAIN_CANDIDATES {
            break;
        }
    }
    out
}

fn measure(start: &str, hops: &[Hop<'_>]) -> Option<Chain> {
    let elapsed_ms: i64 = hops
        .windows(2)
        .map(|pair| (pair[1].1 - pair[0].1).num_milliseconds())
        .sum();
    let total_time_hours = elapsed_ms as f64 / MS_PER_HOUR;
    if total_time_hours <= 0.0 {
        return None;
    }

    let total_amount: f64 = hops.iter().map(|(t, _)| t.amount).sum();
    let velocity = total_amount / total_time_hours;
    let mut accounts = Vec::with_capacity(hops.len() + 1);
    accounts.push(start.to_string());
    accounts.extend(hops.iter().map(|(t, _)| t.target.clone()));

    Some(Chain {
        chain_length: accounts.len(),
        accounts,
        hops: hops.len(),
        total_amount,
        total_time_hours,
        velocity_per_hour: velocity,
        avg_time_between_hops: total_time_hours / (hops.len() - 1) as f64,
        risk_level: RiskTier::for_chain(velocity, total_time_hours),
    })
}

/// Velocity report for `account_id`, or `NotFound` when the account is not
/// an endpoint of any transfer in the snapshot.
pub fn velocity(snapshot: &GraphSnapshot, account_id: &str) -> Lookup<VelocityReport> {
    if !snapshot.graph.contains(account_id) {
        log::info!("Velocity: account {account_id} not present in snapshot");
        return Lookup::not_found(account_id);
    }

    let candidates = candidate_chains(snapshot, account_id);
    let mut chains: Vec<Chain> = candidates
        .iter()
        .filter_map(|hops| measure(account_id, hops))
        .collect();
    let max_velocity = chains
        .iter()
        .map(|c| c.velocity_per_hour)
        .fold(0.0, f64::max);
    let total_chains = chains.len();

    chains.sort_by(|a, b| b.velocity_per_hour.total_cmp(&a.velocity_per_hour));
    chains.truncate(MAX_REPORTED_CHAINS);

    log::info!(
        "Velocity for {account_id}: {total_chains} of {} chains qualify, max {max_velocity:.2}/h",
        candidates.len()
    );
    Lookup::Found(VelocityReport {
        account_id: account_id.to_string(),
        candidate_chains: candidates.len(),
        total_chains,
        max_velocity_per_hour: max_velocity,
        chains,
        risk_level: RiskTier::for_velocity(max_velocity),
    })
}
