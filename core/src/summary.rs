//! Executive overview composed from the core analyses.
//!
//! RULE: every part of the summary comes from the same snapshot. If any
//! part fails, the whole summary fails; there is no partial summary.

use crate::{
    centrality::{self, CentralityKind, RankedAccount},
    community::{self, CommunityEntry},
    error::GraphResult,
    graph::GraphSnapshot,
    risk::AccountDirectory,
    structure, temporal,
    types::AccountId,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

pub const SUMMARY_TOP_N: usize = 5;
pub const MAX_LISTED_COMMUNITIES: usize = 5;

pub const RECOMMENDATIONS: [&str; 5] = [
    "Investigate accounts that appear in more than one centrality ranking",
    "Review communities with a high share of suspicious accounts",
    "Analyse isolated components with high density",
    "Investigate accounts involved in activity bursts",
    "Run velocity analysis on the most central accounts",
];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SummaryCounts {
    pub accounts_of_interest: usize,
    pub high_risk_communities: usize,
    pub total_communities: usize,
    pub weakly_connected_components: usize,
    pub bursts_detected: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SummaryReport {
    pub summary: SummaryCounts,
    pub top_influential_accounts: Vec<RankedAccount>,
    pub top_bridge_accounts: Vec<RankedAccount>,
    /// Union of both top lists, ascending.
    pub accounts_of_interest: Vec<AccountId>,
    /// Up to five HIGH or CRITICAL communities, largest first.
    pub high_risk_communities: Vec<CommunityEntry>,
    pub recommendations: Vec<String>,
}

pub fn network_summary<D: AccountDirectory + ?Sized>(
    snapshot: &GraphSnapshot,
    directory: &D,
    seed: u64,
    burst_threshold_std: f64,
) -> GraphResult<SummaryReport> {
    let graph = &snapshot.graph;

    let pagerank = centrality::rank(
        graph,
        directory,
        CentralityKind::PageRank,
        &centrality::pagerank(graph),
        SUMMARY_TOP_N,
    )?;
    let betweenness = centrality::rank(
        graph,
        directory,
        CentralityKind::Betweenness,
        &centrality::betweenness(graph),
        SUMMARY_TOP_N,
    )?;
    let communities = community::louvain_report(graph, directory, seed)?;
    let components = structure::connected_components(graph, directory)?;
    let bursts = temporal::bursts(snapshot, burst_threshold_std);

    let accounts_of_interest: Vec<AccountId> = pagerank
        .accounts
        .iter()
        .chain(&betweenness.accounts)
        .map(|a| a.account.account_id.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let elevated: Vec<&CommunityEntry> = communities
        .communities
        .iter()
        .filter(|c| c.summary.risk_level.is_elevated())
        .collect();

    log::info!(
        "Summary: {} accounts of interest, {} elevated communities",
        accounts_of_interest.len(),
        elevated.len()
    );
    Ok(SummaryReport {
        summary: SummaryCounts {
            accounts_of_interest: accounts_of_interest.len(),
            high_risk_communities: elevated.len(),
            total_communities: communities.total_communities,
            weakly_connected_components: components.weakly_connected_components,
            bursts_detected: bursts.total_bursts,
        },
        high_risk_communities: elevated
            .into_iter()
            .take(MAX_LISTED_COMMUNITIES)
            .cloned()
            .collect(),
        top_influential_accounts: pagerank.accounts,
        top_bridge_accounts: betweenness.accounts,
        accounts_of_interest,
        recommendations: RECOMMENDATIONS.iter().map(|r| r.to_string()).collect(),
    })
}
