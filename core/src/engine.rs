//! The analysis engine: the single entry point for every top-level request.
//!
//! REQUEST PIPELINE (fixed for every operation):
//!   1. Validate parameters (rejected before any store access)
//!   2. Open an `AnalysisSession` (own connection, own request id)
//!   3. Build one snapshot from the store
//!   4. Run the algorithm on the snapshot
//!   5. Annotate through the session's `AccountDirectory`
//!   6. Drop the session (connection released on every exit path)
//!
//! RULES:
//!   - Requests share no mutable state; nothing is cached between calls.
//!   - Presence-only snapshots for betweenness, closeness, label propagation
//!     and components. Amount-weighted snapshots everywhere else.
//!   - The only write is `recompute_risk_scores`.

use crate::{
    centrality::{self, AccountCentralities, CentralityKind, CentralityReport},
    community::{self, CommunityReport},
    config::{self, AnalysisConfig},
    error::GraphResult,
    graph::{GraphBuilder, GraphSnapshot},
    patterns::{
        self, AccountRiskProfile, CustomerNetwork, CustomerRiskAssessment, FanDirection,
        FanPattern, FanWindow, NetworkStatistics, SuspiciousCycle,
    },
    store::GraphStore,
    structure::{self, CliqueReport, ComponentReport},
    summary::{self, SummaryReport},
    temporal::{self, BurstReport, WindowReport},
    types::{Lookup, TimeRange, Timestamp},
    velocity::{self, VelocityReport},
};

/// One request's private connection to the store.
pub struct AnalysisSession {
    pub request_id: String,
    operation: &'static str,
    store: GraphStore,
}

impl AnalysisSession {
    fn open(base: &GraphStore, operation: &'static str) -> GraphResult<Self> {
        let store = base.reopen()?;
        let request_id = uuid::Uuid::new_v4().to_string();
        log::debug!("Session {request_id} opened for {operation}");
        Ok(Self {
            request_id,
            operation,
            store,
        })
    }

    pub fn store(&self) -> &GraphStore {
        &self.store
    }

    fn snapshot(
        &self,
        include_amounts: bool,
        time_range: Option<TimeRange>,
    ) -> GraphResult<GraphSnapshot> {
        GraphBuilder::build(&self.store, include_amounts, time_range)
    }
}

impl Drop for AnalysisSession {
    fn drop(&mut self) {
        log::debug!("Session {} closed ({})", self.request_id, self.operation);
    }
}

pub struct GraphAnalysisEngine {
    store: GraphStore,
    config: AnalysisConfig,
}

impl GraphAnalysisEngine {
    /// Wrap an opened, migrated store. The config is validated up front.
    pub fn new(store: GraphStore, config: AnalysisConfig) -> GraphResult<Self> {
        config.validate()?;
        Ok(Self { store, config })
    }

    /// Open the database at `path`, apply migrations, and wrap it.
    pub fn open(path: &str, config: AnalysisConfig) -> GraphResult<Self> {
        let store = GraphStore::open(path)?;
        store.migrate()?;
        Self::new(store, config)
    }

    /// Engine over a fresh in-memory database with the test config.
    /// Fixtures are written through `store()`.
    pub fn build_test() -> GraphResult<Self> {
        let store = GraphStore::in_memory()?;
        store.migrate()?;
        Self::new(store, AnalysisConfig::default_test())
    }

    pub fn store(&self) -> &GraphStore {
        &self.store
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    fn session(&self, operation: &'static str) -> GraphResult<AnalysisSession> {
        AnalysisSession::open(&self.store, operation)
    }

    // ── Centrality ────────────────────────────────────────────────

    /// Top-`top_n` accounts under one centrality measure.
    pub fn centrality(&self, kind: CentralityKind, top_n: usize) -> GraphResult<CentralityReport> {
        config::check_top_n(top_n)?;
        let session = self.session(kind.as_str())?;
        let weighted = matches!(kind, CentralityKind::PageRank | CentralityKind::Eigenvector);
        let snapshot = session.snapshot(weighted, None)?;
        let scores = centrality::compute(&snapshot.graph, kind);
        centrality::rank(&snapshot.graph, session.store(), kind, &scores, top_n)
    }

    pub fn pagerank(&self, top_n: usize) -> GraphResult<CentralityReport> {
        self.centrality(CentralityKind::PageRank, top_n)
    }

    pub fn betweenness(&self, top_n: usize) -> GraphResult<CentralityReport> {
        self.centrality(CentralityKind::Betweenness, top_n)
    }

    pub fn closeness(&self, top_n: usize) -> GraphResult<CentralityReport> {
        self.centrality(CentralityKind::Closeness, top_n)
    }

    pub fn eigenvector(&self, top_n: usize) -> GraphResult<CentralityReport> {
        self.centrality(CentralityKind::Eigenvector, top_n)
    }

    /// All four measures for one account, on one weighted snapshot.
    pub fn account_centralities(
        &self,
        account_id: &str,
    ) -> GraphResult<Lookup<AccountCentralities>> {
        let session = self.session("account_centralities")?;
        let snapshot = session.snapshot(true, None)?;
        centrality::account_centralities(&snapshot.graph, session.store(), account_id)
    }

    // ── Communities & structure ───────────────────────────────────

    pub fn louvain_communities(&self) -> GraphResult<CommunityReport> {
        let session = self.session("louvain")?;
        let snapshot = session.snapshot(true, None)?;
        community::louvain_report(&snapshot.graph, session.store(), self.config.seed)
    }

    pub fn label_propagation_communities(&self) -> GraphResult<CommunityReport> {
        let session = self.session("label_propagation")?;
        let snapshot = session.snapshot(false, None)?;
        community::label_propagation_report(&snapshot.graph, session.store(), self.config.seed)
    }

    pub fn connected_components(&self) -> GraphResult<ComponentReport> {
        let session = self.session("connected_components")?;
        let snapshot = session.snapshot(false, None)?;
        structure::connected_components(&snapshot.graph, session.store())
    }

    pub fn cliques(&self, min_size: usize) -> GraphResult<CliqueReport> {
        config::check_clique_min_size(min_size)?;
        let session = self.session("cliques")?;
        let snapshot = session.snapshot(true, None)?;
        structure::cliques(&snapshot.graph, session.store(), min_size)
    }

    // ── Temporal ──────────────────────────────────────────────────

    pub fn time_windows(&self, window_hours: u32) -> GraphResult<WindowReport> {
        config::check_window_hours(window_hours)?;
        let session = self.session("time_windows")?;
        let snapshot = session.snapshot(true, None)?;
        Ok(temporal::time_windows(&snapshot, window_hours))
    }

    pub fn bursts(&self, threshold_std: f64) -> GraphResult<BurstReport> {
        config::check_burst_threshold(threshold_std)?;
        let session = self.session("bursts")?;
        let snapshot = session.snapshot(true, None)?;
        Ok(temporal::bursts(&snapshot, threshold_std))
    }

    pub fn velocity(&self, account_id: &str) -> GraphResult<Lookup<VelocityReport>> {
        let session = self.session("velocity")?;
        let snapshot = session.snapshot(true, None)?;
        Ok(velocity::velocity(&snapshot, account_id))
    }

    // ── Summary & batch ───────────────────────────────────────────

    pub fn summary(&self) -> GraphResult<SummaryReport> {
        let session = self.session("summary")?;
        let snapshot = session.snapshot(true, None)?;
        summary::network_summary(
            &snapshot,
            session.store(),
            self.config.seed,
            self.config.burst_threshold_std,
        )
    }

    /// Rewrite every account's cached risk score. Returns accounts updated.
    pub fn recompute_risk_scores(&self) -> GraphResult<usize> {
        let session = self.session("recompute_risk_scores")?;
        session.store().recompute_risk_scores()
    }

    // ── Patterns ──────────────────────────────────────────────────

    fn fan_window(&self, as_of: Timestamp) -> FanWindow {
        FanWindow {
            as_of,
            days: self.config.fan_window_days,
            min_counterparties: self.config.fan_min_counterparties,
        }
    }

    fn fan_patterns(
        &self,
        direction: FanDirection,
        as_of: Timestamp,
    ) -> GraphResult<Vec<FanPattern>> {
        let session = self.session("fan_patterns")?;
        let snapshot = session.snapshot(true, None)?;
        let window = self.fan_window(as_of);
        Ok(patterns::fan_patterns(
            &snapshot,
            direction,
            window.as_of,
            window.days,
            window.min_counterparties,
        ))
    }

    pub fn fan_out_patterns(&self, as_of: Timestamp) -> GraphResult<Vec<FanPattern>> {
        self.fan_patterns(FanDirection::Out, as_of)
    }

    pub fn fan_in_patterns(&self, as_of: Timestamp) -> GraphResult<Vec<FanPattern>> {
        self.fan_patterns(FanDirection::In, as_of)
    }

    pub fn suspicious_cycles(
        &self,
        min_len: usize,
        max_len: usize,
    ) -> GraphResult<Vec<SuspiciousCycle>> {
        config::check_cycle_lengths(min_len, max_len)?;
        let session = self.session("suspicious_cycles")?;
        let snapshot = session.snapshot(true, None)?;
        Ok(patterns::suspicious_cycles(&snapshot, min_len, max_len))
    }

    /// `NotFound` only when the account is neither in the snapshot nor the store.
    pub fn account_risk(&self, account_id: &str) -> GraphResult<Lookup<AccountRiskProfile>> {
        let session = self.session("account_risk")?;
        let snapshot = session.snapshot(true, None)?;
        if !snapshot.graph.contains(account_id) && !session.store().account_exists(account_id)? {
            return Ok(Lookup::not_found(account_id));
        }
        Ok(Lookup::Found(patterns::account_risk(&snapshot, account_id)))
    }

    pub fn customer_risk(
        &self,
        customer_id: &str,
        as_of: Timestamp,
    ) -> GraphResult<Lookup<CustomerRiskAssessment>> {
        let session = self.session("customer_risk")?;
        if !session.store().customer_exists(customer_id)? {
            return Ok(Lookup::not_found(customer_id));
        }
        let accounts = session.store().customer_accounts(customer_id)?;
        if accounts.is_empty() {
            log::info!("Customer {customer_id} has no accounts");
            return Ok(Lookup::not_found(customer_id));
        }
        let snapshot = session.snapshot(true, None)?;
        Ok(Lookup::Found(patterns::customer_risk(
            &snapshot,
            customer_id,
            &accounts,
            self.fan_window(as_of),
        )))
    }

    /// Accounts within `depth` hops of the customer's accounts. Same
    /// `NotFound` rules as `customer_risk`.
    pub fn customer_network(
        &self,
        customer_id: &str,
        depth: usize,
    ) -> GraphResult<Lookup<CustomerNetwork>> {
        config::check_network_depth(depth)?;
        let session = self.session("customer_network")?;
        if !session.store().customer_exists(customer_id)? {
            return Ok(Lookup::not_found(customer_id));
        }
        let accounts = session.store().customer_accounts(customer_id)?;
        if accounts.is_empty() {
            log::info!("Customer {customer_id} has no accounts");
            return Ok(Lookup::not_found(customer_id));
        }
        let snapshot = session.snapshot(true, None)?;
        patterns::customer_network(&snapshot, session.store(), customer_id, &accounts, depth)
            .map(Lookup::Found)
    }

    pub fn network_statistics(&self) -> GraphResult<NetworkStatistics> {
        let session = self.session("network_statistics")?;
        patterns::network_statistics(session.store())
    }
}
