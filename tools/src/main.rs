//! graph-runner: run one graph analysis against a transaction store.
//!
//! Usage:
//!   graph-runner --db bank.db --analysis pagerank --top-n 10
//!   graph-runner --db bank.db --analysis velocity --account ACC-001
//!   graph-runner --db bank.db --analysis customer-risk --customer C-17 --as-of 2024-06-01T00:00:00Z
//!   graph-runner --db bank.db --analysis customer-network --customer C-17 --depth 2
//!   graph-runner --db bank.db --analysis recompute-risk
//!
//! Defaults for every optional flag come from `--config FILE` when given,
//! otherwise from the built-in configuration.

use anyhow::{anyhow, bail, Result};
use chrono::{DateTime, Utc};
use fincrime_graph::{config::AnalysisConfig, engine::GraphAnalysisEngine};
use serde::Serialize;
use std::env;

const DEFAULT_NETWORK_DEPTH: usize = 2;

const ANALYSES: &[&str] = &[
    "pagerank",
    "betweenness",
    "closeness",
    "eigenvector",
    "account-centrality",
    "louvain",
    "label-propagation",
    "components",
    "cliques",
    "windows",
    "bursts",
    "velocity",
    "summary",
    "fan-out",
    "fan-in",
    "cycles",
    "account-risk",
    "customer-risk",
    "customer-network",
    "statistics",
    "recompute-risk",
];

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let db = flag_value(&args, "--db").ok_or_else(|| anyhow!("--db is required"))?;
    let analysis = flag_value(&args, "--analysis").unwrap_or("summary");
    let config = match flag_value(&args, "--config") {
        Some(path) => AnalysisConfig::load(path)?,
        None => AnalysisConfig::default(),
    };

    let top_n = parse_arg(&args, "--top-n", config.top_n)?;
    let window_hours = parse_arg(&args, "--window-hours", config.window_hours)?;
    let threshold = parse_arg(&args, "--threshold", config.burst_threshold_std)?;
    let min_size = parse_arg(&args, "--min-size", config.clique_min_size)?;
    let min_len = parse_arg(&args, "--min-len", config.cycle_min_len)?;
    let max_len = parse_arg(&args, "--max-len", config.cycle_max_len)?;
    let depth = parse_arg(&args, "--depth", DEFAULT_NETWORK_DEPTH)?;
    let as_of = match flag_value(&args, "--as-of") {
        Some(raw) => DateTime::parse_from_rfc3339(raw)
            .map_err(|e| anyhow!("Invalid --as-of {raw}: {e}"))?
            .with_timezone(&Utc),
        None => Utc::now(),
    };

    log::info!("graph-runner: {analysis} on {db}");
    let engine = GraphAnalysisEngine::open(db, config)?;

    match analysis {
        "pagerank" => print_json(&engine.pagerank(top_n)?),
        "betweenness" => print_json(&engine.betweenness(top_n)?),
        "closeness" => print_json(&engine.closeness(top_n)?),
        "eigenvector" => print_json(&engine.eigenvector(top_n)?),
        "account-centrality" => {
            print_json(&engine.account_centralities(required(&args, "--account")?)?)
        }
        "louvain" => print_json(&engine.louvain_communities()?),
        "label-propagation" => print_json(&engine.label_propagation_communities()?),
        "components" => print_json(&engine.connected_components()?),
        "cliques" => print_json(&engine.cliques(min_size)?),
        "windows" => print_json(&engine.time_windows(window_hours)?),
        "bursts" => print_json(&engine.bursts(threshold)?),
        "velocity" => print_json(&engine.velocity(required(&args, "--account")?)?),
        "summary" => print_json(&engine.summary()?),
        "fan-out" => print_json(&engine.fan_out_patterns(as_of)?),
        "fan-in" => print_json(&engine.fan_in_patterns(as_of)?),
        "cycles" => print_json(&engine.suspicious_cycles(min_len, max_len)?),
        "account-risk" => print_json(&engine.account_risk(required(&args, "--account")?)?),
        "customer-risk" => {
            print_json(&engine.customer_risk(required(&args, "--customer")?, as_of)?)
        }
        "customer-network" => {
            print_json(&engine.customer_network(required(&args, "--customer")?, depth)?)
        }
        "statistics" => print_json(&engine.network_statistics()?),
        "recompute-risk" => {
            let updated = engine.recompute_risk_scores()?;
            print_json(&serde_json::json!({ "accounts_updated": updated }))
        }
        other => bail!("Unknown analysis '{other}'. Expected one of: {}", ANALYSES.join(", ")),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2)
        .find(|w| w[0] == flag)
        .map(|w| w[1].as_str())
}

fn required<'a>(args: &'a [String], flag: &str) -> Result<&'a str> {
    flag_value(args, flag).ok_or_else(|| anyhow!("{flag} is required for this analysis"))
}

/// `default` when the flag is absent; an error when its value does not parse.
fn parse_arg<T: std::str::FromStr>(args: &[String], flag: &str, default: T) -> Result<T> {
    match flag_value(args, flag) {
        Some(raw) => raw
            .parse()
            .map_err(|_| anyhow!("Invalid value for {flag}: '{raw}'")),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn parse_arg_uses_default_when_absent() {
        let args = args(&["graph-runner", "--db", "bank.db"]);
        assert_eq!(parse_arg(&args, "--top-n", 20usize).unwrap(), 20);
    }

    #[test]
    fn parse_arg_reads_value() {
        let args = args(&["graph-runner", "--top-n", "7", "--threshold", "2.5"]);
        assert_eq!(parse_arg(&args, "--top-n", 20usize).unwrap(), 7);
        assert_eq!(parse_arg(&args, "--threshold", 2.0f64).unwrap(), 2.5);
    }

    #[test]
    fn parse_arg_rejects_bad_value() {
        let args = args(&["graph-runner", "--top-n", "abc"]);
        let err = parse_arg(&args, "--top-n", 20usize).unwrap_err();
        assert!(err.to_string().contains("--top-n"));
    }
}
