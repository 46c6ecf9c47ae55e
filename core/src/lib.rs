//! fincrime-graph: transaction-graph analytics for anti-money-laundering.
//!
//! Every top-level request goes through `engine::GraphAnalysisEngine`,
//! which builds one snapshot per request and runs the analyses on it.

pub mod centrality;
pub mod community;
pub mod config;
pub mod engine;
pub mod error;
pub mod graph;
pub mod patterns;
pub mod risk;
pub mod rng;
pub mod store;
pub mod structure;
pub mod summary;
pub mod temporal;
pub mod types;
pub mod velocity;
