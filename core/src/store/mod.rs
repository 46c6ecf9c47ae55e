//! SQLite adapter for the external transaction store.
//!
//! RULE: Only the store talks to the database.
//! Analyses read through `GraphStore` methods (or the `AccountDirectory`
//! seam in `risk.rs`) and never execute SQL directly.
//!
//! The store holds customers, accounts and transfers. Nothing computed by
//! the engine is written back except `account.risk_score`, which only the
//! batch recomputation touches.

mod account;
mod transfer;

use crate::error::GraphResult;
use rusqlite::{Connection, OpenFlags};

/// Largest number of bound parameters used in one `IN (...)` list.
pub(crate) const IN_CHUNK: usize = 500;

pub struct GraphStore {
    conn: Connection,
    path: String,
}

impl GraphStore {
    /// Open (or create) the database at `path`. URI filenames are accepted.
    pub fn open(path: &str) -> GraphResult<Self> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_URI,
        )?;
        // WAL mode only for real files (shared-memory databases ignore it).
        let _ = conn.execute_batch("PRAGMA journal_mode=WAL;");
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        log::debug!("Opened transaction store at {path}");
        Ok(Self {
            conn,
            path: path.to_string(),
        })
    }

    /// Open a private in-memory database (used in tests and fixtures).
    ///
    /// The database is named and shared-cache so `reopen` reaches the same
    /// data. It lives as long as at least one connection to it stays open.
    pub fn in_memory() -> GraphResult<Self> {
        let name = format!(
            "file:fincrime_graph_{}?mode=memory&cache=shared",
            uuid::Uuid::new_v4().simple()
        );
        Self::open(&name)
    }

    /// Open a new connection to the same database.
    pub fn reopen(&self) -> GraphResult<Self> {
        Self::open(&self.path)
    }

    /// Apply all schema migrations in order.
    pub fn migrate(&self) -> GraphResult<()> {
        self.conn
            .execute_batch(include_str!("../../../migrations/001_accounts.sql"))?;
        self.conn
            .execute_batch(include_str!("../../../migrations/002_transfers.sql"))?;
        Ok(())
    }
}

/// A transfer as read from the store. Converted into the typed model by the
/// graph builder.
#[derive(Debug, Clone)]
pub struct TransferRow {
    pub transfer_id: String,
    pub source_account: String,
    pub target_account: String,
    pub amount: f64,
    pub occurred_at_ms: Option<i64>,
    pub is_suspicious: bool,
    pub typology: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NetworkCounts {
    pub customers: u64,
    pub accounts: u64,
    pub transfers: u64,
    pub suspicious_transfers: u64,
}

#[derive(Debug, Clone)]
pub struct NewTransfer<'a> {
    pub transfer_id: &'a str,
    pub source_account: &'a str,
    pub target_account: &'a str,
    pub amount: f64,
    pub occurred_at_ms: Option<i64>,
    pub is_suspicious: bool,
    pub typology: Option<&'a str>,
}
