use super::{GraphStore, IN_CHUNK};
use crate::{error::GraphResult, risk::AccountInfo};
use rusqlite::{params, params_from_iter, OptionalExtension};

impl GraphStore {
    // ── Customer ──────────────────────────────────────────────────

    pub fn insert_customer(
        &self,
        customer_id: &str,
        name: &str,
        customer_type: &str,
        country: Option<&str>,
    ) -> GraphResult<()> {
        self.conn.execute(
            "INSERT INTO customer (customer_id, name, customer_type, country)
             VALUES (?1, ?2, ?3, ?4)",
            params![customer_id, name, customer_type, country],
        )?;
        Ok(())
    }

    pub fn customer_exists(&self, customer_id: &str) -> GraphResult<bool> {
        let found: Option<i64> = self
            .conn
            .query_row(
                "SELECT 1 FROM customer WHERE customer_id = ?1",
                params![customer_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// Accounts owned by a customer, ascending by identifier.
    pub fn customer_accounts(&self, customer_id: &str) -> GraphResult<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT account_id FROM account WHERE customer_id = ?1 ORDER BY account_id ASC",
        )?;
        let rows = stmt.query_map(params![customer_id], |row| row.get(0))?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    // ── Account ───────────────────────────────────────────────────

    pub fn insert_account(
        &self,
        account_id: &str,
        customer_id: Option<&str>,
        account_type: &str,
        is_suspicious: bool,
    ) -> GraphResult<()> {
        self.conn.execute(
            "INSERT INTO account (account_id, customer_id, account_type, is_suspicious)
             VALUES (?1, ?2, ?3, ?4)",
            params![account_id, customer_id, account_type, is_suspicious as i32],
        )?;
        Ok(())
    }

    pub fn account_exists(&self, account_id: &str) -> GraphResult<bool> {
        let found: Option<i64> = self
            .conn
            .query_row(
                "SELECT 1 FROM account WHERE account_id = ?1",
                params![account_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// Insert a bare, unflagged account unless it already exists.
    pub fn ensure_account(&self, account_id: &str) -> GraphResult<()> {
        self.conn.execute(
            "INSERT OR IGNORE INTO account (account_id) VALUES (?1)",
            params![account_id],
        )?;
        Ok(())
    }

    /// Flags and outgoing transfer count for one account.
    /// Unknown accounts yield an unflagged record with no transfers.
    pub fn account_info(&self, account_id: &str) -> GraphResult<AccountInfo> {
        let info = self
            .conn
            .query_row(
                "SELECT a.is_suspicious, a.customer_id,
                        (SELECT COUNT(*) FROM transfer t WHERE t.source_account = a.account_id)
                 FROM account a WHERE a.account_id = ?1",
                params![account_id],
                |row| {
                    Ok(AccountInfo {
                        account_id: account_id.to_string(),
                        is_suspicious: row.get::<_, i32>(0)? != 0,
                        customer_id: row.get(1)?,
                        transaction_count: row.get::<_, i64>(2)? as u64,
                    })
                },
            )
            .optional()?;
        Ok(info.unwrap_or_else(|| AccountInfo::unknown(account_id)))
    }

    /// Number of the given accounts flagged suspicious.
    pub fn count_suspicious(&self, account_ids: &[String]) -> GraphResult<usize> {
        let mut total = 0usize;
        for chunk in account_ids.chunks(IN_CHUNK) {
            let placeholders = vec!["?"; chunk.len()].join(",");
            let sql = format!(
                "SELECT COUNT(*) FROM account
                 WHERE is_suspicious != 0 AND account_id IN ({placeholders})"
            );
            let n: i64 = self
                .conn
                .query_row(&sql, params_from_iter(chunk.iter()), |row| row.get(0))?;
            total += n as usize;
        }
        Ok(total)
    }

    pub fn risk_score(&self, account_id: &str) -> GraphResult<Option<f64>> {
        let score: Option<Option<f64>> = self
            .conn
            .query_row(
                "SELECT risk_score FROM account WHERE account_id = ?1",
                params![account_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(score.flatten())
    }

    // ── Risk recomputation ────────────────────────────────────────

    /// Set every account's `risk_score` to the share of suspicious transfers
    /// among all transfers touching it (0.0 when it has none).
    /// Returns the number of accounts updated.
    pub fn recompute_risk_scores(&self) -> GraphResult<usize> {
        let updated = self.conn.execute(
            "UPDATE account SET risk_score = COALESCE(
                 (SELECT CAST(SUM(CASE WHEN t.is_suspicious != 0 THEN 1 ELSE 0 END) AS REAL)
                         / COUNT(*)
                  FROM transfer t
                  WHERE t.source_account = account.account_id
                     OR t.target_account = account.account_id),
                 0.0)",
            [],
        )?;
        log::info!("Recomputed risk scores for {updated} accounts");
        Ok(updated)
    }
}
