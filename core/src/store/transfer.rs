use super::{GraphStore, NetworkCounts, NewTransfer, TransferRow};
use crate::{error::GraphResult, types::TimeRange};
use rusqlite::params;

impl GraphStore {
    // ── Transfer ──────────────────────────────────────────────────

    pub fn insert_transfer(&self, t: &NewTransfer<'_>) -> GraphResult<()> {
        self.conn.execute(
            "INSERT INTO transfer (
                transfer_id, source_account, target_account, amount,
                occurred_at_ms, is_suspicious, typology
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                t.transfer_id,
                t.source_account,
                t.target_account,
                t.amount,
                t.occurred_at_ms,
                t.is_suspicious as i32,
                t.typology,
            ],
        )?;
        Ok(())
    }

    /// All transfers, or those inside `range` (both bounds inclusive).
    /// Rows without a timestamp never match a range.
    pub fn fetch_transfers(&self, range: Option<TimeRange>) -> GraphResult<Vec<TransferRow>> {
        let rows = match range {
            None => {
                let mut stmt = self.conn.prepare(
                    "SELECT transfer_id, source_account, target_account, amount,
                            occurred_at_ms, is_suspicious, typology
                     FROM transfer ORDER BY transfer_id ASC",
                )?;
                let rows = stmt.query_map([], transfer_row)?;
                rows.collect::<Result<Vec<_>, _>>()?
            }
            Some(r) => {
                let mut stmt = self.conn.prepare(
                    "SELECT transfer_id, source_account, target_account, amount,
                            occurred_at_ms, is_suspicious, typology
                     FROM transfer
                     WHERE occurred_at_ms IS NOT NULL
                       AND occurred_at_ms >= ?1 AND occurred_at_ms <= ?2
                     ORDER BY transfer_id ASC",
                )?;
                let rows = stmt.query_map(
                    params![r.start.timestamp_millis(), r.end.timestamp_millis()],
                    transfer_row,
                )?;
                rows.collect::<Result<Vec<_>, _>>()?
            }
        };
        Ok(rows)
    }

    pub fn network_counts(&self) -> GraphResult<NetworkCounts> {
        let count = |sql: &str| -> GraphResult<u64> {
            let n: i64 = self.conn.query_row(sql, [], |row| row.get(0))?;
            Ok(n as u64)
        };
        Ok(NetworkCounts {
            customers: count("SELECT COUNT(*) FROM customer")?,
            accounts: count("SELECT COUNT(*) FROM account")?,
            transfers: count("SELECT COUNT(*) FROM transfer")?,
            suspicious_transfers: count("SELECT COUNT(*) FROM transfer WHERE is_suspicious != 0")?,
        })
    }

    /// Suspicious transfers per typology, largest first. Untagged rows are
    /// grouped under "unknown".
    pub fn typology_counts(&self) -> GraphResult<Vec<(String, u64)>> {
        let mut stmt = self.conn.prepare(
            "SELECT COALESCE(typology, 'unknown') AS typ, COUNT(*) AS n
             FROM transfer WHERE is_suspicious != 0
             GROUP BY typ ORDER BY n DESC, typ ASC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u64))
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }
}

fn transfer_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<TransferRow> {
    Ok(TransferRow {
        transfer_id: row.get(0)?,
        source_account: row.get(1)?,
        target_account: row.get(2)?,
        amount: row.get(3)?,
        occurred_at_ms: row.get(4)?,
        is_suspicious: row.get::<_, i32>(5)? != 0,
        typology: row.get(6)?,
    })
}
