use rusqlite::{params, Row};

use super::*;

impl CrmDb {
    // =========================================================================
    // Health-score history
    // =========================================================================

    /// Record one health-score sample for an account.
    pub fn insert_health_snapshot(&self, snapshot: &DbHealthSnapshot) -> Result<(), DbError> {
        self.conn.execute(
            "INSERT INTO health_history (
                id, tenant_id, account_id, overall_score, component_scores,
                trend, churn_risk, recorded_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                snapshot.id,
                snapshot.tenant_id,
                snapshot.account_id,
                snapshot.overall_score,
                snapshot.component_scores,
                snapshot.trend,
                snapshot.churn_risk,
                snapshot.recorded_at,
            ],
        )?;
        Ok(())
    }

    /// Up to `limit` most recent health samples for an account, newest first.
    pub fn get_recent_health_history(
        &self,
        tenant_id: &str,
        account_id: &str,
        limit: u32,
    ) -> Result<Vec<DbHealthSnapshot>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, tenant_id, account_id, overall_score, component_scores,
                    trend, churn_risk, recorded_at
             FROM health_history
             WHERE tenant_id = ?1 AND account_id = ?2
             ORDER BY recorded_at DESC
             LIMIT ?3",
        )?;
        let rows = stmt.query_map(params![tenant_id, account_id, limit], Self::map_health_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn map_health_row(row: &Row<'_>) -> rusqlite::Result<DbHealthSnapshot> {
        Ok(DbHealthSnapshot {
            id: row.get(0)?,
            tenant_id: row.get(1)?,
            account_id: row.get(2)?,
            overall_score: row.get(3)?,
            component_scores: row.get(4)?,
            trend: row.get(5)?,
            churn_risk: row.get(6)?,
            recorded_at: row.get(7)?,
        })
    }
}
