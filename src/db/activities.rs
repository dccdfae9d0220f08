use rusqlite::{params, Row};

use super::*;

impl CrmDb {
    // =========================================================================
    // Activity log
    // =========================================================================

    /// Record one activity (meeting, email, call, note) for an account.
    pub fn insert_activity(&self, activity: &DbActivity) -> Result<(), DbError> {
        self.conn.execute(
            "INSERT INTO activities (
                id, tenant_id, account_id, activity_type, occurred_at, sentiment
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                activity.id,
                activity.tenant_id,
                activity.account_id,
                activity.activity_type,
                activity.occurred_at,
                activity.sentiment,
            ],
        )?;
        Ok(())
    }

    /// Activities for an account since `cutoff` (RFC 3339), newest first.
    pub fn get_recent_activities(
        &self,
        tenant_id: &str,
        account_id: &str,
        cutoff: &str,
    ) -> Result<Vec<DbActivity>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, tenant_id, account_id, activity_type, occurred_at, sentiment
             FROM activities
             WHERE tenant_id = ?1 AND account_id = ?2 AND occurred_at >= ?3
             ORDER BY occurred_at DESC",
        )?;
        let rows = stmt.query_map(
            params![tenant_id, account_id, cutoff],
            Self::map_activity_row,
        )?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn map_activity_row(row: &Row<'_>) -> rusqlite::Result<DbActivity> {
        Ok(DbActivity {
            id: row.get(0)?,
            tenant_id: row.get(1)?,
            account_id: row.get(2)?,
            activity_type: row.get(3)?,
            occurred_at: row.get(4)?,
            sentiment: row.get(5)?,
        })
    }
}
