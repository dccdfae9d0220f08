use rusqlite::{params, Row};

use super::*;

impl CrmDb {
    // =========================================================================
    // Pipeline opportunities
    // =========================================================================

    /// Insert or update an opportunity.
    pub fn upsert_opportunity(&self, opp: &DbOpportunity) -> Result<(), DbError> {
        self.conn.execute(
            "INSERT INTO opportunities (
                id, tenant_id, account_id, stage, value, probability, status
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(id) DO UPDATE SET
                stage = excluded.stage,
                value = excluded.value,
                probability = excluded.probability,
                status = excluded.status",
            params![
                opp.id,
                opp.tenant_id,
                opp.account_id,
                opp.stage,
                opp.value,
                opp.probability,
                opp.status,
            ],
        )?;
        Ok(())
    }

    /// Open opportunities for an account.
    pub fn get_open_opportunities(
        &self,
        tenant_id: &str,
        account_id: &str,
    ) -> Result<Vec<DbOpportunity>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, tenant_id, account_id, stage, value, probability, status
             FROM opportunities
             WHERE tenant_id = ?1 AND account_id = ?2 AND status = 'open'
             ORDER BY value DESC",
        )?;
        let rows = stmt.query_map(params![tenant_id, account_id], Self::map_opportunity_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn map_opportunity_row(row: &Row<'_>) -> rusqlite::Result<DbOpportunity> {
        Ok(DbOpportunity {
            id: row.get(0)?,
            tenant_id: row.get(1)?,
            account_id: row.get(2)?,
            stage: row.get(3)?,
            value: row.get(4)?,
            probability: row.get(5)?,
            status: row.get(6)?,
        })
    }
}
