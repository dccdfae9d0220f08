use chrono::Utc;
use rusqlite::{params, Row};

use super::*;

impl CrmDb {
    // =========================================================================
    // Accounts
    // =========================================================================

    /// Insert or update an account within its tenant.
    pub fn upsert_account(&self, account: &DbAccount) -> Result<(), DbError> {
        self.conn.execute(
            "INSERT INTO accounts (
                id, tenant_id, name, account_type, health_score, engagement_score,
                churn_risk, archived, created_at, updated_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
             ON CONFLICT(tenant_id, id) DO UPDATE SET
                name = excluded.name,
                account_type = excluded.account_type,
                health_score = excluded.health_score,
                engagement_score = excluded.engagement_score,
                churn_risk = excluded.churn_risk,
                archived = excluded.archived,
                updated_at = excluded.updated_at",
            params![
                account.id,
                account.tenant_id,
                account.name,
                account.account_type,
                account.health_score,
                account.engagement_score,
                account.churn_risk,
                account.archived as i32,
                account.created_at,
                account.updated_at,
            ],
        )?;
        Ok(())
    }

    /// Get an account by ID within a tenant.
    pub fn get_account(&self, tenant_id: &str, id: &str) -> Result<Option<DbAccount>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, tenant_id, name, account_type, health_score, engagement_score,
                    churn_risk, archived, created_at, updated_at
             FROM accounts
             WHERE tenant_id = ?1 AND id = ?2",
        )?;

        let mut rows = stmt.query_map(params![tenant_id, id], Self::map_account_row)?;

        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    /// Mark an account archived (churned/offboarded).
    pub fn archive_account(&self, tenant_id: &str, id: &str) -> Result<bool, DbError> {
        let now = Utc::now().to_rfc3339();
        let rows = self.conn.execute(
            "UPDATE accounts SET archived = 1, updated_at = ?1
             WHERE tenant_id = ?2 AND id = ?3",
            params![now, tenant_id, id],
        )?;
        Ok(rows > 0)
    }

    pub(crate) fn map_account_row(row: &Row<'_>) -> rusqlite::Result<DbAccount> {
        Ok(DbAccount {
            id: row.get(0)?,
            tenant_id: row.get(1)?,
            name: row.get(2)?,
            account_type: row.get(3)?,
            health_score: row.get(4)?,
            engagement_score: row.get(5)?,
            churn_risk: row.get(6)?,
            archived: row.get::<_, i32>(7)? != 0,
            created_at: row.get(8)?,
            updated_at: row.get(9)?,
        })
    }
}
