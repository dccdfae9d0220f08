use rusqlite::{params, Row};

use super::*;

impl CrmDb {
    // =========================================================================
    // Follow-up actions (CTAs)
    // =========================================================================

    /// Create a follow-up action.
    ///
    /// When an idempotency key is present the insert is `OR IGNORE`, so a
    /// concurrent duplicate silently loses. Returns `true` if a row was
    /// actually inserted.
    pub fn create_follow_up(&self, follow_up: &DbFollowUp) -> Result<bool, DbError> {
        let rows = self.conn.execute(
            "INSERT OR IGNORE INTO follow_ups (
                id, tenant_id, account_id, action_type, priority, title, status,
                reason, due_date, assigned_to, prediction_id, idempotency_key, created_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            params![
                follow_up.id,
                follow_up.tenant_id,
                follow_up.account_id,
                follow_up.action_type,
                follow_up.priority,
                follow_up.title,
                follow_up.status,
                follow_up.reason,
                follow_up.due_date,
                follow_up.assigned_to,
                follow_up.prediction_id,
                follow_up.idempotency_key,
                follow_up.created_at,
            ],
        )?;
        Ok(rows > 0)
    }

    /// Open follow-ups for an account (status not terminal), newest first.
    pub fn get_open_follow_ups(
        &self,
        tenant_id: &str,
        account_id: &str,
    ) -> Result<Vec<DbFollowUp>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, tenant_id, account_id, action_type, priority, title, status,
                    reason, due_date, assigned_to, prediction_id, idempotency_key, created_at
             FROM follow_ups
             WHERE tenant_id = ?1 AND account_id = ?2
               AND status NOT IN ('COMPLETED', 'DISMISSED')
             ORDER BY created_at DESC",
        )?;
        let rows = stmt.query_map(params![tenant_id, account_id], Self::map_follow_up_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Most recent follow-up of a given type for an account, regardless of
    /// status. This is the recency check behind the CTA cooldown gate.
    pub fn get_latest_follow_up_of_type(
        &self,
        tenant_id: &str,
        account_id: &str,
        action_type: &str,
    ) -> Result<Option<DbFollowUp>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, tenant_id, account_id, action_type, priority, title, status,
                    reason, due_date, assigned_to, prediction_id, idempotency_key, created_at
             FROM follow_ups
             WHERE tenant_id = ?1 AND account_id = ?2 AND action_type = ?3
             ORDER BY created_at DESC
             LIMIT 1",
        )?;
        let mut rows = stmt.query_map(
            params![tenant_id, account_id, action_type],
            Self::map_follow_up_row,
        )?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    pub(crate) fn map_follow_up_row(row: &Row<'_>) -> rusqlite::Result<DbFollowUp> {
        Ok(DbFollowUp {
            id: row.get(0)?,
            tenant_id: row.get(1)?,
            account_id: row.get(2)?,
            action_type: row.get(3)?,
            priority: row.get(4)?,
            title: row.get(5)?,
            status: row.get(6)?,
            reason: row.get(7)?,
            due_date: row.get(8)?,
            assigned_to: row.get(9)?,
            prediction_id: row.get(10)?,
            idempotency_key: row.get(11)?,
            created_at: row.get(12)?,
        })
    }
}

#[cfg(test)]
pub(crate) fn sample_follow_up(id: &str, action_type: &str, created_at: &str) -> DbFollowUp {
    DbFollowUp {
        id: id.to_string(),
        tenant_id: "t1".to_string(),
        account_id: "acme".to_string(),
        action_type: action_type.to_string(),
        priority: "high".to_string(),
        title: "Schedule retention call".to_string(),
        status: "OPEN".to_string(),
        reason: None,
        due_date: None,
        assigned_to: None,
        prediction_id: None,
        idempotency_key: None,
        created_at: created_at.to_string(),
    }
}
