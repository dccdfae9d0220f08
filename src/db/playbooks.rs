use rusqlite::{params, Row};

use super::*;

impl CrmDb {
    // =========================================================================
    // Playbooks
    // =========================================================================

    /// Insert or update a playbook.
    pub fn upsert_playbook(&self, playbook: &DbPlaybook) -> Result<(), DbError> {
        self.conn.execute(
            "INSERT INTO playbooks (
                id, tenant_id, action_type, title, guidance, default_priority, default_due_days
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(id) DO UPDATE SET
                action_type = excluded.action_type,
                title = excluded.title,
                guidance = excluded.guidance,
                default_priority = excluded.default_priority,
                default_due_days = excluded.default_due_days",
            params![
                playbook.id,
                playbook.tenant_id,
                playbook.action_type,
                playbook.title,
                playbook.guidance,
                playbook.default_priority,
                playbook.default_due_days,
            ],
        )?;
        Ok(())
    }

    /// Best-effort playbook lookup for an action type.
    ///
    /// Prefers a tenant-specific playbook, falls back to a global one
    /// (`tenant_id IS NULL`). Absence is not an error.
    pub fn get_playbook(
        &self,
        tenant_id: &str,
        action_type: &str,
    ) -> Result<Option<DbPlaybook>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, tenant_id, action_type, title, guidance, default_priority, default_due_days
             FROM playbooks
             WHERE action_type = ?1 AND (tenant_id = ?2 OR tenant_id IS NULL)
             ORDER BY tenant_id IS NULL
             LIMIT 1",
        )?;
        let mut rows = stmt.query_map(params![action_type, tenant_id], Self::map_playbook_row)?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    fn map_playbook_row(row: &Row<'_>) -> rusqlite::Result<DbPlaybook> {
        Ok(DbPlaybook {
            id: row.get(0)?,
            tenant_id: row.get(1)?,
            action_type: row.get(2)?,
            title: row.get(3)?,
            guidance: row.get(4)?,
            default_priority: row.get(5)?,
            default_due_days: row.get(6)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_utils::test_db;
    use super::*;

    fn playbook(id: &str, tenant_id: Option<&str>) -> DbPlaybook {
        DbPlaybook {
            id: id.to_string(),
            tenant_id: tenant_id.map(|s| s.to_string()),
            action_type: "retention_call".to_string(),
            title: "Retention call playbook".to_string(),
            guidance: Some("Lead with the renewal timeline.".to_string()),
            default_priority: Some("high".to_string()),
            default_due_days: Some(5),
        }
    }

    #[test]
    fn test_tenant_specific_preferred_over_global() {
        let db = test_db();
        db.upsert_playbook(&playbook("pb-global", None)).unwrap();
        db.upsert_playbook(&playbook("pb-t1", Some("t1"))).unwrap();

        let found = db
            .get_playbook("t1", "retention_call")
            .expect("query")
            .expect("row");
        assert_eq!(found.id, "pb-t1");

        let other = db
            .get_playbook("t2", "retention_call")
            .expect("query")
            .expect("row");
        assert_eq!(other.id, "pb-global");
    }

    #[test]
    fn test_absent_playbook_is_none() {
        let db = test_db();
        let found = db.get_playbook("t1", "escalation").expect("query");
        assert!(found.is_none());
    }
}
